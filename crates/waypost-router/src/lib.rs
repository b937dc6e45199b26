//! # waypost-router
//!
//! Route patterns in the Kohana style, compiled into anchored regular
//! expressions:
//!
//! - `<name>` captures one path segment
//! - `<name:regex>` captures text matching an inline regular expression
//! - `( ... )` marks an optional group, which may nest
//!
//! ```
//! use waypost_router::pattern::{Params, Route, RouteOptions};
//!
//! let options = RouteOptions::new()
//!     .default_value("controller", "welcome")
//!     .default_value("action", "index");
//! let route = Route::compile_with("(<controller>(/<action>(/<id>)))", &options).unwrap();
//!
//! let params = route.matches("news/view/42").unwrap();
//! assert_eq!(params["id"], "42");
//!
//! assert_eq!(route.uri(&Params::new()).unwrap(), "welcome/index");
//! ```
//!
//! ## Modules
//!
//! - [`constraints`] - Per-parameter regex constraints
//! - [`pattern`] - Pattern parsing and compiled routes
//! - [`matcher`] - Matching request paths
//! - [`reverse`] - Building paths and URLs from parameters
//! - [`registry`] - Ordered route tables, the global registry, and bootstrap
//! - [`cache`] - On-disk route table cache
//! - [`config`] - Route definitions loaded from TOML or JSON

pub mod cache;
pub mod config;
pub mod constraints;
pub mod matcher;
pub mod pattern;
pub mod registry;
pub mod reverse;

pub use cache::RouteCache;
pub use config::RouteDefinition;
pub use constraints::ConstraintTable;
pub use pattern::{Params, Route, RouteOptions, Segment};
pub use registry::{bootstrap, global_registry, RouteMatch, RouteRegistry, RouteTable};
pub use reverse::Origin;
