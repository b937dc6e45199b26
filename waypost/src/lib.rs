//! # waypost
//!
//! Kohana-style route patterns: compile `<name>`, `<name:regex>` and nested
//! `( ... )` optional groups into matchers, build URIs back from parameters,
//! and keep compiled route tables in an on-disk cache.
//!
//! This is the meta-crate that re-exports the sub-crates. Depend on
//! `waypost-core` or `waypost-router` directly for finer-grained control.
//!
//! ```
//! use waypost::prelude::*;
//!
//! let definitions = vec![
//!     RouteDefinition::new("admin(/<controller>(/<action>(/<id>)))").named("admin"),
//!     RouteDefinition::new("(<controller>(/<action>(/<id>)))")
//!         .named("default")
//!         .default_value("controller", "welcome")
//!         .default_value("action", "index"),
//! ];
//!
//! let registry = RouteRegistry::new();
//! let result = bootstrap(&registry, &Settings::default(), &definitions);
//! assert!(result.errors.is_empty());
//!
//! let table = registry.snapshot();
//! let m = table.first_match("/news/view/42").unwrap();
//! assert_eq!(m.name, "default");
//! assert_eq!(m.params["id"], "42");
//!
//! assert_eq!(table.url("default", &Params::new(), "/", None).unwrap(), "/welcome/index");
//! ```

/// Error types, settings, logging, and sessions.
pub use waypost_core as core;

/// Route compilation, matching, reverse building, and caching.
pub use waypost_router as router;

// Third-party re-exports
pub use serde;
pub use serde_json;
pub use tracing;

/// Prelude module for convenient glob imports.
///
/// ```
/// use waypost::prelude::*;
/// ```
pub mod prelude {
    pub use waypost_core::{Settings, WaypostError, WaypostResult};
    pub use waypost_router::{
        bootstrap, global_registry, ConstraintTable, Origin, Params, Route, RouteCache,
        RouteDefinition, RouteMatch, RouteOptions, RouteRegistry, RouteTable,
    };
}

/// Builds the URL for a named route in the global registry, rooted at
/// `settings.base_url`.
///
/// The URL is relative unless a `protocol` is given and `settings.host` is
/// set, in which case it is prefixed with `protocol://host`.
///
/// # Errors
///
/// Returns [`core::WaypostError::RouteNotFound`] for an unknown name, or the
/// reverse-build error.
pub fn url(
    settings: &core::Settings,
    name: &str,
    params: &router::Params,
    protocol: Option<&str>,
) -> core::WaypostResult<String> {
    let origin = protocol
        .zip(settings.host.as_deref())
        .map(|(protocol, host)| router::Origin::new(protocol, host));
    router::global_registry()
        .snapshot()
        .url(name, params, &settings.base_url, origin.as_ref())
}
