//! # waypost-core
//!
//! Core types shared by the waypost routing crates: the error enum, settings and
//! their loader, logging, and the session and feed collaborators used by dispatch code.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Application settings (base URL, cache, logging, sessions)
//! - [`settings_loader`] - Loading settings from TOML/JSON files and the environment
//! - [`logging`] - Tracing setup and the dated file log writer
//! - [`session`] - Session storage collaborator
//! - [`feed`] - Feed collaborator interface

pub mod error;
pub mod feed;
pub mod logging;
pub mod session;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{WaypostError, WaypostResult};
pub use settings::Settings;
