//! # Outbox Config
//!
//! Configuration management for the Outbox offline operation queue.
//!
//! Configuration lives in a single TOML file with optional `[queue]`,
//! `[reachability]`, `[storage]` and `[logging]` sections. Values of the
//! form `${VAR}` are substituted from the environment before parsing.

mod error;
mod loader;
mod logging;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use logging::{build_filter, init_logging};
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
