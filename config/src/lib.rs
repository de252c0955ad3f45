//! Configuration for the replicant daemon.
//!
//! Configuration is loaded once at startup by [`load_config`] and handed to each component's
//! constructor. Nothing in the workspace performs ambient configuration lookups.

mod environment;
mod load;
pub mod shared;

pub use environment::{Environment, UnknownEnvironment};
pub use load::{Config, LoadConfigError, load_config, load_config_from};
