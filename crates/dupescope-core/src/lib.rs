pub mod config;
pub mod error;
pub mod models;
pub mod normalize;

pub use config::{AppConfig, EngineConfig};
pub use error::{DupescopeError, ExitCode, Result};
pub use models::*;
pub use normalize::{normalize, normalize_opt};
