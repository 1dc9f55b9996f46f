pub mod config;
pub mod error;
pub mod project;

pub use config::Config;
pub use error::*;
pub use project::ProjectConfig;
