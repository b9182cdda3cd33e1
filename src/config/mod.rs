pub mod app;

pub use app::{AppConfig, ConfigError, ProfileConfig};
