pub mod config;
pub mod logging;
pub mod metrics;

pub use config::{Config, ConfigError};
pub use metrics::NodeMetrics;
