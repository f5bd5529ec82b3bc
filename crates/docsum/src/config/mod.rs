pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, validate_config};
pub use schema::{
    request_budget, AiConfig, Config, LogFormat, LoggingConfig, QueueConfig, RetryConfig,
    TimeoutsConfig, CONFIG_VERSION,
};
