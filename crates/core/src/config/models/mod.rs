pub mod api_observability;
pub mod app_config;
pub mod database;
pub mod device_directory;
pub mod evaluator;
pub mod lock;

// Re-export main types for easier imports
pub use api_observability::{ApiConfig, LogFormat, ObservabilityConfig};
pub use app_config::AppConfig;
pub use database::DatabaseConfig;
pub use device_directory::DeviceDirectoryConfig;
pub use evaluator::EvaluatorConfig;
pub use lock::{LockBackend, LockConfig};
