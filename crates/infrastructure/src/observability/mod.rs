//! 可观测性：日志初始化、指标采集、结构化日志事件

pub mod metrics_collector;
pub mod structured_logger;
pub mod telemetry;

pub use metrics_collector::MetricsCollector;
pub use structured_logger::StructuredLogger;
pub use telemetry::{init_logging, init_metrics};
