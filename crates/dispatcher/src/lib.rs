//! 弹性伸缩调度核心
//!
//! 策略评估循环、设备匹配、订单管理（含设备维护流程）与执行历史记录。

pub mod device_matcher;
pub mod evaluator;
pub mod history_recorder;
pub mod maintenance;
pub mod order_handlers;
pub mod order_manager;

pub use device_matcher::DeviceMatcher;
pub use evaluator::{EvaluatorDependencies, StrategyEvaluator, SweepSummary};
pub use history_recorder::HistoryRecorder;
pub use maintenance::{MaintenanceCompletion, MaintenanceRequest, MaintenanceService};
pub use order_handlers::{
    ElasticScalingOrderHandler, MaintenanceOrderHandler, OrderHandler, OrderHandlerRegistry,
};
pub use order_manager::{
    generate_order_number, OrderDraft, OrderManager, StatusChange, StatusTransition,
};
