//! 领域服务：阈值突破检测、容量计算与设备选择，均为无状态纯计算

pub mod breach_detector;
pub mod capacity;
pub mod device_selection;

pub use breach_detector::{BreachDetector, BreachEvaluation, DailySnapshot, DetectionOutcome};
pub use capacity::{CapacityDelta, CapacityPlanner};
pub use device_selection::{DeviceSelection, DeviceSelector};
