use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scaler_core::ScalingError;

use super::order::OrderStatus;

/// 执行历史结果码
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    OrderCreated,
    NoDevicesFound,
    NoEligibleDevices,
    ThresholdNotMet,
    NoSnapshotData,
    ConfigError,
    DeviceQueryFailed,
    DatabaseError,
    OrderCreationFailed,
    OrderProcessing,
    OrderCompleted,
    OrderFailed,
    OrderCancelled,
    OrderIgnored,
    OrderTimestampMissing,
}

text_enum!(ResultCode {
    OrderCreated => "order_created",
    NoDevicesFound => "no_devices_found",
    NoEligibleDevices => "no_eligible_devices",
    ThresholdNotMet => "threshold_not_met",
    NoSnapshotData => "no_snapshot_data",
    ConfigError => "config_error",
    DeviceQueryFailed => "device_query_failed",
    DatabaseError => "database_error",
    OrderCreationFailed => "order_creation_failed",
    OrderProcessing => "order_processing",
    OrderCompleted => "order_completed",
    OrderFailed => "order_failed",
    OrderCancelled => "order_cancelled",
    OrderIgnored => "order_ignored",
    OrderTimestampMissing => "order_timestamp_missing",
});

impl ResultCode {
    /// 产生了订单的结果，用于冷却期判断
    pub const ORDER_CREATING: [ResultCode; 3] = [
        ResultCode::OrderCreated,
        ResultCode::NoDevicesFound,
        ResultCode::NoEligibleDevices,
    ];

    pub fn creates_order(&self) -> bool {
        Self::ORDER_CREATING.contains(self)
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ResultCode::ConfigError
                | ResultCode::DeviceQueryFailed
                | ResultCode::DatabaseError
                | ResultCode::OrderCreationFailed
        )
    }

    /// 将评估过程中的错误归类为结果码
    pub fn from_error(error: &ScalingError) -> Self {
        if error.is_configuration_error() {
            return ResultCode::ConfigError;
        }
        match error {
            ScalingError::DeviceQuery(_) | ScalingError::Network(_) => {
                ResultCode::DeviceQueryFailed
            }
            ScalingError::OrderCreation(_) => ResultCode::OrderCreationFailed,
            _ => ResultCode::DatabaseError,
        }
    }

    /// 订单状态变更对应的历史结果码，非终态且非执行中的状态不记录
    pub fn from_order_status(status: OrderStatus) -> Option<Self> {
        match status {
            OrderStatus::Processing | OrderStatus::MaintenanceInProgress => {
                Some(ResultCode::OrderProcessing)
            }
            OrderStatus::Completed => Some(ResultCode::OrderCompleted),
            OrderStatus::Failed => Some(ResultCode::OrderFailed),
            OrderStatus::Cancelled => Some(ResultCode::OrderCancelled),
            OrderStatus::Ignored => Some(ResultCode::OrderIgnored),
            OrderStatus::Pending
            | OrderStatus::PendingConfirmation
            | OrderStatus::ScheduledForMaintenance => None,
        }
    }
}

/// 策略执行历史，只追加不修改
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyExecutionHistory {
    pub id: i64,
    pub strategy_id: i64,
    pub cluster_id: Option<i64>,
    pub resource_type: Option<String>,
    pub execution_time: DateTime<Utc>,
    pub triggered_value: String,
    pub threshold_value: String,
    pub result: ResultCode,
    pub order_id: Option<i64>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl StrategyExecutionHistory {
    pub fn new(strategy_id: i64, result: ResultCode, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            strategy_id,
            cluster_id: None,
            resource_type: None,
            execution_time: now,
            triggered_value: String::new(),
            threshold_value: String::new(),
            result,
            order_id: None,
            reason: reason.into(),
            created_at: now,
        }
    }

    pub fn with_target(mut self, cluster_id: i64, resource_type: impl Into<String>) -> Self {
        self.cluster_id = Some(cluster_id);
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn with_cluster(mut self, cluster_id: Option<i64>) -> Self {
        self.cluster_id = cluster_id;
        self
    }

    pub fn with_values(
        mut self,
        triggered_value: impl Into<String>,
        threshold_value: impl Into<String>,
    ) -> Self {
        self.triggered_value = triggered_value.into();
        self.threshold_value = threshold_value.into();
        self
    }

    pub fn with_order(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_execution_time(mut self, execution_time: DateTime<Utc>) -> Self {
        self.execution_time = execution_time;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_code_from_error() {
        assert_eq!(
            ResultCode::from_error(&ScalingError::MissingQueryTemplate {
                action: "pool_exit".to_string()
            }),
            ResultCode::ConfigError
        );
        assert_eq!(
            ResultCode::from_error(&ScalingError::DeviceQuery("503".to_string())),
            ResultCode::DeviceQueryFailed
        );
        assert_eq!(
            ResultCode::from_error(&ScalingError::OrderCreation("rollback".to_string())),
            ResultCode::OrderCreationFailed
        );
        assert_eq!(
            ResultCode::from_error(&ScalingError::DatabaseOperation("locked".to_string())),
            ResultCode::DatabaseError
        );
    }

    #[test]
    fn test_order_creating_codes() {
        assert!(ResultCode::OrderCreated.creates_order());
        assert!(ResultCode::NoEligibleDevices.creates_order());
        assert!(!ResultCode::ThresholdNotMet.creates_order());
        assert!(!ResultCode::OrderCompleted.creates_order());
    }

    #[test]
    fn test_result_code_from_order_status() {
        assert_eq!(
            ResultCode::from_order_status(OrderStatus::Completed),
            Some(ResultCode::OrderCompleted)
        );
        assert_eq!(ResultCode::from_order_status(OrderStatus::Pending), None);
    }

    #[test]
    fn test_history_builder() {
        let history = StrategyExecutionHistory::new(9, ResultCode::OrderCreated, "ok")
            .with_target(3, "gpu")
            .with_values("CPU: 85.00%", "CPU使用率 > 80.00%")
            .with_order(11);
        assert_eq!(history.cluster_id, Some(3));
        assert_eq!(history.resource_type.as_deref(), Some("gpu"));
        assert_eq!(history.order_id, Some(11));
        assert_eq!(history.result.as_str(), "order_created");
    }
}
