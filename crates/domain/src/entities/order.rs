use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::strategy::TriggerAction;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    ElasticScaling,
    Maintenance,
}

text_enum!(OrderType {
    ElasticScaling => "elastic_scaling",
    Maintenance => "maintenance",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Ignored,
    PendingConfirmation,
    ScheduledForMaintenance,
    MaintenanceInProgress,
}

text_enum!(OrderStatus {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
    Ignored => "ignored",
    PendingConfirmation => "pending_confirmation",
    ScheduledForMaintenance => "scheduled_for_maintenance",
    MaintenanceInProgress => "maintenance_in_progress",
});

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed
                | OrderStatus::Failed
                | OrderStatus::Cancelled
                | OrderStatus::Ignored
        )
    }

    /// 进入该状态时需要记录执行时间
    pub fn starts_execution(&self) -> bool {
        matches!(
            self,
            OrderStatus::Processing | OrderStatus::MaintenanceInProgress
        )
    }
}

/// 订单状态流转路径
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderWorkflow {
    /// pending → processing → completed
    Standard,
    /// pending_confirmation → scheduled_for_maintenance → maintenance_in_progress → completed
    Maintenance,
}

impl OrderWorkflow {
    pub fn initial_status(&self) -> OrderStatus {
        match self {
            OrderWorkflow::Standard => OrderStatus::Pending,
            OrderWorkflow::Maintenance => OrderStatus::PendingConfirmation,
        }
    }

    pub fn can_transition(&self, from: OrderStatus, to: OrderStatus) -> bool {
        use OrderStatus::*;

        if from.is_terminal() || from == to {
            return false;
        }

        match self {
            OrderWorkflow::Standard => matches!(
                (from, to),
                (Pending, Processing)
                    | (Processing, Completed)
                    | (Pending | Processing, Failed | Cancelled | Ignored)
            ),
            OrderWorkflow::Maintenance => matches!(
                (from, to),
                (PendingConfirmation, ScheduledForMaintenance)
                    | (ScheduledForMaintenance, MaintenanceInProgress)
                    | (MaintenanceInProgress, Completed)
                    | (
                        PendingConfirmation | ScheduledForMaintenance | MaintenanceInProgress,
                        Failed | Cancelled | Ignored
                    )
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceAction {
    /// 设备维护申请（cordon/drain）
    Request,
    /// 维护完成后的恢复调度（uncordon）
    Uncordon,
}

text_enum!(MaintenanceAction {
    Request => "maintenance_request",
    Uncordon => "maintenance_uncordon",
});

/// 弹性伸缩订单详情
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElasticScalingDetail {
    pub cluster_id: i64,
    pub strategy_id: Option<i64>,
    pub action: TriggerAction,
    pub resource_type: String,
    pub device_count: i32,
    pub triggered_value: String,
    pub threshold_value: String,
}

/// 设备维护订单详情
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaintenanceDetail {
    pub cluster_id: Option<i64>,
    pub action: MaintenanceAction,
    pub device_count: i32,
    pub maintenance_start: Option<DateTime<Utc>>,
    pub maintenance_end: Option<DateTime<Utc>>,
    pub external_ticket_id: Option<String>,
}

/// 按订单类型区分的详情记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderDetail {
    ElasticScaling(ElasticScalingDetail),
    Maintenance(MaintenanceDetail),
}

impl OrderDetail {
    pub fn order_type(&self) -> OrderType {
        match self {
            OrderDetail::ElasticScaling(_) => OrderType::ElasticScaling,
            OrderDetail::Maintenance(_) => OrderType::Maintenance,
        }
    }

    pub fn workflow(&self) -> OrderWorkflow {
        match self {
            OrderDetail::ElasticScaling(_) => OrderWorkflow::Standard,
            OrderDetail::Maintenance(detail) => match detail.action {
                MaintenanceAction::Request => OrderWorkflow::Maintenance,
                MaintenanceAction::Uncordon => OrderWorkflow::Standard,
            },
        }
    }

    pub fn strategy_id(&self) -> Option<i64> {
        match self {
            OrderDetail::ElasticScaling(detail) => detail.strategy_id,
            OrderDetail::Maintenance(_) => None,
        }
    }

    pub fn cluster_id(&self) -> Option<i64> {
        match self {
            OrderDetail::ElasticScaling(detail) => Some(detail.cluster_id),
            OrderDetail::Maintenance(detail) => detail.cluster_id,
        }
    }

    /// 详情表中 action_type 列的取值
    pub fn action_type(&self) -> &'static str {
        match self {
            OrderDetail::ElasticScaling(detail) => detail.action.as_str(),
            OrderDetail::Maintenance(detail) => detail.action.as_str(),
        }
    }

    pub fn external_ticket_id(&self) -> Option<&str> {
        match self {
            OrderDetail::ElasticScaling(_) => None,
            OrderDetail::Maintenance(detail) => detail.external_ticket_id.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    pub name: String,
    pub description: Option<String>,
    pub status: OrderStatus,
    pub executor: Option<String>,
    pub execution_time: Option<DateTime<Utc>>,
    pub completion_time: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub detail: OrderDetail,
}

impl Order {
    pub fn order_type(&self) -> OrderType {
        self.detail.order_type()
    }

    pub fn workflow(&self) -> OrderWorkflow {
        self.detail.workflow()
    }

    pub fn entity_description(&self) -> String {
        format!(
            "订单 '{}' (ID: {}, 类型: {}, 状态: {})",
            self.order_number,
            self.id,
            self.order_type(),
            self.status
        )
    }
}

/// 待创建的订单，订单行、详情行、设备关联行在同一事务中写入
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub order_number: String,
    pub name: String,
    pub description: Option<String>,
    pub status: OrderStatus,
    pub created_by: String,
    pub detail: OrderDetail,
    pub device_ids: Vec<i64>,
}

/// 订单状态变更写入的字段
///
/// 仅当订单当前状态仍为 `expected_status` 时写入。
#[derive(Debug, Clone, PartialEq)]
pub struct OrderStatusUpdate {
    pub expected_status: OrderStatus,
    pub status: OrderStatus,
    pub executor: Option<String>,
    pub execution_time: Option<DateTime<Utc>>,
    pub completion_time: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderDeviceStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

text_enum!(OrderDeviceStatus {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderDevice {
    pub id: i64,
    pub order_id: i64,
    pub device_id: i64,
    pub status: OrderDeviceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn test_standard_workflow_transitions() {
        let wf = OrderWorkflow::Standard;
        assert_eq!(wf.initial_status(), Pending);
        assert!(wf.can_transition(Pending, Processing));
        assert!(wf.can_transition(Processing, Completed));
        assert!(!wf.can_transition(Pending, Completed));
        assert!(wf.can_transition(Pending, Ignored));
        assert!(wf.can_transition(Processing, Failed));
        assert!(!wf.can_transition(Completed, Processing));
        assert!(!wf.can_transition(Pending, ScheduledForMaintenance));
        assert!(!wf.can_transition(Processing, Processing));
    }

    #[test]
    fn test_maintenance_workflow_transitions() {
        let wf = OrderWorkflow::Maintenance;
        assert_eq!(wf.initial_status(), PendingConfirmation);
        assert!(wf.can_transition(PendingConfirmation, ScheduledForMaintenance));
        assert!(wf.can_transition(ScheduledForMaintenance, MaintenanceInProgress));
        assert!(wf.can_transition(MaintenanceInProgress, Completed));
        assert!(wf.can_transition(ScheduledForMaintenance, Cancelled));
        assert!(!wf.can_transition(PendingConfirmation, Completed));
        assert!(!wf.can_transition(PendingConfirmation, Processing));
        assert!(!wf.can_transition(Cancelled, ScheduledForMaintenance));
    }

    #[test]
    fn test_detail_workflow_by_action() {
        let request = OrderDetail::Maintenance(MaintenanceDetail {
            cluster_id: Some(1),
            action: MaintenanceAction::Request,
            device_count: 1,
            maintenance_start: None,
            maintenance_end: None,
            external_ticket_id: Some("T-1".to_string()),
        });
        assert_eq!(request.workflow(), OrderWorkflow::Maintenance);
        assert_eq!(request.order_type(), OrderType::Maintenance);
        assert_eq!(request.external_ticket_id(), Some("T-1"));

        let uncordon = OrderDetail::Maintenance(MaintenanceDetail {
            cluster_id: Some(1),
            action: MaintenanceAction::Uncordon,
            device_count: 1,
            maintenance_start: None,
            maintenance_end: None,
            external_ticket_id: Some("T-1".to_string()),
        });
        assert_eq!(uncordon.workflow(), OrderWorkflow::Standard);
    }

    #[test]
    fn test_terminal_status() {
        assert!(Completed.is_terminal());
        assert!(Ignored.is_terminal());
        assert!(!MaintenanceInProgress.is_terminal());
        assert!(MaintenanceInProgress.starts_execution());
    }
}
