//! 数据库行与领域实体的映射
//!
//! 两种数据库的列定义一致，行结构通过 `sqlx::FromRow` 共用。

use chrono::{DateTime, Utc};
use scaler_core::{ScalingError, ScalingResult};
use scaler_domain::entities::{
    ElasticScalingDetail, MaintenanceAction, MaintenanceDetail, MetricThreshold, Order,
    OrderDetail, OrderDevice, QueryTemplate, ResourceSnapshot, ResultCode, Strategy,
    StrategyExecutionHistory, ThresholdType, TriggerAction,
};

pub const STRATEGY_COLUMNS: &str = "id, name, description, trigger_action, \
    cpu_threshold_value, cpu_threshold_type, cpu_target_value, \
    memory_threshold_value, memory_threshold_type, memory_target_value, \
    condition_logic, resource_types, device_count, duration_minutes, cooldown_minutes, status, \
    entry_query_template_id, exit_query_template_id, created_by, created_at, updated_at";

pub const SNAPSHOT_COLUMNS: &str = "id, cluster_id, resource_type, cpu_capacity, cpu_request, \
    max_cpu_usage_ratio, memory_capacity, memory_request, max_memory_usage_ratio, created_at";

pub const HISTORY_COLUMNS: &str = "id, strategy_id, cluster_id, resource_type, execution_time, \
    triggered_value, threshold_value, result, order_id, reason, created_at";

/// 订单与详情的联合查询列
pub const ORDER_SELECT: &str = "SELECT o.id, o.order_number, o.name, o.description, o.order_type, \
    o.status, o.executor, o.execution_time, o.completion_time, o.failure_reason, o.created_by, \
    o.created_at, o.updated_at, d.cluster_id AS detail_cluster_id, \
    d.strategy_id AS detail_strategy_id, d.action_type AS detail_action_type, \
    d.resource_type AS detail_resource_type, d.device_count AS detail_device_count, \
    d.triggered_value AS detail_triggered_value, d.threshold_value AS detail_threshold_value, \
    d.maintenance_start AS detail_maintenance_start, d.maintenance_end AS detail_maintenance_end, \
    d.external_ticket_id AS detail_external_ticket_id \
    FROM orders o LEFT JOIN elastic_scaling_order_details d ON d.order_id = o.id";

pub const ORDER_DEVICE_COLUMNS: &str = "id, order_id, device_id, status, created_at, updated_at";

pub const QUERY_TEMPLATE_COLUMNS: &str = "id, name, filter_groups, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
pub struct StrategyRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub trigger_action: String,
    pub cpu_threshold_value: Option<f64>,
    pub cpu_threshold_type: Option<String>,
    pub cpu_target_value: Option<f64>,
    pub memory_threshold_value: Option<f64>,
    pub memory_threshold_type: Option<String>,
    pub memory_target_value: Option<f64>,
    pub condition_logic: String,
    pub resource_types: String,
    pub device_count: i32,
    pub duration_minutes: i64,
    pub cooldown_minutes: i64,
    pub status: String,
    pub entry_query_template_id: Option<i64>,
    pub exit_query_template_id: Option<i64>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StrategyRow {
    pub fn into_strategy(self, cluster_ids: Vec<i64>) -> ScalingResult<Strategy> {
        Ok(Strategy {
            id: self.id,
            name: self.name,
            description: self.description,
            trigger_action: self.trigger_action.parse()?,
            cpu: threshold(
                self.cpu_threshold_value,
                self.cpu_threshold_type,
                self.cpu_target_value,
            )?,
            memory: threshold(
                self.memory_threshold_value,
                self.memory_threshold_type,
                self.memory_target_value,
            )?,
            condition_logic: self.condition_logic.parse()?,
            resource_types: self.resource_types,
            device_count: self.device_count,
            duration_minutes: self.duration_minutes,
            cooldown_minutes: self.cooldown_minutes,
            status: self.status.parse()?,
            cluster_ids,
            entry_query_template_id: self.entry_query_template_id,
            exit_query_template_id: self.exit_query_template_id,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn threshold(
    value: Option<f64>,
    threshold_type: Option<String>,
    target_value: Option<f64>,
) -> ScalingResult<Option<MetricThreshold>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let threshold_type = match threshold_type {
        Some(t) => t.parse()?,
        None => ThresholdType::Usage,
    };
    Ok(Some(MetricThreshold {
        value,
        threshold_type,
        target_value,
    }))
}

/// 策略阈值展开后的列值，按 (value, type, target) 顺序
pub fn threshold_columns(
    threshold: Option<&MetricThreshold>,
) -> (Option<f64>, Option<&'static str>, Option<f64>) {
    match threshold {
        Some(t) => (Some(t.value), Some(t.threshold_type.as_str()), t.target_value),
        None => (None, None, None),
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct SnapshotRow {
    pub id: i64,
    pub cluster_id: i64,
    pub resource_type: String,
    pub cpu_capacity: f64,
    pub cpu_request: f64,
    pub max_cpu_usage_ratio: f64,
    pub memory_capacity: f64,
    pub memory_request: f64,
    pub max_memory_usage_ratio: f64,
    pub created_at: DateTime<Utc>,
}

impl From<SnapshotRow> for ResourceSnapshot {
    fn from(row: SnapshotRow) -> Self {
        ResourceSnapshot {
            id: row.id,
            cluster_id: row.cluster_id,
            resource_type: row.resource_type,
            cpu_capacity: row.cpu_capacity,
            cpu_request: row.cpu_request,
            max_cpu_usage_ratio: row.max_cpu_usage_ratio,
            memory_capacity: row.memory_capacity,
            memory_request: row.memory_request,
            max_memory_usage_ratio: row.max_memory_usage_ratio,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct HistoryRow {
    pub id: i64,
    pub strategy_id: i64,
    pub cluster_id: Option<i64>,
    pub resource_type: Option<String>,
    pub execution_time: DateTime<Utc>,
    pub triggered_value: String,
    pub threshold_value: String,
    pub result: String,
    pub order_id: Option<i64>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for StrategyExecutionHistory {
    type Error = ScalingError;

    fn try_from(row: HistoryRow) -> ScalingResult<Self> {
        Ok(StrategyExecutionHistory {
            id: row.id,
            strategy_id: row.strategy_id,
            cluster_id: row.cluster_id,
            resource_type: row.resource_type,
            execution_time: row.execution_time,
            triggered_value: row.triggered_value,
            threshold_value: row.threshold_value,
            result: row.result.parse::<ResultCode>()?,
            order_id: row.order_id,
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub order_number: String,
    pub name: String,
    pub description: Option<String>,
    pub order_type: String,
    pub status: String,
    pub executor: Option<String>,
    pub execution_time: Option<DateTime<Utc>>,
    pub completion_time: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub detail_cluster_id: Option<i64>,
    pub detail_strategy_id: Option<i64>,
    pub detail_action_type: Option<String>,
    pub detail_resource_type: Option<String>,
    pub detail_device_count: Option<i32>,
    pub detail_triggered_value: Option<String>,
    pub detail_threshold_value: Option<String>,
    pub detail_maintenance_start: Option<DateTime<Utc>>,
    pub detail_maintenance_end: Option<DateTime<Utc>>,
    pub detail_external_ticket_id: Option<String>,
}

impl TryFrom<OrderRow> for Order {
    type Error = ScalingError;

    fn try_from(row: OrderRow) -> ScalingResult<Self> {
        let action_type = row.detail_action_type.clone().ok_or_else(|| {
            ScalingError::DatabaseOperation(format!("订单 {} 缺少详情记录", row.order_number))
        })?;

        let detail = match action_type.parse::<TriggerAction>() {
            Ok(action) => OrderDetail::ElasticScaling(ElasticScalingDetail {
                cluster_id: row.detail_cluster_id.unwrap_or_default(),
                strategy_id: row.detail_strategy_id,
                action,
                resource_type: row.detail_resource_type.unwrap_or_default(),
                device_count: row.detail_device_count.unwrap_or_default(),
                triggered_value: row.detail_triggered_value.unwrap_or_default(),
                threshold_value: row.detail_threshold_value.unwrap_or_default(),
            }),
            Err(_) => OrderDetail::Maintenance(MaintenanceDetail {
                cluster_id: row.detail_cluster_id,
                action: action_type.parse::<MaintenanceAction>()?,
                device_count: row.detail_device_count.unwrap_or_default(),
                maintenance_start: row.detail_maintenance_start,
                maintenance_end: row.detail_maintenance_end,
                external_ticket_id: row.detail_external_ticket_id,
            }),
        };

        if detail.order_type().as_str() != row.order_type {
            return Err(ScalingError::DatabaseOperation(format!(
                "订单 {} 类型 {} 与详情动作 {} 不一致",
                row.order_number, row.order_type, action_type
            )));
        }

        Ok(Order {
            id: row.id,
            order_number: row.order_number,
            name: row.name,
            description: row.description,
            status: row.status.parse()?,
            executor: row.executor,
            execution_time: row.execution_time,
            completion_time: row.completion_time,
            failure_reason: row.failure_reason,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            detail,
        })
    }
}

/// 详情表的写入列值
pub struct DetailColumns<'a> {
    pub cluster_id: Option<i64>,
    pub strategy_id: Option<i64>,
    pub action_type: &'static str,
    pub resource_type: Option<&'a str>,
    pub device_count: i32,
    pub triggered_value: Option<&'a str>,
    pub threshold_value: Option<&'a str>,
    pub maintenance_start: Option<DateTime<Utc>>,
    pub maintenance_end: Option<DateTime<Utc>>,
    pub external_ticket_id: Option<&'a str>,
}

impl<'a> From<&'a OrderDetail> for DetailColumns<'a> {
    fn from(detail: &'a OrderDetail) -> Self {
        match detail {
            OrderDetail::ElasticScaling(d) => DetailColumns {
                cluster_id: Some(d.cluster_id),
                strategy_id: d.strategy_id,
                action_type: d.action.as_str(),
                resource_type: Some(d.resource_type.as_str()),
                device_count: d.device_count,
                triggered_value: Some(d.triggered_value.as_str()),
                threshold_value: Some(d.threshold_value.as_str()),
                maintenance_start: None,
                maintenance_end: None,
                external_ticket_id: None,
            },
            OrderDetail::Maintenance(d) => DetailColumns {
                cluster_id: d.cluster_id,
                strategy_id: None,
                action_type: d.action.as_str(),
                resource_type: None,
                device_count: d.device_count,
                triggered_value: None,
                threshold_value: None,
                maintenance_start: d.maintenance_start,
                maintenance_end: d.maintenance_end,
                external_ticket_id: d.external_ticket_id.as_deref(),
            },
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct OrderDeviceRow {
    pub id: i64,
    pub order_id: i64,
    pub device_id: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OrderDeviceRow> for OrderDevice {
    type Error = ScalingError;

    fn try_from(row: OrderDeviceRow) -> ScalingResult<Self> {
        Ok(OrderDevice {
            id: row.id,
            order_id: row.order_id,
            device_id: row.device_id,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct QueryTemplateRow {
    pub id: i64,
    pub name: String,
    pub filter_groups: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<QueryTemplateRow> for QueryTemplate {
    fn from(row: QueryTemplateRow) -> Self {
        QueryTemplate {
            id: row.id,
            name: row.name,
            groups: row.filter_groups,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// 把关联行 (strategy_id, cluster_id) 按策略分组
pub fn group_cluster_ids(relations: Vec<(i64, i64)>) -> std::collections::HashMap<i64, Vec<i64>> {
    let mut grouped: std::collections::HashMap<i64, Vec<i64>> = std::collections::HashMap::new();
    for (strategy_id, cluster_id) in relations {
        grouped.entry(strategy_id).or_default().push(cluster_id);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use scaler_domain::entities::{OrderType, StrategyStatus};

    fn order_row(action_type: &str, order_type: &str) -> OrderRow {
        OrderRow {
            id: 1,
            order_number: "MNT202401010000001234".to_string(),
            name: "maintenance".to_string(),
            description: None,
            order_type: order_type.to_string(),
            status: "pending_confirmation".to_string(),
            executor: None,
            execution_time: None,
            completion_time: None,
            failure_reason: None,
            created_by: "ops".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            detail_cluster_id: Some(3),
            detail_strategy_id: None,
            detail_action_type: Some(action_type.to_string()),
            detail_resource_type: None,
            detail_device_count: Some(1),
            detail_triggered_value: None,
            detail_threshold_value: None,
            detail_maintenance_start: None,
            detail_maintenance_end: None,
            detail_external_ticket_id: Some("T-9".to_string()),
        }
    }

    #[test]
    fn test_order_row_detail_variant() {
        let order = Order::try_from(order_row("maintenance_request", "maintenance")).unwrap();
        assert_eq!(order.order_type(), OrderType::Maintenance);
        assert_eq!(order.detail.external_ticket_id(), Some("T-9"));

        let order = Order::try_from(order_row("pool_exit", "elastic_scaling")).unwrap();
        assert_eq!(order.order_type(), OrderType::ElasticScaling);
        assert_eq!(order.detail.cluster_id(), Some(3));
    }

    #[test]
    fn test_order_row_type_mismatch() {
        assert!(Order::try_from(order_row("pool_exit", "maintenance")).is_err());
        assert!(Order::try_from(order_row("sideways", "maintenance")).is_err());
    }

    #[test]
    fn test_strategy_row_thresholds() {
        let row = StrategyRow {
            id: 5,
            name: "mem-low".to_string(),
            description: None,
            trigger_action: "pool_exit".to_string(),
            cpu_threshold_value: None,
            cpu_threshold_type: None,
            cpu_target_value: None,
            memory_threshold_value: Some(20.0),
            memory_threshold_type: Some("allocated".to_string()),
            memory_target_value: Some(40.0),
            condition_logic: "OR".to_string(),
            resource_types: "total".to_string(),
            device_count: 2,
            duration_minutes: 2880,
            cooldown_minutes: 30,
            status: "disabled".to_string(),
            entry_query_template_id: None,
            exit_query_template_id: Some(8),
            created_by: "ops".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let strategy = row.into_strategy(vec![1, 2]).unwrap();
        assert!(strategy.cpu.is_none());
        assert_eq!(strategy.memory.unwrap().threshold_type, ThresholdType::Allocated);
        assert_eq!(strategy.status, StrategyStatus::Disabled);
        assert_eq!(strategy.required_days(), 2);
        assert_eq!(strategy.cluster_ids, vec![1, 2]);
    }
}
