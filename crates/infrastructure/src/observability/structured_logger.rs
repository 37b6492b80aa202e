//! 结构化日志事件
//!
//! 每个事件带 `event` 字段和点分隔的结构化字段，便于 JSON 日志检索。

use tracing::{error, info, warn};

pub struct StructuredLogger;

impl StructuredLogger {
    /// 一次 (策略, 集群, 资源类型) 评估完成
    pub fn log_strategy_evaluated(
        strategy_id: i64,
        cluster_id: i64,
        resource_type: &str,
        result: &str,
        consecutive_days: Option<u32>,
    ) {
        info!(
            event = "strategy_evaluated",
            strategy.id = strategy_id,
            cluster.id = cluster_id,
            resource.type = resource_type,
            evaluation.result = result,
            evaluation.consecutive_days = ?consecutive_days,
            "Strategy evaluated"
        );
    }

    pub fn log_strategy_skipped(strategy_id: i64, strategy_name: &str, reason: &str) {
        info!(
            event = "strategy_skipped",
            strategy.id = strategy_id,
            strategy.name = strategy_name,
            skip.reason = reason,
            "Strategy skipped"
        );
    }

    pub fn log_order_created(
        order_id: i64,
        order_number: &str,
        order_type: &str,
        strategy_id: Option<i64>,
        device_count: usize,
    ) {
        info!(
            event = "order_created",
            order.id = order_id,
            order.number = order_number,
            order.type = order_type,
            strategy.id = ?strategy_id,
            order.device_count = device_count,
            "Order created"
        );
    }

    pub fn log_order_status_changed(order_id: i64, order_number: &str, from: &str, to: &str) {
        info!(
            event = "order_status_changed",
            order.id = order_id,
            order.number = order_number,
            order.status_from = from,
            order.status_to = to,
            "Order status changed"
        );
    }

    pub fn log_lock_contended(lock_key: &str) {
        info!(
            event = "lock_contended",
            lock.key = lock_key,
            "Lock held by another instance"
        );
    }

    pub fn log_history_write_failed(strategy_id: i64, result: &str, error: &dyn std::fmt::Display) {
        warn!(
            event = "history_write_failed",
            strategy.id = strategy_id,
            history.result = result,
            error.message = %error,
            "Failed to append execution history"
        );
    }

    pub fn log_system_error(component: &str, operation: &str, error: &dyn std::fmt::Display) {
        error!(
            event = "system_error",
            component = component,
            operation = operation,
            error.message = %error,
            "System error occurred"
        );
    }
}
