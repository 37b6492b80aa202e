//! 弹性伸缩评估指标
//!
//! 基于 metrics 门面记录，启用导出时由 Prometheus exporter 暴露。

use anyhow::Result;
use metrics::{counter, histogram, Counter, Histogram};
use tracing::{debug, warn};

pub struct MetricsCollector {
    evaluations_total: Counter,
    breaches_total: Counter,
    orders_created_total: Counter,
    strategies_skipped_total: Counter,
    evaluation_failures_total: Counter,
    history_write_failures_total: Counter,
    sweep_duration: Histogram,
    database_operation_duration: Histogram,
}

impl MetricsCollector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            evaluations_total: counter!("scaler_evaluations_total"),
            breaches_total: counter!("scaler_breaches_total"),
            orders_created_total: counter!("scaler_orders_created_total"),
            strategies_skipped_total: counter!("scaler_strategies_skipped_total"),
            evaluation_failures_total: counter!("scaler_evaluation_failures_total"),
            history_write_failures_total: counter!("scaler_history_write_failures_total"),
            sweep_duration: histogram!("scaler_sweep_duration_seconds"),
            database_operation_duration: histogram!("scaler_database_operation_duration_seconds"),
        })
    }

    /// 一次 (集群, 资源类型) 评估
    pub fn record_evaluation(&self, breached: bool) {
        self.evaluations_total.increment(1);
        if breached {
            self.breaches_total.increment(1);
        }
    }

    pub fn record_order_created(&self, order_type: &str, device_count: usize) {
        self.orders_created_total.increment(1);
        debug!(
            order_type = order_type,
            device_count = device_count,
            "Order created"
        );
    }

    pub fn record_strategy_skipped(&self, reason: &str) {
        self.strategies_skipped_total.increment(1);
        debug!(reason = reason, "Strategy skipped");
    }

    pub fn record_evaluation_failure(&self, result_code: &str) {
        self.evaluation_failures_total.increment(1);
        warn!(result_code = result_code, "Strategy evaluation failed");
    }

    pub fn record_history_write_failure(&self) {
        self.history_write_failures_total.increment(1);
    }

    pub fn record_sweep_duration(&self, duration_seconds: f64) {
        self.sweep_duration.record(duration_seconds);
    }

    pub fn record_database_operation(&self, operation: &str, duration_seconds: f64) {
        self.database_operation_duration.record(duration_seconds);
        debug!(
            operation = operation,
            duration_seconds = duration_seconds,
            "Database operation completed"
        );
    }
}
