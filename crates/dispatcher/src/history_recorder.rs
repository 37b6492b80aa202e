use std::sync::Arc;

use tracing::debug;

use scaler_domain::entities::StrategyExecutionHistory;
use scaler_domain::repositories::ExecutionHistoryRepository;
use scaler_infrastructure::{MetricsCollector, StructuredLogger};

/// 策略执行历史记录器
///
/// 历史只追加不修改。写入失败不影响调用方，只记录日志和指标。
pub struct HistoryRecorder {
    pub history_repo: Arc<dyn ExecutionHistoryRepository>,
    pub metrics: Arc<MetricsCollector>,
}

impl HistoryRecorder {
    pub fn new(
        history_repo: Arc<dyn ExecutionHistoryRepository>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            history_repo,
            metrics,
        }
    }

    /// 追加一条历史，成功时返回带 id 的记录
    pub async fn record(
        &self,
        entry: StrategyExecutionHistory,
    ) -> Option<StrategyExecutionHistory> {
        match self.history_repo.append(&entry).await {
            Ok(saved) => {
                debug!(
                    "策略 {} 执行历史已记录: {} (ID: {})",
                    saved.strategy_id, saved.result, saved.id
                );
                Some(saved)
            }
            Err(e) => {
                StructuredLogger::log_history_write_failed(
                    entry.strategy_id,
                    entry.result.as_str(),
                    &e,
                );
                self.metrics.record_history_write_failure();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scaler_domain::entities::ResultCode;
    use scaler_testing_utils::MockExecutionHistoryRepository;

    #[tokio::test]
    async fn test_record_appends_row() {
        let repo = Arc::new(MockExecutionHistoryRepository::new());
        let recorder = HistoryRecorder::new(repo.clone(), Arc::new(MetricsCollector::new().unwrap()));

        let saved = recorder
            .record(
                StrategyExecutionHistory::new(3, ResultCode::ThresholdNotMet, "连续满足0天")
                    .with_target(1, "total"),
            )
            .await
            .unwrap();

        assert_eq!(saved.id, 1);
        assert_eq!(repo.count_by_result(ResultCode::ThresholdNotMet), 1);
    }

    #[tokio::test]
    async fn test_record_failure_is_swallowed() {
        let repo = Arc::new(MockExecutionHistoryRepository::new());
        repo.fail_append(true);
        let recorder = HistoryRecorder::new(repo.clone(), Arc::new(MetricsCollector::new().unwrap()));

        let saved = recorder
            .record(StrategyExecutionHistory::new(3, ResultCode::OrderCreated, "ok"))
            .await;

        assert!(saved.is_none());
        assert_eq!(repo.count(), 0);
    }
}
