use async_trait::async_trait;
use chrono::Utc;
use scaler_core::ScalingResult;
use scaler_domain::entities::{ResultCode, StrategyExecutionHistory};
use scaler_domain::repositories::ExecutionHistoryRepository;
use sqlx::SqlitePool;
use tracing::instrument;

use crate::database::mapping::{HistoryRow, HISTORY_COLUMNS};
use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation};
use crate::op_context;

pub struct SqliteExecutionHistoryRepository {
    pool: SqlitePool,
}

impl SqliteExecutionHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionHistoryRepository for SqliteExecutionHistoryRepository {
    #[instrument(skip(self, history), fields(
        strategy.id = history.strategy_id,
        result = %history.result,
    ))]
    async fn append(
        &self,
        history: &StrategyExecutionHistory,
    ) -> ScalingResult<StrategyExecutionHistory> {
        let context = op_context!(RepositoryOperation::Create, "策略执行历史")
            .with_additional_info(format!("策略 {}", history.strategy_id));
        let now = Utc::now();

        let inserted = sqlx::query(
            r#"
            INSERT INTO strategy_execution_history (
                strategy_id, cluster_id, resource_type, execution_time, triggered_value,
                threshold_value, result, order_id, reason, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(history.strategy_id)
        .bind(history.cluster_id)
        .bind(&history.resource_type)
        .bind(history.execution_time)
        .bind(&history.triggered_value)
        .bind(&history.threshold_value)
        .bind(history.result.as_str())
        .bind(history.order_id)
        .bind(&history.reason)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        Ok(StrategyExecutionHistory {
            id: inserted.last_insert_rowid(),
            created_at: now,
            ..history.clone()
        })
    }

    async fn find_latest_with_results(
        &self,
        strategy_id: i64,
        results: &[ResultCode],
    ) -> ScalingResult<Option<StrategyExecutionHistory>> {
        if results.is_empty() {
            return Ok(None);
        }
        let context = op_context!(RepositoryOperation::Query, "策略执行历史", id = strategy_id);

        let placeholders = vec!["?"; results.len()].join(", ");
        let sql = format!(
            "SELECT {HISTORY_COLUMNS} FROM strategy_execution_history \
             WHERE strategy_id = ? AND result IN ({placeholders}) \
             ORDER BY execution_time DESC, id DESC LIMIT 1"
        );
        let mut query = sqlx::query_as::<_, HistoryRow>(&sql).bind(strategy_id);
        for result in results {
            query = query.bind(result.as_str());
        }

        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        row.map(StrategyExecutionHistory::try_from).transpose()
    }

    async fn find_by_strategy(
        &self,
        strategy_id: i64,
        limit: u32,
    ) -> ScalingResult<Vec<StrategyExecutionHistory>> {
        let context = op_context!(RepositoryOperation::Query, "策略执行历史", id = strategy_id);
        let rows = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM strategy_execution_history \
             WHERE strategy_id = ? ORDER BY execution_time DESC, id DESC LIMIT ?"
        ))
        .bind(strategy_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        rows.into_iter()
            .map(StrategyExecutionHistory::try_from)
            .collect()
    }
}
