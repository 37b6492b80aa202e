use async_trait::async_trait;
use chrono::Utc;
use scaler_core::ScalingResult;
use scaler_domain::entities::{ResultCode, StrategyExecutionHistory};
use scaler_domain::repositories::ExecutionHistoryRepository;
use sqlx::PgPool;
use tracing::instrument;

use crate::database::mapping::{HistoryRow, HISTORY_COLUMNS};
use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation};
use crate::op_context;

pub struct PostgresExecutionHistoryRepository {
    pool: PgPool,
}

impl PostgresExecutionHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionHistoryRepository for PostgresExecutionHistoryRepository {
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

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO strategy_execution_history (
                strategy_id, cluster_id, resource_type, execution_time, triggered_value,
                threshold_value, result, order_id, reason, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
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
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        Ok(StrategyExecutionHistory {
            id,
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
        let codes: Vec<&str> = results.iter().map(|r| r.as_str()).collect();

        let row = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM strategy_execution_history \
             WHERE strategy_id = $1 AND result = ANY($2) \
             ORDER BY execution_time DESC, id DESC LIMIT 1"
        ))
        .bind(strategy_id)
        .bind(&codes)
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
             WHERE strategy_id = $1 ORDER BY execution_time DESC, id DESC LIMIT $2"
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
