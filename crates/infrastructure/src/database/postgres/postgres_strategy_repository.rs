use async_trait::async_trait;
use chrono::Utc;
use scaler_core::{ScalingError, ScalingResult};
use scaler_domain::entities::Strategy;
use scaler_domain::repositories::StrategyRepository;
use sqlx::PgPool;
use tracing::instrument;

use crate::database::mapping::{group_cluster_ids, threshold_columns, StrategyRow, STRATEGY_COLUMNS};
use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation};
use crate::op_context;

pub struct PostgresStrategyRepository {
    pool: PgPool,
}

impl PostgresStrategyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn replace_relations(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        strategy_id: i64,
        cluster_ids: &[i64],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM strategy_cluster_relations WHERE strategy_id = $1")
            .bind(strategy_id)
            .execute(&mut **tx)
            .await?;

        if cluster_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO strategy_cluster_relations (strategy_id, cluster_id, created_at)
            SELECT $1, cluster_id, $3 FROM UNNEST($2::BIGINT[]) AS t(cluster_id)
            "#,
        )
        .bind(strategy_id)
        .bind(cluster_ids)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl StrategyRepository for PostgresStrategyRepository {
    #[instrument(skip(self, strategy), fields(strategy.name = %strategy.name))]
    async fn create(&self, strategy: &Strategy) -> ScalingResult<Strategy> {
        strategy.validate()?;
        let context = op_context!(RepositoryOperation::Create, "伸缩策略");
        let now = Utc::now();
        let (cpu_value, cpu_type, cpu_target) = threshold_columns(strategy.cpu.as_ref());
        let (mem_value, mem_type, mem_target) = threshold_columns(strategy.memory.as_ref());

        let result: Result<i64, sqlx::Error> = async {
            let mut tx = self.pool.begin().await?;
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO elastic_scaling_strategies (
                    name, description, trigger_action,
                    cpu_threshold_value, cpu_threshold_type, cpu_target_value,
                    memory_threshold_value, memory_threshold_type, memory_target_value,
                    condition_logic, resource_types, device_count, duration_minutes, cooldown_minutes,
                    status, entry_query_template_id, exit_query_template_id, created_by, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $19)
                RETURNING id
                "#,
            )
            .bind(&strategy.name)
            .bind(&strategy.description)
            .bind(strategy.trigger_action.as_str())
            .bind(cpu_value)
            .bind(cpu_type)
            .bind(cpu_target)
            .bind(mem_value)
            .bind(mem_type)
            .bind(mem_target)
            .bind(strategy.condition_logic.as_str())
            .bind(&strategy.resource_types)
            .bind(strategy.device_count)
            .bind(strategy.duration_minutes)
            .bind(strategy.cooldown_minutes)
            .bind(strategy.status.as_str())
            .bind(strategy.entry_query_template_id)
            .bind(strategy.exit_query_template_id)
            .bind(&strategy.created_by)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

            Self::replace_relations(&mut tx, id, &strategy.cluster_ids).await?;
            tx.commit().await?;
            Ok(id)
        }
        .await;

        let id = result.map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        RepositoryErrorHelpers::log_operation_success(
            &context.with_id(id),
            Some(&format!("关联集群 {:?}", strategy.cluster_ids)),
        );

        Ok(Strategy {
            id,
            created_at: now,
            updated_at: now,
            ..strategy.clone()
        })
    }

    #[instrument(skip(self, strategy), fields(strategy.id = strategy.id))]
    async fn update(&self, strategy: &Strategy) -> ScalingResult<Strategy> {
        strategy.validate()?;
        let context = op_context!(RepositoryOperation::Update, "伸缩策略", id = strategy.id);
        let now = Utc::now();
        let (cpu_value, cpu_type, cpu_target) = threshold_columns(strategy.cpu.as_ref());
        let (mem_value, mem_type, mem_target) = threshold_columns(strategy.memory.as_ref());

        let result: Result<u64, sqlx::Error> = async {
            let mut tx = self.pool.begin().await?;
            let updated = sqlx::query(
                r#"
                UPDATE elastic_scaling_strategies SET
                    name = $1, description = $2, trigger_action = $3,
                    cpu_threshold_value = $4, cpu_threshold_type = $5, cpu_target_value = $6,
                    memory_threshold_value = $7, memory_threshold_type = $8, memory_target_value = $9,
                    condition_logic = $10, resource_types = $11, device_count = $12,
                    duration_minutes = $13, cooldown_minutes = $14, status = $15,
                    entry_query_template_id = $16, exit_query_template_id = $17, updated_at = $18
                WHERE id = $19
                "#,
            )
            .bind(&strategy.name)
            .bind(&strategy.description)
            .bind(strategy.trigger_action.as_str())
            .bind(cpu_value)
            .bind(cpu_type)
            .bind(cpu_target)
            .bind(mem_value)
            .bind(mem_type)
            .bind(mem_target)
            .bind(strategy.condition_logic.as_str())
            .bind(&strategy.resource_types)
            .bind(strategy.device_count)
            .bind(strategy.duration_minutes)
            .bind(strategy.cooldown_minutes)
            .bind(strategy.status.as_str())
            .bind(strategy.entry_query_template_id)
            .bind(strategy.exit_query_template_id)
            .bind(now)
            .bind(strategy.id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if updated == 0 {
                tx.rollback().await?;
                return Ok(0);
            }

            Self::replace_relations(&mut tx, strategy.id, &strategy.cluster_ids).await?;
            tx.commit().await?;
            Ok(updated)
        }
        .await;

        let updated = result.map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        if updated == 0 {
            return Err(ScalingError::StrategyNotFound { id: strategy.id });
        }
        RepositoryErrorHelpers::log_operation_success(&context, None);

        Ok(Strategy {
            updated_at: now,
            ..strategy.clone()
        })
    }

    async fn find_by_id(&self, id: i64) -> ScalingResult<Option<Strategy>> {
        let context = op_context!(RepositoryOperation::Read, "伸缩策略", id = id);
        let row = sqlx::query_as::<_, StrategyRow>(&format!(
            "SELECT {STRATEGY_COLUMNS} FROM elastic_scaling_strategies WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        match row {
            Some(row) => {
                let cluster_ids = self.find_cluster_ids(id).await?;
                Ok(Some(row.into_strategy(cluster_ids)?))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn find_enabled(&self) -> ScalingResult<Vec<Strategy>> {
        let context = op_context!(RepositoryOperation::Query, "启用的伸缩策略");
        let rows = sqlx::query_as::<_, StrategyRow>(&format!(
            "SELECT {STRATEGY_COLUMNS} FROM elastic_scaling_strategies WHERE status = 'enabled' ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let relations: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT strategy_id, cluster_id FROM strategy_cluster_relations \
             WHERE strategy_id = ANY($1) ORDER BY strategy_id, cluster_id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        let mut grouped = group_cluster_ids(relations);

        rows.into_iter()
            .map(|row| {
                let cluster_ids = grouped.remove(&row.id).unwrap_or_default();
                row.into_strategy(cluster_ids)
            })
            .collect()
    }

    async fn find_cluster_ids(&self, strategy_id: i64) -> ScalingResult<Vec<i64>> {
        let context = op_context!(RepositoryOperation::Query, "策略集群关联", id = strategy_id);
        sqlx::query_scalar(
            "SELECT cluster_id FROM strategy_cluster_relations WHERE strategy_id = $1 ORDER BY cluster_id",
        )
        .bind(strategy_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))
    }
}
