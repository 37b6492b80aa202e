use async_trait::async_trait;
use chrono::Utc;
use scaler_core::{ScalingError, ScalingResult};
use scaler_domain::entities::Strategy;
use scaler_domain::repositories::StrategyRepository;
use sqlx::SqlitePool;
use tracing::instrument;

use crate::database::mapping::{group_cluster_ids, threshold_columns, StrategyRow, STRATEGY_COLUMNS};
use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation};
use crate::op_context;

pub struct SqliteStrategyRepository {
    pool: SqlitePool,
}

impl SqliteStrategyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert_relations(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        strategy_id: i64,
        cluster_ids: &[i64],
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        for cluster_id in cluster_ids {
            sqlx::query(
                "INSERT INTO strategy_cluster_relations (strategy_id, cluster_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(strategy_id)
            .bind(cluster_id)
            .bind(now)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StrategyRepository for SqliteStrategyRepository {
    #[instrument(skip(self, strategy), fields(strategy.name = %strategy.name))]
    async fn create(&self, strategy: &Strategy) -> ScalingResult<Strategy> {
        strategy.validate()?;
        let context = op_context!(RepositoryOperation::Create, "伸缩策略");
        let now = Utc::now();
        let (cpu_value, cpu_type, cpu_target) = threshold_columns(strategy.cpu.as_ref());
        let (mem_value, mem_type, mem_target) = threshold_columns(strategy.memory.as_ref());

        let result: Result<i64, sqlx::Error> = async {
            let mut tx = self.pool.begin().await?;
            let inserted = sqlx::query(
                r#"
                INSERT INTO elastic_scaling_strategies (
                    name, description, trigger_action,
                    cpu_threshold_value, cpu_threshold_type, cpu_target_value,
                    memory_threshold_value, memory_threshold_type, memory_target_value,
                    condition_logic, resource_types, device_count, duration_minutes, cooldown_minutes,
                    status, entry_query_template_id, exit_query_template_id, created_by, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
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
            .bind(now)
            .execute(&mut *tx)
            .await?;

            let id = inserted.last_insert_rowid();
            Self::insert_relations(&mut tx, id, &strategy.cluster_ids).await?;
            tx.commit().await?;
            Ok(id)
        }
        .await;

        let id = result.map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        let context = context.with_id(id);
        RepositoryErrorHelpers::log_operation_success(
            &context,
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
                    name = ?, description = ?, trigger_action = ?,
                    cpu_threshold_value = ?, cpu_threshold_type = ?, cpu_target_value = ?,
                    memory_threshold_value = ?, memory_threshold_type = ?, memory_target_value = ?,
                    condition_logic = ?, resource_types = ?, device_count = ?, duration_minutes = ?,
                    cooldown_minutes = ?, status = ?, entry_query_template_id = ?,
                    exit_query_template_id = ?, updated_at = ?
                WHERE id = ?
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

            sqlx::query("DELETE FROM strategy_cluster_relations WHERE strategy_id = ?")
                .bind(strategy.id)
                .execute(&mut *tx)
                .await?;
            Self::insert_relations(&mut tx, strategy.id, &strategy.cluster_ids).await?;
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
            "SELECT {STRATEGY_COLUMNS} FROM elastic_scaling_strategies WHERE id = ?"
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

        let relations: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT strategy_id, cluster_id FROM strategy_cluster_relations ORDER BY strategy_id, cluster_id",
        )
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
            "SELECT cluster_id FROM strategy_cluster_relations WHERE strategy_id = ? ORDER BY cluster_id",
        )
        .bind(strategy_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))
    }
}
