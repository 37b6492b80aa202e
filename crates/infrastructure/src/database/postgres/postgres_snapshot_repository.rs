use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scaler_core::ScalingResult;
use scaler_domain::entities::ResourceSnapshot;
use scaler_domain::repositories::SnapshotRepository;
use sqlx::PgPool;
use tracing::instrument;

use crate::database::mapping::{SnapshotRow, SNAPSHOT_COLUMNS};
use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation};
use crate::op_context;

pub struct PostgresSnapshotRepository {
    pool: PgPool,
}

impl PostgresSnapshotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotRepository for PostgresSnapshotRepository {
    #[instrument(skip(self))]
    async fn find_since(
        &self,
        cluster_id: i64,
        resource_type: &str,
        since: DateTime<Utc>,
    ) -> ScalingResult<Vec<ResourceSnapshot>> {
        let context = op_context!(RepositoryOperation::Query, "资源快照")
            .with_additional_info(format!("集群 {cluster_id}, 资源类型 {resource_type}"));

        let rows = sqlx::query_as::<_, SnapshotRow>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM resource_snapshots \
             WHERE cluster_id = $1 AND resource_type = $2 AND created_at >= $3 \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(cluster_id)
        .bind(resource_type)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        Ok(rows.into_iter().map(ResourceSnapshot::from).collect())
    }

    async fn insert(&self, snapshot: &ResourceSnapshot) -> ScalingResult<ResourceSnapshot> {
        let context = op_context!(RepositoryOperation::Create, "资源快照");
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO resource_snapshots (
                cluster_id, resource_type, cpu_capacity, cpu_request, max_cpu_usage_ratio,
                memory_capacity, memory_request, max_memory_usage_ratio, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(snapshot.cluster_id)
        .bind(&snapshot.resource_type)
        .bind(snapshot.cpu_capacity)
        .bind(snapshot.cpu_request)
        .bind(snapshot.max_cpu_usage_ratio)
        .bind(snapshot.memory_capacity)
        .bind(snapshot.memory_request)
        .bind(snapshot.max_memory_usage_ratio)
        .bind(snapshot.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        Ok(ResourceSnapshot {
            id,
            ..snapshot.clone()
        })
    }
}
