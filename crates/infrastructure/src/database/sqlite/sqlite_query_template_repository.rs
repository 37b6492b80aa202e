use async_trait::async_trait;
use chrono::Utc;
use scaler_core::ScalingResult;
use scaler_domain::entities::QueryTemplate;
use scaler_domain::repositories::QueryTemplateRepository;
use sqlx::SqlitePool;

use crate::database::mapping::{QueryTemplateRow, QUERY_TEMPLATE_COLUMNS};
use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation};
use crate::op_context;

pub struct SqliteQueryTemplateRepository {
    pool: SqlitePool,
}

impl SqliteQueryTemplateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryTemplateRepository for SqliteQueryTemplateRepository {
    async fn create(&self, template: &QueryTemplate) -> ScalingResult<QueryTemplate> {
        // 写入前确认过滤条件可以解析
        template.filter_groups()?;
        let context = op_context!(RepositoryOperation::Create, "设备查询模板");
        let now = Utc::now();

        let inserted = sqlx::query(
            "INSERT INTO query_templates (name, filter_groups, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&template.name)
        .bind(&template.groups)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        Ok(QueryTemplate {
            id: inserted.last_insert_rowid(),
            created_at: now,
            updated_at: now,
            ..template.clone()
        })
    }

    async fn find_by_id(&self, id: i64) -> ScalingResult<Option<QueryTemplate>> {
        let context = op_context!(RepositoryOperation::Read, "设备查询模板", id = id);
        let row = sqlx::query_as::<_, QueryTemplateRow>(&format!(
            "SELECT {QUERY_TEMPLATE_COLUMNS} FROM query_templates WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        Ok(row.map(QueryTemplate::from))
    }
}
