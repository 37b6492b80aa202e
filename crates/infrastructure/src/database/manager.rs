use std::sync::Arc;
use std::time::Duration;

use scaler_core::config::DatabaseConfig;
use scaler_core::{ScalingError, ScalingResult};
use scaler_domain::repositories::{
    ExecutionHistoryRepository, OrderRepository, QueryTemplateRepository, SnapshotRepository,
    StrategyRepository,
};
use tracing::info;

use super::postgres::{
    PostgresExecutionHistoryRepository, PostgresOrderRepository, PostgresQueryTemplateRepository,
    PostgresSnapshotRepository, PostgresStrategyRepository,
};
use super::schema::{POSTGRES_SCHEMA, SQLITE_SCHEMA};
use super::sqlite::{
    SqliteExecutionHistoryRepository, SqliteOrderRepository, SqliteQueryTemplateRepository,
    SqliteSnapshotRepository, SqliteStrategyRepository,
};
use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation};
use crate::op_context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    PostgreSQL,
    SQLite,
}

impl DatabaseType {
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            DatabaseType::PostgreSQL
        } else {
            DatabaseType::SQLite
        }
    }
}

#[derive(Clone)]
pub enum DatabasePool {
    PostgreSQL(sqlx::PgPool),
    SQLite(sqlx::SqlitePool),
}

impl DatabasePool {
    pub async fn connect(config: &DatabaseConfig) -> ScalingResult<Self> {
        let acquire_timeout = Duration::from_secs(config.connection_timeout_seconds.max(1));
        let idle_timeout = Duration::from_secs(config.idle_timeout_seconds.max(1));

        match DatabaseType::from_url(&config.url) {
            DatabaseType::PostgreSQL => {
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .min_connections(config.min_connections)
                    .acquire_timeout(acquire_timeout)
                    .idle_timeout(idle_timeout)
                    .connect(&config.url)
                    .await?;
                Ok(DatabasePool::PostgreSQL(pool))
            }
            DatabaseType::SQLite => {
                // 内存库的每个连接都是独立的数据库
                let max_connections = if config.url.contains(":memory:") {
                    1
                } else {
                    config.max_connections
                };
                let pool = sqlx::sqlite::SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .acquire_timeout(acquire_timeout)
                    .connect(&config.url)
                    .await?;
                Ok(DatabasePool::SQLite(pool))
            }
        }
    }

    pub fn database_type(&self) -> DatabaseType {
        match self {
            DatabasePool::PostgreSQL(_) => DatabaseType::PostgreSQL,
            DatabasePool::SQLite(_) => DatabaseType::SQLite,
        }
    }

    pub async fn health_check(&self) -> ScalingResult<()> {
        match self {
            DatabasePool::PostgreSQL(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
            DatabasePool::SQLite(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
        }
        Ok(())
    }

    pub async fn close(&self) {
        match self {
            DatabasePool::PostgreSQL(pool) => pool.close().await,
            DatabasePool::SQLite(pool) => pool.close().await,
        }
    }
}

/// 数据库管理器，按连接串选择方言并构造各仓储
#[derive(Clone)]
pub struct DatabaseManager {
    pool: DatabasePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> ScalingResult<Self> {
        let pool = DatabasePool::connect(config).await?;
        info!(
            "数据库连接已建立: {:?}, 最大连接数 {}",
            pool.database_type(),
            config.max_connections
        );
        Ok(Self { pool })
    }

    /// 仅指定连接串，其余参数取默认值
    pub async fn from_url(url: &str) -> ScalingResult<Self> {
        let config = DatabaseConfig {
            url: url.to_string(),
            ..DatabaseConfig::default()
        };
        Self::new(&config).await
    }

    pub fn database_type(&self) -> DatabaseType {
        self.pool.database_type()
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// 建表，语句均为 IF NOT EXISTS，可重复执行
    pub async fn migrate(&self) -> ScalingResult<()> {
        let context = op_context!(RepositoryOperation::Migrate, "数据库表结构");

        match &self.pool {
            DatabasePool::PostgreSQL(pool) => {
                for statement in POSTGRES_SCHEMA {
                    sqlx::query(statement)
                        .execute(pool)
                        .await
                        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
                }
            }
            DatabasePool::SQLite(pool) => {
                for statement in SQLITE_SCHEMA {
                    sqlx::query(statement)
                        .execute(pool)
                        .await
                        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
                }
            }
        }

        RepositoryErrorHelpers::log_operation_success(
            &context,
            Some(&format!("{:?}", self.database_type())),
        );
        Ok(())
    }

    pub async fn health_check(&self) -> ScalingResult<()> {
        self.pool
            .health_check()
            .await
            .map_err(|e| ScalingError::DatabaseOperation(format!("数据库健康检查失败: {e}")))
    }

    pub async fn close(&self) {
        self.pool.close().await
    }

    pub fn strategy_repository(&self) -> Arc<dyn StrategyRepository> {
        match &self.pool {
            DatabasePool::PostgreSQL(pool) => {
                Arc::new(PostgresStrategyRepository::new(pool.clone()))
            }
            DatabasePool::SQLite(pool) => Arc::new(SqliteStrategyRepository::new(pool.clone())),
        }
    }

    pub fn snapshot_repository(&self) -> Arc<dyn SnapshotRepository> {
        match &self.pool {
            DatabasePool::PostgreSQL(pool) => {
                Arc::new(PostgresSnapshotRepository::new(pool.clone()))
            }
            DatabasePool::SQLite(pool) => Arc::new(SqliteSnapshotRepository::new(pool.clone())),
        }
    }

    pub fn history_repository(&self) -> Arc<dyn ExecutionHistoryRepository> {
        match &self.pool {
            DatabasePool::PostgreSQL(pool) => {
                Arc::new(PostgresExecutionHistoryRepository::new(pool.clone()))
            }
            DatabasePool::SQLite(pool) => {
                Arc::new(SqliteExecutionHistoryRepository::new(pool.clone()))
            }
        }
    }

    pub fn order_repository(&self) -> Arc<dyn OrderRepository> {
        match &self.pool {
            DatabasePool::PostgreSQL(pool) => Arc::new(PostgresOrderRepository::new(pool.clone())),
            DatabasePool::SQLite(pool) => Arc::new(SqliteOrderRepository::new(pool.clone())),
        }
    }

    pub fn query_template_repository(&self) -> Arc<dyn QueryTemplateRepository> {
        match &self.pool {
            DatabasePool::PostgreSQL(pool) => {
                Arc::new(PostgresQueryTemplateRepository::new(pool.clone()))
            }
            DatabasePool::SQLite(pool) => {
                Arc::new(SqliteQueryTemplateRepository::new(pool.clone()))
            }
        }
    }
}
