pub mod manager;
pub mod mapping;
pub mod postgres;
pub mod schema;
pub mod sqlite;

pub use manager::{DatabaseManager, DatabasePool, DatabaseType};
pub use postgres::{
    PostgresExecutionHistoryRepository, PostgresOrderRepository, PostgresQueryTemplateRepository,
    PostgresSnapshotRepository, PostgresStrategyRepository,
};
pub use sqlite::{
    SqliteExecutionHistoryRepository, SqliteOrderRepository, SqliteQueryTemplateRepository,
    SqliteSnapshotRepository, SqliteStrategyRepository,
};
