pub mod sqlite_history_repository;
pub mod sqlite_order_repository;
pub mod sqlite_query_template_repository;
pub mod sqlite_snapshot_repository;
pub mod sqlite_strategy_repository;

pub use sqlite_history_repository::SqliteExecutionHistoryRepository;
pub use sqlite_order_repository::SqliteOrderRepository;
pub use sqlite_query_template_repository::SqliteQueryTemplateRepository;
pub use sqlite_snapshot_repository::SqliteSnapshotRepository;
pub use sqlite_strategy_repository::SqliteStrategyRepository;
