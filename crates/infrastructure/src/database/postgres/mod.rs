pub mod postgres_history_repository;
pub mod postgres_order_repository;
pub mod postgres_query_template_repository;
pub mod postgres_snapshot_repository;
pub mod postgres_strategy_repository;

pub use postgres_history_repository::PostgresExecutionHistoryRepository;
pub use postgres_order_repository::PostgresOrderRepository;
pub use postgres_query_template_repository::PostgresQueryTemplateRepository;
pub use postgres_snapshot_repository::PostgresSnapshotRepository;
pub use postgres_strategy_repository::PostgresStrategyRepository;
