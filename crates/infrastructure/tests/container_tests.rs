//! 依赖 Docker 的集成测试，默认忽略：`cargo test -- --ignored`

use std::time::Duration;

use anyhow::Result;
use scaler_core::config::{DatabaseConfig, LockBackend, LockConfig};
use scaler_domain::entities::{
    ElasticScalingDetail, NewOrder, OrderDetail, OrderStatus, TriggerAction,
};
use scaler_domain::repositories::DistributedLock;
use scaler_infrastructure::database::{DatabaseManager, DatabaseType};
use scaler_infrastructure::RedisDistributedLock;
use scaler_testing_utils::{PostgresTestContainer, RedisTestContainer, StrategyBuilder};

#[tokio::test]
#[ignore]
async fn test_redis_lock_contract() -> Result<()> {
    let redis = RedisTestContainer::new().await?;
    let lock = RedisDistributedLock::new(&LockConfig {
        backend: LockBackend::Redis,
        redis_url: redis.redis_url.clone(),
        key_prefix: "test".to_string(),
        default_ttl_seconds: 1,
    })
    .await?;

    let key = "elastic_scaling:strategy:1";
    assert!(lock.acquire(key, "a", Duration::from_secs(10)).await?);
    assert!(!lock.acquire(key, "b", Duration::from_secs(10)).await?);
    assert!(!lock.release(key, "b").await?);
    assert!(lock.release(key, "a").await?);

    // 零TTL使用默认过期时间
    lock.set_default_expiration(Duration::from_millis(200));
    assert!(lock.acquire(key, "c", Duration::ZERO).await?);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(lock.acquire(key, "d", Duration::from_secs(10)).await?);

    lock.delete(key).await?;
    assert!(lock.acquire(key, "e", Duration::from_secs(10)).await?);

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_postgres_repositories() -> Result<()> {
    let postgres = PostgresTestContainer::new().await?;
    let manager = DatabaseManager::new(&DatabaseConfig {
        url: postgres.database_url.clone(),
        ..DatabaseConfig::default()
    })
    .await?;
    assert_eq!(manager.database_type(), DatabaseType::PostgreSQL);
    manager.migrate().await?;

    let strategies = manager.strategy_repository();
    let created = strategies
        .create(&StrategyBuilder::new().with_clusters(vec![2, 1]).build())
        .await?;
    let enabled = strategies.find_enabled().await?;
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].id, created.id);
    assert_eq!(enabled[0].cluster_ids, vec![1, 2]);

    let orders = manager.order_repository();
    let order = orders
        .create(&NewOrder {
            order_number: "ESO202401010000000042".to_string(),
            name: "入池".to_string(),
            description: None,
            status: OrderStatus::Pending,
            created_by: "system".to_string(),
            detail: OrderDetail::ElasticScaling(ElasticScalingDetail {
                cluster_id: 1,
                strategy_id: Some(created.id),
                action: TriggerAction::PoolEntry,
                resource_type: "total".to_string(),
                device_count: 2,
                triggered_value: "CPU使用率: 90.00%".to_string(),
                threshold_value: "CPU使用率 > 80%".to_string(),
            }),
            device_ids: vec![5, 6],
        })
        .await?;

    let loaded = orders.find_by_id(order.id).await?.unwrap();
    assert_eq!(loaded.detail.strategy_id(), Some(created.id));
    assert_eq!(orders.find_devices(order.id).await?.len(), 2);

    manager.close().await;
    Ok(())
}
