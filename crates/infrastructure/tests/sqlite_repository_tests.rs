use anyhow::Result;
use chrono::{Duration, Utc};
use scaler_core::ScalingError;
use scaler_domain::entities::{
    ElasticScalingDetail, MaintenanceAction, MaintenanceDetail, NewOrder, OrderDetail,
    OrderDeviceStatus, OrderStatus, OrderStatusUpdate, OrderType, ResultCode,
    StrategyExecutionHistory, StrategyStatus, TriggerAction,
};
use scaler_infrastructure::database::{DatabaseManager, DatabasePool};
use scaler_testing_utils::{QueryTemplateBuilder, SnapshotBuilder, StrategyBuilder};

async fn setup() -> Result<DatabaseManager> {
    let manager = DatabaseManager::from_url("sqlite::memory:").await?;
    manager.migrate().await?;
    Ok(manager)
}

fn elastic_order(number: &str, device_ids: Vec<i64>) -> NewOrder {
    NewOrder {
        order_number: number.to_string(),
        name: "CPU入池".to_string(),
        description: Some("集群1连续3天CPU使用率超过80%".to_string()),
        status: OrderStatus::Pending,
        created_by: "system".to_string(),
        detail: OrderDetail::ElasticScaling(ElasticScalingDetail {
            cluster_id: 1,
            strategy_id: Some(7),
            action: TriggerAction::PoolEntry,
            resource_type: "total".to_string(),
            device_count: device_ids.len() as i32,
            triggered_value: "CPU使用率: 85.00%".to_string(),
            threshold_value: "CPU使用率 > 80%".to_string(),
        }),
        device_ids,
    }
}

fn maintenance_order(number: &str, ticket: &str) -> NewOrder {
    NewOrder {
        order_number: number.to_string(),
        name: "设备维护".to_string(),
        description: None,
        status: OrderStatus::PendingConfirmation,
        created_by: "ops".to_string(),
        detail: OrderDetail::Maintenance(MaintenanceDetail {
            cluster_id: Some(1),
            action: MaintenanceAction::Request,
            device_count: 1,
            maintenance_start: Some(Utc::now()),
            maintenance_end: Some(Utc::now() + Duration::hours(4)),
            external_ticket_id: Some(ticket.to_string()),
        }),
        device_ids: vec![11],
    }
}

#[tokio::test]
async fn test_strategy_create_update_and_relations() -> Result<()> {
    let manager = setup().await?;
    let repo = manager.strategy_repository();

    let strategy = StrategyBuilder::new()
        .with_name("cpu-high")
        .with_clusters(vec![3, 1])
        .build();
    let created = repo.create(&strategy).await?;
    assert!(created.id > 0);

    let loaded = repo.find_by_id(created.id).await?.unwrap();
    assert_eq!(loaded.name, "cpu-high");
    assert_eq!(loaded.cluster_ids, vec![1, 3]);
    assert_eq!(loaded.cpu, strategy.cpu);
    assert!(loaded.memory.is_none());

    let mut changed = loaded.clone();
    changed.cluster_ids = vec![5];
    changed.status = StrategyStatus::Disabled;
    repo.update(&changed).await?;

    assert_eq!(repo.find_cluster_ids(created.id).await?, vec![5]);
    assert!(repo.find_enabled().await?.is_empty());

    let mut missing = changed.clone();
    missing.id = 999;
    let err = repo.update(&missing).await.unwrap_err();
    assert!(matches!(err, ScalingError::StrategyNotFound { id: 999 }));

    Ok(())
}

#[tokio::test]
async fn test_invalid_strategy_is_rejected_before_write() -> Result<()> {
    let manager = setup().await?;
    let repo = manager.strategy_repository();

    let invalid = StrategyBuilder::new().with_clusters(vec![]).build();
    let err = repo.create(&invalid).await.unwrap_err();
    assert!(matches!(err, ScalingError::InvalidStrategy(_)));
    assert!(repo.find_enabled().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_find_enabled_groups_cluster_ids() -> Result<()> {
    let manager = setup().await?;
    let repo = manager.strategy_repository();

    let a = repo
        .create(&StrategyBuilder::new().with_name("a").with_clusters(vec![1, 2]).build())
        .await?;
    let b = repo
        .create(&StrategyBuilder::new().with_name("b").with_clusters(vec![9]).build())
        .await?;
    repo.create(&StrategyBuilder::new().with_name("c").disabled().build())
        .await?;

    let enabled = repo.find_enabled().await?;
    assert_eq!(enabled.len(), 2);
    assert_eq!(enabled[0].id, a.id);
    assert_eq!(enabled[0].cluster_ids, vec![1, 2]);
    assert_eq!(enabled[1].id, b.id);
    assert_eq!(enabled[1].cluster_ids, vec![9]);

    Ok(())
}

#[tokio::test]
async fn test_snapshots_filtered_and_ascending() -> Result<()> {
    let manager = setup().await?;
    let repo = manager.snapshot_repository();

    repo.insert(&SnapshotBuilder::new().with_cluster(1).with_cpu_usage(70.0).days_ago(1).build())
        .await?;
    repo.insert(&SnapshotBuilder::new().with_cluster(1).with_cpu_usage(60.0).days_ago(3).build())
        .await?;
    repo.insert(&SnapshotBuilder::new().with_cluster(1).with_cpu_usage(90.0).days_ago(10).build())
        .await?;
    repo.insert(&SnapshotBuilder::new().with_cluster(2).with_cpu_usage(50.0).days_ago(1).build())
        .await?;
    repo.insert(
        &SnapshotBuilder::new()
            .with_cluster(1)
            .with_resource_type("gpu")
            .days_ago(1)
            .build(),
    )
    .await?;

    let found = repo
        .find_since(1, "total", Utc::now() - Duration::days(7))
        .await?;
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].max_cpu_usage_ratio, 60.0);
    assert_eq!(found[1].max_cpu_usage_ratio, 70.0);
    assert!(found[0].created_at < found[1].created_at);

    Ok(())
}

#[tokio::test]
async fn test_history_latest_with_results() -> Result<()> {
    let manager = setup().await?;
    let repo = manager.history_repository();
    let now = Utc::now();

    repo.append(
        &StrategyExecutionHistory::new(1, ResultCode::OrderCreated, "入池订单已创建")
            .with_target(1, "total")
            .with_order(10)
            .with_execution_time(now - Duration::minutes(30)),
    )
    .await?;
    repo.append(
        &StrategyExecutionHistory::new(1, ResultCode::NoDevicesFound, "未找到设备")
            .with_target(1, "total")
            .with_execution_time(now - Duration::minutes(5)),
    )
    .await?;
    repo.append(
        &StrategyExecutionHistory::new(1, ResultCode::ThresholdNotMet, "未达到阈值")
            .with_execution_time(now),
    )
    .await?;
    repo.append(&StrategyExecutionHistory::new(2, ResultCode::OrderCreated, "其他策略"))
        .await?;

    let latest = repo
        .find_latest_with_results(1, &ResultCode::ORDER_CREATING)
        .await?
        .unwrap();
    assert_eq!(latest.result, ResultCode::NoDevicesFound);

    let only_created = repo
        .find_latest_with_results(1, &[ResultCode::OrderCreated])
        .await?
        .unwrap();
    assert_eq!(only_created.order_id, Some(10));
    assert!(repo.find_latest_with_results(1, &[]).await?.is_none());

    let recent = repo.find_by_strategy(1, 2).await?;
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].result, ResultCode::ThresholdNotMet);
    assert_eq!(recent[1].result, ResultCode::NoDevicesFound);

    Ok(())
}

#[tokio::test]
async fn test_order_create_with_detail_and_devices() -> Result<()> {
    let manager = setup().await?;
    let repo = manager.order_repository();

    let created = repo.create(&elastic_order("ESO202401010000001234", vec![101, 102])).await?;
    assert!(created.id > 0);

    let loaded = repo.find_by_id(created.id).await?.unwrap();
    assert_eq!(loaded.order_type(), OrderType::ElasticScaling);
    assert_eq!(loaded.status, OrderStatus::Pending);
    assert_eq!(loaded.detail.strategy_id(), Some(7));

    let devices = repo.find_devices(created.id).await?;
    assert_eq!(
        devices.iter().map(|d| d.device_id).collect::<Vec<_>>(),
        vec![101, 102]
    );
    assert!(devices.iter().all(|d| d.status == OrderDeviceStatus::Pending));

    let device = repo
        .update_device_status(created.id, 102, OrderDeviceStatus::Completed)
        .await?;
    assert_eq!(device.status, OrderDeviceStatus::Completed);
    let err = repo
        .update_device_status(created.id, 999, OrderDeviceStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, ScalingError::DeviceNotFound { id: 999 }));

    // 设备状态独立于订单状态
    assert_eq!(
        repo.find_by_id(created.id).await?.unwrap().status,
        OrderStatus::Pending
    );

    Ok(())
}

#[tokio::test]
async fn test_order_status_update_keeps_unset_fields() -> Result<()> {
    let manager = setup().await?;
    let repo = manager.order_repository();
    let created = repo.create(&elastic_order("ESO202401010000005678", vec![1])).await?;

    let started_at = Utc::now();
    let processing = repo
        .update_status(
            created.id,
            &OrderStatusUpdate {
                expected_status: OrderStatus::Pending,
                status: OrderStatus::Processing,
                executor: Some("alice".to_string()),
                execution_time: Some(started_at),
                completion_time: None,
                failure_reason: None,
            },
        )
        .await?;
    assert_eq!(processing.status, OrderStatus::Processing);
    assert_eq!(processing.executor.as_deref(), Some("alice"));

    let failed = repo
        .update_status(
            created.id,
            &OrderStatusUpdate {
                expected_status: OrderStatus::Processing,
                status: OrderStatus::Failed,
                executor: None,
                execution_time: None,
                completion_time: Some(Utc::now()),
                failure_reason: Some("设备下线失败".to_string()),
            },
        )
        .await?;
    assert_eq!(failed.executor.as_deref(), Some("alice"));
    assert!(failed.execution_time.is_some());
    assert!(failed.completion_time.is_some());
    assert_eq!(failed.failure_reason.as_deref(), Some("设备下线失败"));

    let err = repo
        .update_status(
            404,
            &OrderStatusUpdate {
                expected_status: OrderStatus::Processing,
                status: OrderStatus::Completed,
                executor: None,
                execution_time: None,
                completion_time: None,
                failure_reason: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ScalingError::OrderNotFound { id: 404 }));

    Ok(())
}

#[tokio::test]
async fn test_order_status_update_requires_expected_status() -> Result<()> {
    let manager = setup().await?;
    let repo = manager.order_repository();
    let created = repo.create(&elastic_order("ESO202401010000006789", vec![1])).await?;

    let to_processing = OrderStatusUpdate {
        expected_status: OrderStatus::Pending,
        status: OrderStatus::Processing,
        executor: Some("alice".to_string()),
        execution_time: Some(Utc::now()),
        completion_time: None,
        failure_reason: None,
    };
    repo.update_status(created.id, &to_processing).await?;

    // 状态已被其他请求改变，第二次写入不生效
    let err = repo
        .update_status(
            created.id,
            &OrderStatusUpdate {
                executor: Some("bob".to_string()),
                ..to_processing
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ScalingError::InvalidStatusTransition { ref from, ref to }
            if from == "processing" && to == "processing"
    ));

    let stored = repo.find_by_id(created.id).await?.unwrap();
    assert_eq!(stored.executor.as_deref(), Some("alice"));

    Ok(())
}

#[tokio::test]
async fn test_find_orders_by_ticket() -> Result<()> {
    let manager = setup().await?;
    let repo = manager.order_repository();

    let first = repo.create(&maintenance_order("MNT202401010000000001", "T-100")).await?;
    let second = repo.create(&maintenance_order("MNT202401010000000002", "T-100")).await?;
    repo.create(&maintenance_order("MNT202401010000000003", "T-200")).await?;

    let orders = repo.find_by_ticket("T-100").await?;
    assert_eq!(
        orders.iter().map(|o| o.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );
    assert_eq!(orders[0].order_type(), OrderType::Maintenance);
    assert_eq!(orders[0].status, OrderStatus::PendingConfirmation);
    assert!(repo.find_by_ticket("T-missing").await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_duplicate_order_number_fails() -> Result<()> {
    let manager = setup().await?;
    let repo = manager.order_repository();

    repo.create(&elastic_order("ESO202401010000009999", vec![1])).await?;
    let err = repo
        .create(&elastic_order("ESO202401010000009999", vec![2]))
        .await
        .unwrap_err();
    assert!(matches!(err, ScalingError::OrderCreation(_)));

    Ok(())
}

#[tokio::test]
async fn test_order_creation_is_atomic() -> Result<()> {
    let manager = setup().await?;
    let DatabasePool::SQLite(pool) = manager.pool().clone() else {
        panic!("expected sqlite pool");
    };

    // 详情表缺失时，订单行必须随事务回滚
    sqlx::query("DROP TABLE elastic_scaling_order_details")
        .execute(&pool)
        .await?;

    let repo = manager.order_repository();
    let err = repo
        .create(&elastic_order("ESO202401010000004321", vec![1, 2]))
        .await
        .unwrap_err();
    assert!(matches!(err, ScalingError::OrderCreation(_)));

    let (orders,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
        .fetch_one(&pool)
        .await?;
    let (devices,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM order_devices")
        .fetch_one(&pool)
        .await?;
    assert_eq!(orders, 0);
    assert_eq!(devices, 0);

    Ok(())
}

#[tokio::test]
async fn test_query_template_round_trip() -> Result<()> {
    let manager = setup().await?;
    let repo = manager.query_template_repository();

    let template = QueryTemplateBuilder::new(0)
        .with_raw_groups(
            r#"[{"blocks":[{"type":"device","key":"group","conditionType":"equal","value":"gpu"}]}]"#,
        )
        .build();
    let created = repo.create(&template).await?;
    let loaded = repo.find_by_id(created.id).await?.unwrap();
    let groups = loaded.filter_groups()?;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].blocks[0].value, "gpu");

    let broken = QueryTemplateBuilder::new(0).with_raw_groups("{not json").build();
    let err = repo.create(&broken).await.unwrap_err();
    assert!(matches!(err, ScalingError::InvalidQueryTemplate { .. }));
    assert!(repo.find_by_id(999).await?.is_none());

    Ok(())
}
