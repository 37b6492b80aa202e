use std::sync::Arc;
use std::time::Duration;

use scaler_core::config::EvaluatorConfig;
use scaler_domain::entities::{
    Device, OrderDetail, OrderStatus, ResultCode, Strategy, StrategyExecutionHistory,
    ThresholdType,
};
use scaler_dispatcher::{
    DeviceMatcher, EvaluatorDependencies, HistoryRecorder, OrderHandlerRegistry, OrderManager,
    StrategyEvaluator,
};
use scaler_infrastructure::{strategy_lock_key, sweep_lock_key, MetricsCollector};
use scaler_testing_utils::{
    DeviceBuilder, InMemoryDeviceDirectory, MockDistributedLock, MockExecutionHistoryRepository,
    MockOrderRepository, MockQueryTemplateRepository, MockSnapshotRepository,
    MockStrategyRepository, QueryTemplateBuilder, SnapshotBuilder, StrategyBuilder, TestEnv,
};

struct Harness {
    strategies: Arc<MockStrategyRepository>,
    snapshots: Arc<MockSnapshotRepository>,
    history: Arc<MockExecutionHistoryRepository>,
    orders: Arc<MockOrderRepository>,
    directory: Arc<InMemoryDeviceDirectory>,
    lock: Arc<MockDistributedLock>,
    evaluator: StrategyEvaluator,
}

fn harness_with_history(
    strategies: Vec<Strategy>,
    devices: Vec<Device>,
    history: Vec<StrategyExecutionHistory>,
) -> Harness {
    let metrics = Arc::new(MetricsCollector::new().unwrap());
    let strategy_repo = Arc::new(MockStrategyRepository::with_strategies(strategies));
    let snapshots = Arc::new(MockSnapshotRepository::new());
    let history_repo = Arc::new(MockExecutionHistoryRepository::with_history(history));
    let orders = Arc::new(MockOrderRepository::new());
    let templates = Arc::new(MockQueryTemplateRepository::with_templates(vec![
        QueryTemplateBuilder::new(1).build(),
        QueryTemplateBuilder::new(2).build(),
    ]));
    let directory = Arc::new(InMemoryDeviceDirectory::with_devices(devices));
    let lock = Arc::new(MockDistributedLock::new());

    let recorder = Arc::new(HistoryRecorder::new(history_repo.clone(), metrics.clone()));
    let registry = Arc::new(OrderHandlerRegistry::with_defaults(
        recorder.clone(),
        orders.clone(),
    ));
    let order_manager = Arc::new(OrderManager::new(orders.clone(), registry, metrics.clone()));
    let matcher = Arc::new(DeviceMatcher::new(templates, directory.clone(), 1000));

    let evaluator = StrategyEvaluator::new(
        EvaluatorDependencies {
            strategy_repo: strategy_repo.clone(),
            snapshot_repo: snapshots.clone(),
            history_repo: history_repo.clone(),
            recorder,
            matcher,
            order_manager,
            lock: lock.clone(),
            metrics,
        },
        EvaluatorConfig::default(),
    );

    Harness {
        strategies: strategy_repo,
        snapshots,
        history: history_repo,
        orders,
        directory,
        lock,
        evaluator,
    }
}

fn harness(strategies: Vec<Strategy>, devices: Vec<Device>) -> Harness {
    harness_with_history(strategies, devices, Vec::new())
}

fn idle_devices() -> Vec<Device> {
    vec![
        DeviceBuilder::new(1).build(),
        DeviceBuilder::new(2).build(),
        DeviceBuilder::new(3).in_cluster(1).build(),
    ]
}

fn add_breaching_snapshots(h: &Harness, cluster_id: i64) {
    for snapshot in SnapshotBuilder::daily_series(cluster_id, &[90.0]) {
        h.snapshots.add(snapshot);
    }
}

#[tokio::test]
async fn test_breach_creates_order_and_history() {
    let h = harness(
        vec![StrategyBuilder::new().with_device_count(2).build()],
        idle_devices(),
    );
    add_breaching_snapshots(&h, 1);

    let summary = h.evaluator.evaluate_once().await.unwrap();
    assert_eq!(summary.strategies_seen, 1);
    assert_eq!(summary.evaluated_pairs, 1);
    assert_eq!(summary.orders_created, 1);

    let orders = h.orders.all();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Pending);
    assert!(orders[0].order_number.starts_with("ESO"));
    match &orders[0].detail {
        OrderDetail::ElasticScaling(detail) => {
            assert_eq!(detail.strategy_id, Some(1));
            assert_eq!(detail.cluster_id, 1);
            assert_eq!(detail.device_count, 2);
        }
        other => panic!("unexpected detail: {other:?}"),
    }

    // 未分配设备优先
    let device_ids: Vec<i64> = h.orders.device_rows().iter().map(|d| d.device_id).collect();
    assert_eq!(device_ids, vec![1, 2]);

    let history = h.history.all();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].result, ResultCode::OrderCreated);
    assert_eq!(history[0].order_id, Some(orders[0].id));
    assert_eq!(history[0].cluster_id, Some(1));
    assert!(!history[0].triggered_value.is_empty());
}

#[tokio::test]
async fn test_threshold_not_met_records_history_only() {
    let h = harness(vec![StrategyBuilder::new().build()], idle_devices());
    for snapshot in SnapshotBuilder::daily_series(1, &[95.0, 50.0]) {
        h.snapshots.add(snapshot);
    }

    let summary = h.evaluator.evaluate_once().await.unwrap();
    assert_eq!(summary.orders_created, 0);
    assert_eq!(h.orders.count(), 0);
    assert_eq!(h.history.count_by_result(ResultCode::ThresholdNotMet), 1);
    assert_eq!(h.directory.query_count(), 0);
}

#[tokio::test]
async fn test_no_snapshot_data_is_distinct_outcome() {
    let h = harness(vec![StrategyBuilder::new().build()], idle_devices());

    h.evaluator.evaluate_once().await.unwrap();

    assert_eq!(h.history.count_by_result(ResultCode::NoSnapshotData), 1);
    assert_eq!(h.history.count_by_result(ResultCode::ThresholdNotMet), 0);
    assert_eq!(h.orders.count(), 0);
}

#[tokio::test]
async fn test_cooldown_skips_within_window() {
    let previous = StrategyExecutionHistory::new(1, ResultCode::OrderCreated, "上次触发")
        .with_execution_time(TestEnv::minutes_ago(5));
    let h = harness_with_history(
        vec![StrategyBuilder::new().with_cooldown_minutes(10).build()],
        idle_devices(),
        vec![previous],
    );
    add_breaching_snapshots(&h, 1);

    let summary = h.evaluator.evaluate_once().await.unwrap();
    assert_eq!(summary.skipped_by_cooldown, 1);
    assert_eq!(summary.orders_created, 0);
    assert_eq!(h.orders.count(), 0);
    assert_eq!(h.history.count(), 1);
}

#[tokio::test]
async fn test_cooldown_expired_proceeds() {
    let previous = StrategyExecutionHistory::new(1, ResultCode::OrderCreated, "上次触发")
        .with_execution_time(TestEnv::minutes_ago(11));
    let h = harness_with_history(
        vec![StrategyBuilder::new().with_cooldown_minutes(10).build()],
        idle_devices(),
        vec![previous],
    );
    add_breaching_snapshots(&h, 1);

    let summary = h.evaluator.evaluate_once().await.unwrap();
    assert_eq!(summary.skipped_by_cooldown, 0);
    assert_eq!(summary.orders_created, 1);
    assert_eq!(h.history.count_by_result(ResultCode::OrderCreated), 2);
}

#[tokio::test]
async fn test_cooldown_ignores_non_order_results() {
    let previous = StrategyExecutionHistory::new(1, ResultCode::ThresholdNotMet, "未满足")
        .with_execution_time(TestEnv::minutes_ago(1));
    let h = harness_with_history(
        vec![StrategyBuilder::new().with_cooldown_minutes(10).build()],
        idle_devices(),
        vec![previous],
    );
    add_breaching_snapshots(&h, 1);

    let summary = h.evaluator.evaluate_once().await.unwrap();
    assert_eq!(summary.orders_created, 1);
}

#[tokio::test]
async fn test_oversized_cooldown_is_capped() {
    let previous = StrategyExecutionHistory::new(1, ResultCode::OrderCreated, "上次触发")
        .with_execution_time(TestEnv::minutes_ago(5));
    let h = harness_with_history(
        vec![StrategyBuilder::new().with_cooldown_minutes(i64::MAX / 2).build()],
        idle_devices(),
        vec![previous],
    );
    add_breaching_snapshots(&h, 1);

    let summary = h.evaluator.evaluate_once().await.unwrap();
    assert_eq!(summary.skipped_by_cooldown, 1);
    assert_eq!(h.orders.count(), 0);
}

#[tokio::test]
async fn test_out_of_range_duration_is_recorded_as_config_error() {
    // 存量数据可能绕过接口校验
    let oversized = StrategyBuilder::new()
        .with_id(1)
        .with_required_days(100_000_000)
        .build();
    let healthy = StrategyBuilder::new().with_id(2).with_name("healthy").build();
    let h = harness(vec![oversized, healthy], idle_devices());
    add_breaching_snapshots(&h, 1);

    let summary = h.evaluator.evaluate_once().await.unwrap();
    assert_eq!(summary.strategies_seen, 2);
    assert_eq!(summary.orders_created, 1);

    let history = h.history.all();
    assert!(history
        .iter()
        .any(|row| row.strategy_id == 1 && row.result == ResultCode::ConfigError));
    assert!(history
        .iter()
        .any(|row| row.strategy_id == 2 && row.result == ResultCode::OrderCreated));
}

#[tokio::test]
async fn test_zero_clusters_is_idempotent() {
    let h = harness(
        vec![StrategyBuilder::new().with_clusters(vec![]).build()],
        idle_devices(),
    );

    for _ in 0..2 {
        let summary = h.evaluator.evaluate_once().await.unwrap();
        assert_eq!(summary.skipped_no_clusters, 1);
        assert_eq!(h.history.count(), 0);
    }
    assert_eq!(h.orders.count(), 0);
}

#[tokio::test]
async fn test_associations_removed_after_load_skip_silently() {
    let h = harness(vec![StrategyBuilder::new().build()], idle_devices());
    add_breaching_snapshots(&h, 1);
    h.strategies.set_cluster_ids(1, vec![]);

    let summary = h.evaluator.evaluate_once().await.unwrap();
    assert_eq!(summary.skipped_no_clusters, 1);
    assert_eq!(h.history.count(), 0);
}

#[tokio::test]
async fn test_strategy_lock_held_elsewhere_skips() {
    let h = harness(vec![StrategyBuilder::new().build()], idle_devices());
    add_breaching_snapshots(&h, 1);
    h.lock
        .hold(&strategy_lock_key(1), "other-instance", Duration::from_secs(60));

    let summary = h.evaluator.evaluate_once().await.unwrap();
    assert_eq!(summary.skipped_by_lock, 1);
    assert_eq!(h.orders.count(), 0);
    assert_eq!(h.history.count(), 0);
    // 其他实例的锁不受影响
    assert!(h.lock.is_held(&strategy_lock_key(1)));
}

#[tokio::test]
async fn test_sweep_lock_held_elsewhere_skips_sweep() {
    let h = harness(vec![StrategyBuilder::new().build()], idle_devices());
    add_breaching_snapshots(&h, 1);
    h.lock
        .hold(&sweep_lock_key(), "other-instance", Duration::from_secs(60));

    let summary = h.evaluator.evaluate_once().await.unwrap();
    assert!(summary.sweep_skipped);
    assert_eq!(summary.strategies_seen, 0);
    assert_eq!(h.orders.count(), 0);
}

#[tokio::test]
async fn test_locks_released_after_sweep() {
    let h = harness(vec![StrategyBuilder::new().build()], idle_devices());
    add_breaching_snapshots(&h, 1);

    h.evaluator.evaluate_once().await.unwrap();

    assert!(!h.lock.is_held(&strategy_lock_key(1)));
    assert!(!h.lock.is_held(&sweep_lock_key()));
    assert_eq!(h.lock.releases(), 2);
}

#[tokio::test]
async fn test_strategy_list_failure_aborts_tick_and_releases_sweep_lock() {
    let h = harness(vec![StrategyBuilder::new().build()], idle_devices());
    h.strategies.fail_find_enabled(true);

    assert!(h.evaluator.evaluate_once().await.is_err());
    assert!(!h.lock.is_held(&sweep_lock_key()));
    assert_eq!(h.history.count(), 0);
}

#[tokio::test]
async fn test_missing_template_records_config_error() {
    let h = harness(
        vec![StrategyBuilder::new().with_query_templates(None, None).build()],
        idle_devices(),
    );
    add_breaching_snapshots(&h, 1);

    let summary = h.evaluator.evaluate_once().await.unwrap();
    assert_eq!(summary.orders_created, 0);
    assert_eq!(h.orders.count(), 0);

    let history = h.history.all();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].result, ResultCode::ConfigError);
    assert!(!history[0].threshold_value.is_empty());
}

#[tokio::test]
async fn test_device_query_failure_recorded() {
    let h = harness(vec![StrategyBuilder::new().build()], idle_devices());
    add_breaching_snapshots(&h, 1);
    h.directory.fail_queries("portal timeout");

    h.evaluator.evaluate_once().await.unwrap();

    assert_eq!(h.history.count_by_result(ResultCode::DeviceQueryFailed), 1);
    assert_eq!(h.orders.count(), 0);
}

#[tokio::test]
async fn test_order_creation_failure_recorded() {
    let h = harness(vec![StrategyBuilder::new().build()], idle_devices());
    add_breaching_snapshots(&h, 1);
    h.orders.fail_create("disk full");

    let summary = h.evaluator.evaluate_once().await.unwrap();
    assert_eq!(summary.orders_created, 0);

    let history = h.history.all();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].result, ResultCode::OrderCreationFailed);
    assert!(history[0].reason.contains("disk full"));
    assert!(h.orders.device_rows().is_empty());
}

#[tokio::test]
async fn test_failed_pair_does_not_stop_other_pairs_or_strategies() {
    let broken = StrategyBuilder::new()
        .with_id(1)
        .with_query_templates(None, None)
        .build();
    let healthy = StrategyBuilder::new()
        .with_id(2)
        .with_name("healthy")
        .with_resource_types("total,gpu")
        .build();
    let h = harness(vec![broken, healthy], idle_devices());
    add_breaching_snapshots(&h, 1);

    let summary = h.evaluator.evaluate_once().await.unwrap();
    assert_eq!(summary.strategies_seen, 2);
    assert_eq!(summary.evaluated_pairs, 3);
    assert_eq!(summary.orders_created, 1);

    let history = h.history.all();
    let for_strategy = |id: i64, result: ResultCode| {
        history
            .iter()
            .filter(|row| row.strategy_id == id && row.result == result)
            .count()
    };
    assert_eq!(for_strategy(1, ResultCode::ConfigError), 1);
    assert_eq!(for_strategy(2, ResultCode::OrderCreated), 1);
    assert_eq!(for_strategy(2, ResultCode::NoSnapshotData), 1);
}

#[tokio::test]
async fn test_history_write_failure_does_not_undo_order() {
    let h = harness(vec![StrategyBuilder::new().build()], idle_devices());
    add_breaching_snapshots(&h, 1);
    h.history.fail_append(true);

    let summary = h.evaluator.evaluate_once().await.unwrap();
    assert_eq!(summary.orders_created, 1);
    assert_eq!(h.orders.count(), 1);
    assert_eq!(h.history.count(), 0);
}

#[tokio::test]
async fn test_no_devices_creates_reminder_order_and_starts_cooldown() {
    let h = harness(vec![StrategyBuilder::new().build()], Vec::new());
    add_breaching_snapshots(&h, 1);

    let summary = h.evaluator.evaluate_once().await.unwrap();
    assert_eq!(summary.orders_created, 1);
    assert_eq!(h.history.count_by_result(ResultCode::NoDevicesFound), 1);
    assert!(h.orders.device_rows().is_empty());

    let second = h.evaluator.evaluate_once().await.unwrap();
    assert_eq!(second.skipped_by_cooldown, 1);
    assert_eq!(h.orders.count(), 1);
}

#[tokio::test]
async fn test_exit_without_cluster_devices_records_no_eligible_devices() {
    let strategy = StrategyBuilder::new()
        .pool_exit()
        .with_cpu(30.0, ThresholdType::Usage)
        .build();
    let h = harness(
        vec![strategy],
        vec![
            DeviceBuilder::new(1).build(),
            DeviceBuilder::new(2).in_cluster(9).build(),
        ],
    );
    for snapshot in SnapshotBuilder::daily_series(1, &[10.0]) {
        h.snapshots.add(snapshot);
    }

    h.evaluator.evaluate_once().await.unwrap();

    assert_eq!(h.history.count_by_result(ResultCode::NoEligibleDevices), 1);
    assert_eq!(h.orders.count(), 1);
    assert!(h.orders.device_rows().is_empty());
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let h = harness(vec![StrategyBuilder::new().build()], idle_devices());
    add_breaching_snapshots(&h, 1);
    let evaluator = Arc::new(h.evaluator);
    let (tx, rx) = tokio::sync::broadcast::channel(1);

    let runner = {
        let evaluator = Arc::clone(&evaluator);
        tokio::spawn(async move { evaluator.run(rx).await })
    };

    let orders = h.orders.clone();
    assert!(
        TestEnv::wait_for(
            || {
                let orders = orders.clone();
                async move { orders.count() == 1 }
            },
            Duration::from_secs(5),
        )
        .await
    );

    tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(h.orders.count(), 1);
}
