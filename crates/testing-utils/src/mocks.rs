//! 仓储与外部协作方的内存实现
//!
//! 无需数据库、Redis 或设备目录服务即可驱动评估调度器和订单流程。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scaler_core::{ScalingError, ScalingResult};
use scaler_domain::entities::{
    matches_all_groups, Device, DevicePage, FilterGroup, NewOrder, Order, OrderDevice,
    OrderDeviceStatus, OrderStatusUpdate, PageRequest, QueryTemplate, ResourceSnapshot,
    ResultCode, Strategy, StrategyExecutionHistory,
};
use scaler_domain::repositories::{
    DeviceDirectory, DistributedLock, ExecutionHistoryRepository, OrderRepository,
    QueryTemplateRepository, SnapshotRepository, StrategyRepository,
};

/// StrategyRepository 的内存实现
#[derive(Debug, Clone)]
pub struct MockStrategyRepository {
    strategies: Arc<Mutex<HashMap<i64, Strategy>>>,
    next_id: Arc<Mutex<i64>>,
    fail_find_enabled: Arc<Mutex<bool>>,
}

impl MockStrategyRepository {
    pub fn new() -> Self {
        Self {
            strategies: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
            fail_find_enabled: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_strategies(strategies: Vec<Strategy>) -> Self {
        let max_id = strategies.iter().map(|s| s.id).max().unwrap_or(0);
        let map = strategies.into_iter().map(|s| (s.id, s)).collect();
        Self {
            strategies: Arc::new(Mutex::new(map)),
            next_id: Arc::new(Mutex::new(max_id + 1)),
            fail_find_enabled: Arc::new(Mutex::new(false)),
        }
    }

    /// 让 `find_enabled` 返回数据库错误
    pub fn fail_find_enabled(&self, fail: bool) {
        *self.fail_find_enabled.lock().unwrap() = fail;
    }

    /// 只修改关联关系，模拟外部直接清理关联表
    pub fn set_cluster_ids(&self, strategy_id: i64, cluster_ids: Vec<i64>) {
        if let Some(strategy) = self.strategies.lock().unwrap().get_mut(&strategy_id) {
            strategy.cluster_ids = cluster_ids;
        }
    }

    pub fn count(&self) -> usize {
        self.strategies.lock().unwrap().len()
    }
}

impl Default for MockStrategyRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StrategyRepository for MockStrategyRepository {
    async fn create(&self, strategy: &Strategy) -> ScalingResult<Strategy> {
        strategy.validate()?;
        let mut strategies = self.strategies.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();

        let mut created = strategy.clone();
        created.id = *next_id;
        *next_id += 1;

        strategies.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, strategy: &Strategy) -> ScalingResult<Strategy> {
        strategy.validate()?;
        let mut strategies = self.strategies.lock().unwrap();
        if !strategies.contains_key(&strategy.id) {
            return Err(ScalingError::StrategyNotFound { id: strategy.id });
        }
        let mut updated = strategy.clone();
        updated.updated_at = Utc::now();
        strategies.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn find_by_id(&self, id: i64) -> ScalingResult<Option<Strategy>> {
        Ok(self.strategies.lock().unwrap().get(&id).cloned())
    }

    async fn find_enabled(&self) -> ScalingResult<Vec<Strategy>> {
        if *self.fail_find_enabled.lock().unwrap() {
            return Err(ScalingError::DatabaseOperation("connection refused".to_string()));
        }
        let mut enabled: Vec<Strategy> = self
            .strategies
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.is_enabled())
            .cloned()
            .collect();
        enabled.sort_by_key(|s| s.id);
        Ok(enabled)
    }

    async fn find_cluster_ids(&self, strategy_id: i64) -> ScalingResult<Vec<i64>> {
        Ok(self
            .strategies
            .lock()
            .unwrap()
            .get(&strategy_id)
            .map(|s| s.cluster_ids.clone())
            .unwrap_or_default())
    }
}

/// SnapshotRepository 的内存实现
#[derive(Debug, Clone, Default)]
pub struct MockSnapshotRepository {
    snapshots: Arc<Mutex<Vec<ResourceSnapshot>>>,
}

impl MockSnapshotRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshots(snapshots: Vec<ResourceSnapshot>) -> Self {
        Self {
            snapshots: Arc::new(Mutex::new(snapshots)),
        }
    }

    pub fn add(&self, snapshot: ResourceSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot);
    }
}

#[async_trait]
impl SnapshotRepository for MockSnapshotRepository {
    async fn find_since(
        &self,
        cluster_id: i64,
        resource_type: &str,
        since: DateTime<Utc>,
    ) -> ScalingResult<Vec<ResourceSnapshot>> {
        let mut found: Vec<ResourceSnapshot> = self
            .snapshots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| {
                s.cluster_id == cluster_id
                    && s.resource_type == resource_type
                    && s.created_at >= since
            })
            .cloned()
            .collect();
        found.sort_by_key(|s| s.created_at);
        Ok(found)
    }

    async fn insert(&self, snapshot: &ResourceSnapshot) -> ScalingResult<ResourceSnapshot> {
        let mut snapshots = self.snapshots.lock().unwrap();
        let mut inserted = snapshot.clone();
        inserted.id = snapshots.len() as i64 + 1;
        snapshots.push(inserted.clone());
        Ok(inserted)
    }
}

/// ExecutionHistoryRepository 的内存实现
#[derive(Debug, Clone, Default)]
pub struct MockExecutionHistoryRepository {
    rows: Arc<Mutex<Vec<StrategyExecutionHistory>>>,
    fail_append: Arc<Mutex<bool>>,
}

impl MockExecutionHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(rows: Vec<StrategyExecutionHistory>) -> Self {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, mut row)| {
                row.id = i as i64 + 1;
                row
            })
            .collect();
        Self {
            rows: Arc::new(Mutex::new(rows)),
            fail_append: Arc::new(Mutex::new(false)),
        }
    }

    pub fn fail_append(&self, fail: bool) {
        *self.fail_append.lock().unwrap() = fail;
    }

    pub fn all(&self) -> Vec<StrategyExecutionHistory> {
        self.rows.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn count_by_result(&self, result: ResultCode) -> usize {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.result == result)
            .count()
    }
}

#[async_trait]
impl ExecutionHistoryRepository for MockExecutionHistoryRepository {
    async fn append(
        &self,
        history: &StrategyExecutionHistory,
    ) -> ScalingResult<StrategyExecutionHistory> {
        if *self.fail_append.lock().unwrap() {
            return Err(ScalingError::DatabaseOperation("history table locked".to_string()));
        }
        let mut rows = self.rows.lock().unwrap();
        let mut appended = history.clone();
        appended.id = rows.len() as i64 + 1;
        rows.push(appended.clone());
        Ok(appended)
    }

    async fn find_latest_with_results(
        &self,
        strategy_id: i64,
        results: &[ResultCode],
    ) -> ScalingResult<Option<StrategyExecutionHistory>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.strategy_id == strategy_id && results.contains(&row.result))
            .max_by_key(|row| (row.execution_time, row.id))
            .cloned())
    }

    async fn find_by_strategy(
        &self,
        strategy_id: i64,
        limit: u32,
    ) -> ScalingResult<Vec<StrategyExecutionHistory>> {
        let mut rows: Vec<StrategyExecutionHistory> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.strategy_id == strategy_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.execution_time, b.id).cmp(&(a.execution_time, a.id)));
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

/// OrderRepository 的内存实现，可注入创建失败
#[derive(Debug, Clone)]
pub struct MockOrderRepository {
    orders: Arc<Mutex<HashMap<i64, Order>>>,
    devices: Arc<Mutex<Vec<OrderDevice>>>,
    next_id: Arc<Mutex<i64>>,
    fail_create: Arc<Mutex<Option<String>>>,
}

impl MockOrderRepository {
    pub fn new() -> Self {
        Self {
            orders: Arc::new(Mutex::new(HashMap::new())),
            devices: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(Mutex::new(1)),
            fail_create: Arc::new(Mutex::new(None)),
        }
    }

    /// 之后的创建全部失败且不写入任何数据
    pub fn fail_create(&self, reason: &str) {
        *self.fail_create.lock().unwrap() = Some(reason.to_string());
    }

    pub fn clear_failure(&self) {
        *self.fail_create.lock().unwrap() = None;
    }

    pub fn all(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.orders.lock().unwrap().values().cloned().collect();
        orders.sort_by_key(|o| o.id);
        orders
    }

    pub fn count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    pub fn device_rows(&self) -> Vec<OrderDevice> {
        self.devices.lock().unwrap().clone()
    }
}

impl Default for MockOrderRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderRepository for MockOrderRepository {
    async fn create(&self, order: &NewOrder) -> ScalingResult<Order> {
        if let Some(reason) = self.fail_create.lock().unwrap().clone() {
            return Err(ScalingError::OrderCreation(reason));
        }

        let mut orders = self.orders.lock().unwrap();
        if orders.values().any(|o| o.order_number == order.order_number) {
            return Err(ScalingError::OrderCreation(format!(
                "订单号重复: {}",
                order.order_number
            )));
        }

        let mut next_id = self.next_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;

        let now = Utc::now();
        let created = Order {
            id,
            order_number: order.order_number.clone(),
            name: order.name.clone(),
            description: order.description.clone(),
            status: order.status,
            executor: None,
            execution_time: None,
            completion_time: None,
            failure_reason: None,
            created_by: order.created_by.clone(),
            created_at: now,
            updated_at: now,
            detail: order.detail.clone(),
        };
        orders.insert(id, created.clone());

        let mut devices = self.devices.lock().unwrap();
        for device_id in &order.device_ids {
            let row_id = devices.len() as i64 + 1;
            devices.push(OrderDevice {
                id: row_id,
                order_id: id,
                device_id: *device_id,
                status: OrderDeviceStatus::Pending,
                created_at: now,
                updated_at: now,
            });
        }

        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> ScalingResult<Option<Order>> {
        Ok(self.orders.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_ticket(&self, ticket_id: &str) -> ScalingResult<Vec<Order>> {
        let mut found: Vec<Order> = self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.detail.external_ticket_id() == Some(ticket_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(found)
    }

    async fn update_status(&self, id: i64, update: &OrderStatusUpdate) -> ScalingResult<Order> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(&id)
            .ok_or(ScalingError::OrderNotFound { id })?;
        if order.status != update.expected_status {
            return Err(ScalingError::InvalidStatusTransition {
                from: order.status.to_string(),
                to: update.status.to_string(),
            });
        }

        order.status = update.status;
        if update.executor.is_some() {
            order.executor = update.executor.clone();
        }
        if update.execution_time.is_some() {
            order.execution_time = update.execution_time;
        }
        if update.completion_time.is_some() {
            order.completion_time = update.completion_time;
        }
        if update.failure_reason.is_some() {
            order.failure_reason = update.failure_reason.clone();
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn find_devices(&self, order_id: i64) -> ScalingResult<Vec<OrderDevice>> {
        Ok(self
            .devices
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn update_device_status(
        &self,
        order_id: i64,
        device_id: i64,
        status: OrderDeviceStatus,
    ) -> ScalingResult<OrderDevice> {
        let mut devices = self.devices.lock().unwrap();
        let row = devices
            .iter_mut()
            .find(|d| d.order_id == order_id && d.device_id == device_id)
            .ok_or(ScalingError::DeviceNotFound { id: device_id })?;
        row.status = status;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }
}

/// QueryTemplateRepository 的内存实现
#[derive(Debug, Clone, Default)]
pub struct MockQueryTemplateRepository {
    templates: Arc<Mutex<HashMap<i64, QueryTemplate>>>,
}

impl MockQueryTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_templates(templates: Vec<QueryTemplate>) -> Self {
        Self {
            templates: Arc::new(Mutex::new(
                templates.into_iter().map(|t| (t.id, t)).collect(),
            )),
        }
    }
}

#[async_trait]
impl QueryTemplateRepository for MockQueryTemplateRepository {
    async fn create(&self, template: &QueryTemplate) -> ScalingResult<QueryTemplate> {
        let mut templates = self.templates.lock().unwrap();
        let mut created = template.clone();
        if created.id <= 0 {
            created.id = templates.keys().max().copied().unwrap_or(0) + 1;
        }
        templates.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> ScalingResult<Option<QueryTemplate>> {
        Ok(self.templates.lock().unwrap().get(&id).cloned())
    }
}

/// 按查询模板条件过滤的内存设备目录
#[derive(Debug, Clone, Default)]
pub struct InMemoryDeviceDirectory {
    devices: Arc<Mutex<Vec<Device>>>,
    failure: Arc<Mutex<Option<String>>>,
    query_count: Arc<Mutex<usize>>,
}

impl InMemoryDeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: Vec<Device>) -> Self {
        Self {
            devices: Arc::new(Mutex::new(devices)),
            ..Self::default()
        }
    }

    /// 之后的查询全部失败
    pub fn fail_queries(&self, reason: &str) {
        *self.failure.lock().unwrap() = Some(reason.to_string());
    }

    pub fn query_count(&self) -> usize {
        *self.query_count.lock().unwrap()
    }
}

#[async_trait]
impl DeviceDirectory for InMemoryDeviceDirectory {
    async fn query(&self, groups: &[FilterGroup], page: PageRequest) -> ScalingResult<DevicePage> {
        *self.query_count.lock().unwrap() += 1;
        if let Some(reason) = self.failure.lock().unwrap().clone() {
            return Err(ScalingError::DeviceQuery(reason));
        }

        let matched: Vec<Device> = self
            .devices
            .lock()
            .unwrap()
            .iter()
            .filter(|device| matches_all_groups(groups, device))
            .cloned()
            .collect();

        let total = matched.len() as u64;
        let devices = matched
            .into_iter()
            .skip(page.offset())
            .take(page.size as usize)
            .collect();
        Ok(DevicePage { devices, total })
    }

    async fn get_device(&self, id: i64) -> ScalingResult<Option<Device>> {
        Ok(self
            .devices
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }
}

/// 可模拟其他实例持有锁的分布式锁
#[derive(Debug, Clone)]
pub struct MockDistributedLock {
    held: Arc<Mutex<HashMap<String, (String, Instant)>>>,
    default_ttl: Arc<Mutex<Duration>>,
    acquire_attempts: Arc<Mutex<usize>>,
    releases: Arc<Mutex<usize>>,
}

impl MockDistributedLock {
    pub fn new() -> Self {
        Self {
            held: Arc::new(Mutex::new(HashMap::new())),
            default_ttl: Arc::new(Mutex::new(Duration::from_secs(60))),
            acquire_attempts: Arc::new(Mutex::new(0)),
            releases: Arc::new(Mutex::new(0)),
        }
    }

    /// 以其他 token 持有该键，模拟另一个实例
    pub fn hold(&self, key: &str, token: &str, ttl: Duration) {
        self.held
            .lock()
            .unwrap()
            .insert(key.to_string(), (token.to_string(), Instant::now() + ttl));
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held
            .lock()
            .unwrap()
            .get(key)
            .is_some_and(|(_, expires_at)| *expires_at > Instant::now())
    }

    pub fn acquire_attempts(&self) -> usize {
        *self.acquire_attempts.lock().unwrap()
    }

    pub fn releases(&self) -> usize {
        *self.releases.lock().unwrap()
    }
}

impl Default for MockDistributedLock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DistributedLock for MockDistributedLock {
    async fn acquire(&self, key: &str, token: &str, ttl: Duration) -> ScalingResult<bool> {
        *self.acquire_attempts.lock().unwrap() += 1;
        let ttl = if ttl.is_zero() {
            *self.default_ttl.lock().unwrap()
        } else {
            ttl
        };

        let mut held = self.held.lock().unwrap();
        let now = Instant::now();
        if held
            .get(key)
            .is_some_and(|(_, expires_at)| *expires_at > now)
        {
            return Ok(false);
        }
        held.insert(key.to_string(), (token.to_string(), now + ttl));
        Ok(true)
    }

    async fn release(&self, key: &str, token: &str) -> ScalingResult<bool> {
        let mut held = self.held.lock().unwrap();
        if held.get(key).is_some_and(|(owner, _)| owner == token) {
            held.remove(key);
            *self.releases.lock().unwrap() += 1;
            return Ok(true);
        }
        Ok(false)
    }

    async fn delete(&self, key: &str) -> ScalingResult<()> {
        self.held.lock().unwrap().remove(key);
        Ok(())
    }

    fn set_default_expiration(&self, ttl: Duration) {
        *self.default_ttl.lock().unwrap() = ttl;
    }

    fn default_expiration(&self) -> Duration {
        *self.default_ttl.lock().unwrap()
    }
}
