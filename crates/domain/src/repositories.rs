//! 领域仓储与外部协作方抽象
//!
//! 评估调度器只依赖这里的接口，具体实现位于 infrastructure crate，
//! 测试使用 testing-utils 中的内存实现。

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scaler_core::ScalingResult;

use crate::entities::{
    Device, DevicePage, FilterGroup, NewOrder, Order, OrderDevice, OrderDeviceStatus,
    OrderStatusUpdate, PageRequest, QueryTemplate, ResourceSnapshot, ResultCode, Strategy,
    StrategyExecutionHistory,
};

/// 策略仓储抽象
#[async_trait]
pub trait StrategyRepository: Send + Sync {
    /// 写入策略及其集群关联，二者在同一事务中提交
    async fn create(&self, strategy: &Strategy) -> ScalingResult<Strategy>;
    /// 更新策略并整体替换集群关联
    async fn update(&self, strategy: &Strategy) -> ScalingResult<Strategy>;
    async fn find_by_id(&self, id: i64) -> ScalingResult<Option<Strategy>>;
    async fn find_enabled(&self) -> ScalingResult<Vec<Strategy>>;
    async fn find_cluster_ids(&self, strategy_id: i64) -> ScalingResult<Vec<i64>>;
}

/// 资源快照仓储抽象，快照由外部采集任务写入
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// 按时间升序返回 `since` 之后的快照
    async fn find_since(
        &self,
        cluster_id: i64,
        resource_type: &str,
        since: DateTime<Utc>,
    ) -> ScalingResult<Vec<ResourceSnapshot>>;
    async fn insert(&self, snapshot: &ResourceSnapshot) -> ScalingResult<ResourceSnapshot>;
}

/// 执行历史仓储抽象，只追加
#[async_trait]
pub trait ExecutionHistoryRepository: Send + Sync {
    async fn append(
        &self,
        history: &StrategyExecutionHistory,
    ) -> ScalingResult<StrategyExecutionHistory>;
    /// 返回结果码属于 `results` 的最近一条记录
    async fn find_latest_with_results(
        &self,
        strategy_id: i64,
        results: &[ResultCode],
    ) -> ScalingResult<Option<StrategyExecutionHistory>>;
    /// 按执行时间倒序
    async fn find_by_strategy(
        &self,
        strategy_id: i64,
        limit: u32,
    ) -> ScalingResult<Vec<StrategyExecutionHistory>>;
}

/// 订单仓储抽象
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 订单、详情、设备关联在同一事务中写入，失败时全部回滚
    async fn create(&self, order: &NewOrder) -> ScalingResult<Order>;
    async fn find_by_id(&self, id: i64) -> ScalingResult<Option<Order>>;
    /// 按外部工单号查找订单，按创建时间倒序
    async fn find_by_ticket(&self, ticket_id: &str) -> ScalingResult<Vec<Order>>;
    /// 条件更新：当前状态与 `expected_status` 不一致时返回 `InvalidStatusTransition`
    async fn update_status(&self, id: i64, update: &OrderStatusUpdate) -> ScalingResult<Order>;
    async fn find_devices(&self, order_id: i64) -> ScalingResult<Vec<OrderDevice>>;
    async fn update_device_status(
        &self,
        order_id: i64,
        device_id: i64,
        status: OrderDeviceStatus,
    ) -> ScalingResult<OrderDevice>;
}

/// 设备查询模板仓储抽象
#[async_trait]
pub trait QueryTemplateRepository: Send + Sync {
    async fn create(&self, template: &QueryTemplate) -> ScalingResult<QueryTemplate>;
    async fn find_by_id(&self, id: i64) -> ScalingResult<Option<QueryTemplate>>;
}

/// 外部设备目录
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    async fn query(&self, groups: &[FilterGroup], page: PageRequest) -> ScalingResult<DevicePage>;
    async fn get_device(&self, id: i64) -> ScalingResult<Option<Device>>;
}

/// 分布式锁
///
/// 获取为单次尝试，不阻塞不重试；TTL 到期是持有者崩溃时的最终保障。
#[async_trait]
pub trait DistributedLock: Send + Sync {
    async fn acquire(&self, key: &str, token: &str, ttl: Duration) -> ScalingResult<bool>;
    /// 仅当 token 与当前持有者一致时删除
    async fn release(&self, key: &str, token: &str) -> ScalingResult<bool>;
    /// 无条件删除
    async fn delete(&self, key: &str) -> ScalingResult<()>;
    /// 设置进程级默认过期时间，`ttl` 为零时的获取使用该值
    fn set_default_expiration(&self, ttl: Duration);
    fn default_expiration(&self) -> Duration;
}
