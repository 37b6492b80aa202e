use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info, instrument};

use scaler_core::{ScalingError, ScalingResult};
use scaler_domain::entities::{
    NewOrder, Order, OrderDetail, OrderDevice, OrderDeviceStatus, OrderStatus, OrderStatusUpdate,
    OrderType,
};
use scaler_domain::repositories::OrderRepository;
use scaler_infrastructure::{MetricsCollector, StructuredLogger};

use crate::order_handlers::OrderHandlerRegistry;

/// 待创建订单的业务字段，订单号和初始状态由 `OrderManager` 决定
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub name: String,
    pub description: Option<String>,
    pub created_by: String,
    pub detail: OrderDetail,
    pub device_ids: Vec<i64>,
}

/// 状态变更请求
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub executor: Option<String>,
    pub reason: Option<String>,
}

impl StatusChange {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            status,
            executor: None,
            reason: None,
        }
    }

    pub fn by(mut self, executor: impl Into<String>) -> Self {
        self.executor = Some(executor.into());
        self
    }

    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusTransition {
    pub order: Order,
    pub previous: OrderStatus,
    /// 处理器生成的后续订单，例如维护完成后的 uncordon 订单
    pub follow_up: Option<Order>,
}

/// 订单编号：前缀 + yyyyMMddHHmmss + 4位随机数
pub fn generate_order_number(order_type: OrderType) -> String {
    let prefix = match order_type {
        OrderType::ElasticScaling => "ESO",
        OrderType::Maintenance => "MNT",
    };
    let suffix: u32 = rand::rng().random_range(0..10_000);
    format!("{}{}{:04}", prefix, Utc::now().format("%Y%m%d%H%M%S"), suffix)
}

pub struct OrderManager {
    pub order_repo: Arc<dyn OrderRepository>,
    pub handlers: Arc<OrderHandlerRegistry>,
    pub metrics: Arc<MetricsCollector>,
}

impl OrderManager {
    pub fn new(
        order_repo: Arc<dyn OrderRepository>,
        handlers: Arc<OrderHandlerRegistry>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            order_repo,
            handlers,
            metrics,
        }
    }

    /// 创建订单，订单、详情和设备关联在同一事务内写入
    #[instrument(skip(self, draft), fields(order_type = %draft.detail.order_type(), devices = draft.device_ids.len()))]
    pub async fn create_order(&self, draft: OrderDraft) -> ScalingResult<Order> {
        let order_type = draft.detail.order_type();
        let handler = self.handlers.get(order_type)?;

        let new_order = NewOrder {
            order_number: generate_order_number(order_type),
            name: draft.name,
            description: draft.description,
            status: handler.initial_status(&draft.detail),
            created_by: draft.created_by,
            detail: draft.detail,
            device_ids: draft.device_ids,
        };

        let order = self.order_repo.create(&new_order).await?;
        StructuredLogger::log_order_created(
            order.id,
            &order.order_number,
            order_type.as_str(),
            order.detail.strategy_id(),
            new_order.device_ids.len(),
        );
        self.metrics
            .record_order_created(order_type.as_str(), new_order.device_ids.len());
        Ok(order)
    }

    pub async fn get_order(&self, id: i64) -> ScalingResult<Order> {
        self.order_repo
            .find_by_id(id)
            .await?
            .ok_or(ScalingError::OrderNotFound { id })
    }

    pub async fn get_order_with_devices(&self, id: i64) -> ScalingResult<(Order, Vec<OrderDevice>)> {
        let order = self.get_order(id).await?;
        let devices = self.order_repo.find_devices(id).await?;
        Ok((order, devices))
    }

    /// 校验状态机后更新订单状态，并交给订单类型处理器
    ///
    /// 进入执行状态时写入执行时间，进入终态时写入完成时间。
    /// 非法变更返回 `InvalidStatusTransition`，不做任何写入。
    /// 写入以读取时的状态为条件，并发变更中只有一方成功，
    /// 后续订单也只由成功的一方生成。
    #[instrument(skip(self, change), fields(order_id = id, to = %change.status))]
    pub async fn update_status(&self, id: i64, change: StatusChange) -> ScalingResult<StatusTransition> {
        let current = self.get_order(id).await?;
        let previous = current.status;
        let target = change.status;

        if !current.workflow().can_transition(previous, target) {
            return Err(ScalingError::InvalidStatusTransition {
                from: previous.to_string(),
                to: target.to_string(),
            });
        }

        let now = Utc::now();
        let update = OrderStatusUpdate {
            expected_status: previous,
            status: target,
            executor: change.executor,
            execution_time: (target.starts_execution() && current.execution_time.is_none())
                .then_some(now),
            completion_time: target.is_terminal().then_some(now),
            failure_reason: match target {
                OrderStatus::Failed | OrderStatus::Cancelled | OrderStatus::Ignored => change.reason,
                _ => None,
            },
        };

        let order = self.order_repo.update_status(id, &update).await?;
        StructuredLogger::log_order_status_changed(
            order.id,
            &order.order_number,
            previous.as_str(),
            target.as_str(),
        );

        let handler = self.handlers.get(order.order_type())?;
        let follow_up = match handler.on_status_changed(&order, previous).await? {
            Some(draft) => {
                let created = self.create_order(draft).await?;
                info!(
                    "订单 {} 生成后续订单 {}",
                    order.order_number, created.order_number
                );
                Some(created)
            }
            None => None,
        };

        Ok(StatusTransition {
            order,
            previous,
            follow_up,
        })
    }

    /// 设备级状态独立于订单状态
    pub async fn update_device_status(
        &self,
        order_id: i64,
        device_id: i64,
        status: OrderDeviceStatus,
    ) -> ScalingResult<OrderDevice> {
        self.get_order(order_id).await?;
        let device = self
            .order_repo
            .update_device_status(order_id, device_id, status)
            .await?;
        debug!("订单 {} 设备 {} 状态更新为 {}", order_id, device_id, status);
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number(OrderType::ElasticScaling);
        assert!(number.starts_with("ESO"));
        assert_eq!(number.len(), 3 + 14 + 4);
        assert!(number[3..].chars().all(|c| c.is_ascii_digit()));

        assert!(generate_order_number(OrderType::Maintenance).starts_with("MNT"));
    }
}
