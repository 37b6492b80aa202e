//! 订单类型处理器
//!
//! 每种订单类型对应一个处理器，决定初始状态并响应状态变更。
//! 注册表在启动时构建并注入 `OrderManager`。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use scaler_core::{ScalingError, ScalingResult};
use scaler_domain::entities::{
    MaintenanceAction, MaintenanceDetail, Order, OrderDetail, OrderStatus, OrderType, ResultCode,
    StrategyExecutionHistory,
};
use scaler_domain::repositories::OrderRepository;

use crate::history_recorder::HistoryRecorder;
use crate::order_manager::OrderDraft;

#[async_trait]
pub trait OrderHandler: Send + Sync {
    fn order_type(&self) -> OrderType;

    fn initial_status(&self, detail: &OrderDetail) -> OrderStatus {
        detail.workflow().initial_status()
    }

    /// 状态已经持久化后调用，返回值是需要创建的后续订单
    async fn on_status_changed(
        &self,
        order: &Order,
        previous: OrderStatus,
    ) -> ScalingResult<Option<OrderDraft>>;
}

/// 弹性伸缩订单：状态变更写入策略执行历史
pub struct ElasticScalingOrderHandler {
    recorder: Arc<HistoryRecorder>,
}

impl ElasticScalingOrderHandler {
    pub fn new(recorder: Arc<HistoryRecorder>) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl OrderHandler for ElasticScalingOrderHandler {
    fn order_type(&self) -> OrderType {
        OrderType::ElasticScaling
    }

    async fn on_status_changed(
        &self,
        order: &Order,
        previous: OrderStatus,
    ) -> ScalingResult<Option<OrderDraft>> {
        let OrderDetail::ElasticScaling(detail) = &order.detail else {
            return Ok(None);
        };
        let Some(strategy_id) = detail.strategy_id else {
            return Ok(None);
        };
        let Some(result) = ResultCode::from_order_status(order.status) else {
            return Ok(None);
        };

        let (expected_time, time_name) = if order.status.is_terminal() {
            (order.completion_time, "完成时间")
        } else {
            (order.execution_time, "执行时间")
        };
        let reason = format!(
            "订单 {} 状态 {} -> {}",
            order.order_number, previous, order.status
        );

        let entry = match expected_time {
            Some(time) => {
                StrategyExecutionHistory::new(strategy_id, result, reason).with_execution_time(time)
            }
            None => {
                warn!("订单 {} 缺少{}，按当前时间记录", order.order_number, time_name);
                StrategyExecutionHistory::new(
                    strategy_id,
                    ResultCode::OrderTimestampMissing,
                    format!("{reason}，缺少{time_name}"),
                )
            }
        };

        self.recorder
            .record(
                entry
                    .with_target(detail.cluster_id, detail.resource_type.clone())
                    .with_values(
                        detail.triggered_value.clone(),
                        detail.threshold_value.clone(),
                    )
                    .with_order(order.id),
            )
            .await;
        Ok(None)
    }
}

/// 设备维护订单：维护申请完成后生成 uncordon 订单
pub struct MaintenanceOrderHandler {
    order_repo: Arc<dyn OrderRepository>,
}

impl MaintenanceOrderHandler {
    pub fn new(order_repo: Arc<dyn OrderRepository>) -> Self {
        Self { order_repo }
    }

    /// 维护申请订单对应的 uncordon 订单，沿用工单号和设备
    pub fn uncordon_draft(order: &Order, device_ids: Vec<i64>) -> Option<OrderDraft> {
        let OrderDetail::Maintenance(detail) = &order.detail else {
            return None;
        };
        if detail.action != MaintenanceAction::Request {
            return None;
        }

        Some(OrderDraft {
            name: format!("{}-恢复调度", order.name),
            description: Some(format!("维护订单 {} 完成后恢复设备调度", order.order_number)),
            created_by: order.created_by.clone(),
            detail: OrderDetail::Maintenance(MaintenanceDetail {
                cluster_id: detail.cluster_id,
                action: MaintenanceAction::Uncordon,
                device_count: device_ids.len() as i32,
                maintenance_start: detail.maintenance_start,
                maintenance_end: detail.maintenance_end,
                external_ticket_id: detail.external_ticket_id.clone(),
            }),
            device_ids,
        })
    }
}

#[async_trait]
impl OrderHandler for MaintenanceOrderHandler {
    fn order_type(&self) -> OrderType {
        OrderType::Maintenance
    }

    async fn on_status_changed(
        &self,
        order: &Order,
        _previous: OrderStatus,
    ) -> ScalingResult<Option<OrderDraft>> {
        let OrderDetail::Maintenance(detail) = &order.detail else {
            return Ok(None);
        };

        match (detail.action, order.status) {
            (MaintenanceAction::Request, OrderStatus::Completed) => {
                let device_ids = self
                    .order_repo
                    .find_devices(order.id)
                    .await?
                    .into_iter()
                    .map(|d| d.device_id)
                    .collect();
                Ok(Self::uncordon_draft(order, device_ids))
            }
            (MaintenanceAction::Uncordon, OrderStatus::Processing) => {
                info!("订单 {} 待执行 uncordon", order.order_number);
                Ok(None)
            }
            _ => Ok(None),
        }
    }
}

/// 订单类型到处理器的注册表
#[derive(Default, Clone)]
pub struct OrderHandlerRegistry {
    handlers: HashMap<OrderType, Arc<dyn OrderHandler>>,
}

impl OrderHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册弹性伸缩和设备维护两种内置处理器
    pub fn with_defaults(
        recorder: Arc<HistoryRecorder>,
        order_repo: Arc<dyn OrderRepository>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ElasticScalingOrderHandler::new(recorder)));
        registry.register(Arc::new(MaintenanceOrderHandler::new(order_repo)));
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn OrderHandler>) {
        self.handlers.insert(handler.order_type(), handler);
    }

    pub fn get(&self, order_type: OrderType) -> ScalingResult<Arc<dyn OrderHandler>> {
        self.handlers
            .get(&order_type)
            .cloned()
            .ok_or_else(|| ScalingError::Internal(format!("未注册订单类型 {order_type} 的处理器")))
    }
}
