//! 设备维护流程
//!
//! `pending_confirmation → scheduled_for_maintenance → maintenance_in_progress → completed`，
//! 外部工单回调完成维护后自动生成 uncordon 订单。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use scaler_core::{ScalingError, ScalingResult};
use scaler_domain::entities::{
    MaintenanceAction, MaintenanceDetail, Order, OrderDetail, OrderStatus,
};
use scaler_domain::repositories::{DeviceDirectory, OrderRepository};

use crate::order_handlers::MaintenanceOrderHandler;
use crate::order_manager::{OrderDraft, OrderManager, StatusChange};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRequest {
    pub device_id: i64,
    pub maintenance_start: DateTime<Utc>,
    pub maintenance_end: DateTime<Utc>,
    pub external_ticket_id: String,
    #[serde(default)]
    pub requested_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceCompletion {
    pub maintenance_order: Order,
    pub uncordon_order: Order,
}

pub struct MaintenanceService {
    pub order_repo: Arc<dyn OrderRepository>,
    pub directory: Arc<dyn DeviceDirectory>,
    pub order_manager: Arc<OrderManager>,
}

fn maintenance_action(order: &Order) -> Option<MaintenanceAction> {
    match &order.detail {
        OrderDetail::Maintenance(detail) => Some(detail.action),
        OrderDetail::ElasticScaling(_) => None,
    }
}

impl MaintenanceService {
    pub fn new(
        order_repo: Arc<dyn OrderRepository>,
        directory: Arc<dyn DeviceDirectory>,
        order_manager: Arc<OrderManager>,
    ) -> Self {
        Self {
            order_repo,
            directory,
            order_manager,
        }
    }

    /// 创建维护申请订单
    ///
    /// 同一工单存在未结束的维护申请时直接返回该订单。
    #[instrument(skip(self, request), fields(device_id = request.device_id, ticket = %request.external_ticket_id))]
    pub async fn request_maintenance(&self, request: MaintenanceRequest) -> ScalingResult<Order> {
        let ticket_id = request.external_ticket_id.trim();
        if ticket_id.is_empty() {
            return Err(ScalingError::InvalidRequest("外部工单号不能为空".to_string()));
        }
        if request.maintenance_end <= request.maintenance_start {
            return Err(ScalingError::InvalidRequest(
                "维护结束时间必须晚于开始时间".to_string(),
            ));
        }

        let existing = self.order_repo.find_by_ticket(ticket_id).await?;
        if let Some(order) = existing.into_iter().find(|o| {
            maintenance_action(o) == Some(MaintenanceAction::Request) && !o.status.is_terminal()
        }) {
            info!("工单 {} 已有进行中的维护订单 {}", ticket_id, order.order_number);
            return Ok(order);
        }

        let device = self
            .directory
            .get_device(request.device_id)
            .await?
            .ok_or(ScalingError::DeviceNotFound {
                id: request.device_id,
            })?;
        let device_name = if device.hostname.is_empty() {
            device.id.to_string()
        } else {
            device.hostname.clone()
        };

        let draft = OrderDraft {
            name: format!("设备维护-{device_name}"),
            description: Some(format!(
                "维护窗口 {} ~ {}",
                request.maintenance_start.format("%Y-%m-%d %H:%M"),
                request.maintenance_end.format("%Y-%m-%d %H:%M")
            )),
            created_by: request
                .requested_by
                .unwrap_or_else(|| "maintenance".to_string()),
            detail: OrderDetail::Maintenance(MaintenanceDetail {
                cluster_id: device.cluster_id,
                action: MaintenanceAction::Request,
                device_count: 1,
                maintenance_start: Some(request.maintenance_start),
                maintenance_end: Some(request.maintenance_end),
                external_ticket_id: Some(ticket_id.to_string()),
            }),
            device_ids: vec![device.id],
        };

        self.order_manager.create_order(draft).await
    }

    /// 确认维护，进入待维护状态
    pub async fn confirm_maintenance(&self, order_id: i64, executor: Option<String>) -> ScalingResult<Order> {
        let order = self.maintenance_request_order(order_id).await?;
        let mut change = StatusChange::to(OrderStatus::ScheduledForMaintenance);
        change.executor = executor;
        let transition = self.order_manager.update_status(order.id, change).await?;

        let devices = self.order_repo.find_devices(order.id).await?;
        let device_ids: Vec<i64> = devices.iter().map(|d| d.device_id).collect();
        info!(
            "订单 {} 已确认维护，待对设备 {:?} 执行 cordon/drain",
            transition.order.order_number, device_ids
        );
        Ok(transition.order)
    }

    pub async fn start_maintenance(&self, order_id: i64, executor: Option<String>) -> ScalingResult<Order> {
        let order = self.maintenance_request_order(order_id).await?;
        let mut change = StatusChange::to(OrderStatus::MaintenanceInProgress);
        change.executor = executor;
        let transition = self.order_manager.update_status(order.id, change).await?;
        Ok(transition.order)
    }

    /// 外部工单回调：完成维护并返回 uncordon 订单
    ///
    /// 重复回调返回已生成的 uncordon 订单。并发回调只有完成状态变更的一方
    /// 生成 uncordon 订单，其余回调返回该订单，尚未生成时返回状态冲突。
    #[instrument(skip(self))]
    pub async fn complete_by_ticket(&self, ticket_id: &str) -> ScalingResult<MaintenanceCompletion> {
        let (request_order, uncordon_order) = self.ticket_orders(ticket_id).await?;

        if request_order.status == OrderStatus::Completed {
            return Self::existing_completion(request_order, uncordon_order);
        }

        let transition = match self
            .order_manager
            .update_status(
                request_order.id,
                StatusChange::to(OrderStatus::Completed).by("maintenance_callback"),
            )
            .await
        {
            Ok(transition) => transition,
            Err(ScalingError::InvalidStatusTransition { from, to }) => {
                // 其他回调已完成状态变更
                let (request_order, uncordon_order) = self.ticket_orders(ticket_id).await?;
                if request_order.status == OrderStatus::Completed {
                    debug!("工单 {} 已由并发回调完成", ticket_id);
                    return Self::existing_completion(request_order, uncordon_order);
                }
                return Err(ScalingError::InvalidStatusTransition { from, to });
            }
            Err(e) => return Err(e),
        };
        let uncordon_order = match transition.follow_up {
            Some(order) => order,
            None => self.create_uncordon(&transition.order).await?,
        };
        info!(
            "工单 {} 维护完成，uncordon 订单 {}",
            ticket_id, uncordon_order.order_number
        );

        Ok(MaintenanceCompletion {
            maintenance_order: transition.order,
            uncordon_order,
        })
    }

    /// 工单对应的维护申请订单与 uncordon 订单
    async fn ticket_orders(&self, ticket_id: &str) -> ScalingResult<(Order, Option<Order>)> {
        let orders = self.order_repo.find_by_ticket(ticket_id).await?;
        let request_order = orders
            .iter()
            .find(|o| maintenance_action(o) == Some(MaintenanceAction::Request))
            .cloned()
            .ok_or_else(|| ScalingError::TicketNotFound {
                ticket_id: ticket_id.to_string(),
            })?;
        let uncordon_order = orders
            .iter()
            .find(|o| maintenance_action(o) == Some(MaintenanceAction::Uncordon))
            .cloned();
        Ok((request_order, uncordon_order))
    }

    fn existing_completion(
        request_order: Order,
        uncordon_order: Option<Order>,
    ) -> ScalingResult<MaintenanceCompletion> {
        match uncordon_order {
            Some(uncordon_order) => Ok(MaintenanceCompletion {
                maintenance_order: request_order,
                uncordon_order,
            }),
            None => Err(ScalingError::InvalidStatusTransition {
                from: OrderStatus::Completed.to_string(),
                to: OrderStatus::Completed.to_string(),
            }),
        }
    }

    async fn maintenance_request_order(&self, order_id: i64) -> ScalingResult<Order> {
        let order = self.order_manager.get_order(order_id).await?;
        if maintenance_action(&order) != Some(MaintenanceAction::Request) {
            return Err(ScalingError::InvalidRequest(format!(
                "订单 {} 不是设备维护申请",
                order.order_number
            )));
        }
        Ok(order)
    }

    async fn create_uncordon(&self, request_order: &Order) -> ScalingResult<Order> {
        let device_ids = self
            .order_repo
            .find_devices(request_order.id)
            .await?
            .into_iter()
            .map(|d| d.device_id)
            .collect();
        let draft = MaintenanceOrderHandler::uncordon_draft(request_order, device_ids).ok_or_else(
            || ScalingError::Internal(format!("订单 {} 无法生成 uncordon 订单", request_order.order_number)),
        )?;
        self.order_manager.create_order(draft).await
    }
}
