use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use scaler_dispatcher::StatusChange;
use scaler_domain::entities::{Order, OrderDevice, OrderDeviceStatus, OrderStatus};

use crate::{
    error::ApiResult,
    response::success,
    routes::AppState,
};

/// 订单的简要引用，供创建类接口返回
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderReference {
    pub id: i64,
    pub order_number: String,
    pub status: OrderStatus,
}

impl From<&Order> for OrderReference {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number.clone(),
            status: order.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub devices: Vec<OrderDevice>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub executor: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl From<StatusUpdateRequest> for StatusChange {
    fn from(request: StatusUpdateRequest) -> Self {
        let mut change = StatusChange::to(request.status);
        if let Some(executor) = request.executor {
            change = change.by(executor);
        }
        if let Some(reason) = request.reason {
            change = change.because(reason);
        }
        change
    }
}

#[derive(Debug, Serialize)]
pub struct StatusUpdateResponse {
    pub order: Order,
    pub previous_status: OrderStatus,
    pub follow_up_order: Option<OrderReference>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceStatusRequest {
    pub status: OrderDeviceStatus,
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let (order, devices) = state.order_manager.get_order_with_devices(id).await?;
    Ok(success(OrderView { order, devices }))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<StatusUpdateRequest>,
) -> ApiResult<impl IntoResponse> {
    let transition = state
        .order_manager
        .update_status(id, request.into())
        .await?;

    info!(
        order_id = id,
        from = %transition.previous,
        to = %transition.order.status,
        "订单状态已通过接口更新"
    );

    Ok(success(StatusUpdateResponse {
        previous_status: transition.previous,
        follow_up_order: transition.follow_up.as_ref().map(OrderReference::from),
        order: transition.order,
    }))
}

pub async fn update_device_status(
    State(state): State<AppState>,
    Path((order_id, device_id)): Path<(i64, i64)>,
    Json(request): Json<DeviceStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let device = state
        .order_manager
        .update_device_status(order_id, device_id, request.status)
        .await?;
    Ok(success(device))
}
