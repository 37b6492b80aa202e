use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use scaler_dispatcher::MaintenanceRequest;

use crate::{
    error::ApiResult,
    handlers::orders::OrderReference,
    response::{created, success, success_with_message},
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ExecutorQuery {
    pub executor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MaintenanceCallback {
    pub external_ticket_id: String,
}

#[derive(Debug, Serialize)]
pub struct MaintenanceCompletionView {
    pub maintenance_order: OrderReference,
    pub uncordon_order: OrderReference,
}

pub async fn request_maintenance(
    State(state): State<AppState>,
    Json(request): Json<MaintenanceRequest>,
) -> ApiResult<impl IntoResponse> {
    let order = state.maintenance_service.request_maintenance(request).await?;
    Ok(created(OrderReference::from(&order)))
}

pub async fn confirm_maintenance(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<ExecutorQuery>,
) -> ApiResult<impl IntoResponse> {
    let order = state
        .maintenance_service
        .confirm_maintenance(id, params.executor)
        .await?;
    Ok(success(OrderReference::from(&order)))
}

pub async fn start_maintenance(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<ExecutorQuery>,
) -> ApiResult<impl IntoResponse> {
    let order = state
        .maintenance_service
        .start_maintenance(id, params.executor)
        .await?;
    Ok(success(OrderReference::from(&order)))
}

/// 外部维护系统完成回调
pub async fn maintenance_callback(
    State(state): State<AppState>,
    Json(callback): Json<MaintenanceCallback>,
) -> ApiResult<impl IntoResponse> {
    info!(ticket_id = %callback.external_ticket_id, "收到维护完成回调");

    let completion = state
        .maintenance_service
        .complete_by_ticket(&callback.external_ticket_id)
        .await?;

    Ok(success_with_message(
        MaintenanceCompletionView {
            maintenance_order: OrderReference::from(&completion.maintenance_order),
            uncordon_order: OrderReference::from(&completion.uncordon_order),
        },
        "维护已完成，已生成恢复调度订单",
    ))
}
