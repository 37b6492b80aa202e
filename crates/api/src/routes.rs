use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use scaler_dispatcher::{MaintenanceService, OrderManager};
use scaler_domain::repositories::{ExecutionHistoryRepository, StrategyRepository};

use crate::handlers::{
    health::health_check,
    maintenance::{confirm_maintenance, maintenance_callback, request_maintenance, start_maintenance},
    orders::{get_order, update_device_status, update_order_status},
    strategies::{create_strategy, get_strategy, get_strategy_history, update_strategy},
};

#[derive(Clone)]
pub struct AppState {
    pub strategy_repo: Arc<dyn StrategyRepository>,
    pub history_repo: Arc<dyn ExecutionHistoryRepository>,
    pub order_manager: Arc<OrderManager>,
    pub maintenance_service: Arc<MaintenanceService>,
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // 策略管理
        .route("/api/strategies", post(create_strategy))
        .route("/api/strategies/{id}", get(get_strategy).put(update_strategy))
        .route("/api/strategies/{id}/history", get(get_strategy_history))
        // 订单管理
        .route("/api/orders/{id}", get(get_order))
        .route("/api/orders/{id}/status", put(update_order_status))
        .route(
            "/api/orders/{id}/devices/{device_id}/status",
            put(update_device_status),
        )
        // 设备维护
        .route("/api/maintenance", post(request_maintenance))
        .route("/api/maintenance/callback", post(maintenance_callback))
        .route("/api/maintenance/{id}/confirm", post(confirm_maintenance))
        .route("/api/maintenance/{id}/start", post(start_maintenance))
        .with_state(state)
}
