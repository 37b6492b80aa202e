//! 弹性伸缩服务 HTTP 管理接口
//!
//! 基于 axum 提供策略配置、订单状态回写与设备维护流程的 REST 接口。
//! 所有成功响应使用 [`response::ApiResponse`] 包装，错误统一由 [`error::ApiError`] 转换。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use axum::Router;
use scaler_core::config::ApiConfig;

pub use error::{ApiError, ApiResult};
pub use response::ApiResponse;
pub use routes::{create_routes, AppState};

/// 创建带请求日志、追踪中间件的完整应用，按配置启用 CORS
pub fn create_app(state: AppState, config: &ApiConfig) -> Router {
    let app = create_routes(state)
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(middleware::trace_layer());

    if config.cors_enabled {
        app.layer(middleware::cors_layer(&config.cors_origins))
    } else {
        app
    }
}
