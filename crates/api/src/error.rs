use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scaler_core::ScalingError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("伸缩服务错误: {0}")]
    Scaling(#[from] ScalingError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("未找到资源")]
    NotFound,

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

impl ApiError {
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Scaling(err) => match err {
                ScalingError::StrategyNotFound { .. } => (StatusCode::NOT_FOUND, "STRATEGY_NOT_FOUND"),
                ScalingError::OrderNotFound { .. } => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"),
                ScalingError::TicketNotFound { .. } => (StatusCode::NOT_FOUND, "TICKET_NOT_FOUND"),
                ScalingError::DeviceNotFound { .. } => (StatusCode::NOT_FOUND, "DEVICE_NOT_FOUND"),
                ScalingError::InvalidStrategy(_) => (StatusCode::BAD_REQUEST, "INVALID_STRATEGY"),
                ScalingError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
                ScalingError::InvalidStatusTransition { .. } => {
                    (StatusCode::CONFLICT, "INVALID_STATUS_TRANSITION")
                }
                err if err.is_configuration_error() => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "CONFIGURATION_ERROR")
                }
                ScalingError::DeviceQuery(_) | ScalingError::Network(_) => {
                    (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR")
                }
                ScalingError::Lock(_) => (StatusCode::SERVICE_UNAVAILABLE, "LOCK_UNAVAILABLE"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// 500 类错误不向调用方暴露内部细节
    fn public_message(&self, status: StatusCode) -> String {
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            return "系统内部错误，请稍后重试".to_string();
        }
        match self {
            ApiError::Scaling(err) => err.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.classify();
        if status.is_server_error() {
            tracing::error!(error = %self, "请求处理失败");
        } else {
            tracing::debug!(error = %self, "请求被拒绝");
        }

        let body = Json(json!({
            "success": false,
            "error": {
                "message": self.public_message(status),
                "type": error_type,
                "code": status.as_u16(),
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ScalingError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_not_found_errors_map_to_404() {
        assert_eq!(status_of(ScalingError::StrategyNotFound { id: 1 }), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ScalingError::OrderNotFound { id: 1 }), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ScalingError::TicketNotFound {
                ticket_id: "OPS-1".to_string()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_client_errors() {
        assert_eq!(
            status_of(ScalingError::InvalidStrategy("name".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ScalingError::InvalidStatusTransition {
                from: "completed".to_string(),
                to: "processing".to_string(),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ScalingError::QueryTemplateNotFound { id: 9 }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::BadRequest("limit".to_string()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_server_errors() {
        assert_eq!(
            status_of(ScalingError::DeviceQuery("timeout".to_string())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(ScalingError::DatabaseOperation("locked".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = ApiError::Internal("连接串 postgres://secret".to_string());
        assert_eq!(
            err.public_message(StatusCode::INTERNAL_SERVER_ERROR),
            "系统内部错误，请稍后重试"
        );
        let err = ApiError::from(ScalingError::OrderNotFound { id: 5 });
        assert_eq!(err.public_message(StatusCode::NOT_FOUND), "订单未找到: 5");
    }
}
