use thiserror::Error;

/// 弹性伸缩错误类型定义
#[derive(Debug, Error)]
pub enum ScalingError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),

    #[error("策略未找到: {id}")]
    StrategyNotFound { id: i64 },

    #[error("订单未找到: {id}")]
    OrderNotFound { id: i64 },

    #[error("外部工单对应的订单未找到: {ticket_id}")]
    TicketNotFound { ticket_id: String },

    #[error("设备未找到: {id}")]
    DeviceNotFound { id: i64 },

    #[error("策略未配置{action}动作的设备查询模板")]
    MissingQueryTemplate { action: String },

    #[error("设备查询模板未找到: {id}")]
    QueryTemplateNotFound { id: i64 },

    #[error("设备查询模板 {id} 内容无法解析: {message}")]
    InvalidQueryTemplate { id: i64, message: String },

    #[error("设备目录查询失败: {0}")]
    DeviceQuery(String),

    #[error("分布式锁错误: {0}")]
    Lock(String),

    #[error("无效的策略配置: {0}")]
    InvalidStrategy(String),

    #[error("订单状态不允许从 {from} 变更为 {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("无效的请求: {0}")]
    InvalidRequest(String),

    #[error("订单创建失败: {0}")]
    OrderCreation(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl ScalingError {
    /// 设备查询模板相关的配置类错误
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ScalingError::MissingQueryTemplate { .. }
                | ScalingError::QueryTemplateNotFound { .. }
                | ScalingError::InvalidQueryTemplate { .. }
                | ScalingError::InvalidStrategy(_)
                | ScalingError::Configuration(_)
        )
    }

    pub fn is_database_error(&self) -> bool {
        matches!(
            self,
            ScalingError::Database(_) | ScalingError::DatabaseOperation(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ScalingError::StrategyNotFound { .. }
                | ScalingError::OrderNotFound { .. }
                | ScalingError::TicketNotFound { .. }
                | ScalingError::DeviceNotFound { .. }
        )
    }
}

impl From<serde_json::Error> for ScalingError {
    fn from(err: serde_json::Error) -> Self {
        ScalingError::Serialization(err.to_string())
    }
}
