//! 仓储操作的错误上下文
//!
//! 把 sqlx 错误转换为带实体描述的 `ScalingError`，并统一记录日志。

use std::fmt;

use chrono::{DateTime, Utc};
use scaler_core::ScalingError;
use sqlx::Error as SqlxError;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy)]
pub enum RepositoryOperation {
    Create,
    Read,
    Update,
    Query,
    Migrate,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Create => write!(f, "创建"),
            RepositoryOperation::Read => write!(f, "查询"),
            RepositoryOperation::Update => write!(f, "更新"),
            RepositoryOperation::Query => write!(f, "检索"),
            RepositoryOperation::Migrate => write!(f, "初始化"),
        }
    }
}

/// 仓储操作上下文
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub operation: RepositoryOperation,
    pub entity: &'static str,
    pub entity_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub additional_info: Option<String>,
}

impl OperationContext {
    pub fn new(operation: RepositoryOperation, entity: &'static str) -> Self {
        Self {
            operation,
            entity,
            entity_id: None,
            timestamp: Utc::now(),
            additional_info: None,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.entity_id = Some(id);
        self
    }

    pub fn with_additional_info(mut self, info: String) -> Self {
        self.additional_info = Some(info);
        self
    }

    pub fn entity_description(&self) -> String {
        match self.entity_id {
            Some(id) => format!("{} (ID: {})", self.entity, id),
            None => self.entity.to_string(),
        }
    }
}

#[macro_export]
macro_rules! op_context {
    ($operation:expr, $entity:expr) => {
        $crate::error_handling::OperationContext::new($operation, $entity)
    };
    ($operation:expr, $entity:expr, id = $id:expr) => {
        $crate::error_handling::OperationContext::new($operation, $entity).with_id($id)
    };
}

pub struct RepositoryErrorHelpers;

impl RepositoryErrorHelpers {
    pub fn database_error(context: &OperationContext, error: SqlxError) -> ScalingError {
        let entity_desc = context.entity_description();
        let operation_desc = context.operation.to_string();

        let error_msg = match &error {
            SqlxError::Database(db_error) => match db_error.constraint() {
                Some(constraint) => format!(
                    "{}{}时发生数据库约束冲突: {}",
                    operation_desc, entity_desc, constraint
                ),
                None if db_error.is_unique_violation() => format!(
                    "{}{}时发生唯一约束冲突: {}",
                    operation_desc, entity_desc, db_error
                ),
                None => format!("{}{}时发生数据库错误: {}", operation_desc, entity_desc, db_error),
            },
            SqlxError::PoolClosed => format!("{}{}时数据库连接池已关闭", operation_desc, entity_desc),
            SqlxError::PoolTimedOut => format!("{}{}时数据库连接池超时", operation_desc, entity_desc),
            SqlxError::RowNotFound => format!("{}{}时记录不存在", operation_desc, entity_desc),
            _ => format!("{}{}时发生数据库错误: {}", operation_desc, entity_desc, error),
        };

        error!(
            error = %error,
            operation = %context.operation,
            entity = context.entity,
            entity_id = ?context.entity_id,
            additional_info = ?context.additional_info,
            "{}",
            error_msg
        );

        ScalingError::DatabaseOperation(error_msg)
    }

    pub fn log_operation_success(context: &OperationContext, details: Option<&str>) {
        debug!(
            operation = %context.operation,
            entity = context.entity,
            entity_id = ?context.entity_id,
            details = ?details,
            "{}{}成功",
            context.operation,
            context.entity_description()
        );
    }
}
