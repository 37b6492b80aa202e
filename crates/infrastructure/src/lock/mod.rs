//! 分布式锁实现与锁键约定

pub mod guard;
pub mod local_lock;
pub mod redis_lock;

use std::sync::Arc;
use std::time::Duration;

use scaler_core::config::{LockBackend, LockConfig};
use scaler_core::ScalingResult;
use scaler_domain::repositories::DistributedLock;
use tracing::info;

pub use guard::{generate_lock_token, LockGuard};
pub use local_lock::LocalDistributedLock;
pub use redis_lock::RedisDistributedLock;

const LOCK_NAMESPACE: &str = "elastic_scaling";

/// 全局评估轮次锁
pub fn sweep_lock_key() -> String {
    format!("{LOCK_NAMESPACE}:sweep")
}

/// 单个策略的评估锁
pub fn strategy_lock_key(strategy_id: i64) -> String {
    format!("{LOCK_NAMESPACE}:strategy:{strategy_id}")
}

/// 按配置构造锁后端
pub async fn build_lock(config: &LockConfig) -> ScalingResult<Arc<dyn DistributedLock>> {
    let default_ttl = Duration::from_secs(config.default_ttl_seconds);
    match config.backend {
        LockBackend::Redis => {
            let lock = RedisDistributedLock::new(config).await?;
            info!("使用Redis分布式锁: {}", config.redis_url);
            Ok(Arc::new(lock))
        }
        LockBackend::Local => {
            info!("使用进程内锁，仅适用于单实例部署");
            Ok(Arc::new(LocalDistributedLock::new(default_ttl)))
        }
    }
}
