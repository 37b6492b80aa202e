use std::sync::Arc;
use std::time::Duration;

use scaler_core::ScalingResult;
use scaler_domain::repositories::DistributedLock;
use tracing::warn;
use uuid::Uuid;

/// 锁 token：`{hostname}:{uuid}`
pub fn generate_lock_token() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());
    format!("{}:{}", host, Uuid::new_v4())
}

/// 已持有的锁，离开作用域前应调用 `release`
pub struct LockGuard {
    lock: Arc<dyn DistributedLock>,
    key: String,
    token: String,
    released: bool,
}

impl LockGuard {
    /// 单次尝试获取，已被占用时返回 `None`
    pub async fn try_acquire(
        lock: Arc<dyn DistributedLock>,
        key: impl Into<String>,
        ttl: Duration,
    ) -> ScalingResult<Option<Self>> {
        let key = key.into();
        let token = generate_lock_token();

        if !lock.acquire(&key, &token, ttl).await? {
            return Ok(None);
        }

        Ok(Some(Self {
            lock,
            key,
            token,
            released: false,
        }))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub async fn release(mut self) -> ScalingResult<bool> {
        self.released = true;
        self.lock.release(&self.key, &self.token).await
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let lock = Arc::clone(&self.lock);
        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = lock.release(&key, &token).await {
                        warn!("后台释放锁 {} 失败: {}", key, e);
                    }
                });
            }
            Err(_) => warn!("锁 {} 未释放且不在运行时中，等待TTL过期", key),
        }
    }
}
