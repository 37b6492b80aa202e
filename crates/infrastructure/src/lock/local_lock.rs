use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use scaler_core::ScalingResult;
use scaler_domain::repositories::DistributedLock;

struct Holder {
    token: String,
    expires_at: Instant,
}

/// 进程内锁，用于单实例部署
pub struct LocalDistributedLock {
    holders: Mutex<HashMap<String, Holder>>,
    default_ttl: Mutex<Duration>,
}

impl LocalDistributedLock {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            holders: Mutex::new(HashMap::new()),
            default_ttl: Mutex::new(default_ttl),
        }
    }

    fn holders(&self) -> MutexGuard<'_, HashMap<String, Holder>> {
        self.holders.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for LocalDistributedLock {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[async_trait]
impl DistributedLock for LocalDistributedLock {
    async fn acquire(&self, key: &str, token: &str, ttl: Duration) -> ScalingResult<bool> {
        let ttl = if ttl.is_zero() {
            self.default_expiration()
        } else {
            ttl
        };

        let now = Instant::now();
        let mut holders = self.holders();
        if holders.get(key).is_some_and(|h| h.expires_at > now) {
            return Ok(false);
        }

        holders.insert(
            key.to_string(),
            Holder {
                token: token.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str, token: &str) -> ScalingResult<bool> {
        let mut holders = self.holders();
        match holders.get(key) {
            Some(holder) if holder.token == token => {
                holders.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> ScalingResult<()> {
        self.holders().remove(key);
        Ok(())
    }

    fn set_default_expiration(&self, ttl: Duration) {
        *self.default_ttl.lock().unwrap_or_else(|e| e.into_inner()) = ttl;
    }

    fn default_expiration(&self) -> Duration {
        *self.default_ttl.lock().unwrap_or_else(|e| e.into_inner())
    }
}
