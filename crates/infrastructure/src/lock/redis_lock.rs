use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use scaler_core::config::LockConfig;
use scaler_core::{ScalingError, ScalingResult};
use scaler_domain::repositories::DistributedLock;
use tracing::{debug, instrument, warn};

/// 仅当值与 token 一致时删除
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// 基于 Redis `SET NX PX` 的分布式锁
pub struct RedisDistributedLock {
    connection: ConnectionManager,
    key_prefix: String,
    default_ttl_ms: AtomicU64,
    release_script: Script,
}

impl RedisDistributedLock {
    pub async fn new(config: &LockConfig) -> ScalingResult<Self> {
        let client = Client::open(config.redis_url.as_str())
            .map_err(|e| ScalingError::Lock(format!("创建Redis客户端失败: {e}")))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| ScalingError::Lock(format!("连接Redis失败: {e}")))?;

        debug!("Redis分布式锁已连接: {}", config.redis_url);
        Ok(Self {
            connection,
            key_prefix: config.key_prefix.clone(),
            default_ttl_ms: AtomicU64::new(config.default_ttl_seconds.saturating_mul(1000)),
            release_script: Script::new(RELEASE_SCRIPT),
        })
    }

    fn full_key(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.key_prefix, key)
        }
    }

    fn effective_ttl(&self, ttl: Duration) -> u64 {
        if ttl.is_zero() {
            self.default_ttl_ms.load(Ordering::Relaxed)
        } else {
            ttl.as_millis().min(u128::from(u64::MAX)) as u64
        }
    }
}

#[async_trait]
impl DistributedLock for RedisDistributedLock {
    #[instrument(skip(self, token))]
    async fn acquire(&self, key: &str, token: &str, ttl: Duration) -> ScalingResult<bool> {
        let mut conn = self.connection.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.full_key(key))
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(self.effective_ttl(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| ScalingError::Lock(format!("获取锁 {key} 失败: {e}")))?;

        Ok(reply.is_some())
    }

    async fn release(&self, key: &str, token: &str) -> ScalingResult<bool> {
        let mut conn = self.connection.clone();
        let deleted: i64 = self
            .release_script
            .key(self.full_key(key))
            .arg(token)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| ScalingError::Lock(format!("释放锁 {key} 失败: {e}")))?;

        if deleted == 0 {
            warn!("锁 {} 已过期或被其他实例持有，跳过释放", key);
        }
        Ok(deleted > 0)
    }

    async fn delete(&self, key: &str) -> ScalingResult<()> {
        let mut conn = self.connection.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(self.full_key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| ScalingError::Lock(format!("删除锁 {key} 失败: {e}")))?;
        Ok(())
    }

    fn set_default_expiration(&self, ttl: Duration) {
        let millis = ttl.as_millis().min(u128::from(u64::MAX)) as u64;
        self.default_ttl_ms.store(millis, Ordering::Relaxed);
    }

    fn default_expiration(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms.load(Ordering::Relaxed))
    }
}
