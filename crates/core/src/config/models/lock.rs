use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LockBackend {
    /// 多实例部署，基于Redis
    Redis,
    /// 单实例部署，进程内锁
    Local,
}

/// Distributed lock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    pub backend: LockBackend,
    pub redis_url: String,
    pub key_prefix: String,
    pub default_ttl_seconds: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            backend: LockBackend::Redis,
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "fleet_scaler".to_string(),
            default_ttl_seconds: 300,
        }
    }
}

impl LockConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backend == LockBackend::Redis
            && !self.redis_url.starts_with("redis://")
            && !self.redis_url.starts_with("rediss://")
        {
            return Err(anyhow::anyhow!("无效的Redis URL: {}", self.redis_url));
        }

        if self.default_ttl_seconds == 0 {
            return Err(anyhow::anyhow!("锁默认过期时间必须大于0"));
        }

        Ok(())
    }
}
