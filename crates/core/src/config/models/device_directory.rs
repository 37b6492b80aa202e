use serde::{Deserialize, Serialize};

/// 设备目录服务（运维门户设备查询接口）配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDirectoryConfig {
    pub base_url: String,
    pub request_timeout_seconds: u64,
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for DeviceDirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_seconds: 30,
            api_token: None,
        }
    }
}

impl DeviceDirectoryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(anyhow::anyhow!("设备目录地址必须是HTTP(S) URL: {}", self.base_url));
        }

        if self.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("设备目录请求超时时间必须大于0"));
        }

        Ok(())
    }
}
