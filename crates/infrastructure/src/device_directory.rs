//! 运维门户设备目录的HTTP客户端
//!
//! - `POST {base}/api/v1/devices/query` 按过滤组分页查询
//! - `GET {base}/api/v1/devices/{id}` 查询单台设备，404 视为不存在

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use scaler_core::config::DeviceDirectoryConfig;
use scaler_core::{ScalingError, ScalingResult};
use scaler_domain::entities::{Device, DevicePage, FilterGroup, PageRequest};
use scaler_domain::repositories::DeviceDirectory;
use serde::Serialize;
use tracing::{debug, error, instrument};

#[derive(Debug, Serialize)]
struct DeviceQueryRequest<'a> {
    groups: &'a [FilterGroup],
    page: u32,
    size: u32,
}

pub struct HttpDeviceDirectory {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpDeviceDirectory {
    pub fn new(config: &DeviceDirectoryConfig) -> ScalingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| ScalingError::Configuration(format!("创建设备目录HTTP客户端失败: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl DeviceDirectory for HttpDeviceDirectory {
    #[instrument(skip(self, groups), fields(groups = groups.len(), page = page.page, size = page.size))]
    async fn query(&self, groups: &[FilterGroup], page: PageRequest) -> ScalingResult<DevicePage> {
        let url = format!("{}/api/v1/devices/query", self.base_url);
        let body = DeviceQueryRequest {
            groups,
            page: page.page,
            size: page.size,
        };

        let response = self
            .authorize(self.client.post(&url).json(&body))
            .send()
            .await
            .map_err(|e| ScalingError::DeviceQuery(format!("请求设备目录失败: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, body = %text, "设备目录查询返回错误");
            return Err(ScalingError::DeviceQuery(format!(
                "设备目录返回 {status}: {text}"
            )));
        }

        let result: DevicePage = response
            .json()
            .await
            .map_err(|e| ScalingError::DeviceQuery(format!("解析设备目录响应失败: {e}")))?;
        debug!(
            returned = result.devices.len(),
            total = result.total,
            "设备目录查询完成"
        );
        Ok(result)
    }

    async fn get_device(&self, id: i64) -> ScalingResult<Option<Device>> {
        let url = format!("{}/api/v1/devices/{}", self.base_url, id);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| ScalingError::DeviceQuery(format!("请求设备目录失败: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ScalingError::DeviceQuery(format!(
                "查询设备 {id} 返回 {status}: {text}"
            )));
        }

        let device: Device = response
            .json()
            .await
            .map_err(|e| ScalingError::DeviceQuery(format!("解析设备 {id} 失败: {e}")))?;
        Ok(Some(device))
    }
}
