use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 节点污点
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Taint {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub effect: String,
}

/// 设备目录中的设备记录，由外部系统维护
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: i64,
    #[serde(default)]
    pub ci_code: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub status: String,
    /// 未分配到任何集群时为空
    #[serde(default)]
    pub cluster_id: Option<i64>,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub cpu: f64,
    #[serde(default)]
    pub memory: f64,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub taints: Vec<Taint>,
}

impl Device {
    pub fn new(id: i64, cpu: f64, memory: f64) -> Self {
        Self {
            id,
            ci_code: format!("CI-{id}"),
            ip: String::new(),
            hostname: format!("node-{id}"),
            arch: "x86_64".to_string(),
            group: String::new(),
            status: "online".to_string(),
            cluster_id: None,
            cluster_name: None,
            cpu,
            memory,
            labels: HashMap::new(),
            taints: Vec::new(),
        }
    }

    pub fn is_unassigned(&self) -> bool {
        self.cluster_id.is_none()
    }

    pub fn belongs_to(&self, cluster_id: i64) -> bool {
        self.cluster_id == Some(cluster_id)
    }

    /// 按字段名读取设备属性，供查询模板的 `device` 类型条件使用
    pub fn field(&self, key: &str) -> Option<String> {
        let value = match key {
            "id" => self.id.to_string(),
            "ciCode" | "ci_code" => self.ci_code.clone(),
            "ip" => self.ip.clone(),
            "hostname" => self.hostname.clone(),
            "arch" => self.arch.clone(),
            "group" => self.group.clone(),
            "status" => self.status.clone(),
            "cluster" | "clusterName" | "cluster_name" => self.cluster_name.clone()?,
            "clusterId" | "cluster_id" => self.cluster_id?.to_string(),
            "cpu" => self.cpu.to_string(),
            "memory" => self.memory.to_string(),
            _ => return None,
        };
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

/// 分页参数，页码从1开始
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page: page.max(1),
            size: size.max(1),
        }
    }

    pub fn offset(&self) -> usize {
        ((self.page - 1) * self.size) as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DevicePage {
    pub devices: Vec<Device>,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_field_lookup() {
        let mut device = Device::new(5, 32.0, 128.0);
        device.cluster_id = Some(2);
        device.cluster_name = Some("prod-a".to_string());
        assert_eq!(device.field("hostname").as_deref(), Some("node-5"));
        assert_eq!(device.field("clusterId").as_deref(), Some("2"));
        assert_eq!(device.field("cluster").as_deref(), Some("prod-a"));
        assert_eq!(device.field("ip"), None);
        assert_eq!(device.field("unknown"), None);
    }

    #[test]
    fn test_page_request_offset() {
        assert_eq!(PageRequest::new(0, 10).offset(), 0);
        assert_eq!(PageRequest::new(3, 10).offset(), 20);
    }
}
