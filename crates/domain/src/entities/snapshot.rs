use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::strategy::ThresholdType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cpu,
    Memory,
}

impl Metric {
    pub fn display_name(&self) -> &'static str {
        match self {
            Metric::Cpu => "CPU",
            Metric::Memory => "内存",
        }
    }
}

/// 集群资源池的容量快照，由外部采集任务写入，只读
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceSnapshot {
    pub id: i64,
    pub cluster_id: i64,
    pub resource_type: String,
    pub cpu_capacity: f64,
    pub cpu_request: f64,
    /// 百分比
    pub max_cpu_usage_ratio: f64,
    pub memory_capacity: f64,
    pub memory_request: f64,
    /// 百分比
    pub max_memory_usage_ratio: f64,
    pub created_at: DateTime<Utc>,
}

impl ResourceSnapshot {
    pub fn capacity(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cpu => self.cpu_capacity,
            Metric::Memory => self.memory_capacity,
        }
    }

    /// 分配率百分比，容量为0时视为0%
    pub fn allocation_ratio(&self, metric: Metric) -> f64 {
        let (request, capacity) = match metric {
            Metric::Cpu => (self.cpu_request, self.cpu_capacity),
            Metric::Memory => (self.memory_request, self.memory_capacity),
        };
        if capacity <= 0.0 {
            0.0
        } else {
            request / capacity * 100.0
        }
    }

    pub fn usage_ratio(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cpu => self.max_cpu_usage_ratio,
            Metric::Memory => self.max_memory_usage_ratio,
        }
    }

    pub fn metric_value(&self, metric: Metric, threshold_type: ThresholdType) -> f64 {
        match threshold_type {
            ThresholdType::Usage => self.usage_ratio(metric),
            ThresholdType::Allocated => self.allocation_ratio(metric),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(cpu_capacity: f64, cpu_request: f64) -> ResourceSnapshot {
        ResourceSnapshot {
            id: 1,
            cluster_id: 1,
            resource_type: "total".to_string(),
            cpu_capacity,
            cpu_request,
            max_cpu_usage_ratio: 42.5,
            memory_capacity: 1024.0,
            memory_request: 256.0,
            max_memory_usage_ratio: 10.0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_allocation_ratio() {
        let s = snapshot(200.0, 150.0);
        assert_eq!(s.allocation_ratio(Metric::Cpu), 75.0);
        assert_eq!(s.allocation_ratio(Metric::Memory), 25.0);
    }

    #[test]
    fn test_zero_capacity_is_zero_percent() {
        let s = snapshot(0.0, 150.0);
        assert_eq!(s.metric_value(Metric::Cpu, ThresholdType::Allocated), 0.0);
    }

    #[test]
    fn test_usage_reads_snapshot_ratio() {
        let s = snapshot(200.0, 150.0);
        assert_eq!(s.metric_value(Metric::Cpu, ThresholdType::Usage), 42.5);
    }
}
