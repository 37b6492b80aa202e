use serde::Serialize;

use crate::entities::{Metric, ResourceSnapshot, Strategy, TriggerAction};

/// 需要伸缩的容量，入池为正，出池为负
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CapacityDelta {
    pub cpu: f64,
    pub memory: f64,
}

impl CapacityDelta {
    pub fn new(cpu: f64, memory: f64) -> Self {
        Self { cpu, memory }
    }

    pub fn is_effective(&self) -> bool {
        self.cpu.abs() > f64::EPSILON || self.memory.abs() > f64::EPSILON
    }

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cpu => self.cpu,
            Metric::Memory => self.memory,
        }
    }
}

/// 根据目标比例计算伸缩容量
pub struct CapacityPlanner;

impl CapacityPlanner {
    /// 使伸缩后比例达到目标值所需的容量变化
    ///
    /// 未设置目标值的指标贡献 0；全部为 0 时返回 `None`，调用方按固定数量伸缩。
    pub fn demand(strategy: &Strategy, latest: &ResourceSnapshot) -> Option<CapacityDelta> {
        if !strategy.has_target_value() {
            return None;
        }

        let delta = CapacityDelta {
            cpu: Self::metric_demand(strategy, latest, Metric::Cpu),
            memory: Self::metric_demand(strategy, latest, Metric::Memory),
        };

        delta.is_effective().then_some(delta)
    }

    fn metric_demand(strategy: &Strategy, latest: &ResourceSnapshot, metric: Metric) -> f64 {
        let Some(threshold) = strategy.threshold(metric) else {
            return 0.0;
        };
        let Some(target) = threshold.target_value.filter(|t| *t > 0.0) else {
            return 0.0;
        };

        let capacity = latest.capacity(metric);
        if capacity <= 0.0 {
            return 0.0;
        }

        // 负载不变时 ratio * C = target * (C + delta)
        let ratio = latest.metric_value(metric, threshold.threshold_type);
        let delta = capacity * (ratio / target - 1.0);

        match strategy.trigger_action {
            TriggerAction::PoolEntry => delta.max(0.0),
            TriggerAction::PoolExit => delta.min(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{MetricThreshold, ThresholdType};
    use chrono::Utc;

    fn snapshot() -> ResourceSnapshot {
        ResourceSnapshot {
            id: 1,
            cluster_id: 1,
            resource_type: "total".to_string(),
            cpu_capacity: 100.0,
            cpu_request: 90.0,
            max_cpu_usage_ratio: 30.0,
            memory_capacity: 400.0,
            memory_request: 100.0,
            max_memory_usage_ratio: 20.0,
            created_at: Utc::now(),
        }
    }

    fn threshold(value: f64, target: Option<f64>) -> Option<MetricThreshold> {
        Some(MetricThreshold {
            value,
            threshold_type: ThresholdType::Allocated,
            target_value: target,
        })
    }

    #[test]
    fn test_entry_demand_from_allocation() {
        let mut strategy = Strategy::new("s".to_string(), TriggerAction::PoolEntry, vec![1]);
        strategy.cpu = threshold(80.0, Some(60.0));
        let delta = CapacityPlanner::demand(&strategy, &snapshot()).unwrap();
        // 90 / (100 + 50) = 60%
        assert!((delta.cpu - 50.0).abs() < 1e-9);
        assert_eq!(delta.memory, 0.0);
    }

    #[test]
    fn test_exit_demand_is_negative() {
        let mut strategy = Strategy::new("s".to_string(), TriggerAction::PoolExit, vec![1]);
        strategy.memory = threshold(30.0, Some(50.0));
        let delta = CapacityPlanner::demand(&strategy, &snapshot()).unwrap();
        // 100 / (400 - 200) = 50%
        assert!((delta.memory + 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_target_falls_back() {
        let mut strategy = Strategy::new("s".to_string(), TriggerAction::PoolEntry, vec![1]);
        strategy.cpu = threshold(80.0, None);
        assert_eq!(CapacityPlanner::demand(&strategy, &snapshot()), None);
    }

    #[test]
    fn test_target_already_met_falls_back() {
        let mut strategy = Strategy::new("s".to_string(), TriggerAction::PoolEntry, vec![1]);
        strategy.memory = threshold(80.0, Some(50.0));
        // 内存分配率 25% 已低于目标
        assert_eq!(CapacityPlanner::demand(&strategy, &snapshot()), None);
    }
}
