//! 测试数据构建器，提供合理默认值并支持按需覆盖

use chrono::{DateTime, Duration, Utc};
use scaler_domain::entities::{
    ConditionLogic, Device, FilterBlock, FilterGroup, MetricThreshold, QueryTemplate,
    ResourceSnapshot, Strategy, StrategyStatus, Taint, ThresholdType, TriggerAction,
};

/// Strategy 构建器，默认是 CPU 使用率 > 80% 持续1天的入池策略
pub struct StrategyBuilder {
    strategy: Strategy,
}

impl StrategyBuilder {
    pub fn new() -> Self {
        let mut strategy = Strategy::new("test_strategy".to_string(), TriggerAction::PoolEntry, vec![1]);
        strategy.id = 1;
        strategy.cpu = Some(MetricThreshold {
            value: 80.0,
            threshold_type: ThresholdType::Usage,
            target_value: None,
        });
        strategy.cooldown_minutes = 10;
        strategy.entry_query_template_id = Some(1);
        strategy.exit_query_template_id = Some(2);
        Self { strategy }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.strategy.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.strategy.name = name.to_string();
        self
    }

    pub fn pool_exit(mut self) -> Self {
        self.strategy.trigger_action = TriggerAction::PoolExit;
        self
    }

    pub fn with_cpu(mut self, value: f64, threshold_type: ThresholdType) -> Self {
        self.strategy.cpu = Some(MetricThreshold {
            value,
            threshold_type,
            target_value: None,
        });
        self
    }

    pub fn with_memory(mut self, value: f64, threshold_type: ThresholdType) -> Self {
        self.strategy.memory = Some(MetricThreshold {
            value,
            threshold_type,
            target_value: None,
        });
        self
    }

    pub fn without_cpu(mut self) -> Self {
        self.strategy.cpu = None;
        self
    }

    pub fn with_cpu_target(mut self, target: f64) -> Self {
        if let Some(cpu) = self.strategy.cpu.as_mut() {
            cpu.target_value = Some(target);
        }
        self
    }

    pub fn with_memory_target(mut self, target: f64) -> Self {
        if let Some(memory) = self.strategy.memory.as_mut() {
            memory.target_value = Some(target);
        }
        self
    }

    pub fn with_condition_logic(mut self, logic: ConditionLogic) -> Self {
        self.strategy.condition_logic = logic;
        self
    }

    pub fn with_resource_types(mut self, resource_types: &str) -> Self {
        self.strategy.resource_types = resource_types.to_string();
        self
    }

    pub fn with_device_count(mut self, device_count: i32) -> Self {
        self.strategy.device_count = device_count;
        self
    }

    pub fn with_required_days(mut self, days: i64) -> Self {
        self.strategy.duration_minutes = days * 24 * 60;
        self
    }

    pub fn with_cooldown_minutes(mut self, minutes: i64) -> Self {
        self.strategy.cooldown_minutes = minutes;
        self
    }

    pub fn with_clusters(mut self, cluster_ids: Vec<i64>) -> Self {
        self.strategy.cluster_ids = cluster_ids;
        self
    }

    pub fn with_query_templates(mut self, entry: Option<i64>, exit: Option<i64>) -> Self {
        self.strategy.entry_query_template_id = entry;
        self.strategy.exit_query_template_id = exit;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.strategy.status = StrategyStatus::Disabled;
        self
    }

    pub fn build(self) -> Strategy {
        self.strategy
    }
}

impl Default for StrategyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// ResourceSnapshot 构建器
pub struct SnapshotBuilder {
    snapshot: ResourceSnapshot,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self {
            snapshot: ResourceSnapshot {
                id: 0,
                cluster_id: 1,
                resource_type: "total".to_string(),
                cpu_capacity: 100.0,
                cpu_request: 50.0,
                max_cpu_usage_ratio: 50.0,
                memory_capacity: 1024.0,
                memory_request: 512.0,
                max_memory_usage_ratio: 50.0,
                created_at: Utc::now(),
            },
        }
    }

    pub fn with_cluster(mut self, cluster_id: i64) -> Self {
        self.snapshot.cluster_id = cluster_id;
        self
    }

    pub fn with_resource_type(mut self, resource_type: &str) -> Self {
        self.snapshot.resource_type = resource_type.to_string();
        self
    }

    pub fn with_cpu(mut self, capacity: f64, request: f64, max_usage_ratio: f64) -> Self {
        self.snapshot.cpu_capacity = capacity;
        self.snapshot.cpu_request = request;
        self.snapshot.max_cpu_usage_ratio = max_usage_ratio;
        self
    }

    pub fn with_memory(mut self, capacity: f64, request: f64, max_usage_ratio: f64) -> Self {
        self.snapshot.memory_capacity = capacity;
        self.snapshot.memory_request = request;
        self.snapshot.max_memory_usage_ratio = max_usage_ratio;
        self
    }

    pub fn with_cpu_usage(mut self, ratio: f64) -> Self {
        self.snapshot.max_cpu_usage_ratio = ratio;
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.snapshot.created_at = created_at;
        self
    }

    pub fn days_ago(self, days: i64) -> Self {
        self.at(Utc::now() - Duration::days(days))
    }

    pub fn build(self) -> ResourceSnapshot {
        self.snapshot
    }

    /// 从 `days - 1` 天前到今天，每天一条快照
    pub fn daily_series(cluster_id: i64, cpu_usages: &[f64]) -> Vec<ResourceSnapshot> {
        let days = cpu_usages.len() as i64;
        cpu_usages
            .iter()
            .enumerate()
            .map(|(i, usage)| {
                SnapshotBuilder::new()
                    .with_cluster(cluster_id)
                    .with_cpu_usage(*usage)
                    .days_ago(days - 1 - i as i64)
                    .build()
            })
            .collect()
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Device 构建器
pub struct DeviceBuilder {
    device: Device,
}

impl DeviceBuilder {
    pub fn new(id: i64) -> Self {
        Self {
            device: Device::new(id, 32.0, 128.0),
        }
    }

    pub fn with_capacity(mut self, cpu: f64, memory: f64) -> Self {
        self.device.cpu = cpu;
        self.device.memory = memory;
        self
    }

    pub fn in_cluster(mut self, cluster_id: i64) -> Self {
        self.device.cluster_id = Some(cluster_id);
        self.device.cluster_name = Some(format!("cluster-{cluster_id}"));
        self
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.device.group = group.to_string();
        self
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.device.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_taint(mut self, key: &str, value: &str, effect: &str) -> Self {
        self.device.taints.push(Taint {
            key: key.to_string(),
            value: value.to_string(),
            effect: effect.to_string(),
        });
        self
    }

    pub fn build(self) -> Device {
        self.device
    }
}

/// QueryTemplate 构建器，默认不带任何条件（匹配全部设备）
pub struct QueryTemplateBuilder {
    template: QueryTemplate,
}

impl QueryTemplateBuilder {
    pub fn new(id: i64) -> Self {
        let now = Utc::now();
        Self {
            template: QueryTemplate {
                id,
                name: format!("template-{id}"),
                groups: "[]".to_string(),
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_groups(mut self, groups: &[FilterGroup]) -> Self {
        self.template.groups = serde_json::to_string(groups).unwrap_or_else(|_| "[]".to_string());
        self
    }

    pub fn with_blocks(self, blocks: Vec<FilterBlock>) -> Self {
        self.with_groups(&[FilterGroup {
            blocks,
            operator: Default::default(),
        }])
    }

    pub fn with_raw_groups(mut self, raw: &str) -> Self {
        self.template.groups = raw.to_string();
        self
    }

    pub fn build(self) -> QueryTemplate {
        self.template
    }
}
