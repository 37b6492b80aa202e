use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use scaler_core::{ScalingError, ScalingResult};

use super::snapshot::Metric;

/// 未配置资源类型时评估的默认资源池
pub const DEFAULT_RESOURCE_TYPE: &str = "total";

const MINUTES_PER_DAY: i64 = 24 * 60;

/// 持续时长上限：一年
pub const MAX_DURATION_MINUTES: i64 = 365 * MINUTES_PER_DAY;
/// 冷却时间上限：一年
pub const MAX_COOLDOWN_MINUTES: i64 = 365 * MINUTES_PER_DAY;

/// 策略触发动作：入池（扩容）或出池（缩容）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TriggerAction {
    PoolEntry,
    PoolExit,
}

text_enum!(TriggerAction {
    PoolEntry => "pool_entry",
    PoolExit => "pool_exit",
});

impl TriggerAction {
    pub fn display_name(&self) -> &'static str {
        match self {
            TriggerAction::PoolEntry => "入池",
            TriggerAction::PoolExit => "出池",
        }
    }

    /// 阈值比较方向：入池要求实际值高于阈值，出池要求低于阈值
    pub fn is_breached(&self, actual: f64, threshold: f64) -> bool {
        match self {
            TriggerAction::PoolEntry => actual > threshold,
            TriggerAction::PoolExit => actual < threshold,
        }
    }

    fn comparison_symbol(&self) -> &'static str {
        match self {
            TriggerAction::PoolEntry => ">",
            TriggerAction::PoolExit => "<",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdType {
    /// 快照中的最大使用率
    Usage,
    /// 申请量 / 容量
    Allocated,
}

text_enum!(ThresholdType {
    Usage => "usage",
    Allocated => "allocated",
});

impl ThresholdType {
    pub fn display_name(&self) -> &'static str {
        match self {
            ThresholdType::Usage => "使用率",
            ThresholdType::Allocated => "分配率",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConditionLogic {
    #[default]
    And,
    Or,
}

text_enum!(ConditionLogic {
    And => "AND",
    Or => "OR",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyStatus {
    Enabled,
    Disabled,
}

text_enum!(StrategyStatus {
    Enabled => "enabled",
    Disabled => "disabled",
});

/// 单个指标（CPU或内存）的阈值配置
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MetricThreshold {
    pub value: f64,
    pub threshold_type: ThresholdType,
    /// 伸缩后期望达到的比例，未设置时按固定设备数量伸缩
    #[serde(default)]
    pub target_value: Option<f64>,
}

/// 弹性伸缩策略
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub trigger_action: TriggerAction,
    #[serde(default)]
    pub cpu: Option<MetricThreshold>,
    #[serde(default)]
    pub memory: Option<MetricThreshold>,
    #[serde(default)]
    pub condition_logic: ConditionLogic,
    /// 逗号分隔的资源池类型列表
    #[serde(default)]
    pub resource_types: String,
    #[serde(default)]
    pub device_count: i32,
    /// 持续时长，以分钟存储，评估时换算为天数
    pub duration_minutes: i64,
    pub cooldown_minutes: i64,
    pub status: StrategyStatus,
    pub cluster_ids: Vec<i64>,
    #[serde(default)]
    pub entry_query_template_id: Option<i64>,
    #[serde(default)]
    pub exit_query_template_id: Option<i64>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Strategy {
    pub fn new(name: String, trigger_action: TriggerAction, cluster_ids: Vec<i64>) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // 将由数据库生成
            name,
            description: None,
            trigger_action,
            cpu: None,
            memory: None,
            condition_logic: ConditionLogic::And,
            resource_types: DEFAULT_RESOURCE_TYPE.to_string(),
            device_count: 1,
            duration_minutes: MINUTES_PER_DAY,
            cooldown_minutes: 60,
            status: StrategyStatus::Enabled,
            cluster_ids,
            entry_query_template_id: None,
            exit_query_template_id: None,
            created_by: "system".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.status, StrategyStatus::Enabled)
    }

    pub fn threshold(&self, metric: Metric) -> Option<&MetricThreshold> {
        match metric {
            Metric::Cpu => self.cpu.as_ref(),
            Metric::Memory => self.memory.as_ref(),
        }
    }

    /// 需要持续满足条件的天数
    ///
    /// 字段按分钟存储但按天解释，不足一天按一天计算。
    pub fn required_days(&self) -> u32 {
        let days = (self.duration_minutes / MINUTES_PER_DAY).max(1);
        u32::try_from(days).unwrap_or(u32::MAX)
    }

    /// 冷却时长，超出上限的存量数据按上限处理
    pub fn cooldown(&self) -> Duration {
        Duration::minutes(self.cooldown_minutes.clamp(0, MAX_COOLDOWN_MINUTES))
    }

    /// 解析资源池类型列表，为空时返回默认的 `total`
    pub fn resource_type_list(&self) -> Vec<String> {
        let types: Vec<String> = self
            .resource_types
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        if types.is_empty() {
            vec![DEFAULT_RESOURCE_TYPE.to_string()]
        } else {
            types
        }
    }

    pub fn query_template_id(&self, action: TriggerAction) -> Option<i64> {
        let id = match action {
            TriggerAction::PoolEntry => self.entry_query_template_id,
            TriggerAction::PoolExit => self.exit_query_template_id,
        };
        id.filter(|id| *id > 0)
    }

    /// 固定数量模式下的设备数，未配置时默认1台
    pub fn effective_device_count(&self) -> usize {
        if self.device_count <= 0 {
            1
        } else {
            self.device_count as usize
        }
    }

    pub fn has_target_value(&self) -> bool {
        self.cpu.and_then(|t| t.target_value).is_some()
            || self.memory.and_then(|t| t.target_value).is_some()
    }

    /// 阈值描述，仅用于审计记录
    pub fn threshold_description(&self) -> String {
        let symbol = self.trigger_action.comparison_symbol();
        let mut parts = Vec::new();
        if let Some(cpu) = &self.cpu {
            parts.push(format!(
                "CPU{} {} {:.2}%",
                cpu.threshold_type.display_name(),
                symbol,
                cpu.value
            ));
        }
        if let Some(memory) = &self.memory {
            parts.push(format!(
                "内存{} {} {:.2}%",
                memory.threshold_type.display_name(),
                symbol,
                memory.value
            ));
        }

        let joiner = match self.condition_logic {
            ConditionLogic::And => " 且 ",
            ConditionLogic::Or => " 或 ",
        };
        format!(
            "{}，持续{}天",
            parts.join(joiner),
            self.required_days()
        )
    }

    pub fn validate(&self) -> ScalingResult<()> {
        if self.name.trim().is_empty() {
            return Err(ScalingError::InvalidStrategy("策略名称不能为空".to_string()));
        }

        if self.cpu.is_none() && self.memory.is_none() {
            return Err(ScalingError::InvalidStrategy(
                "CPU阈值和内存阈值至少需要配置一个".to_string(),
            ));
        }

        for (label, threshold) in [("CPU", &self.cpu), ("内存", &self.memory)] {
            if let Some(threshold) = threshold {
                self.validate_threshold(label, threshold)?;
            }
        }

        if self.cluster_ids.is_empty() {
            return Err(ScalingError::InvalidStrategy(
                "策略至少需要关联一个集群".to_string(),
            ));
        }

        if self.duration_minutes < 0 {
            return Err(ScalingError::InvalidStrategy("持续时长不能为负数".to_string()));
        }
        if self.duration_minutes > MAX_DURATION_MINUTES {
            return Err(ScalingError::InvalidStrategy(format!(
                "持续时长不能超过{MAX_DURATION_MINUTES}分钟"
            )));
        }

        if self.cooldown_minutes < 0 {
            return Err(ScalingError::InvalidStrategy("冷却时间不能为负数".to_string()));
        }
        if self.cooldown_minutes > MAX_COOLDOWN_MINUTES {
            return Err(ScalingError::InvalidStrategy(format!(
                "冷却时间不能超过{MAX_COOLDOWN_MINUTES}分钟"
            )));
        }

        if self.device_count < 0 {
            return Err(ScalingError::InvalidStrategy("设备数量不能为负数".to_string()));
        }

        Ok(())
    }

    fn validate_threshold(&self, label: &str, threshold: &MetricThreshold) -> ScalingResult<()> {
        if !(0.0..=100.0).contains(&threshold.value) {
            return Err(ScalingError::InvalidStrategy(format!(
                "{label}阈值必须在0到100之间: {}",
                threshold.value
            )));
        }

        let Some(target) = threshold.target_value else {
            return Ok(());
        };

        if target <= 0.0 || target > 100.0 {
            return Err(ScalingError::InvalidStrategy(format!(
                "{label}目标值必须在0到100之间: {target}"
            )));
        }

        let on_correct_side = match self.trigger_action {
            TriggerAction::PoolEntry => target < threshold.value,
            TriggerAction::PoolExit => target > threshold.value,
        };
        if !on_correct_side {
            return Err(ScalingError::InvalidStrategy(format!(
                "{label}目标值 {target} 与{}阈值 {} 方向不一致",
                self.trigger_action.display_name(),
                threshold.value
            )));
        }

        Ok(())
    }

    pub fn entity_description(&self) -> String {
        format!(
            "策略 '{}' (ID: {}, 动作: {})",
            self.name, self.id, self.trigger_action
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_strategy() -> Strategy {
        let mut strategy = Strategy::new("cpu-high".to_string(), TriggerAction::PoolEntry, vec![1]);
        strategy.cpu = Some(MetricThreshold {
            value: 80.0,
            threshold_type: ThresholdType::Usage,
            target_value: None,
        });
        strategy
    }

    #[test]
    fn test_required_days_from_minutes() {
        let mut strategy = entry_strategy();
        strategy.duration_minutes = 0;
        assert_eq!(strategy.required_days(), 1);
        strategy.duration_minutes = 3 * 24 * 60;
        assert_eq!(strategy.required_days(), 3);
        strategy.duration_minutes = 3 * 24 * 60 + 100;
        assert_eq!(strategy.required_days(), 3);
        strategy.duration_minutes = i64::MAX;
        assert_eq!(strategy.required_days(), u32::MAX);
    }

    #[test]
    fn test_validate_rejects_oversized_durations() {
        let mut strategy = entry_strategy();
        strategy.duration_minutes = MAX_DURATION_MINUTES;
        strategy.cooldown_minutes = MAX_COOLDOWN_MINUTES;
        assert!(strategy.validate().is_ok());

        strategy.duration_minutes = 100_000_000 * 24 * 60;
        assert!(matches!(
            strategy.validate(),
            Err(ScalingError::InvalidStrategy(_))
        ));

        let mut strategy = entry_strategy();
        strategy.cooldown_minutes = i64::MAX / 2;
        assert!(matches!(
            strategy.validate(),
            Err(ScalingError::InvalidStrategy(_))
        ));
        assert_eq!(strategy.cooldown(), Duration::minutes(MAX_COOLDOWN_MINUTES));
    }

    #[test]
    fn test_resource_type_list_defaults_to_total() {
        let mut strategy = entry_strategy();
        strategy.resource_types = String::new();
        assert_eq!(strategy.resource_type_list(), vec!["total".to_string()]);
        strategy.resource_types = " compute, gpu ,,".to_string();
        assert_eq!(
            strategy.resource_type_list(),
            vec!["compute".to_string(), "gpu".to_string()]
        );
    }

    #[test]
    fn test_validate_requires_threshold_and_clusters() {
        let mut strategy = entry_strategy();
        assert!(strategy.validate().is_ok());

        strategy.cpu = None;
        assert!(strategy.validate().is_err());

        let mut strategy = entry_strategy();
        strategy.cluster_ids.clear();
        assert!(strategy.validate().is_err());
    }

    #[test]
    fn test_validate_target_side() {
        let mut strategy = entry_strategy();
        strategy.cpu.as_mut().unwrap().target_value = Some(60.0);
        assert!(strategy.validate().is_ok());
        strategy.cpu.as_mut().unwrap().target_value = Some(90.0);
        assert!(strategy.validate().is_err());

        let mut exit = entry_strategy();
        exit.trigger_action = TriggerAction::PoolExit;
        exit.cpu = Some(MetricThreshold {
            value: 20.0,
            threshold_type: ThresholdType::Allocated,
            target_value: Some(50.0),
        });
        assert!(exit.validate().is_ok());
        exit.cpu.as_mut().unwrap().target_value = Some(10.0);
        assert!(exit.validate().is_err());
    }

    #[test]
    fn test_query_template_by_action() {
        let mut strategy = entry_strategy();
        strategy.entry_query_template_id = Some(7);
        strategy.exit_query_template_id = Some(0);
        assert_eq!(strategy.query_template_id(TriggerAction::PoolEntry), Some(7));
        assert_eq!(strategy.query_template_id(TriggerAction::PoolExit), None);
    }

    #[test]
    fn test_effective_device_count() {
        let mut strategy = entry_strategy();
        strategy.device_count = 0;
        assert_eq!(strategy.effective_device_count(), 1);
        strategy.device_count = 4;
        assert_eq!(strategy.effective_device_count(), 4);
    }

    #[test]
    fn test_threshold_description() {
        let mut strategy = entry_strategy();
        strategy.memory = Some(MetricThreshold {
            value: 70.0,
            threshold_type: ThresholdType::Allocated,
            target_value: None,
        });
        strategy.condition_logic = ConditionLogic::Or;
        assert_eq!(
            strategy.threshold_description(),
            "CPU使用率 > 80.00% 或 内存分配率 > 70.00%，持续1天"
        );
    }

    #[test]
    fn test_text_enum_roundtrip() {
        assert_eq!("pool_exit".parse::<TriggerAction>().unwrap(), TriggerAction::PoolExit);
        assert_eq!(ConditionLogic::Or.as_str(), "OR");
        assert!("sideways".parse::<TriggerAction>().is_err());
    }
}
