use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scaler_core::{ScalingError, ScalingResult};

use super::device::Device;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FilterType {
    Device,
    NodeLabel,
    Taint,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConditionType {
    Equal,
    NotEqual,
    Contains,
    NotContains,
    Exists,
    NotExists,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    #[serde(alias = "and")]
    And,
    #[serde(alias = "or")]
    Or,
}

impl LogicalOperator {
    fn combine(&self, left: bool, right: bool) -> bool {
        match self {
            LogicalOperator::And => left && right,
            LogicalOperator::Or => left || right,
        }
    }
}

/// 单个过滤条件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterBlock {
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    pub key: String,
    pub condition_type: ConditionType,
    #[serde(default)]
    pub value: String,
    /// 与前一个条件的组合方式，首个条件忽略
    #[serde(default)]
    pub operator: LogicalOperator,
}

impl FilterBlock {
    pub fn matches(&self, device: &Device) -> bool {
        let actual = match self.filter_type {
            FilterType::Device => device.field(&self.key),
            FilterType::NodeLabel => device.labels.get(&self.key).cloned(),
            FilterType::Taint => device
                .taints
                .iter()
                .find(|taint| taint.key == self.key)
                .map(|taint| taint.value.clone()),
        };

        match self.condition_type {
            ConditionType::Exists => actual.is_some(),
            ConditionType::NotExists => actual.is_none(),
            ConditionType::Equal => actual.as_deref() == Some(self.value.as_str()),
            ConditionType::NotEqual => actual.as_deref() != Some(self.value.as_str()),
            ConditionType::Contains => actual.is_some_and(|v| v.contains(&self.value)),
            ConditionType::NotContains => !actual.is_some_and(|v| v.contains(&self.value)),
            ConditionType::In => actual.is_some_and(|v| self.values().any(|candidate| candidate == v)),
            ConditionType::NotIn => {
                !actual.is_some_and(|v| self.values().any(|candidate| candidate == v))
            }
        }
    }

    fn values(&self) -> impl Iterator<Item = &str> {
        self.value
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// 过滤条件组，组内条件按各自的操作符从左到右折叠
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterGroup {
    #[serde(default)]
    pub blocks: Vec<FilterBlock>,
    /// 与前一个条件组的组合方式
    #[serde(default)]
    pub operator: LogicalOperator,
}

impl FilterGroup {
    pub fn matches(&self, device: &Device) -> bool {
        let mut blocks = self.blocks.iter();
        let Some(first) = blocks.next() else {
            return true;
        };
        blocks.fold(first.matches(device), |acc, block| {
            block.operator.combine(acc, block.matches(device))
        })
    }
}

/// 依次应用全部条件组，空列表匹配所有设备
pub fn matches_all_groups(groups: &[FilterGroup], device: &Device) -> bool {
    let mut iter = groups.iter();
    let Some(first) = iter.next() else {
        return true;
    };
    iter.fold(first.matches(device), |acc, group| {
        group.operator.combine(acc, group.matches(device))
    })
}

/// 设备查询模板，条件组以JSON文本保存
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryTemplate {
    pub id: i64,
    pub name: String,
    pub groups: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueryTemplate {
    pub fn filter_groups(&self) -> ScalingResult<Vec<FilterGroup>> {
        serde_json::from_str(&self.groups).map_err(|e| ScalingError::InvalidQueryTemplate {
            id: self.id,
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::device::Taint;

    fn block(filter_type: FilterType, key: &str, condition_type: ConditionType, value: &str) -> FilterBlock {
        FilterBlock {
            filter_type,
            key: key.to_string(),
            condition_type,
            value: value.to_string(),
            operator: LogicalOperator::And,
        }
    }

    fn device() -> Device {
        let mut device = Device::new(1, 64.0, 256.0);
        device.group = "gpu-a100".to_string();
        device
            .labels
            .insert("zone".to_string(), "cn-north-1".to_string());
        device.taints.push(Taint {
            key: "maintenance".to_string(),
            value: "true".to_string(),
            effect: "NoSchedule".to_string(),
        });
        device
    }

    #[test]
    fn test_block_conditions() {
        let d = device();
        assert!(block(FilterType::Device, "group", ConditionType::Contains, "a100").matches(&d));
        assert!(block(FilterType::NodeLabel, "zone", ConditionType::In, "cn-south-1, cn-north-1").matches(&d));
        assert!(block(FilterType::NodeLabel, "zone", ConditionType::NotIn, "cn-south-1").matches(&d));
        assert!(block(FilterType::Taint, "maintenance", ConditionType::Exists, "").matches(&d));
        assert!(block(FilterType::Taint, "dedicated", ConditionType::NotExists, "").matches(&d));
        assert!(!block(FilterType::Device, "arch", ConditionType::Equal, "arm64").matches(&d));
        assert!(block(FilterType::Device, "ip", ConditionType::NotEqual, "10.0.0.1").matches(&d));
    }

    #[test]
    fn test_group_folds_left() {
        let d = device();
        let mut second = block(FilterType::Device, "arch", ConditionType::Equal, "x86_64");
        second.operator = LogicalOperator::Or;
        let group = FilterGroup {
            blocks: vec![
                block(FilterType::Device, "arch", ConditionType::Equal, "arm64"),
                second,
            ],
            operator: LogicalOperator::And,
        };
        assert!(group.matches(&d));
        assert!(matches_all_groups(&[], &d));
    }

    #[test]
    fn test_template_parse() {
        let template = QueryTemplate {
            id: 4,
            name: "idle-gpu".to_string(),
            groups: r#"[{"blocks":[{"type":"nodeLabel","key":"zone","conditionType":"equal","value":"cn-north-1","operator":"and"}],"operator":"AND"}]"#.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let groups = template.filter_groups().unwrap();
        assert_eq!(groups.len(), 1);
        assert!(groups[0].matches(&device()));

        let broken = QueryTemplate {
            groups: "{not json".to_string(),
            ..template
        };
        assert!(matches!(
            broken.filter_groups(),
            Err(ScalingError::InvalidQueryTemplate { id: 4, .. })
        ));
    }
}
