use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::entities::{ConditionLogic, Metric, ResourceSnapshot, Strategy};

/// 某一自然日（UTC）的代表快照
#[derive(Debug, Clone, PartialEq)]
pub struct DailySnapshot {
    pub day: NaiveDate,
    pub snapshot: ResourceSnapshot,
}

/// 阈值评估结果，`triggered_value` 和 `threshold_value` 仅用于审计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreachEvaluation {
    pub breached: bool,
    /// 截止最近一天的连续满足天数
    pub consecutive_days: u32,
    pub max_consecutive_days: u32,
    pub required_days: u32,
    pub evaluated_days: u32,
    /// 相邻观测日之间缺失的天数
    pub missing_days: u32,
    pub triggered_value: String,
    pub threshold_value: String,
}

impl BreachEvaluation {
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "连续满足{}天（要求{}天，最长{}天，共评估{}天）",
            self.consecutive_days, self.required_days, self.max_consecutive_days, self.evaluated_days
        );
        if self.missing_days > 0 {
            summary.push_str(&format!("，缺失{}天快照", self.missing_days));
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    /// 回看窗口内没有任何快照
    NoData,
    Evaluated(BreachEvaluation),
}

/// 阈值突破检测，纯计算逻辑
pub struct BreachDetector;

impl BreachDetector {
    /// 按自然日分组，每天取最新的一条快照，结果按日期升序
    pub fn daily_representatives(snapshots: &[ResourceSnapshot]) -> Vec<DailySnapshot> {
        let mut by_day: BTreeMap<NaiveDate, &ResourceSnapshot> = BTreeMap::new();
        for snapshot in snapshots {
            let day = snapshot.created_at.date_naive();
            match by_day.get(&day) {
                Some(existing) if existing.created_at >= snapshot.created_at => {}
                _ => {
                    by_day.insert(day, snapshot);
                }
            }
        }

        by_day
            .into_iter()
            .map(|(day, snapshot)| DailySnapshot {
                day,
                snapshot: snapshot.clone(),
            })
            .collect()
    }

    /// 单日是否满足策略条件
    pub fn day_satisfies(strategy: &Strategy, snapshot: &ResourceSnapshot) -> bool {
        let check = |metric: Metric| {
            strategy.threshold(metric).map(|threshold| {
                let actual = snapshot.metric_value(metric, threshold.threshold_type);
                strategy.trigger_action.is_breached(actual, threshold.value)
            })
        };

        match (check(Metric::Cpu), check(Metric::Memory)) {
            (Some(cpu), Some(memory)) => match strategy.condition_logic {
                ConditionLogic::And => cpu && memory,
                ConditionLogic::Or => cpu || memory,
            },
            (Some(single), None) | (None, Some(single)) => single,
            (None, None) => false,
        }
    }

    pub fn detect(strategy: &Strategy, days: &[DailySnapshot]) -> DetectionOutcome {
        if days.is_empty() {
            return DetectionOutcome::NoData;
        }

        let required_days = strategy.required_days();
        let mut consecutive_days = 0u32;
        let mut max_consecutive_days = 0u32;
        let mut missing_days = 0u32;
        let mut previous: Option<NaiveDate> = None;

        for daily in days {
            if let Some(prev) = previous {
                let gap = (daily.day - prev).num_days() - 1;
                if gap > 0 {
                    missing_days += gap as u32;
                    consecutive_days = 0;
                }
            }
            previous = Some(daily.day);

            if Self::day_satisfies(strategy, &daily.snapshot) {
                consecutive_days += 1;
                max_consecutive_days = max_consecutive_days.max(consecutive_days);
            } else {
                consecutive_days = 0;
            }
        }

        let breached = consecutive_days >= required_days;
        debug!(
            "策略 {} 连续满足 {} 天，要求 {} 天，突破: {}",
            strategy.id, consecutive_days, required_days, breached
        );

        DetectionOutcome::Evaluated(BreachEvaluation {
            breached,
            consecutive_days,
            max_consecutive_days,
            required_days,
            evaluated_days: days.len() as u32,
            missing_days,
            triggered_value: Self::triggered_value(strategy, days),
            threshold_value: strategy.threshold_description(),
        })
    }

    /// 各指标在评估天数内的平均值
    fn triggered_value(strategy: &Strategy, days: &[DailySnapshot]) -> String {
        let mut parts = Vec::new();
        for metric in [Metric::Cpu, Metric::Memory] {
            let Some(threshold) = strategy.threshold(metric) else {
                continue;
            };
            let total: f64 = days
                .iter()
                .map(|d| d.snapshot.metric_value(metric, threshold.threshold_type))
                .sum();
            let average = total / days.len() as f64;
            parts.push(format!(
                "{}{}: {:.2}%",
                metric.display_name(),
                threshold.threshold_type.display_name(),
                average
            ));
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{MetricThreshold, ThresholdType, TriggerAction};
    use chrono::{Duration, TimeZone, Utc};

    fn strategy(required_days: i64) -> Strategy {
        let mut strategy = Strategy::new("cpu-high".to_string(), TriggerAction::PoolEntry, vec![1]);
        strategy.id = 1;
        strategy.duration_minutes = required_days * 24 * 60;
        strategy.cpu = Some(MetricThreshold {
            value: 80.0,
            threshold_type: ThresholdType::Usage,
            target_value: None,
        });
        strategy
    }

    fn snapshot(day: u32, hour: u32, cpu_usage: f64) -> ResourceSnapshot {
        ResourceSnapshot {
            id: (day * 100 + hour) as i64,
            cluster_id: 1,
            resource_type: "total".to_string(),
            cpu_capacity: 100.0,
            cpu_request: 50.0,
            max_cpu_usage_ratio: cpu_usage,
            memory_capacity: 1000.0,
            memory_request: 900.0,
            max_memory_usage_ratio: 30.0,
            created_at: Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap(),
        }
    }

    fn days(usages: &[f64]) -> Vec<DailySnapshot> {
        let snapshots: Vec<_> = usages
            .iter()
            .enumerate()
            .map(|(i, usage)| snapshot(i as u32 + 1, 12, *usage))
            .collect();
        BreachDetector::daily_representatives(&snapshots)
    }

    fn evaluated(outcome: DetectionOutcome) -> BreachEvaluation {
        match outcome {
            DetectionOutcome::Evaluated(evaluation) => evaluation,
            DetectionOutcome::NoData => panic!("expected evaluation"),
        }
    }

    #[test]
    fn test_latest_snapshot_per_day_wins() {
        let snapshots = vec![snapshot(2, 9, 10.0), snapshot(1, 8, 20.0), snapshot(1, 23, 90.0)];
        let daily = BreachDetector::daily_representatives(&snapshots);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].snapshot.max_cpu_usage_ratio, 90.0);
        assert_eq!(daily[1].snapshot.max_cpu_usage_ratio, 10.0);
    }

    #[test]
    fn test_trailing_run_not_total_count() {
        let evaluation = evaluated(BreachDetector::detect(
            &strategy(2),
            &days(&[90.0, 91.0, 92.0, 50.0, 85.0, 86.0]),
        ));
        assert!(evaluation.breached);
        assert_eq!(evaluation.consecutive_days, 2);
        assert_eq!(evaluation.max_consecutive_days, 3);
    }

    #[test]
    fn test_last_day_off_breaks_run() {
        let evaluation = evaluated(BreachDetector::detect(
            &strategy(1),
            &days(&[90.0, 91.0, 92.0, 50.0]),
        ));
        assert!(!evaluation.breached);
        assert_eq!(evaluation.consecutive_days, 0);
    }

    #[test]
    fn test_no_data_is_distinct() {
        assert_eq!(BreachDetector::detect(&strategy(1), &[]), DetectionOutcome::NoData);
    }

    #[test]
    fn test_calendar_gap_resets_run() {
        let snapshots = vec![snapshot(1, 12, 90.0), snapshot(2, 12, 90.0), snapshot(5, 12, 90.0)];
        let daily = BreachDetector::daily_representatives(&snapshots);
        let evaluation = evaluated(BreachDetector::detect(&strategy(2), &daily));
        assert_eq!(evaluation.missing_days, 2);
        assert_eq!(evaluation.consecutive_days, 1);
        assert!(!evaluation.breached);
        assert!(evaluation.summary().contains("缺失2天快照"));
    }

    #[test]
    fn test_exit_direction_and_logic() {
        let mut exit = strategy(1);
        exit.trigger_action = TriggerAction::PoolExit;
        exit.cpu = Some(MetricThreshold {
            value: 20.0,
            threshold_type: ThresholdType::Usage,
            target_value: None,
        });
        exit.memory = Some(MetricThreshold {
            value: 50.0,
            threshold_type: ThresholdType::Allocated,
            target_value: None,
        });

        // memory allocated = 90%，不满足 < 50
        let low_cpu = snapshot(1, 12, 10.0);
        exit.condition_logic = ConditionLogic::And;
        assert!(!BreachDetector::day_satisfies(&exit, &low_cpu));
        exit.condition_logic = ConditionLogic::Or;
        assert!(BreachDetector::day_satisfies(&exit, &low_cpu));
    }

    #[test]
    fn test_triggered_value_averages() {
        let evaluation = evaluated(BreachDetector::detect(&strategy(1), &days(&[80.0, 90.0])));
        assert_eq!(evaluation.triggered_value, "CPU使用率: 85.00%");
        assert_eq!(evaluation.threshold_value, "CPU使用率 > 80.00%，持续1天");
    }

    #[test]
    fn test_required_days_window_with_duration_offset() {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let snapshots: Vec<_> = (0..3)
            .map(|i| {
                let mut s = snapshot(1, 0, 95.0);
                s.created_at = base + Duration::days(i);
                s
            })
            .collect();
        let daily = BreachDetector::daily_representatives(&snapshots);
        assert!(evaluated(BreachDetector::detect(&strategy(3), &daily)).breached);
    }
}
