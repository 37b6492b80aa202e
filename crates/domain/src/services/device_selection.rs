use std::cmp::Ordering;

use tracing::debug;

use super::capacity::CapacityDelta;
use crate::entities::{Device, ResultCode, TriggerAction};

/// 设备筛选结果
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSelection {
    /// 设备目录返回的候选数量
    pub candidates: usize,
    /// 分区过滤后的可用数量
    pub eligible: usize,
    pub selected: Vec<Device>,
}

impl DeviceSelection {
    /// 零候选和零选中都不是错误，仍会生成提醒订单
    pub fn result_code(&self) -> ResultCode {
        if self.candidates == 0 {
            ResultCode::NoDevicesFound
        } else if self.selected.is_empty() {
            ResultCode::NoEligibleDevices
        } else {
            ResultCode::OrderCreated
        }
    }

    pub fn device_ids(&self) -> Vec<i64> {
        self.selected.iter().map(|d| d.id).collect()
    }

    pub fn total_cpu(&self) -> f64 {
        self.selected.iter().map(|d| d.cpu).sum()
    }

    pub fn total_memory(&self) -> f64 {
        self.selected.iter().map(|d| d.memory).sum()
    }
}

/// 候选设备分区与选择算法
pub struct DeviceSelector;

impl DeviceSelector {
    /// 入池：未分配集群的设备排在前面，其余保持目录顺序；
    /// 出池：只保留属于目标集群的设备
    pub fn partition(action: TriggerAction, cluster_id: i64, devices: Vec<Device>) -> Vec<Device> {
        match action {
            TriggerAction::PoolEntry => {
                let (mut unassigned, assigned): (Vec<_>, Vec<_>) =
                    devices.into_iter().partition(Device::is_unassigned);
                unassigned.extend(assigned);
                unassigned
            }
            TriggerAction::PoolExit => devices
                .into_iter()
                .filter(|device| device.belongs_to(cluster_id))
                .collect(),
        }
    }

    /// 贪心选择，直到 CPU 与内存累计值都满足需求或候选耗尽
    ///
    /// 入池按 CPU 降序（未分配设备优先），出池按 CPU 升序。
    pub fn select_by_delta(
        action: TriggerAction,
        mut devices: Vec<Device>,
        demand: CapacityDelta,
    ) -> Vec<Device> {
        match action {
            TriggerAction::PoolEntry => devices.sort_by(|a, b| {
                b.is_unassigned()
                    .cmp(&a.is_unassigned())
                    .then(b.cpu.partial_cmp(&a.cpu).unwrap_or(Ordering::Equal))
            }),
            TriggerAction::PoolExit => {
                devices.sort_by(|a, b| a.cpu.partial_cmp(&b.cpu).unwrap_or(Ordering::Equal))
            }
        }

        let mut running = CapacityDelta::default();
        let mut selected = Vec::new();

        for device in devices {
            if Self::demand_met(action, &running, &demand) {
                break;
            }
            match action {
                TriggerAction::PoolEntry => {
                    running.cpu += device.cpu;
                    running.memory += device.memory;
                }
                TriggerAction::PoolExit => {
                    running.cpu -= device.cpu;
                    running.memory -= device.memory;
                }
            }
            selected.push(device);
        }

        debug!(
            "贪心选择 {} 台设备，累计 CPU {:.2} / 内存 {:.2}，需求 CPU {:.2} / 内存 {:.2}",
            selected.len(),
            running.cpu,
            running.memory,
            demand.cpu,
            demand.memory
        );
        selected
    }

    fn demand_met(action: TriggerAction, running: &CapacityDelta, demand: &CapacityDelta) -> bool {
        match action {
            TriggerAction::PoolEntry => running.cpu >= demand.cpu && running.memory >= demand.memory,
            TriggerAction::PoolExit => running.cpu <= demand.cpu && running.memory <= demand.memory,
        }
    }

    pub fn select_fixed(devices: Vec<Device>, count: usize) -> Vec<Device> {
        devices.into_iter().take(count).collect()
    }

    /// 分区后按容量需求或固定数量选择设备
    pub fn filter_and_select(
        action: TriggerAction,
        cluster_id: i64,
        candidates: Vec<Device>,
        demand: Option<CapacityDelta>,
        fixed_count: usize,
    ) -> DeviceSelection {
        let candidate_count = candidates.len();
        let eligible = Self::partition(action, cluster_id, candidates);
        let eligible_count = eligible.len();

        let selected = match demand.filter(CapacityDelta::is_effective) {
            Some(demand) => Self::select_by_delta(action, eligible, demand),
            None => Self::select_fixed(eligible, fixed_count),
        };

        DeviceSelection {
            candidates: candidate_count,
            eligible: eligible_count,
            selected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: i64, cpu: f64, memory: f64, cluster_id: Option<i64>) -> Device {
        let mut device = Device::new(id, cpu, memory);
        device.cluster_id = cluster_id;
        device
    }

    fn sample() -> Vec<Device> {
        vec![
            device(1, 32.0, 128.0, None),
            device(2, 64.0, 256.0, None),
            device(3, 16.0, 64.0, None),
        ]
    }

    fn ids(devices: &[Device]) -> Vec<i64> {
        devices.iter().map(|d| d.id).collect()
    }

    #[test]
    fn test_greedy_entry_prefers_large_devices() {
        let selected = DeviceSelector::select_by_delta(
            TriggerAction::PoolEntry,
            sample(),
            CapacityDelta::new(80.0, 300.0),
        );
        assert_eq!(ids(&selected), vec![2, 1]);
        let total_cpu: f64 = selected.iter().map(|d| d.cpu).sum();
        let total_memory: f64 = selected.iter().map(|d| d.memory).sum();
        assert_eq!(total_cpu, 96.0);
        assert_eq!(total_memory, 384.0);
    }

    #[test]
    fn test_greedy_exit_prefers_small_devices() {
        let selected = DeviceSelector::select_by_delta(
            TriggerAction::PoolExit,
            sample(),
            CapacityDelta::new(-40.0, -150.0),
        );
        assert_eq!(ids(&selected), vec![3, 1]);
    }

    #[test]
    fn test_greedy_exhausts_candidates() {
        let selected = DeviceSelector::select_by_delta(
            TriggerAction::PoolEntry,
            sample(),
            CapacityDelta::new(1000.0, 0.0),
        );
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn test_entry_fixed_count_unassigned_first() {
        let candidates = vec![
            device(1, 8.0, 32.0, Some(7)),
            device(2, 8.0, 32.0, None),
            device(3, 8.0, 32.0, Some(9)),
            device(4, 8.0, 32.0, None),
        ];

        let two = DeviceSelector::filter_and_select(
            TriggerAction::PoolEntry,
            7,
            candidates.clone(),
            None,
            2,
        );
        assert_eq!(ids(&two.selected), vec![2, 4]);

        let three =
            DeviceSelector::filter_and_select(TriggerAction::PoolEntry, 7, candidates, None, 3);
        assert_eq!(ids(&three.selected), vec![2, 4, 1]);
        assert_eq!(three.result_code(), ResultCode::OrderCreated);
    }

    #[test]
    fn test_exit_only_target_cluster() {
        let candidates = vec![
            device(1, 8.0, 32.0, Some(7)),
            device(2, 8.0, 32.0, None),
            device(3, 8.0, 32.0, Some(9)),
            device(4, 8.0, 32.0, Some(7)),
        ];
        let selection =
            DeviceSelector::filter_and_select(TriggerAction::PoolExit, 7, candidates, None, 5);
        assert_eq!(selection.eligible, 2);
        assert!(selection.selected.iter().all(|d| d.cluster_id == Some(7)));
    }

    #[test]
    fn test_exit_zero_eligible_is_empty_selection() {
        let candidates = vec![device(1, 8.0, 32.0, Some(9)), device(2, 8.0, 32.0, None)];
        let selection =
            DeviceSelector::filter_and_select(TriggerAction::PoolExit, 7, candidates, None, 1);
        assert!(selection.selected.is_empty());
        assert_eq!(selection.candidates, 2);
        assert_eq!(selection.result_code(), ResultCode::NoEligibleDevices);
    }

    #[test]
    fn test_no_candidates_result_code() {
        let selection =
            DeviceSelector::filter_and_select(TriggerAction::PoolEntry, 7, Vec::new(), None, 1);
        assert_eq!(selection.result_code(), ResultCode::NoDevicesFound);
    }

    #[test]
    fn test_ineffective_demand_uses_fixed_count() {
        let selection = DeviceSelector::filter_and_select(
            TriggerAction::PoolEntry,
            7,
            sample(),
            Some(CapacityDelta::default()),
            1,
        );
        assert_eq!(ids(&selection.selected), vec![1]);
    }
}
