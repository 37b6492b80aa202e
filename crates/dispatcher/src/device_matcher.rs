use std::sync::Arc;

use tracing::{debug, info, instrument};

use scaler_core::{ScalingError, ScalingResult};
use scaler_domain::entities::{Device, FilterGroup, PageRequest, Strategy};
use scaler_domain::repositories::{DeviceDirectory, QueryTemplateRepository};
use scaler_domain::services::{CapacityDelta, DeviceSelection, DeviceSelector};

/// 设备匹配：解析查询模板、查询设备目录、分区并选择设备
pub struct DeviceMatcher {
    pub template_repo: Arc<dyn QueryTemplateRepository>,
    pub directory: Arc<dyn DeviceDirectory>,
    pub page_size: u32,
}

impl DeviceMatcher {
    pub fn new(
        template_repo: Arc<dyn QueryTemplateRepository>,
        directory: Arc<dyn DeviceDirectory>,
        page_size: u32,
    ) -> Self {
        Self {
            template_repo,
            directory,
            page_size: page_size.max(1),
        }
    }

    /// 按策略动作匹配设备
    ///
    /// 模板缺失或无法解析返回配置类错误，设备目录失败返回 `DeviceQuery`。
    /// 没有候选或没有选中设备不是错误。
    #[instrument(skip(self, strategy, demand), fields(strategy_id = strategy.id, cluster_id = cluster_id))]
    pub async fn match_devices(
        &self,
        strategy: &Strategy,
        cluster_id: i64,
        demand: Option<CapacityDelta>,
    ) -> ScalingResult<DeviceSelection> {
        let action = strategy.trigger_action;
        let template_id =
            strategy
                .query_template_id(action)
                .ok_or_else(|| ScalingError::MissingQueryTemplate {
                    action: action.to_string(),
                })?;

        let template = self
            .template_repo
            .find_by_id(template_id)
            .await?
            .ok_or(ScalingError::QueryTemplateNotFound { id: template_id })?;
        let groups = template.filter_groups()?;

        let candidates = self.fetch_all(&groups).await?;
        debug!(
            "策略 {} 模板 {} 查询到 {} 台候选设备",
            strategy.id,
            template.name,
            candidates.len()
        );

        let selection = DeviceSelector::filter_and_select(
            action,
            cluster_id,
            candidates,
            demand,
            strategy.effective_device_count(),
        );
        info!(
            "策略 {} 集群 {} 设备匹配完成: 候选 {}, 可用 {}, 选中 {} (CPU {:.1}, 内存 {:.1})",
            strategy.id,
            cluster_id,
            selection.candidates,
            selection.eligible,
            selection.selected.len(),
            selection.total_cpu(),
            selection.total_memory()
        );
        Ok(selection)
    }

    async fn fetch_all(&self, groups: &[FilterGroup]) -> ScalingResult<Vec<Device>> {
        let mut devices = Vec::new();
        let mut page = 1;
        loop {
            let result = self
                .directory
                .query(groups, PageRequest::new(page, self.page_size))
                .await?;
            let returned = result.devices.len();
            devices.extend(result.devices);

            if returned == 0 || devices.len() as u64 >= result.total {
                break;
            }
            page += 1;
        }
        Ok(devices)
    }
}
