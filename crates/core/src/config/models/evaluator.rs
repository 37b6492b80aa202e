use serde::{Deserialize, Serialize};

/// 策略评估调度器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    /// 快照回溯天数，策略要求的持续天数更长时以策略为准
    pub lookback_days: i64,
    pub max_concurrent_strategies: usize,
    pub strategy_lock_ttl_seconds: u64,
    pub sweep_lock_ttl_seconds: u64,
    pub device_query_page_size: u32,
    /// 自动创建订单时记录的创建人
    pub order_creator: String,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 60,
            lookback_days: 7,
            max_concurrent_strategies: 8,
            strategy_lock_ttl_seconds: 120,
            sweep_lock_ttl_seconds: 300,
            device_query_page_size: 1000,
            order_creator: "system".to_string(),
        }
    }
}

impl EvaluatorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.interval_seconds == 0 {
            return Err(anyhow::anyhow!("评估间隔必须大于0"));
        }

        if self.lookback_days <= 0 {
            return Err(anyhow::anyhow!("快照回溯天数必须大于0"));
        }

        if self.max_concurrent_strategies == 0 {
            return Err(anyhow::anyhow!("最大并发评估策略数必须大于0"));
        }

        if self.strategy_lock_ttl_seconds == 0 || self.sweep_lock_ttl_seconds == 0 {
            return Err(anyhow::anyhow!("锁过期时间必须大于0"));
        }

        if self.device_query_page_size == 0 {
            return Err(anyhow::anyhow!("设备查询分页大小必须大于0"));
        }

        if self.order_creator.is_empty() {
            return Err(anyhow::anyhow!("订单创建人不能为空"));
        }

        Ok(())
    }
}
