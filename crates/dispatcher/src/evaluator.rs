use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use scaler_core::config::EvaluatorConfig;
use scaler_core::{ScalingError, ScalingResult};
use scaler_domain::entities::{
    ElasticScalingDetail, OrderDetail, ResourceSnapshot, ResultCode, Strategy,
    StrategyExecutionHistory,
};
use scaler_domain::repositories::{
    DistributedLock, ExecutionHistoryRepository, SnapshotRepository, StrategyRepository,
};
use scaler_domain::services::{BreachDetector, BreachEvaluation, CapacityPlanner, DetectionOutcome};
use scaler_infrastructure::{
    strategy_lock_key, sweep_lock_key, LockGuard, MetricsCollector, StructuredLogger,
};

use crate::device_matcher::DeviceMatcher;
use crate::history_recorder::HistoryRecorder;
use crate::order_manager::{OrderDraft, OrderManager};

/// 一轮评估的统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    /// 其他实例正在执行本轮评估
    pub sweep_skipped: bool,
    pub strategies_seen: usize,
    pub skipped_by_lock: usize,
    pub skipped_by_cooldown: usize,
    pub skipped_no_clusters: usize,
    pub failed_strategies: usize,
    pub evaluated_pairs: usize,
    pub orders_created: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrategyOutcome {
    LockContended,
    CoolingDown,
    NoClusters,
    Failed,
    Evaluated { pairs: usize, orders: usize },
}

impl SweepSummary {
    fn absorb(&mut self, outcome: StrategyOutcome) {
        match outcome {
            StrategyOutcome::LockContended => self.skipped_by_lock += 1,
            StrategyOutcome::CoolingDown => self.skipped_by_cooldown += 1,
            StrategyOutcome::NoClusters => self.skipped_no_clusters += 1,
            StrategyOutcome::Failed => self.failed_strategies += 1,
            StrategyOutcome::Evaluated { pairs, orders } => {
                self.evaluated_pairs += pairs;
                self.orders_created += orders;
            }
        }
    }
}

pub struct EvaluatorDependencies {
    pub strategy_repo: Arc<dyn StrategyRepository>,
    pub snapshot_repo: Arc<dyn SnapshotRepository>,
    pub history_repo: Arc<dyn ExecutionHistoryRepository>,
    pub recorder: Arc<HistoryRecorder>,
    pub matcher: Arc<DeviceMatcher>,
    pub order_manager: Arc<OrderManager>,
    pub lock: Arc<dyn DistributedLock>,
    pub metrics: Arc<MetricsCollector>,
}

/// 策略评估器
///
/// 每轮加载启用的策略，逐个在分布式锁保护下评估所有 (集群, 资源类型)。
/// 单个组合失败只记录执行历史，不影响其他组合和其他策略。
pub struct StrategyEvaluator {
    pub strategy_repo: Arc<dyn StrategyRepository>,
    pub snapshot_repo: Arc<dyn SnapshotRepository>,
    pub history_repo: Arc<dyn ExecutionHistoryRepository>,
    pub recorder: Arc<HistoryRecorder>,
    pub matcher: Arc<DeviceMatcher>,
    pub order_manager: Arc<OrderManager>,
    pub lock: Arc<dyn DistributedLock>,
    pub metrics: Arc<MetricsCollector>,
    pub config: EvaluatorConfig,
}

impl StrategyEvaluator {
    pub fn new(deps: EvaluatorDependencies, config: EvaluatorConfig) -> Self {
        Self {
            strategy_repo: deps.strategy_repo,
            snapshot_repo: deps.snapshot_repo,
            history_repo: deps.history_repo,
            recorder: deps.recorder,
            matcher: deps.matcher,
            order_manager: deps.order_manager,
            lock: deps.lock,
            metrics: deps.metrics,
            config,
        }
    }

    /// 按固定间隔执行评估，收到关闭信号后不再开始新的一轮
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        if !self.config.enabled {
            info!("策略评估已禁用");
            return;
        }

        let mut interval = tokio::time::interval(Duration::from_secs(self.config.interval_seconds));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "策略评估器启动，评估间隔: {}秒，最大并发策略数: {}",
            self.config.interval_seconds, self.config.max_concurrent_strategies
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.evaluate_once().await {
                        Ok(summary) => debug!("本轮评估完成: {:?}", summary),
                        Err(e) => StructuredLogger::log_system_error("evaluator", "evaluate_once", &e),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("收到关闭信号，策略评估器停止");
                    break;
                }
            }
        }
    }

    /// 执行一轮评估
    ///
    /// 只有读取启用策略列表失败或锁后端不可用时返回错误。
    #[instrument(skip(self))]
    pub async fn evaluate_once(&self) -> ScalingResult<SweepSummary> {
        let started = Instant::now();
        let sweep_key = sweep_lock_key();
        let Some(sweep_guard) = LockGuard::try_acquire(
            Arc::clone(&self.lock),
            sweep_key.as_str(),
            Duration::from_secs(self.config.sweep_lock_ttl_seconds),
        )
        .await?
        else {
            StructuredLogger::log_lock_contended(&sweep_key);
            return Ok(SweepSummary {
                sweep_skipped: true,
                ..SweepSummary::default()
            });
        };

        let result = self.sweep().await;
        if let Err(e) = sweep_guard.release().await {
            warn!("释放评估轮次锁失败: {}", e);
        }
        let summary = result?;

        let elapsed = started.elapsed().as_secs_f64();
        self.metrics.record_sweep_duration(elapsed);
        info!(
            "本轮评估完成: 策略 {}, 锁跳过 {}, 冷却跳过 {}, 评估组合 {}, 创建订单 {}, 耗时 {:.3}秒",
            summary.strategies_seen,
            summary.skipped_by_lock,
            summary.skipped_by_cooldown,
            summary.evaluated_pairs,
            summary.orders_created,
            elapsed
        );
        Ok(summary)
    }

    async fn sweep(&self) -> ScalingResult<SweepSummary> {
        let strategies = self.strategy_repo.find_enabled().await?;
        let mut summary = SweepSummary {
            strategies_seen: strategies.len(),
            ..SweepSummary::default()
        };
        if strategies.is_empty() {
            debug!("没有启用的策略");
            return Ok(summary);
        }

        let outcomes: Vec<StrategyOutcome> = stream::iter(strategies)
            .map(|strategy| self.evaluate_strategy(strategy))
            .buffer_unordered(self.config.max_concurrent_strategies.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            summary.absorb(outcome);
        }
        Ok(summary)
    }

    #[instrument(skip(self, strategy), fields(strategy_id = strategy.id, strategy_name = %strategy.name))]
    async fn evaluate_strategy(&self, strategy: Strategy) -> StrategyOutcome {
        let lock_key = strategy_lock_key(strategy.id);
        let guard = match LockGuard::try_acquire(
            Arc::clone(&self.lock),
            lock_key.as_str(),
            Duration::from_secs(self.config.strategy_lock_ttl_seconds),
        )
        .await
        {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                StructuredLogger::log_lock_contended(&lock_key);
                self.metrics.record_strategy_skipped("lock");
                return StrategyOutcome::LockContended;
            }
            Err(e) => {
                StructuredLogger::log_system_error("evaluator", "acquire_strategy_lock", &e);
                self.metrics.record_strategy_skipped("lock_error");
                return StrategyOutcome::LockContended;
            }
        };

        let outcome = self.evaluate_locked(&strategy).await;

        match guard.release().await {
            Ok(true) => {}
            Ok(false) => warn!("策略 {} 的锁已过期或被其他实例持有", strategy.id),
            Err(e) => warn!("释放策略 {} 的锁失败: {}", strategy.id, e),
        }
        outcome
    }

    async fn evaluate_locked(&self, strategy: &Strategy) -> StrategyOutcome {
        match self.in_cooldown(strategy).await {
            Ok(true) => {
                StructuredLogger::log_strategy_skipped(strategy.id, &strategy.name, "cooldown");
                self.metrics.record_strategy_skipped("cooldown");
                return StrategyOutcome::CoolingDown;
            }
            Ok(false) => {}
            Err(e) => {
                self.record_strategy_failure(strategy, "读取冷却期记录失败", &e)
                    .await;
                return StrategyOutcome::Failed;
            }
        }

        let cluster_ids = match self.strategy_repo.find_cluster_ids(strategy.id).await {
            Ok(ids) => ids,
            Err(e) => {
                self.record_strategy_failure(strategy, "读取关联集群失败", &e)
                    .await;
                return StrategyOutcome::Failed;
            }
        };
        if cluster_ids.is_empty() {
            debug!("策略 {} 没有关联集群，跳过", strategy.id);
            self.metrics.record_strategy_skipped("no_clusters");
            return StrategyOutcome::NoClusters;
        }

        let resource_types = strategy.resource_type_list();
        let mut pairs = 0;
        let mut orders = 0;
        for cluster_id in &cluster_ids {
            for resource_type in &resource_types {
                pairs += 1;
                if self.evaluate_pair(strategy, *cluster_id, resource_type).await {
                    orders += 1;
                }
            }
        }

        StrategyOutcome::Evaluated { pairs, orders }
    }

    /// 最近一次产生订单的评估仍在冷却期内
    async fn in_cooldown(&self, strategy: &Strategy) -> ScalingResult<bool> {
        let latest = self
            .history_repo
            .find_latest_with_results(strategy.id, &ResultCode::ORDER_CREATING)
            .await?;

        Ok(match latest {
            Some(history) => {
                let Some(cooldown_until) = history
                    .execution_time
                    .checked_add_signed(strategy.cooldown())
                else {
                    return Ok(true);
                };
                let cooling = Utc::now() < cooldown_until;
                if cooling {
                    debug!(
                        "策略 {} 冷却中，上次触发: {}，冷却至: {}",
                        strategy.id, history.execution_time, cooldown_until
                    );
                }
                cooling
            }
            None => false,
        })
    }

    /// 评估单个 (集群, 资源类型)，返回是否创建了订单
    async fn evaluate_pair(&self, strategy: &Strategy, cluster_id: i64, resource_type: &str) -> bool {
        let (evaluation, latest) = match self
            .detect_breach(strategy, cluster_id, resource_type)
            .await
        {
            Ok(Some(breach)) => breach,
            Ok(None) => return false,
            Err(e) => {
                self.record_pair_failure(strategy, cluster_id, resource_type, None, &e)
                    .await;
                return false;
            }
        };

        match self
            .create_scaling_order(strategy, cluster_id, resource_type, &evaluation, &latest)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                self.record_pair_failure(strategy, cluster_id, resource_type, Some(&evaluation), &e)
                    .await;
                false
            }
        }
    }

    /// 阈值检测，未突破时记录历史并返回 `None`
    async fn detect_breach(
        &self,
        strategy: &Strategy,
        cluster_id: i64,
        resource_type: &str,
    ) -> ScalingResult<Option<(BreachEvaluation, ResourceSnapshot)>> {
        let lookback_days = self
            .config
            .lookback_days
            .max(i64::from(strategy.required_days()));
        let since = chrono::Duration::try_days(lookback_days)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or_else(|| {
                ScalingError::InvalidStrategy(format!("快照回溯窗口超出范围: {lookback_days}天"))
            })?;
        let snapshots = self
            .snapshot_repo
            .find_since(cluster_id, resource_type, since)
            .await?;
        let days = BreachDetector::daily_representatives(&snapshots);

        let evaluation = match BreachDetector::detect(strategy, &days) {
            DetectionOutcome::NoData => {
                self.metrics.record_evaluation(false);
                StructuredLogger::log_strategy_evaluated(
                    strategy.id,
                    cluster_id,
                    resource_type,
                    ResultCode::NoSnapshotData.as_str(),
                    None,
                );
                self.recorder
                    .record(
                        StrategyExecutionHistory::new(
                            strategy.id,
                            ResultCode::NoSnapshotData,
                            format!("最近{lookback_days}天没有资源快照"),
                        )
                        .with_target(cluster_id, resource_type)
                        .with_values("", strategy.threshold_description()),
                    )
                    .await;
                return Ok(None);
            }
            DetectionOutcome::Evaluated(evaluation) => evaluation,
        };

        self.metrics.record_evaluation(evaluation.breached);
        if !evaluation.breached {
            StructuredLogger::log_strategy_evaluated(
                strategy.id,
                cluster_id,
                resource_type,
                ResultCode::ThresholdNotMet.as_str(),
                Some(evaluation.consecutive_days),
            );
            self.recorder
                .record(
                    StrategyExecutionHistory::new(
                        strategy.id,
                        ResultCode::ThresholdNotMet,
                        evaluation.summary(),
                    )
                    .with_target(cluster_id, resource_type)
                    .with_values(
                        evaluation.triggered_value.clone(),
                        evaluation.threshold_value.clone(),
                    ),
                )
                .await;
            return Ok(None);
        }

        // 快照按时间升序，最后一条即最新
        match snapshots.last() {
            Some(latest) => Ok(Some((evaluation, latest.clone()))),
            None => Ok(None),
        }
    }

    async fn create_scaling_order(
        &self,
        strategy: &Strategy,
        cluster_id: i64,
        resource_type: &str,
        evaluation: &BreachEvaluation,
        latest: &ResourceSnapshot,
    ) -> ScalingResult<()> {
        let demand = CapacityPlanner::demand(strategy, latest);
        let selection = self
            .matcher
            .match_devices(strategy, cluster_id, demand)
            .await?;
        let result = selection.result_code();

        let draft = OrderDraft {
            name: format!(
                "{}-集群{}-{}",
                strategy.name,
                cluster_id,
                strategy.trigger_action.display_name()
            ),
            description: Some(format!(
                "资源类型 {}，{}，选中 {} 台设备",
                resource_type,
                evaluation.summary(),
                selection.selected.len()
            )),
            created_by: self.config.order_creator.clone(),
            detail: OrderDetail::ElasticScaling(ElasticScalingDetail {
                cluster_id,
                strategy_id: Some(strategy.id),
                action: strategy.trigger_action,
                resource_type: resource_type.to_string(),
                device_count: selection.selected.len() as i32,
                triggered_value: evaluation.triggered_value.clone(),
                threshold_value: evaluation.threshold_value.clone(),
            }),
            device_ids: selection.device_ids(),
        };
        let order = self.order_manager.create_order(draft).await?;

        if result != ResultCode::OrderCreated {
            warn!(
                "策略 {} 集群 {} 触发{}但没有可用设备，已创建提醒订单 {}",
                strategy.id,
                cluster_id,
                strategy.trigger_action.display_name(),
                order.order_number
            );
        }
        StructuredLogger::log_strategy_evaluated(
            strategy.id,
            cluster_id,
            resource_type,
            result.as_str(),
            Some(evaluation.consecutive_days),
        );
        self.recorder
            .record(
                StrategyExecutionHistory::new(
                    strategy.id,
                    result,
                    format!(
                        "{}，候选 {} 台，可用 {} 台，选中 {} 台",
                        evaluation.summary(),
                        selection.candidates,
                        selection.eligible,
                        selection.selected.len()
                    ),
                )
                .with_target(cluster_id, resource_type)
                .with_values(
                    evaluation.triggered_value.clone(),
                    evaluation.threshold_value.clone(),
                )
                .with_order(order.id),
            )
            .await;
        Ok(())
    }

    async fn record_pair_failure(
        &self,
        strategy: &Strategy,
        cluster_id: i64,
        resource_type: &str,
        evaluation: Option<&BreachEvaluation>,
        error: &ScalingError,
    ) {
        let result = ResultCode::from_error(error);
        error!(
            "策略 {} 集群 {} 资源类型 {} 评估失败 ({}): {}",
            strategy.id, cluster_id, resource_type, result, error
        );
        self.metrics.record_evaluation_failure(result.as_str());
        StructuredLogger::log_strategy_evaluated(
            strategy.id,
            cluster_id,
            resource_type,
            result.as_str(),
            evaluation.map(|e| e.consecutive_days),
        );

        let mut entry = StrategyExecutionHistory::new(strategy.id, result, error.to_string())
            .with_target(cluster_id, resource_type);
        if let Some(evaluation) = evaluation {
            entry = entry.with_values(
                evaluation.triggered_value.clone(),
                evaluation.threshold_value.clone(),
            );
        }
        self.recorder.record(entry).await;
    }

    async fn record_strategy_failure(
        &self,
        strategy: &Strategy,
        context: &str,
        error: &ScalingError,
    ) {
        let result = ResultCode::from_error(error);
        error!("策略 {} {}: {}", strategy.id, context, error);
        self.metrics.record_evaluation_failure(result.as_str());
        self.recorder
            .record(StrategyExecutionHistory::new(
                strategy.id,
                result,
                format!("{context}: {error}"),
            ))
            .await;
    }
}
