use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use scaler_core::ScalingError;
use scaler_domain::entities::{
    ConditionLogic, MetricThreshold, Strategy, StrategyStatus, TriggerAction,
};

use crate::{
    error::{ApiError, ApiResult},
    response::{created, success},
    routes::AppState,
};

const DEFAULT_HISTORY_LIMIT: u32 = 50;
const MAX_HISTORY_LIMIT: u32 = 500;

/// 创建或更新策略的请求体，未提供的可选字段沿用默认值或已有值
#[derive(Debug, Deserialize)]
pub struct StrategyRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub trigger_action: TriggerAction,
    #[serde(default)]
    pub cpu: Option<MetricThreshold>,
    #[serde(default)]
    pub memory: Option<MetricThreshold>,
    #[serde(default)]
    pub condition_logic: Option<ConditionLogic>,
    #[serde(default)]
    pub resource_types: Option<String>,
    #[serde(default)]
    pub device_count: Option<i32>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub cooldown_minutes: Option<i64>,
    #[serde(default)]
    pub status: Option<StrategyStatus>,
    pub cluster_ids: Vec<i64>,
    #[serde(default)]
    pub entry_query_template_id: Option<i64>,
    #[serde(default)]
    pub exit_query_template_id: Option<i64>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl StrategyRequest {
    fn into_new_strategy(self) -> Strategy {
        let mut base = Strategy::new(self.name.clone(), self.trigger_action, self.cluster_ids.clone());
        if let Some(created_by) = &self.created_by {
            base.created_by = created_by.clone();
        }
        self.apply_to(base)
    }

    /// 阈值、描述、模板按请求整体替换，数值类字段缺省时保留原值
    fn apply_to(self, mut strategy: Strategy) -> Strategy {
        strategy.name = self.name;
        strategy.description = self.description;
        strategy.trigger_action = self.trigger_action;
        strategy.cpu = self.cpu;
        strategy.memory = self.memory;
        strategy.cluster_ids = self.cluster_ids;
        strategy.entry_query_template_id = self.entry_query_template_id;
        strategy.exit_query_template_id = self.exit_query_template_id;
        if let Some(logic) = self.condition_logic {
            strategy.condition_logic = logic;
        }
        if let Some(resource_types) = self.resource_types {
            strategy.resource_types = resource_types;
        }
        if let Some(device_count) = self.device_count {
            strategy.device_count = device_count;
        }
        if let Some(duration_minutes) = self.duration_minutes {
            strategy.duration_minutes = duration_minutes;
        }
        if let Some(cooldown_minutes) = self.cooldown_minutes {
            strategy.cooldown_minutes = cooldown_minutes;
        }
        if let Some(status) = self.status {
            strategy.status = status;
        }
        strategy
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

pub async fn create_strategy(
    State(state): State<AppState>,
    axum::Json(request): axum::Json<StrategyRequest>,
) -> ApiResult<impl IntoResponse> {
    let strategy = request.into_new_strategy();
    strategy.validate()?;

    let created_strategy = state.strategy_repo.create(&strategy).await?;
    info!(
        strategy_id = created_strategy.id,
        action = %created_strategy.trigger_action,
        "创建策略: {}",
        created_strategy.name
    );
    Ok(created(created_strategy))
}

pub async fn get_strategy(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let strategy = state
        .strategy_repo
        .find_by_id(id)
        .await?
        .ok_or(ScalingError::StrategyNotFound { id })?;
    Ok(success(strategy))
}

pub async fn update_strategy(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    axum::Json(request): axum::Json<StrategyRequest>,
) -> ApiResult<impl IntoResponse> {
    let existing = state
        .strategy_repo
        .find_by_id(id)
        .await?
        .ok_or(ScalingError::StrategyNotFound { id })?;

    let strategy = request.apply_to(existing);
    strategy.validate()?;

    let updated = state.strategy_repo.update(&strategy).await?;
    info!(strategy_id = id, status = %updated.status, "更新策略: {}", updated.name);
    Ok(success(updated))
}

pub async fn get_strategy_history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<HistoryQuery>,
) -> ApiResult<impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit == 0 || limit > MAX_HISTORY_LIMIT {
        return Err(ApiError::BadRequest(format!(
            "limit 必须在1到{MAX_HISTORY_LIMIT}之间"
        )));
    }

    if state.strategy_repo.find_by_id(id).await?.is_none() {
        return Err(ScalingError::StrategyNotFound { id }.into());
    }

    let history = state.history_repo.find_by_strategy(id, limit).await?;
    Ok(success(history))
}
