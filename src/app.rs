use std::sync::Arc;

use anyhow::{Context, Result};
use scaler_api::{create_app, AppState};
use scaler_core::config::AppConfig;
use scaler_dispatcher::{
    DeviceMatcher, EvaluatorDependencies, HistoryRecorder, MaintenanceService,
    OrderHandlerRegistry, OrderManager, StrategyEvaluator,
};
use scaler_infrastructure::{
    build_lock, init_metrics, DatabaseManager, HttpDeviceDirectory, MetricsCollector,
};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info};

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 仅运行策略评估器
    Evaluator,
    /// 仅运行API服务器
    Api,
    /// 评估器与API服务器同时运行
    All,
}

impl AppMode {
    pub fn parse(mode: &str, config: &AppConfig) -> Result<Self> {
        match mode {
            "evaluator" => {
                if !config.evaluator.enabled {
                    return Err(anyhow::anyhow!("评估器被禁用，请检查配置"));
                }
                Ok(AppMode::Evaluator)
            }
            "api" => {
                if !config.api.enabled {
                    return Err(anyhow::anyhow!("API模式被禁用，请检查配置"));
                }
                Ok(AppMode::Api)
            }
            "all" => Ok(AppMode::All),
            other => Err(anyhow::anyhow!("不支持的运行模式: {other}")),
        }
    }
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    database: DatabaseManager,
    evaluator: Arc<StrategyEvaluator>,
    api_state: AppState,
}

impl Application {
    /// 连接外部依赖并装配所有组件
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        info!("初始化应用程序，模式: {:?}", mode);

        info!("连接数据库: {}", mask_database_url(&config.database.url));
        let database = DatabaseManager::new(&config.database)
            .await
            .context("连接数据库失败")?;
        if config.database.auto_migrate {
            database.migrate().await.context("运行数据库迁移失败")?;
        }

        let lock = build_lock(&config.lock).await.context("初始化分布式锁失败")?;
        let directory = Arc::new(
            HttpDeviceDirectory::new(&config.device_directory).context("创建设备目录客户端失败")?,
        );

        init_metrics(&config.observability)?;
        let metrics = Arc::new(MetricsCollector::new().context("创建指标收集器失败")?);

        let strategy_repo = database.strategy_repository();
        let history_repo = database.history_repository();
        let order_repo = database.order_repository();

        let recorder = Arc::new(HistoryRecorder::new(history_repo.clone(), metrics.clone()));
        let handlers = Arc::new(OrderHandlerRegistry::with_defaults(
            recorder.clone(),
            order_repo.clone(),
        ));
        let order_manager = Arc::new(OrderManager::new(
            order_repo.clone(),
            handlers,
            metrics.clone(),
        ));
        let matcher = Arc::new(DeviceMatcher::new(
            database.query_template_repository(),
            directory.clone(),
            config.evaluator.device_query_page_size,
        ));

        let evaluator = Arc::new(StrategyEvaluator::new(
            EvaluatorDependencies {
                strategy_repo: strategy_repo.clone(),
                snapshot_repo: database.snapshot_repository(),
                history_repo: history_repo.clone(),
                recorder,
                matcher,
                order_manager: order_manager.clone(),
                lock,
                metrics,
            },
            config.evaluator.clone(),
        ));

        let maintenance_service = Arc::new(MaintenanceService::new(
            order_repo,
            directory,
            order_manager.clone(),
        ));

        let api_state = AppState {
            strategy_repo,
            history_repo,
            order_manager,
            maintenance_service,
        };

        Ok(Self {
            config,
            mode,
            database,
            evaluator,
            api_state,
        })
    }

    /// 运行直到收到关闭信号
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动应用程序，模式: {:?}", self.mode);

        let result = match self.mode {
            AppMode::Evaluator => {
                self.evaluator.run(shutdown_rx).await;
                Ok(())
            }
            AppMode::Api => self.run_api(shutdown_rx).await,
            AppMode::All => self.run_all_components(shutdown_rx).await,
        };

        self.database.close().await;
        result
    }

    async fn run_api(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let address = &self.config.api.bind_address;
        let app = create_app(self.api_state.clone(), &self.config.api);

        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("绑定地址失败: {address}"))?;
        info!("API服务器启动在 http://{}", address);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API服务器收到关闭信号");
            })
            .await
            .context("API服务器运行失败")?;

        info!("API服务器已停止");
        Ok(())
    }

    async fn run_all_components(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动所有组件");

        let evaluator_handle = if self.config.evaluator.enabled {
            let evaluator = Arc::clone(&self.evaluator);
            let shutdown_rx = shutdown_rx.resubscribe();
            Some(tokio::spawn(async move { evaluator.run(shutdown_rx).await }))
        } else {
            None
        };

        if self.config.api.enabled {
            if let Err(e) = self.run_api(shutdown_rx).await {
                error!("API服务器运行失败: {e:#}");
            }
        } else {
            let mut shutdown_rx = shutdown_rx;
            let _ = shutdown_rx.recv().await;
        }

        if let Some(handle) = evaluator_handle {
            if let Err(e) = handle.await {
                error!("策略评估器任务异常退出: {e}");
            }
        }

        info!("所有组件已停止");
        Ok(())
    }
}

/// 屏蔽数据库URL中的密码
fn mask_database_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if !url[..colon_pos].ends_with('/') {
                let mut masked = url.to_string();
                masked.replace_range(colon_pos + 1..at_pos, "***");
                return masked;
            }
        }
    }
    url.to_string()
}
