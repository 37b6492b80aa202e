use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use scaler_core::config::{AppConfig, LogFormat};
use scaler_infrastructure::init_logging;
use tracing::{error, info, warn};

mod app;
mod shutdown;

use app::{AppMode, Application};
use shutdown::{wait_for_shutdown_signal, ShutdownManager};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// 算力资源池弹性伸缩调度服务
#[derive(Debug, Parser)]
#[command(name = "fleet-scaler", version, about = "算力资源池弹性伸缩调度服务")]
struct Cli {
    /// 配置文件路径，未指定时按默认路径查找
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// 运行模式
    #[arg(
        short,
        long,
        value_name = "MODE",
        value_parser = ["evaluator", "api", "all"],
        default_value = "all"
    )]
    mode: String,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// 日志格式，覆盖配置文件
    #[arg(long, value_name = "FORMAT", value_parser = ["json", "pretty"])]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("加载配置文件失败: {path}"),
        None => "加载配置失败".to_string(),
    })?;

    let log_level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.observability.log_level)
        .to_string();
    let log_format = match cli.log_format.as_deref() {
        Some("json") => LogFormat::Json,
        Some(_) => LogFormat::Pretty,
        None => config.observability.log_format,
    };
    init_logging(&log_level, log_format)?;

    info!("启动弹性伸缩调度服务");
    info!("运行模式: {}", cli.mode);

    let app_mode = AppMode::parse(&cli.mode, &config)?;
    let app = Arc::new(Application::new(config, app_mode).await?);

    let shutdown_manager = ShutdownManager::new();
    let shutdown_rx = shutdown_manager.subscribe().await;
    let app_handle = {
        let app = Arc::clone(&app);
        tokio::spawn(async move {
            if let Err(e) = app.run(shutdown_rx).await {
                error!("应用运行失败: {e:#}");
            }
        })
    };

    if let Err(e) = wait_for_shutdown_signal().await {
        error!("监听关闭信号失败: {e}");
    }
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, app_handle).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    info!("弹性伸缩调度服务已退出");
    Ok(())
}
