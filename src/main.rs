//! GenForge - 生成式模型编排服务
//!
//! 启动顺序：配置 -> 日志 -> 目录 -> 组件装配 -> 后台 worker -> HTTP 服务器

use std::time::Duration;

use genforge::config::{load_config, print_config};
use genforge::infrastructure::http::HttpServer;
use genforge::Application;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!(
        "{},genforge={},tower_http=debug",
        config.log.level, config.log.level
    );
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));
    if config.log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    tracing::info!("GenForge - 生成式模型编排服务");
    print_config(&config);

    // 装配组件并启动后台 worker，产物目录由存储层创建
    let (app, workers) = Application::with_placeholder_backend(&config)?;
    let worker_handles = workers.spawn();

    let server = HttpServer::new(config.server.clone(), app.state.clone());
    drop(app);

    tracing::info!("Starting HTTP server...");

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    // 服务器退出后 AppState 已释放，等待进行中的任务完成卸载
    worker_handles
        .shutdown(Duration::from_secs(config.worker.shutdown_grace_secs))
        .await;

    tracing::info!("Server shutdown complete");

    Ok(())
}
