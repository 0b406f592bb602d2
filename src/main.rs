//! IronMint 主入口

use std::sync::Arc;

use anyhow::{Context, Result};
use ironmint::{api, app_state::AppState, config::Config, infrastructure::logging};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载环境变量
    dotenvy::dotenv().ok();

    // 2. 加载配置：默认值 → 环境变量 → CONFIG_PATH 指向的 TOML
    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())?;
    config.validate().context("Invalid configuration")?;

    // 3. 初始化日志；guard 需存活到进程结束，否则文件日志丢失
    let _log_guard = logging::init_logging(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config_path = config_path.as_deref().unwrap_or("-"),
        "starting ironmint"
    );

    tokio::fs::create_dir_all(&config.storage.data_dir)
        .await
        .with_context(|| format!("Failed to create data dir {}", config.storage.data_dir))?;

    let bind_addr = config.server.bind_addr.clone();
    let state = Arc::new(AppState::new(config)?);
    let app = api::routes(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    tracing::info!("server listening on http://{}", bind_addr);
    tracing::info!("swagger ui: http://{}/docs", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
}
