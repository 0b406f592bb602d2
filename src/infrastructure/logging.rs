//! 日志系统配置模块
//! 控制台输出 + 可选的按天轮转文件日志，格式为 text 或 json

use std::path::Path;

use anyhow::Result;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::LoggingConfig;

const LOG_FILE_NAME: &str = "ironmint.log";

/// 初始化日志系统
///
/// 返回的 guard 必须存活到进程退出，否则文件日志的后台写线程会提前结束。
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    // RUST_LOG 优先于配置
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let json = config.format == "json";

    let stdout_layer = if json {
        fmt::layer().json().with_timer(ChronoUtc::rfc_3339()).boxed()
    } else {
        fmt::layer()
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(true)
            .boxed()
    };

    if !config.enable_file_logging {
        Registry::default()
            .with(filter)
            .with(stdout_layer)
            .try_init()?;
        return Ok(None);
    }

    let log_dir = config
        .log_file_path
        .as_deref()
        .and_then(|p| Path::new(p).parent())
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("./logs"));
    std::fs::create_dir_all(log_dir)?;

    let (writer, guard) = non_blocking(rolling::daily(log_dir, LOG_FILE_NAME));
    let file_layer = if json {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_timer(ChronoUtc::rfc_3339())
            .boxed()
    } else {
        fmt::layer()
            .with_writer(writer)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(false)
            .boxed()
    };

    Registry::default()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;

    Ok(Some(guard))
}
