//! # 日志初始化
//!
//! 安装 `tracing` 订阅者：stderr 控制台层 + 可选的文件层。
//! `RUST_LOG` 优先；否则 `-v` 为 debug，默认 warn。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `tracing-subscriber`, `tracing-appender`

use crate::error::{Result, VidtagError};

use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// 初始化日志，返回的 guard 必须存活到程序结束以刷新文件
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let default_level = if verbose { "vidtag=debug" } else { "vidtag=warn" };
    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::new(default_level),
    };

    let mut guard = None;
    let file_layer = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            fs::create_dir_all(dir).map_err(|e| VidtagError::FileWriteError {
                path: dir.display().to_string(),
                source: e,
            })?;
            let file_name = path
                .file_name()
                .ok_or_else(|| VidtagError::InvalidArgument(format!(
                    "log file path has no file name: {}",
                    path.display()
                )))?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, worker_guard) = tracing_appender::non_blocking(appender);
            guard = Some(worker_guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_thread_names(true),
            )
        }
        None => None,
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(console::user_attended_stderr())
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| VidtagError::Other(format!("failed to initialise logging: {}", e)))?;

    Ok(guard)
}
