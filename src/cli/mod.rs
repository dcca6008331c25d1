//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `inject`: 批量写入元数据
//! - `read`: 读取单个文件的容器标签
//! - `interactive`: 交互式会话（无子命令时的默认行为）
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: inject, read, interactive

pub mod inject;
pub mod interactive;
pub mod read;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// vidtag - 视频容器元数据批量注入工具
#[derive(Parser)]
#[command(name = "vidtag")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(
    about = "Batch-inject container metadata into video files without re-encoding",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbose diagnostics (engine command lines, retries)
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Also write diagnostics to this file
    #[arg(long, global = true, env = "VIDTAG_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Runs the interactive session when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Inject metadata into one or more video files
    Inject(inject::InjectArgs),

    /// Print the container tags of a video file
    Read(read::ReadArgs),

    /// Guided session: choose files, enter fields, confirm
    Interactive(interactive::InteractiveArgs),
}

/// 无子命令时使用的默认参数（仍读取环境变量）
#[derive(Parser)]
#[command(name = "vidtag")]
struct DefaultInteractive {
    #[command(flatten)]
    args: interactive::InteractiveArgs,
}

/// 解析出的子命令；缺省为交互模式
pub fn command_or_interactive(command: Option<Commands>) -> Commands {
    command.unwrap_or_else(|| {
        Commands::Interactive(DefaultInteractive::parse_from(["vidtag"]).args)
    })
}

// ─────────────────────────────────────────────────────────────
// 共享参数组
// ─────────────────────────────────────────────────────────────

/// 外部引擎位置
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// ffmpeg executable
    #[arg(long, env = "VIDTAG_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: String,

    /// ffprobe executable
    #[arg(long, env = "VIDTAG_FFPROBE", default_value = "ffprobe")]
    pub ffprobe: String,
}

/// 批次执行控制
#[derive(Args, Debug, Clone)]
pub struct ExecutionArgs {
    /// Number of parallel workers (default: number of CPUs)
    #[arg(short = 't', long, env = "VIDTAG_THREADS")]
    pub threads: Option<usize>,

    /// Per-file time limit in seconds (0 disables it)
    #[arg(long, env = "VIDTAG_TIMEOUT", default_value_t = 600)]
    pub timeout: u64,

    /// Extra attempts for files whose engine run failed
    #[arg(long, default_value_t = 0)]
    pub retries: u32,

    /// Replace existing output files instead of failing
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,
}
