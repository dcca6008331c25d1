//! # vidtag - 视频容器元数据批量注入工具
//!
//! 通过外部媒体引擎（ffmpeg/ffprobe）以流拷贝方式重封装视频，
//! 写入容器级标签并回读校验，多文件并行处理。
//!
//! ## 子命令
//! - `inject`      - 向一个或多个视频写入元数据
//! - `read`        - 打印视频的容器标签
//! - `interactive` - 引导式会话（无子命令时默认）
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── batch/    (收集、调度、取消、汇总)
//!   │     ├── engine/   (引擎契约、ffmpeg 实现、适配器)
//!   │     └── models/   (元数据、任务、结果)
//!   ├── utils/      (输出、进度条、日志)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod engine;
mod error;
mod models;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    let log_guard = match utils::logging::init(cli.verbose, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            utils::output::print_error(&format!("{}", e));
            std::process::exit(1);
        }
    };

    let code = match commands::run(cli::command_or_interactive(cli.command)) {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            utils::output::print_error(&format!("{}", e));
            1
        }
    };

    // 退出前释放 guard 以刷新日志文件
    drop(log_guard);
    std::process::exit(code);
}
