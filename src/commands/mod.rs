//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `batch/`, `engine/`, `models/`, `utils/`
//! - 子模块: inject, read, interactive

pub mod inject;
pub mod interactive;
pub mod read;

use crate::cli::Commands;
use crate::error::Result;

/// 命令执行结果，决定进程退出码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 全部成功（包括空批次）
    Success,
    /// 至少一个任务失败
    Failed,
    /// 用户中断
    Interrupted,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::Failed => 1,
            Outcome::Interrupted => 130,
        }
    }
}

/// 执行命令
pub fn run(cmd: Commands) -> Result<Outcome> {
    match cmd {
        Commands::Inject(args) => inject::execute(args),
        Commands::Read(args) => read::execute(args),
        Commands::Interactive(args) => interactive::execute(args),
    }
}
