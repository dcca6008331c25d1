//! # 批次取消信号
//!
//! 由中断处理器触发，worker 与进程监视循环轮询。
//!
//! ## 依赖关系
//! - 被 `batch/dispatcher.rs`, `engine/process.rs`, `commands/inject.rs` 使用

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 可克隆的取消令牌，所有克隆共享同一状态
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// 安装 Ctrl-C 处理器，触发本令牌
    pub fn install_interrupt_handler(&self) -> Result<(), ctrlc::Error> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            if !token.is_cancelled() {
                eprintln!("\nInterrupted: finishing up, no new files will be started...");
            }
            token.cancel();
        })
    }
}
