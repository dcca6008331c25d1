//! # 批量调度器
//!
//! 在固定大小的 worker 池上执行任务，按完成顺序流式返回结果。
//!
//! ## 功能
//! - 专用 rayon 线程池，池大小即同时运行的引擎调用上限
//! - 共享 FIFO 队列，每个任务只会被一个 worker 取走
//! - 结果经 crossbeam 通道按完成顺序返回
//! - 可重试失败的重试策略
//! - 取消后不再启动新任务，队列中剩余任务以 Cancelled 结果返回
//!
//! ## 依赖关系
//! - 被 `commands/inject.rs` 调用
//! - 使用 `rayon`, `crossbeam-channel`

use super::CancelToken;
use crate::models::{Task, TaskResult};

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// 调度器配置
#[derive(Debug, Clone)]
pub struct Dispatcher {
    /// worker 数量
    concurrency: usize,
    /// 可重试失败的额外尝试次数
    retries: u32,
    cancel: CancelToken,
}

impl Dispatcher {
    /// 创建调度器，`concurrency` 至少为 1
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            retries: 0,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// 启动批次，立即返回结果流
    ///
    /// `processor` 对每个任务被同步调用，必须为每次调用返回一个结果。
    pub fn run<F>(&self, tasks: Vec<Task>, processor: F) -> ResultStream
    where
        F: Fn(&Task, &CancelToken) -> TaskResult + Send + Sync + 'static,
    {
        let total = tasks.len();
        let (tx, rx) = unbounded();

        if tasks.is_empty() {
            return ResultStream::new(rx, total, None);
        }

        let workers = self.concurrency.min(total);
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("vidtag-worker-{}", i))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, "failed to build worker pool");
                return ResultStream::new(rx, total, None);
            }
        };

        let queue = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let processor = Arc::new(processor);

        for worker in 0..workers {
            let worker_state = Worker {
                id: worker,
                queue: Arc::clone(&queue),
                tx: tx.clone(),
                cancel: self.cancel.clone(),
                retries: self.retries,
            };
            let processor = Arc::clone(&processor);
            pool.spawn(move || worker_state.drain(processor.as_ref()));
        }

        // 所有 worker 退出后通道自动关闭
        drop(tx);
        ResultStream::new(rx, total, Some(pool))
    }
}

struct Worker {
    id: usize,
    queue: Arc<Mutex<VecDeque<Task>>>,
    tx: Sender<TaskResult>,
    cancel: CancelToken,
    retries: u32,
}

impl Worker {
    fn next_task(&self) -> Option<Task> {
        match self.queue.lock() {
            Ok(mut queue) => queue.pop_front(),
            // 持锁线程 panic 后队列内容仍然有效
            Err(poisoned) => poisoned.into_inner().pop_front(),
        }
    }

    fn drain<F>(&self, processor: &F)
    where
        F: Fn(&Task, &CancelToken) -> TaskResult,
    {
        while let Some(task) = self.next_task() {
            let result = if self.cancel.is_cancelled() {
                TaskResult::cancelled(task)
            } else {
                self.process(&task, processor)
            };

            if self.tx.send(result).is_err() {
                debug!(worker = self.id, "result receiver dropped, stopping");
                return;
            }
        }
    }

    fn process<F>(&self, task: &Task, processor: &F) -> TaskResult
    where
        F: Fn(&Task, &CancelToken) -> TaskResult,
    {
        let mut attempt = 1;
        loop {
            let result = processor(task, &self.cancel);
            let retry = !result.success
                && attempt <= self.retries
                && !self.cancel.is_cancelled()
                && result.error_kind.is_some_and(|k| k.is_retryable());

            if !retry {
                return result.with_attempts(attempt);
            }

            debug!(
                worker = self.id,
                task = task.id,
                attempt,
                "retrying after {}",
                result.message.as_deref().unwrap_or("failure")
            );
            attempt += 1;
        }
    }
}

/// 惰性结果流，按完成顺序产出
pub struct ResultStream {
    rx: Receiver<TaskResult>,
    expected: usize,
    // 线程池须活到所有 worker 结束
    _pool: Option<rayon::ThreadPool>,
}

impl ResultStream {
    fn new(rx: Receiver<TaskResult>, expected: usize, pool: Option<rayon::ThreadPool>) -> Self {
        Self {
            rx,
            expected,
            _pool: pool,
        }
    }

    /// 预期的结果数量（等于提交的任务数）
    pub fn expected(&self) -> usize {
        self.expected
    }
}

impl Iterator for ResultStream {
    type Item = TaskResult;

    fn next(&mut self) -> Option<TaskResult> {
        self.rx.recv().ok()
    }
}
