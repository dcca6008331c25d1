//! # 结果聚合器
//!
//! 按到达顺序累积任务结果，批次结束后生成统计与摘要。
//! 生命周期：`new → observe* → finalize`，实例显式传递，无全局状态。
//!
//! ## 依赖关系
//! - 被 `commands/inject.rs` 使用
//! - 使用 `utils/output.rs`, `tabled`

use crate::models::{ErrorKind, Task, TaskResult};
use crate::utils::output;

use std::time::{Duration, Instant};
use tabled::{Table, Tabled};

/// 失败任务记录
#[derive(Debug, Clone)]
pub struct FailedTask {
    pub task: Task,
    pub kind: ErrorKind,
    pub message: String,
}

/// 批次统计（finalize 后只读）
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    pub expected: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// 因中断未执行或被终止的任务
    pub cancelled: usize,
    pub input_bytes: u64,
    pub output_bytes: u64,
    /// 各任务耗时之和（并发下相互重叠）
    pub task_time: Duration,
    /// 批次墙钟跨度
    pub wall_clock: Duration,
    pub failures: Vec<FailedTask>,
    /// 是否已观察到全部预期结果
    pub complete: bool,
}

impl BatchStats {
    /// 吞吐量（字节/秒）= 输出总字节 ÷ 墙钟跨度
    pub fn throughput(&self) -> Option<f64> {
        let secs = self.wall_clock.as_secs_f64();
        (secs > 0.0 && self.output_bytes > 0).then(|| self.output_bytes as f64 / secs)
    }

    /// 成功任务的平均耗时
    pub fn average_task_time(&self) -> Option<Duration> {
        u32::try_from(self.succeeded)
            .ok()
            .filter(|n| *n > 0)
            .map(|n| self.task_time / n)
    }

    pub fn all_succeeded(&self) -> bool {
        self.complete && self.failed == 0 && self.cancelled == 0
    }
}

/// 结果聚合器
#[derive(Debug)]
pub struct Aggregator {
    started: Instant,
    stats: BatchStats,
}

impl Aggregator {
    /// 开始计时，`expected` 为提交的任务数
    pub fn new(expected: usize) -> Self {
        Self {
            started: Instant::now(),
            stats: BatchStats {
                expected,
                ..Default::default()
            },
        }
    }

    /// 记录一个结果，每个结果只能调用一次
    pub fn observe(&mut self, result: &TaskResult) {
        let stats = &mut self.stats;
        stats.attempted += 1;
        stats.task_time += result.duration;
        stats.input_bytes += result.input_bytes;

        if result.success {
            stats.succeeded += 1;
            stats.output_bytes += result.output_bytes;
            return;
        }

        let kind = result.error_kind.unwrap_or(ErrorKind::EngineFailure);
        if kind == ErrorKind::Cancelled {
            stats.cancelled += 1;
        } else {
            stats.failed += 1;
        }
        stats.failures.push(FailedTask {
            task: result.task.clone(),
            kind,
            message: result.message.clone().unwrap_or_default(),
        });
    }

    /// 当前快照；未观察到全部结果时 `complete == false`
    pub fn finalize(&self) -> BatchStats {
        let mut stats = self.stats.clone();
        stats.wall_clock = self.started.elapsed();
        stats.complete = stats.attempted >= stats.expected;
        stats
    }
}

/// 失败表格行
#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Error")]
    kind: String,
    #[tabled(rename = "Message")]
    message: String,
}

/// 输出摘要
pub fn render(stats: &BatchStats) {
    output::print_header("Batch Summary");

    if !stats.complete {
        output::print_warning(&format!(
            "Incomplete: {} of {} results observed",
            stats.attempted, stats.expected
        ));
    }

    output::print_info(&format!("Files:      {}", stats.attempted));
    output::print_success(&format!("Succeeded:  {}", stats.succeeded));
    if stats.failed > 0 {
        output::print_error(&format!("Failed:     {}", stats.failed));
    }
    if stats.cancelled > 0 {
        output::print_skip(&format!("Cancelled:  {}", stats.cancelled));
    }

    if stats.succeeded > 0 {
        output::print_info(&format!("Input size:  {}", format_bytes(stats.input_bytes)));
        output::print_info(&format!("Output size: {}", format_bytes(stats.output_bytes)));
        output::print_info(&format!(
            "Wall clock:  {:.2}s",
            stats.wall_clock.as_secs_f64()
        ));
        if let Some(avg) = stats.average_task_time() {
            output::print_info(&format!("Avg / file:  {:.2}s", avg.as_secs_f64()));
        }
        if let Some(rate) = stats.throughput() {
            output::print_info(&format!("Throughput:  {}/s", format_bytes(rate as u64)));
        }
    }

    if !stats.failures.is_empty() {
        output::print_separator();
        let rows: Vec<FailureRow> = stats
            .failures
            .iter()
            .map(|f| FailureRow {
                file: f.task.source.display().to_string(),
                kind: f.kind.to_string(),
                message: first_line(&f.message),
            })
            .collect();
        println!("{}", Table::new(rows));
    }

    output::print_separator();
}

fn first_line(message: &str) -> String {
    let line = message.lines().next().unwrap_or_default();
    if message.lines().nth(1).is_some() {
        format!("{} ...", line)
    } else {
        line.to_string()
    }
}

/// 人类可读的字节数
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}
