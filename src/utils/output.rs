//! # 美化输出工具
//!
//! 提供统一的终端输出样式，以及单个文件处理结果的状态行。
//!
//! ## 依赖关系
//! - 被 `commands/` 和 `batch/aggregator.rs` 使用
//! - 使用 `colored` crate

use colored::Colorize;

/// 打印成功消息
pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// 打印错误消息
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

/// 打印警告消息
pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// 打印信息消息
pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

/// 打印跳过消息
pub fn print_skip(msg: &str) {
    println!("{} {}", "[SKIP]".dimmed(), msg);
}

/// 打印完成消息
pub fn print_done(msg: &str) {
    println!("{} {}", "[DONE]".green().bold(), msg);
}

/// 单个文件的处理状态
#[derive(Debug, Clone, Copy)]
pub enum TaskStatus<'a> {
    /// 已写入目标文件
    Written {
        destination: &'a str,
        seconds: f64,
        attempts: u32,
    },
    /// 失败，带错误种类与首行消息
    Failed { kind: &'a str, reason: &'a str },
    Cancelled,
}

/// 格式化单个文件的结果行
pub fn format_task(name: &str, status: &TaskStatus<'_>) -> String {
    match *status {
        TaskStatus::Written {
            destination,
            seconds,
            attempts,
        } => {
            let retried = if attempts > 1 {
                format!(" (attempt {})", attempts).yellow().to_string()
            } else {
                String::new()
            };
            format!(
                "{} {} {} {} {}{}",
                "[OK]".green().bold(),
                name.dimmed(),
                "->".cyan(),
                destination,
                format!("{:.2}s", seconds).dimmed(),
                retried
            )
        }
        TaskStatus::Failed { kind, reason } => format!(
            "{} {} {} {}",
            "[ERR]".red().bold(),
            name,
            format!("[{}]", kind).red(),
            reason
        ),
        TaskStatus::Cancelled => format!("{} {} (cancelled)", "[SKIP]".dimmed(), name),
    }
}

/// 打印单个文件的结果；失败写到 stderr
pub fn print_task(name: &str, status: TaskStatus<'_>) {
    let line = format_task(name, &status);
    match status {
        TaskStatus::Failed { .. } => eprintln!("{}", line),
        _ => println!("{}", line),
    }
}

/// 打印键值对
pub fn print_tag(key: &str, value: &str) {
    println!("  {} {}", format!("{}:", key).cyan(), value);
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(60);
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}

/// 打印分隔线
pub fn print_separator() {
    println!("{}", "─".repeat(60).dimmed());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_lines_carry_outcome() {
        let ok = format_task(
            "clip.mp4",
            &TaskStatus::Written {
                destination: "/out/clip_metadata.mp4",
                seconds: 1.5,
                attempts: 2,
            },
        );
        assert!(ok.contains("clip.mp4"));
        assert!(ok.contains("/out/clip_metadata.mp4"));
        assert!(ok.contains("1.50s"));
        assert!(ok.contains("attempt 2"));

        let first_try = format_task(
            "clip.mp4",
            &TaskStatus::Written {
                destination: "/out/x.mp4",
                seconds: 0.1,
                attempts: 1,
            },
        );
        assert!(!first_try.contains("attempt"));

        let failed = format_task(
            "clip.mp4",
            &TaskStatus::Failed {
                kind: "NotFound",
                reason: "no such file",
            },
        );
        assert!(failed.contains("[NotFound]"));
        assert!(failed.contains("no such file"));

        assert!(format_task("clip.mp4", &TaskStatus::Cancelled).contains("cancelled"));
    }
}
