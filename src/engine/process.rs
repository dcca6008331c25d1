//! # 受限子进程执行
//!
//! 以阻塞方式运行外部命令，同时受单任务时限和批次取消信号约束。
//! stdout/stderr 由独立线程读取，避免管道写满导致子进程卡住。
//!
//! ## 依赖关系
//! - 被 `engine/ffmpeg.rs` 使用
//! - 使用 `batch/cancel.rs`

use crate::batch::CancelToken;

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// 轮询子进程状态的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// 单次调用的约束条件
#[derive(Debug, Clone)]
pub struct InvocationControl {
    /// 墙钟时限，`None` 表示不限
    pub timeout: Option<Duration>,
    pub cancel: CancelToken,
}

impl InvocationControl {
    pub fn new(timeout: Option<Duration>, cancel: CancelToken) -> Self {
        Self { timeout, cancel }
    }
}

/// 正常退出的进程输出
#[derive(Debug)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// 子进程的结束方式
#[derive(Debug)]
pub enum Termination {
    Exited(CapturedOutput),
    TimedOut,
    Cancelled,
}

/// 运行命令直到退出、超时或被取消
///
/// 超时或取消时子进程会被杀死并回收。
pub fn run_bounded(mut command: Command, control: &InvocationControl) -> io::Result<Termination> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn()?;
    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let started = Instant::now();
    let verdict = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Ok(status),
            Ok(None) => {
                if control.cancel.is_cancelled() {
                    terminate(&mut child);
                    break Err(Termination::Cancelled);
                }
                if control.timeout.is_some_and(|limit| started.elapsed() >= limit) {
                    terminate(&mut child);
                    break Err(Termination::TimedOut);
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                terminate(&mut child);
                return Err(e);
            }
        }
    };

    let stdout = join_reader(stdout_reader);
    let stderr = join_reader(stderr_reader);

    Ok(match verdict {
        Ok(status) => Termination::Exited(CapturedOutput {
            status,
            stdout,
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        }),
        Err(termination) => termination,
    })
}

fn spawn_reader<R>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

fn terminate(child: &mut Child) {
    let _ = child.kill();
    // 回收僵尸进程
    let _ = child.wait();
}
