//! # 引擎适配器
//!
//! 把一个任务翻译成一次外部引擎调用，并解释其结果。
//!
//! ## 流程
//! 1. 前置检查：源文件可读、目标冲突策略、创建目标目录
//! 2. 引擎写入目标旁的隐藏部分文件 `.<stem>.partial.<随机串>.<ext>`
//! 3. 回读部分文件的容器标签，确认包含全部请求的键值
//! 4. 校验通过后移动到目标路径（`Fail` 策略下不覆盖已有文件）
//!
//! 部分文件由 `tempfile::TempPath` 持有，任何失败、超时或取消都会在 drop 时删除，
//! 目标路径上只会出现完整输出。
//! 适配器本身从不重试。
//!
//! ## 依赖关系
//! - 被 `commands/inject.rs`, `commands/read.rs` 使用
//! - 使用 `engine::MediaEngine`, `models/`
//! - 使用 `tempfile` 管理部分文件

use super::process::InvocationControl;
use super::{EngineError, MediaEngine, RemuxOutcome, RemuxRequest};
use crate::batch::CancelToken;
use crate::error::{Result, VidtagError};
use crate::models::{ErrorKind, MetadataSet, Task, TaskResult};

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempPath;
use tracing::{debug, warn};

/// 目标文件已存在时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// 报告 DestinationConflict，不动已有文件
    #[default]
    Fail,
    /// 用新输出替换
    Replace,
}

/// 任务到引擎调用的适配器
pub struct EngineAdapter<E> {
    engine: E,
    overwrite: OverwritePolicy,
    /// 单任务墙钟时限（覆盖重封装与回读）
    timeout: Option<Duration>,
}

impl<E: MediaEngine> EngineAdapter<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            overwrite: OverwritePolicy::default(),
            timeout: None,
        }
    }

    pub fn with_overwrite(mut self, overwrite: OverwritePolicy) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// 处理单个任务，总是返回一个结果
    pub fn inject(&self, task: &Task, cancel: &CancelToken) -> TaskResult {
        let started = Instant::now();
        match self.try_inject(task, cancel, started) {
            Ok(output_bytes) => {
                let input_bytes = file_size(&task.source);
                TaskResult::succeeded(task.clone(), started.elapsed(), input_bytes, output_bytes)
            }
            Err((kind, message)) => {
                debug!(source = %task.source.display(), %kind, "task failed");
                TaskResult::failed(task.clone(), kind, started.elapsed(), message)
                    .with_input_bytes(file_size(&task.source))
            }
        }
    }

    fn try_inject(
        &self,
        task: &Task,
        cancel: &CancelToken,
        started: Instant,
    ) -> std::result::Result<u64, (ErrorKind, String)> {
        check_source(&task.source)?;

        if task.destination.exists() && self.overwrite == OverwritePolicy::Fail {
            return Err((
                ErrorKind::DestinationConflict,
                format!("destination exists: {}", task.destination.display()),
            ));
        }

        if let Some(parent) = task.destination.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                (
                    ErrorKind::DestinationConflict,
                    format!("cannot create {}: {}", parent.display(), e),
                )
            })?;
        }

        let partial = create_partial(&task.destination).map_err(|e| {
            (
                ErrorKind::DestinationConflict,
                format!("cannot create output next to {}: {}", task.destination.display(), e),
            )
        })?;

        let tags = task.metadata.to_arguments();
        let request = RemuxRequest {
            source: &task.source,
            destination: &partial,
            tags: &tags,
            overwrite: true,
        };

        let control = self.control(cancel, started)?;
        let outcome = self.engine.remux(&request, &control);
        // SIGINT 也会送达引擎进程，它可能先于轮询以非零码退出
        if outcome != RemuxOutcome::Completed && cancel.is_cancelled() {
            return Err((ErrorKind::Cancelled, "interrupted during remux".to_string()));
        }
        match outcome {
            RemuxOutcome::Completed => {}
            RemuxOutcome::Rejected { stderr } => {
                return Err((ErrorKind::UnsupportedFormat, stderr));
            }
            RemuxOutcome::Failed { code, stderr } => {
                let message = if stderr.is_empty() {
                    format!("engine exited with code {:?}", code)
                } else {
                    stderr
                };
                return Err((ErrorKind::EngineFailure, message));
            }
            RemuxOutcome::TimedOut => return Err(timeout_error(self.timeout)),
            RemuxOutcome::Cancelled => {
                return Err((ErrorKind::Cancelled, "interrupted during remux".to_string()));
            }
        }

        let written = file_size(&partial);
        if written == 0 {
            return Err((
                ErrorKind::VerificationFailure,
                "engine reported success but produced no output".to_string(),
            ));
        }

        // 退出码为 0 不代表标签真的写入，部分容器会静默丢弃
        let control = self.control(cancel, started)?;
        let read_back = match self.engine.introspect(&partial, &control) {
            Ok(tags) => MetadataSet::from_engine_tags(tags),
            Err(e) if e == EngineError::Cancelled || cancel.is_cancelled() => {
                return Err((ErrorKind::Cancelled, "interrupted during read-back".to_string()));
            }
            Err(EngineError::TimedOut) => return Err(timeout_error(self.timeout)),
            Err(e) => {
                return Err((ErrorKind::VerificationFailure, format!("read-back failed: {}", e)));
            }
        };

        let missing = task.metadata.missing_from(&read_back);
        if !missing.is_empty() {
            warn!(
                destination = %task.destination.display(),
                missing = %missing.join(", "),
                "container dropped requested tags"
            );
            return Err((
                ErrorKind::VerificationFailure,
                format!("tags missing after remux: {}", missing.join(", ")),
            ));
        }

        let committed = match self.overwrite {
            OverwritePolicy::Fail => partial.persist_noclobber(&task.destination),
            OverwritePolicy::Replace => partial.persist(&task.destination),
        };
        committed.map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                (
                    ErrorKind::DestinationConflict,
                    format!("destination appeared during processing: {}", task.destination.display()),
                )
            } else {
                (
                    ErrorKind::EngineFailure,
                    format!("cannot move output into place: {}", e.error),
                )
            }
        })?;

        Ok(written)
    }

    /// 剩余时限内的调用约束
    fn control(
        &self,
        cancel: &CancelToken,
        started: Instant,
    ) -> std::result::Result<InvocationControl, (ErrorKind, String)> {
        if cancel.is_cancelled() {
            return Err((ErrorKind::Cancelled, "batch interrupted".to_string()));
        }
        let remaining = match self.timeout {
            Some(limit) => match limit.checked_sub(started.elapsed()) {
                Some(left) if !left.is_zero() => Some(left),
                _ => return Err(timeout_error(self.timeout)),
            },
            None => None,
        };
        Ok(InvocationControl::new(remaining, cancel.clone()))
    }

    /// 读取文件的容器标签
    pub fn read(&self, path: &Path) -> Result<MetadataSet> {
        if !path.is_file() {
            return Err(VidtagError::ReadError {
                path: path.display().to_string(),
                reason: "file does not exist".to_string(),
            });
        }

        let control = InvocationControl::new(self.timeout, CancelToken::new());
        match self.engine.introspect(path, &control) {
            Ok(tags) => Ok(MetadataSet::from_engine_tags(tags)),
            Err(EngineError::Spawn { command, .. }) => Err(VidtagError::CommandNotFound { command }),
            Err(e) => Err(VidtagError::ReadError {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

fn check_source(source: &Path) -> std::result::Result<(), (ErrorKind, String)> {
    let not_found = |reason: String| (ErrorKind::NotFound, reason);
    let meta = fs::metadata(source)
        .map_err(|e| not_found(format!("{}: {}", source.display(), e)))?;
    if !meta.is_file() {
        return Err(not_found(format!("not a regular file: {}", source.display())));
    }
    File::open(source).map_err(|e| not_found(format!("unreadable {}: {}", source.display(), e)))?;
    Ok(())
}

fn timeout_error(limit: Option<Duration>) -> (ErrorKind, String) {
    let message = match limit {
        Some(limit) => format!("exceeded time limit of {:.1}s", limit.as_secs_f64()),
        None => "exceeded time limit".to_string(),
    };
    (ErrorKind::Timeout, message)
}

fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// 部分文件名的前缀与后缀，保留扩展名以便引擎选择同一种容器
pub fn partial_affixes(destination: &Path) -> (String, String) {
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let suffix = destination
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    (format!(".{}.partial.", stem), suffix)
}

/// 在目标目录中创建空的部分文件，drop 时自动删除
fn create_partial(destination: &Path) -> io::Result<TempPath> {
    let (prefix, suffix) = partial_affixes(destination);
    let dir = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok(tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(&suffix)
        .tempfile_in(dir)?
        .into_temp_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeEngine;
    use crate::models::{plan_tasks, OutputNaming, TaskSpec};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup(tokens: &[&str]) -> (TempDir, Task) {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("clip.mp4");
        fs::write(&source, b"payload bytes").unwrap();
        let metadata = Arc::new(MetadataSet::build(tokens).unwrap());
        let task = plan_tasks(vec![TaskSpec::new(&source)], metadata, &OutputNaming::default())
            .unwrap()
            .remove(0);
        (dir, task)
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n.contains(".partial"))
            .collect()
    }

    #[test]
    fn test_round_trip_read_back() {
        let (dir, task) = setup(&["title=A", "artist=B"]);
        let adapter = EngineAdapter::new(FakeEngine::default());

        let result = adapter.inject(&task, &CancelToken::new());
        assert!(result.success, "{:?}", result.message);
        assert!(result.output_bytes > 0);
        assert_eq!(result.input_bytes, 13);

        let tags = adapter.read(&task.destination).unwrap();
        assert_eq!(tags.get("title"), Some("A"));
        assert_eq!(tags.get("artist"), Some("B"));
        assert_eq!(fs::read(&task.source).unwrap(), b"payload bytes");
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_escaped_values_round_trip() {
        let (_dir, task) = setup(&["description=say \"hi\""]);
        let adapter = EngineAdapter::new(FakeEngine::default());
        assert!(adapter.inject(&task, &CancelToken::new()).success);
        let tags = adapter.read(&task.destination).unwrap();
        assert_eq!(tags.get("description"), Some("say \"hi\""));
    }

    #[test]
    fn test_replace_is_idempotent() {
        let (_dir, task) = setup(&["title=A", "artist=B"]);
        let adapter =
            EngineAdapter::new(FakeEngine::default()).with_overwrite(OverwritePolicy::Replace);

        assert!(adapter.inject(&task, &CancelToken::new()).success);
        let first = adapter.read(&task.destination).unwrap();
        assert!(adapter.inject(&task, &CancelToken::new()).success);
        let second = adapter.read(&task.destination).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_source() {
        let (dir, mut task) = setup(&["title=A"]);
        task.source = dir.path().join("nope.mp4");
        let result = EngineAdapter::new(FakeEngine::default()).inject(&task, &CancelToken::new());
        assert_eq!(result.error_kind, Some(ErrorKind::NotFound));
        assert!(!task.destination.exists());
    }

    #[test]
    fn test_destination_conflict_leaves_file_alone() {
        let (_dir, task) = setup(&["title=A"]);
        fs::write(&task.destination, b"keep me").unwrap();

        let engine = FakeEngine::default();
        let adapter = EngineAdapter::new(engine);
        let result = adapter.inject(&task, &CancelToken::new());

        assert_eq!(result.error_kind, Some(ErrorKind::DestinationConflict));
        assert_eq!(fs::read(&task.destination).unwrap(), b"keep me");
        assert_eq!(adapter.engine().calls(), 0);
    }

    #[test]
    fn test_dropped_tags_fail_verification() {
        let (dir, task) = setup(&["title=A"]);
        let engine = FakeEngine {
            drop_tags: true,
            ..Default::default()
        };
        let result = EngineAdapter::new(engine).inject(&task, &CancelToken::new());

        assert_eq!(result.error_kind, Some(ErrorKind::VerificationFailure));
        assert!(result.message.unwrap().contains("title"));
        assert!(!task.destination.exists());
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_engine_outcomes_map_to_kinds() {
        let cases = [
            (
                RemuxOutcome::Failed {
                    code: Some(1),
                    stderr: "Conversion failed!".to_string(),
                },
                ErrorKind::EngineFailure,
            ),
            (RemuxOutcome::TimedOut, ErrorKind::Timeout),
            (RemuxOutcome::Cancelled, ErrorKind::Cancelled),
        ];

        for (outcome, kind) in cases {
            let (dir, task) = setup(&["title=A"]);
            let engine = FakeEngine {
                outcome: Some(outcome),
                ..Default::default()
            };
            let result = EngineAdapter::new(engine).inject(&task, &CancelToken::new());
            assert_eq!(result.error_kind, Some(kind));
            assert!(!task.destination.exists());
            assert!(leftovers(dir.path()).is_empty());
        }
    }

    #[test]
    fn test_engine_failure_carries_stderr() {
        let (_dir, task) = setup(&["title=A"]);
        let engine = FakeEngine {
            fail_first: 1,
            ..Default::default()
        };
        let result = EngineAdapter::new(engine).inject(&task, &CancelToken::new());
        assert_eq!(result.error_kind, Some(ErrorKind::EngineFailure));
        assert_eq!(result.message.as_deref(), Some("transient failure"));
    }

    #[test]
    fn test_unsupported_container() {
        let (_dir, task) = setup(&["title=A"]);
        fs::write(&task.source, b"BAD header").unwrap();
        let result = EngineAdapter::new(FakeEngine::default()).inject(&task, &CancelToken::new());
        assert_eq!(result.error_kind, Some(ErrorKind::UnsupportedFormat));
    }

    #[test]
    fn test_creates_output_directory() {
        let (dir, mut task) = setup(&["title=A"]);
        task.destination = dir.path().join("nested/out/clip.mp4");
        let result = EngineAdapter::new(FakeEngine::default()).inject(&task, &CancelToken::new());
        assert!(result.success);
        assert!(task.destination.is_file());
    }

    #[test]
    fn test_read_missing_file() {
        let adapter = EngineAdapter::new(FakeEngine::default());
        assert!(matches!(
            adapter.read(Path::new("/definitely/not/here.mkv")),
            Err(VidtagError::ReadError { .. })
        ));
    }

    #[test]
    fn test_partial_affixes_keep_extension() {
        let (prefix, suffix) = partial_affixes(Path::new("/out/clip_metadata.mkv"));
        assert_eq!(prefix, ".clip_metadata.partial.");
        assert_eq!(suffix, ".mkv");

        let dir = tempfile::tempdir().unwrap();
        let partial = create_partial(&dir.path().join("clip_metadata.mkv")).unwrap();
        let name = partial.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(".clip_metadata.partial."));
        assert!(name.ends_with(".mkv"));
        assert!(partial.exists());

        let path = partial.to_path_buf();
        drop(partial);
        assert!(!path.exists());
    }

    /// 回读结束后另一个进程抢先写入了目标文件
    struct RacingEngine {
        inner: FakeEngine,
        destination: PathBuf,
    }

    impl MediaEngine for RacingEngine {
        fn remux(&self, request: &RemuxRequest<'_>, control: &InvocationControl) -> RemuxOutcome {
            self.inner.remux(request, control)
        }

        fn introspect(
            &self,
            path: &Path,
            control: &InvocationControl,
        ) -> std::result::Result<Vec<(String, String)>, EngineError> {
            let tags = self.inner.introspect(path, control);
            fs::write(&self.destination, b"written elsewhere").unwrap();
            tags
        }
    }

    #[test]
    fn test_late_destination_is_never_clobbered() {
        let (dir, task) = setup(&["title=A"]);
        let engine = RacingEngine {
            inner: FakeEngine::default(),
            destination: task.destination.clone(),
        };
        let result = EngineAdapter::new(engine).inject(&task, &CancelToken::new());

        assert_eq!(result.error_kind, Some(ErrorKind::DestinationConflict));
        assert_eq!(fs::read(&task.destination).unwrap(), b"written elsewhere");
        assert!(leftovers(dir.path()).is_empty());
    }

    /// 收到 SIGINT 的引擎：先于轮询自行退出
    struct SignalledEngine;

    impl MediaEngine for SignalledEngine {
        fn remux(&self, _request: &RemuxRequest<'_>, control: &InvocationControl) -> RemuxOutcome {
            control.cancel.cancel();
            RemuxOutcome::Failed {
                code: Some(255),
                stderr: "Exiting normally, received signal 2.".to_string(),
            }
        }

        fn introspect(
            &self,
            _path: &Path,
            _control: &InvocationControl,
        ) -> std::result::Result<Vec<(String, String)>, EngineError> {
            Err(EngineError::Unreadable {
                reason: "not reached".to_string(),
            })
        }
    }

    #[test]
    fn test_engine_exit_after_interrupt_is_cancelled() {
        let (dir, task) = setup(&["title=A"]);
        let cancel = CancelToken::new();
        let result = EngineAdapter::new(SignalledEngine).inject(&task, &cancel);

        assert!(cancel.is_cancelled());
        assert_eq!(result.error_kind, Some(ErrorKind::Cancelled));
        assert!(!task.destination.exists());
        assert!(leftovers(dir.path()).is_empty());
    }
}
