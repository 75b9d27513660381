use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tempfile::TempDir;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

use super::error::{SandboxError, SandboxResult};

pub const DEFAULT_PYTHON: &str = "python3";
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(60);
pub const SNIPPET_FILE_NAME: &str = "snippet.py";
pub const TIMEOUT_STDERR: &str = "TimeoutExpired: process killed";

const SCRATCH_DIR_PREFIX: &str = "agent_py_";
const UNKNOWN_EXIT_CODE: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Plain,
    /// Runs under `pdb`; stdin is closed, so the debugger sees EOF at its first prompt.
    Debug,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ExecutionOutcome {
    /// `exit=..` header followed by both streams, the layout shown to users and the model.
    pub fn render(&self) -> String {
        format!(
            "exit={}\n--- stdout ---\n{}\n--- stderr ---\n{}",
            self.exit_code, self.stdout, self.stderr
        )
    }
}

#[derive(Debug, Clone)]
pub struct SandboxRunner {
    python: PathBuf,
    timeout: Duration,
}

impl Default for SandboxRunner {
    fn default() -> Self {
        Self::new(DEFAULT_PYTHON)
    }
}

enum Scratch {
    Fresh(TempDir),
    Provided(PathBuf),
}

impl Scratch {
    fn path(&self) -> &Path {
        match self {
            Self::Fresh(dir) => dir.path(),
            Self::Provided(path) => path,
        }
    }
}

impl SandboxRunner {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            timeout: DEFAULT_RUN_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Writes `code` to a scratch file and runs it as a separate interpreter process.
    ///
    /// Without `workdir` every call gets its own temporary directory, removed once the
    /// process has been reaped. The process never outlives this call: on timeout it is
    /// killed and the outcome carries [`TIMEOUT_STDERR`] with empty stdout.
    pub async fn run(
        &self,
        code: &str,
        mode: RunMode,
        workdir: Option<&Path>,
    ) -> SandboxResult<ExecutionOutcome> {
        let scratch = match workdir {
            Some(dir) => Scratch::Provided(dir.to_path_buf()),
            None => Scratch::Fresh(
                tempfile::Builder::new()
                    .prefix(SCRATCH_DIR_PREFIX)
                    .tempdir()
                    .map_err(|err| SandboxError::io("create scratch directory", err))?,
            ),
        };
        let dir = scratch.path();
        let script = dir.join(SNIPPET_FILE_NAME);
        fs::write(&script, code).await.map_err(|err| {
            SandboxError::io(format!("write {}", script.display()), err)
        })?;

        let mut command = Command::new(&self.python);
        command.arg("-u");
        if mode == RunMode::Debug {
            command.args(["-m", "pdb"]);
        }
        command
            .arg(&script)
            .current_dir(dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|err| SandboxError::Spawn {
            program: self.python.display().to_string(),
            message: err.to_string(),
        })?;
        drop(child.stdin.take());

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| SandboxError::Internal("child stdout is unavailable".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| SandboxError::Internal("child stderr is unavailable".to_string()))?;

        let stdout_task = tokio::spawn(async move {
            let mut buffer = Vec::new();
            stdout.read_to_end(&mut buffer).await.map(|_| buffer)
        });
        let stderr_task = tokio::spawn(async move {
            let mut buffer = Vec::new();
            stderr.read_to_end(&mut buffer).await.map(|_| buffer)
        });
        let stdout_abort = stdout_task.abort_handle();
        let stderr_abort = stderr_task.abort_handle();

        let finished = timeout(self.timeout, async {
            let status = child
                .wait()
                .await
                .map_err(|err| SandboxError::io("wait for python process", err))?;
            let stdout = join_reader(stdout_task, "stdout").await?;
            let stderr = join_reader(stderr_task, "stderr").await?;
            Ok::<_, SandboxError>((status, stdout, stderr))
        })
        .await;

        match finished {
            Ok(result) => {
                let (status, stdout, stderr) = result?;
                Ok(ExecutionOutcome {
                    exit_code: exit_code_of(status),
                    stdout,
                    stderr,
                    timed_out: false,
                })
            }
            Err(_) => {
                stdout_abort.abort();
                stderr_abort.abort();
                let _ = child.kill().await;
                let exit_code = child
                    .try_wait()
                    .ok()
                    .flatten()
                    .map_or(UNKNOWN_EXIT_CODE, exit_code_of);
                Ok(ExecutionOutcome {
                    exit_code,
                    stdout: String::new(),
                    stderr: TIMEOUT_STDERR.to_string(),
                    timed_out: true,
                })
            }
        }
    }
}

async fn join_reader(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
    stream: &str,
) -> SandboxResult<String> {
    let bytes = task
        .await
        .map_err(|err| SandboxError::Internal(format!("{stream} reader failed: {err}")))?
        .map_err(|err| SandboxError::io(format!("read {stream}"), err))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(unix)]
fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| -signal))
        .unwrap_or(UNKNOWN_EXIT_CODE)
}

#[cfg(not(unix))]
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(UNKNOWN_EXIT_CODE)
}

#[cfg(test)]
mod tests {
    use super::{RunMode, SNIPPET_FILE_NAME, SandboxRunner, TIMEOUT_STDERR};
    use crate::python::SandboxError;
    use std::fs;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn run_prints_and_exits_cleanly() {
        let outcome = SandboxRunner::default()
            .run("print(1+1)", RunMode::Plain, None)
            .await
            .expect("run");

        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.stdout.contains('2'), "stdout: {:?}", outcome.stdout);
        assert!(outcome.stderr.is_empty(), "stderr: {:?}", outcome.stderr);
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn run_reports_real_exit_code_and_stderr() {
        let outcome = SandboxRunner::default()
            .run(
                "import sys\nprint('before')\nsys.stderr.write('oops\\n')\nsys.exit(3)",
                RunMode::Plain,
                None,
            )
            .await
            .expect("run");

        assert_eq!(outcome.exit_code, 3);
        assert_eq!(outcome.stdout, "before\n");
        assert_eq!(outcome.stderr, "oops\n");
    }

    #[tokio::test]
    async fn run_captures_traceback_for_uncaught_exception() {
        let outcome = SandboxRunner::default()
            .run("1 / 0", RunMode::Plain, None)
            .await
            .expect("run");

        assert_eq!(outcome.exit_code, 1);
        assert!(outcome.stderr.contains("ZeroDivisionError"));
    }

    #[tokio::test]
    async fn run_kills_process_after_timeout() {
        let runner = SandboxRunner::default().with_timeout(Duration::from_millis(500));
        let started = Instant::now();
        let outcome = runner
            .run("import time\nprint('hi')\ntime.sleep(30)", RunMode::Plain, None)
            .await
            .expect("run");

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(outcome.timed_out);
        assert_eq!(outcome.stdout, "");
        assert_eq!(outcome.stderr, TIMEOUT_STDERR);
        assert_ne!(outcome.exit_code, 0);
    }

    #[tokio::test]
    async fn each_run_gets_a_fresh_scratch_directory() {
        let runner = SandboxRunner::default();
        let code = "import os\nprint(os.getcwd())";
        let first = runner.run(code, RunMode::Plain, None).await.expect("first");
        let second = runner.run(code, RunMode::Plain, None).await.expect("second");

        assert_ne!(first.stdout.trim(), second.stdout.trim());
        assert!(first.stdout.contains("agent_py_"));
    }

    #[tokio::test]
    async fn run_uses_provided_workdir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outcome = SandboxRunner::default()
            .run(
                "open('out.txt', 'w').write('data')",
                RunMode::Plain,
                Some(dir.path()),
            )
            .await
            .expect("run");

        assert_eq!(outcome.exit_code, 0);
        assert!(dir.path().join(SNIPPET_FILE_NAME).is_file());
        assert_eq!(
            fs::read_to_string(dir.path().join("out.txt")).expect("read out.txt"),
            "data"
        );
    }

    #[tokio::test]
    async fn snippet_is_written_verbatim_before_the_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let code = "print('héllo ✓')\n";
        let outcome = SandboxRunner::default()
            .run(code, RunMode::Plain, Some(dir.path()))
            .await
            .expect("run");

        assert_eq!(outcome.exit_code, 0);
        assert_eq!(
            fs::read_to_string(dir.path().join(SNIPPET_FILE_NAME)).expect("read snippet"),
            code
        );
    }

    #[tokio::test]
    async fn run_fails_when_snippet_cannot_be_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing");
        let err = SandboxRunner::default()
            .run("print(1)", RunMode::Plain, Some(&missing))
            .await
            .expect_err("workdir does not exist");

        assert!(err.to_string().contains(SNIPPET_FILE_NAME));
    }

    #[tokio::test]
    async fn debug_mode_does_not_wait_for_debugger_input() {
        let runner = SandboxRunner::default().with_timeout(Duration::from_secs(20));
        let outcome = runner
            .run("x = 1\nprint(x)", RunMode::Debug, None)
            .await
            .expect("run");

        assert!(!outcome.timed_out);
        assert!(outcome.stdout.contains("(Pdb)"), "stdout: {:?}", outcome.stdout);
    }

    #[tokio::test]
    async fn missing_interpreter_is_a_spawn_error() {
        let err = SandboxRunner::new("definitely-not-a-python-binary")
            .run("print(1)", RunMode::Plain, None)
            .await
            .expect_err("spawn should fail");

        assert!(matches!(err, SandboxError::Spawn { .. }));
        assert!(err.to_string().contains("definitely-not-a-python-binary"));
    }

    #[test]
    fn render_lists_exit_code_and_both_streams() {
        let outcome = super::ExecutionOutcome {
            exit_code: 0,
            stdout: "2\n".to_string(),
            stderr: String::new(),
            timed_out: false,
        };
        assert_eq!(
            outcome.render(),
            "exit=0\n--- stdout ---\n2\n\n--- stderr ---\n"
        );
    }
}
