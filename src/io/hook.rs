use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use wait_timeout::ChildExt;

use crate::model::config::ScmConfig;

/// Error type for commit hook steps. The data operation that preceded the
/// hook has already succeeded when one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("do not know the scm backend {0:?}")]
    UnknownBackend(String),
    #[error("could not run `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("`{command}` failed ({status}): {output}")]
    Failed {
        command: String,
        status: String,
        output: String,
    },
    #[error("`{command}` did not finish within {secs}s")]
    Timeout { command: String, secs: u64 },
}

/// Version-control side effects run after a data operation.
///
/// Paths are relative to the data directory.
pub trait CommitHook {
    fn add(&self, file: &Path) -> Result<(), HookError>;
    fn commit(&self, message: &str) -> Result<(), HookError>;
    /// Record that `old` was renamed to `new`. The file has already been
    /// moved on disk.
    fn rename(&self, old: &Path, new: &Path) -> Result<(), HookError>;
    /// Record that `file` was removed. The file is already gone on disk.
    fn remove(&self, file: &Path) -> Result<(), HookError>;
    fn push(&self) -> Result<(), HookError>;
}

/// Build the hook for a configured backend, rooted at the data directory.
pub fn hook_for(scm: &ScmConfig, datadir: &Path) -> Result<Box<dyn CommitHook>, HookError> {
    match scm.backend.as_str() {
        "git" => Ok(Box::new(GitHook::new(
            datadir,
            Duration::from_secs(scm.timeout_secs),
        ))),
        other => Err(HookError::UnknownBackend(other.to_string())),
    }
}

/// Runs `git` inside the data directory
#[derive(Debug, Clone)]
pub struct GitHook {
    workdir: PathBuf,
    timeout: Duration,
}

impl GitHook {
    pub fn new(workdir: &Path, timeout: Duration) -> Self {
        GitHook {
            workdir: workdir.to_path_buf(),
            timeout,
        }
    }

    fn git(&self, args: &[&str]) -> Result<(), HookError> {
        let mut command = Command::new("git");
        command.args(args).current_dir(&self.workdir);
        tracing::debug!(args = ?args, workdir = %self.workdir.display(), "running git");
        run_with_timeout(command, self.timeout)
    }
}

impl CommitHook for GitHook {
    fn add(&self, file: &Path) -> Result<(), HookError> {
        self.git(&["add", "--", &file.to_string_lossy()])
    }

    fn commit(&self, message: &str) -> Result<(), HookError> {
        self.git(&["commit", "-m", message])
    }

    fn rename(&self, old: &Path, new: &Path) -> Result<(), HookError> {
        self.remove(old)?;
        self.add(new)
    }

    fn remove(&self, file: &Path) -> Result<(), HookError> {
        self.git(&[
            "rm",
            "--cached",
            "--ignore-unmatch",
            "-q",
            "--",
            &file.to_string_lossy(),
        ])
    }

    fn push(&self) -> Result<(), HookError> {
        self.git(&["push"])
    }
}

/// Run a command to completion, killing it once `timeout` has passed.
/// Stdout is discarded. Stderr is read on a separate thread while the
/// child runs and is reported on failure.
pub fn run_with_timeout(mut command: Command, timeout: Duration) -> Result<(), HookError> {
    let display = describe(&command);
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| HookError::Spawn {
            command: display.clone(),
            source,
        })?;

    let stderr = child.stderr.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut output = String::new();
            let _ = pipe.read_to_string(&mut output);
            output
        })
    });

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(HookError::Timeout {
                command: display,
                secs: timeout.as_secs(),
            });
        }
        Err(source) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(HookError::Spawn {
                command: display,
                source,
            });
        }
    };

    // joined only after a normal exit: grandchildren of a killed child can
    // keep the pipe open
    let output = stderr
        .and_then(|reader| reader.join().ok())
        .unwrap_or_default();
    if status.success() {
        return Ok(());
    }
    Err(HookError::Failed {
        command: display,
        status: status.to_string(),
        output: output.trim().to_string(),
    })
}

fn describe(command: &Command) -> String {
    let mut parts = vec![command.get_program().to_string_lossy().to_string()];
    parts.extend(command.get_args().map(|a| a.to_string_lossy().to_string()));
    parts.join(" ")
}
