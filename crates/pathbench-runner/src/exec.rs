use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use pathbench_core::{BenchError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl CommandSpec {
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec![self.program.to_string_lossy().to_string()];
        parts.extend(self.args.iter().cloned());
        f.write_str(&shell_join(&parts))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Exited(i32),
    Signaled,
    TimedOut(Duration),
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ExitOutcome::Exited(0))
    }

    pub fn status_label(&self) -> String {
        match self {
            ExitOutcome::Exited(code) => code.to_string(),
            ExitOutcome::Signaled => "signal".to_string(),
            ExitOutcome::TimedOut(_) => "timeout".to_string(),
        }
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => ExitOutcome::Exited(code),
            None => ExitOutcome::Signaled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecPolicy {
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl Default for ExecPolicy {
    fn default() -> Self {
        Self {
            timeout: None,
            poll_interval: Duration::from_millis(50),
        }
    }
}

pub trait CommandExecutor {
    fn execute(&self, command: &CommandSpec, policy: &ExecPolicy) -> Result<ExitOutcome>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl CommandExecutor for ProcessExecutor {
    fn execute(&self, command: &CommandSpec, policy: &ExecPolicy) -> Result<ExitOutcome> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        cmd.current_dir(&command.cwd);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::from(io::stderr()));
        cmd.stderr(Stdio::inherit());

        debug!(command = %command, cwd = %command.cwd.display(), "spawning");
        let mut child = cmd.spawn().map_err(|e| {
            BenchError::Io(io::Error::new(
                e.kind(),
                format!("failed to spawn {}: {}", command.program.display(), e),
            ))
        })?;

        let Some(timeout) = policy.timeout else {
            return Ok(child.wait()?.into());
        };
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status.into());
            }
            if Instant::now() >= deadline {
                warn!(
                    command = %command,
                    timeout_s = timeout.as_secs_f64(),
                    "killing process after timeout"
                );
                let _ = child.kill();
                let _ = child.wait();
                return Ok(ExitOutcome::TimedOut(timeout));
            }
            thread::sleep(policy.poll_interval);
        }
    }
}

pub(crate) fn shell_join(parts: &[String]) -> String {
    parts
        .iter()
        .map(|p| shell_quote(p))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        "''".to_string()
    } else if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./:".contains(c))
    {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\"'\"'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_only_when_needed() {
        let spec = CommandSpec {
            program: PathBuf::from("./worldGen"),
            args: vec!["run_10x10_1_0".to_string(), "my map".to_string(), "it's".to_string()],
            cwd: PathBuf::from("."),
        };
        assert_eq!(
            spec.to_string(),
            "./worldGen run_10x10_1_0 'my map' 'it'\"'\"'s'"
        );
        assert_eq!(spec.program_name(), "worldGen");
    }

    #[test]
    fn only_zero_exit_is_success() {
        assert!(ExitOutcome::Exited(0).success());
        assert!(!ExitOutcome::Exited(1).success());
        assert!(!ExitOutcome::Signaled.success());
        assert!(!ExitOutcome::TimedOut(Duration::from_secs(1)).success());
        assert_eq!(ExitOutcome::Exited(3).status_label(), "3");
    }

    #[cfg(unix)]
    #[test]
    fn process_executor_reports_exit_code() {
        let spec = CommandSpec {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), "exit 3".to_string()],
            cwd: std::env::temp_dir(),
        };
        let outcome = ProcessExecutor
            .execute(&spec, &ExecPolicy::default())
            .expect("execute");
        assert_eq!(outcome, ExitOutcome::Exited(3));
    }

    #[cfg(unix)]
    #[test]
    fn process_executor_kills_after_timeout() {
        let spec = CommandSpec {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), "sleep 5".to_string()],
            cwd: std::env::temp_dir(),
        };
        let policy = ExecPolicy {
            timeout: Some(Duration::from_millis(100)),
            poll_interval: Duration::from_millis(10),
        };
        let started = Instant::now();
        let outcome = ProcessExecutor.execute(&spec, &policy).expect("execute");
        assert_eq!(outcome, ExitOutcome::TimedOut(Duration::from_millis(100)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_program_is_an_io_error() {
        let spec = CommandSpec {
            program: PathBuf::from("/definitely/not/here/pathbench-missing"),
            args: vec![],
            cwd: std::env::temp_dir(),
        };
        let err = ProcessExecutor
            .execute(&spec, &ExecPolicy::default())
            .expect_err("spawn must fail");
        assert_eq!(err.code(), "io_error");
        assert!(err.to_string().contains("failed to spawn"));
    }
}
