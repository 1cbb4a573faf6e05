use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::model::TaskLabel;

pub type Result<T> = std::result::Result<T, BenchError>;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("provisioning_failure: map={map}: {reason}")]
    ProvisioningFailure { map: String, reason: String },

    #[error("missing_artifact: {}", path.display())]
    MissingArtifact { path: PathBuf },

    #[error("malformed_artifact: {}: {reason}", path.display())]
    MalformedArtifact { path: PathBuf, reason: String },

    #[error("empty_log: no runs recorded for algorithm={algorithm} group={group}")]
    EmptyLog { algorithm: String, group: String },

    #[error("timeout: {program} still running after {:.3}s", timeout.as_secs_f64())]
    Timeout { program: String, timeout: Duration },

    #[error("algorithm_failed: {algorithm} exited with status {status}")]
    AlgorithmFailed { algorithm: String, status: String },

    #[error(
        "plan_mismatch: existing logs were produced by plan {recorded}, current plan is {current}"
    )]
    PlanMismatch { recorded: String, current: String },

    #[error("corrupt_log: {}:{line}: {reason}", path.display())]
    CorruptLog {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("task_failed: {task}: {source}")]
    TaskFailed {
        task: TaskLabel,
        #[source]
        source: Box<BenchError>,
    },

    #[error("invalid_config: {0}")]
    Config(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BenchError {
    pub fn code(&self) -> &'static str {
        match self {
            BenchError::ProvisioningFailure { .. } => "provisioning_failure",
            BenchError::MissingArtifact { .. } => "missing_artifact",
            BenchError::MalformedArtifact { .. } => "malformed_artifact",
            BenchError::EmptyLog { .. } => "empty_log",
            BenchError::Timeout { .. } => "timeout",
            BenchError::AlgorithmFailed { .. } => "algorithm_failed",
            BenchError::PlanMismatch { .. } => "plan_mismatch",
            BenchError::CorruptLog { .. } => "corrupt_log",
            BenchError::TaskFailed { .. } => "task_failed",
            BenchError::Config(_) => "invalid_config",
            BenchError::Json(_) => "json_error",
            BenchError::Io(_) => "io_error",
        }
    }

    pub fn in_task(self, task: TaskLabel) -> BenchError {
        match self {
            already @ BenchError::TaskFailed { .. } => already,
            other => BenchError::TaskFailed {
                task,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through `TaskFailed`.
    pub fn root(&self) -> &BenchError {
        match self {
            BenchError::TaskFailed { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        BenchError::MalformedArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
