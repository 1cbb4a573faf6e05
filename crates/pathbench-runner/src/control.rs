use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use pathbench_core::{atomic_write_json_pretty, BenchError, Result, TaskLabel};

use crate::config::BenchConfig;

pub const MANIFEST_FILE: &str = "run_manifest.json";

pub fn run_control_path(compiled_dir: &Path) -> PathBuf {
    compiled_dir.join("runtime").join("run_control.json")
}

pub fn check_run_manifest(compiled_dir: &Path, config: &BenchConfig) -> Result<()> {
    let path = compiled_dir.join(MANIFEST_FILE);
    let current = config.log_layout_digest();
    let now = Utc::now().to_rfc3339();
    let created_at = if path.exists() {
        let existing: Value = serde_json::from_slice(&fs::read(&path)?)?;
        let recorded = existing
            .pointer("/log_layout_digest")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        if recorded != current {
            return Err(BenchError::PlanMismatch { recorded, current });
        }
        existing
            .pointer("/created_at")
            .and_then(|v| v.as_str())
            .unwrap_or(now.as_str())
            .to_string()
    } else {
        info!(path = %path.display(), "starting new result set");
        now.clone()
    };
    let manifest = json!({
        "schema_version": "run_manifest_v1",
        "log_layout": config.log_layout(),
        "log_layout_digest": current,
        "created_at": created_at,
        "updated_at": now,
    });
    atomic_write_json_pretty(&path, &manifest)
}

fn write_run_control(path: &Path, status: &str, active_task: Option<&TaskLabel>) -> Result<()> {
    let payload = json!({
        "schema_version": "run_control_v1",
        "status": status,
        "active_task": active_task.map(|t| json!({
            "label": t.to_string(),
            "algorithm": t.algorithm,
            "map": t.map,
            "trial_index": t.trial_index,
            "direction": t.direction,
        })),
        "updated_at": Utc::now().to_rfc3339(),
    });
    atomic_write_json_pretty(path, &payload)
}

pub(crate) struct RunControlGuard {
    path: PathBuf,
    active: Option<TaskLabel>,
    done: bool,
}

impl RunControlGuard {
    pub(crate) fn start(compiled_dir: &Path) -> Result<Self> {
        let path = run_control_path(compiled_dir);
        write_run_control(&path, "running", None)?;
        Ok(Self {
            path,
            active: None,
            done: false,
        })
    }

    pub(crate) fn set_active(&mut self, task: TaskLabel) -> Result<()> {
        write_run_control(&self.path, "running", Some(&task))?;
        self.active = Some(task);
        Ok(())
    }

    pub(crate) fn complete(&mut self) -> Result<()> {
        write_run_control(&self.path, "completed", None)?;
        self.done = true;
        Ok(())
    }
}

impl Drop for RunControlGuard {
    fn drop(&mut self) {
        if !self.done {
            let _ = write_run_control(&self.path, "failed", self.active.as_ref());
        }
    }
}
