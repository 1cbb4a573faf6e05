use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use pathbench_core::{ensure_dir, BenchError, Direction, Endpoints, MapKey, Result};

use crate::artifact::{parse_endpoints, ArtifactFormat};
use crate::config::LayoutConfig;
use crate::exec::{CommandExecutor, CommandSpec, ExecPolicy, ExitOutcome};
use crate::provision::MapArtifact;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArtifacts {
    pub algorithm: String,
    pub map: MapKey,
    pub direction: Direction,
    pub endpoints: Endpoints,
    pub result_dir: PathBuf,
    pub perf_path: PathBuf,
    pub result_path: PathBuf,
}

pub struct AlgorithmRunner<'a> {
    layout: &'a LayoutConfig,
    format: &'a ArtifactFormat,
    executor: &'a dyn CommandExecutor,
    policy: ExecPolicy,
}

impl<'a> AlgorithmRunner<'a> {
    pub fn new(
        layout: &'a LayoutConfig,
        format: &'a ArtifactFormat,
        executor: &'a dyn CommandExecutor,
        policy: ExecPolicy,
    ) -> Self {
        Self {
            layout,
            format,
            executor,
            policy,
        }
    }

    pub fn result_dir(&self, map: &MapKey, endpoints: &Endpoints) -> PathBuf {
        self.layout.results_dir.join(format!(
            "{}_{}_{}_{}_{}",
            map.name(),
            endpoints.start_x,
            endpoints.start_y,
            endpoints.end_x,
            endpoints.end_y
        ))
    }

    pub fn prepare(
        &self,
        algorithm: &str,
        map: &MapArtifact,
        direction: Direction,
    ) -> Result<(CommandSpec, RunArtifacts)> {
        let stored = parse_endpoints(&map.endpoint_path)?;
        let endpoints = stored.oriented(direction);

        let mut args = vec![map.key.name()];
        if direction == Direction::Reversed {
            args.extend(endpoints.as_args());
        }
        let command = CommandSpec {
            program: self.layout.algorithm_executable(algorithm),
            args,
            cwd: self.layout.workdir.clone(),
        };

        let result_dir = self.result_dir(&map.key, &endpoints);
        let artifacts = RunArtifacts {
            algorithm: algorithm.to_string(),
            map: map.key.clone(),
            direction,
            endpoints,
            perf_path: result_dir.join(format!("{}{}", algorithm, self.format.perf_ext)),
            result_path: result_dir.join(format!("{}{}", algorithm, self.format.result_ext)),
            result_dir,
        };
        Ok((command, artifacts))
    }

    pub fn run(
        &self,
        algorithm: &str,
        map: &MapArtifact,
        direction: Direction,
    ) -> Result<RunArtifacts> {
        let (command, artifacts) = self.prepare(algorithm, map, direction)?;

        ensure_dir(&self.layout.results_dir)?;
        for stale in [&artifacts.perf_path, &artifacts.result_path] {
            if stale.exists() {
                debug!(path = %stale.display(), "removing stale artifact");
                fs::remove_file(stale)?;
            }
        }

        info!(
            algorithm,
            map = %map.key,
            direction = %direction,
            command = %command,
            "running"
        );
        let outcome = self.executor.execute(&command, &self.policy)?;
        if outcome.success() {
            return Ok(artifacts);
        }
        match outcome {
            ExitOutcome::TimedOut(timeout) => Err(BenchError::Timeout {
                program: command.program_name(),
                timeout,
            }),
            other => Err(BenchError::AlgorithmFailed {
                algorithm: algorithm.to_string(),
                status: other.status_label(),
            }),
        }
    }
}
