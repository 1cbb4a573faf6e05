use std::fs;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use pathbench_core::{ensure_dir, BenchError, MapKey, Result};

use crate::artifact::ArtifactFormat;
use crate::config::LayoutConfig;
use crate::exec::{CommandExecutor, CommandSpec, ExecPolicy, ExitOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapArtifact {
    pub key: MapKey,
    pub world_path: PathBuf,
    pub endpoint_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub artifact: MapArtifact,
    pub generated: bool,
}

pub fn locate(layout: &LayoutConfig, format: &ArtifactFormat, map: &MapKey) -> MapArtifact {
    let name = map.name();
    MapArtifact {
        key: map.clone(),
        world_path: layout
            .worlds_dir
            .join(format!("{}{}", name, format.world_ext)),
        endpoint_path: layout
            .worlds_dir
            .join(format!("{}{}", name, format.endpoint_ext)),
    }
}

impl MapArtifact {
    pub fn is_complete(&self) -> bool {
        self.world_path.exists() && self.endpoint_path.exists()
    }
}

pub struct WorldProvisioner<'a> {
    layout: &'a LayoutConfig,
    format: &'a ArtifactFormat,
    executor: &'a dyn CommandExecutor,
    policy: ExecPolicy,
}

impl<'a> WorldProvisioner<'a> {
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

    pub fn artifact_for(&self, map: &MapKey) -> MapArtifact {
        locate(self.layout, self.format, map)
    }

    pub fn generator_command(&self, map: &MapKey) -> CommandSpec {
        CommandSpec {
            program: self.layout.generator.clone(),
            args: vec![
                map.name(),
                map.width().to_string(),
                map.height().to_string(),
                map.terrain_cost().to_string(),
            ],
            cwd: self.layout.workdir.clone(),
        }
    }

    /// Create-if-absent. An existing map is returned untouched; a map whose
    /// world file exists without its descriptor is an integrity failure and
    /// is never regenerated over.
    pub fn provision(&self, map: &MapKey) -> Result<Provisioned> {
        let artifact = self.artifact_for(map);
        let world = artifact.world_path.exists();
        let endpoints = artifact.endpoint_path.exists();
        match (world, endpoints) {
            (true, true) => {
                debug!(map = %map, "map already provisioned");
                return Ok(Provisioned {
                    artifact,
                    generated: false,
                });
            }
            (true, false) | (false, true) => {
                return Err(BenchError::ProvisioningFailure {
                    map: map.name(),
                    reason: format!(
                        "incomplete map artifact: {} exists={}, {} exists={}",
                        artifact.world_path.display(),
                        world,
                        artifact.endpoint_path.display(),
                        endpoints
                    ),
                });
            }
            (false, false) => {}
        }

        ensure_dir(&self.layout.worlds_dir)?;
        let command = self.generator_command(map);
        info!(map = %map, command = %command, "generating map");
        let outcome = self.executor.execute(&command, &self.policy)?;
        if !outcome.success() {
            // Both files were absent before this call, so anything present
            // now is a partial write from the failed generator.
            discard_partial(&artifact)?;
            return Err(match outcome {
                ExitOutcome::TimedOut(timeout) => BenchError::Timeout {
                    program: command.program_name(),
                    timeout,
                },
                other => BenchError::ProvisioningFailure {
                    map: map.name(),
                    reason: format!("generator exited with status {}", other.status_label()),
                },
            });
        }

        for path in [&artifact.world_path, &artifact.endpoint_path] {
            if !path.exists() {
                discard_partial(&artifact)?;
                return Err(BenchError::ProvisioningFailure {
                    map: map.name(),
                    reason: format!(
                        "generator reported success but {} is missing",
                        path.display()
                    ),
                });
            }
        }
        Ok(Provisioned {
            artifact,
            generated: true,
        })
    }
}

fn discard_partial(artifact: &MapArtifact) -> Result<()> {
    for path in [&artifact.world_path, &artifact.endpoint_path] {
        if path.exists() {
            warn!(path = %path.display(), "removing partial map artifact");
            fs::remove_file(path)?;
        }
    }
    Ok(())
}
