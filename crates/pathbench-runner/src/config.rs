use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use pathbench_core::{canonical_json_digest, BenchError, Direction, MapGroupKey, Result};

use crate::artifact::ArtifactFormat;
use crate::exec::ExecPolicy;

pub const CONFIG_TEMPLATE: &str = "\
# Benchmark matrix. Tasks run in the order
# terrain cost > size > instance > algorithm > trial.
sizes:
  - { width: 100, height: 100 }
terrain_costs: [1, 255]
instances_per_size: 2
trials_per_run: 3
algorithms:
  - dijkstra
  - aStar
  - bidir
  - fringe
directions: forward                    # forward | reversed | both
layout:
  workdir: build                       # relative to this file
  generator: ./worldGen                # relative paths below resolve against workdir
  algorithm_dir: .
  worlds_dir: worlds
  results_dir: results
  compiled_dir: compiledResults
  name_prefix: run
execution:
  timeout_seconds: 600                 # omit to wait indefinitely
  poll_interval_ms: 50
artifact_format:
  version: v1
  perf_label: 'time: '
  cost_label: 'Total Cost: '
  tail_window: 5
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeSpec {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionMode {
    #[default]
    Forward,
    Reversed,
    Both,
}

impl DirectionMode {
    pub fn directions(&self) -> &'static [Direction] {
        match self {
            DirectionMode::Forward => &[Direction::Forward],
            DirectionMode::Reversed => &[Direction::Reversed],
            DirectionMode::Both => &[Direction::Forward, Direction::Reversed],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    pub workdir: PathBuf,
    pub generator: PathBuf,
    pub algorithm_dir: PathBuf,
    pub worlds_dir: PathBuf,
    pub results_dir: PathBuf,
    pub compiled_dir: PathBuf,
    pub name_prefix: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            generator: PathBuf::from("./worldGen"),
            algorithm_dir: PathBuf::from("."),
            worlds_dir: PathBuf::from("worlds"),
            results_dir: PathBuf::from("results"),
            compiled_dir: PathBuf::from("compiledResults"),
            name_prefix: "run".to_string(),
        }
    }
}

impl LayoutConfig {
    pub fn resolve(&mut self, base: &Path) {
        self.workdir = anchor(base, &self.workdir);
        let wd = self.workdir.clone();
        for p in [
            &mut self.generator,
            &mut self.algorithm_dir,
            &mut self.worlds_dir,
            &mut self.results_dir,
            &mut self.compiled_dir,
        ] {
            *p = anchor(&wd, p);
        }
    }

    pub fn algorithm_executable(&self, algorithm: &str) -> PathBuf {
        self.algorithm_dir.join(algorithm)
    }
}

fn anchor(base: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    pub timeout_seconds: Option<u64>,
    pub poll_interval_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: None,
            poll_interval_ms: 50,
        }
    }
}

impl ExecutionConfig {
    pub fn policy(&self) -> ExecPolicy {
        ExecPolicy {
            timeout: self.timeout_seconds.map(Duration::from_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchConfig {
    pub sizes: Vec<SizeSpec>,
    pub terrain_costs: Vec<u32>,
    pub instances_per_size: u32,
    pub trials_per_run: u32,
    pub algorithms: Vec<String>,
    #[serde(default)]
    pub directions: DirectionMode,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub artifact_format: ArtifactFormat,
}

impl BenchConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            BenchError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_yaml(&raw)?;
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        config.layout.resolve(base);
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: BenchConfig = serde_yaml::from_str(raw)
            .map_err(|e| BenchError::Config(format!("invalid experiment yaml: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.sizes.is_empty() {
            problems.push("sizes must not be empty".to_string());
        }
        for s in &self.sizes {
            if s.width == 0 || s.height == 0 {
                problems.push(format!("size {}x{} has a zero dimension", s.width, s.height));
            }
        }
        if self.terrain_costs.is_empty() {
            problems.push("terrain_costs must not be empty".to_string());
        }
        if self.instances_per_size == 0 {
            problems.push("instances_per_size must be > 0".to_string());
        }
        if self.trials_per_run == 0 {
            problems.push("trials_per_run must be > 0".to_string());
        }
        if self.algorithms.is_empty() {
            problems.push("algorithms must not be empty".to_string());
        }
        let mut seen = BTreeSet::new();
        for a in &self.algorithms {
            if a.trim().is_empty() || a.contains(['/', '\\']) {
                problems.push(format!("invalid algorithm id {:?}", a));
            } else if !seen.insert(a.as_str()) {
                problems.push(format!("duplicate algorithm id {:?}", a));
            }
        }
        if self.layout.name_prefix.is_empty() {
            problems.push("layout.name_prefix must not be empty".to_string());
        }
        problems.extend(self.artifact_format.problems());
        if problems.is_empty() {
            Ok(())
        } else {
            Err(BenchError::Config(problems.join("; ")))
        }
    }

    pub fn groups(&self) -> Vec<MapGroupKey> {
        let mut out = Vec::new();
        for &cost in &self.terrain_costs {
            for size in &self.sizes {
                out.push(MapGroupKey::new(
                    &self.layout.name_prefix,
                    size.width,
                    size.height,
                    cost,
                ));
            }
        }
        out
    }

    pub fn records_per_instance(&self) -> usize {
        self.trials_per_run as usize * self.directions.directions().len()
    }

    pub fn log_layout(&self) -> Value {
        json!({
            "trials_per_run": self.trials_per_run,
            "directions": self.directions,
        })
    }

    pub fn log_layout_digest(&self) -> String {
        canonical_json_digest(&self.log_layout())
    }
}
