pub mod algorithm;
pub mod artifact;
pub mod config;
pub mod control;
pub mod exec;
pub mod harvest;
pub mod plan;
pub mod provision;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use pathbench_analysis::{trial_std, write_group_report, ReportEntry, REPORT_FILE};
use pathbench_core::{
    ensure_dir, BenchError, DataStore, Direction, LogKind, MapGroupKey, MapKey, Result,
    TaskLabel,
};

pub use algorithm::{AlgorithmRunner, RunArtifacts};
pub use artifact::ArtifactFormat;
pub use config::{BenchConfig, DirectionMode, CONFIG_TEMPLATE};
pub use exec::{CommandExecutor, CommandSpec, ExecPolicy, ExitOutcome, ProcessExecutor};
pub use harvest::harvest;
pub use plan::{RunPlan, Task};
pub use provision::{MapArtifact, Provisioned, WorldProvisioner};

#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub group: String,
    pub path: PathBuf,
    pub entries: Vec<ReportEntry>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub maps_generated: usize,
    pub maps_reused: usize,
    pub runs_executed: usize,
    pub runs_skipped: usize,
    pub std_records_appended: usize,
    pub reports: Vec<GroupReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatrixSummary {
    pub groups: Vec<String>,
    pub algorithms: Vec<String>,
    pub instances_per_size: u32,
    pub trials_per_run: u32,
    pub directions: Vec<Direction>,
    pub maps_total: usize,
    pub maps_present: usize,
    pub runs_total: usize,
    pub runs_logged: usize,
    pub log_layout_digest: String,
    pub compiled_dir: PathBuf,
}

/// Executes the whole matrix in plan order, resuming after whatever the logs
/// already hold. The first failing task stops the run; its error names the
/// task and everything appended before it stays valid.
pub fn run_matrix(config: &BenchConfig, executor: &dyn CommandExecutor) -> Result<RunSummary> {
    config.validate()?;
    let plan = RunPlan::new(config);
    let layout = &config.layout;
    ensure_dir(&layout.compiled_dir)?;
    control::check_run_manifest(&layout.compiled_dir, config)?;
    let control = control::RunControlGuard::start(&layout.compiled_dir)?;

    let policy = config.execution.policy();
    let mut pipeline = Pipeline {
        plan: &plan,
        format: &config.artifact_format,
        store: DataStore::new(&layout.compiled_dir),
        provisioner: WorldProvisioner::new(layout, &config.artifact_format, executor, policy),
        runner: AlgorithmRunner::new(layout, &config.artifact_format, executor, policy),
        control,
        current_map: None,
        log_lens: HashMap::new(),
        summary: RunSummary::default(),
    };

    info!(
        groups = plan.groups().len(),
        maps = plan.map_count(),
        runs = plan.run_count(),
        "starting benchmark matrix"
    );
    for task in plan.tasks() {
        pipeline.step(task).map_err(|e| match task.label() {
            Some(label) => e.in_task(label),
            None => e,
        })?;
    }
    pipeline.control.complete()?;
    let summary = pipeline.summary;
    info!(
        executed = summary.runs_executed,
        skipped = summary.runs_skipped,
        generated = summary.maps_generated,
        "benchmark matrix complete"
    );
    Ok(summary)
}

struct Pipeline<'a> {
    plan: &'a RunPlan,
    format: &'a ArtifactFormat,
    store: DataStore,
    provisioner: WorldProvisioner<'a>,
    runner: AlgorithmRunner<'a>,
    control: control::RunControlGuard,
    current_map: Option<MapArtifact>,
    log_lens: HashMap<(String, String, &'static str), usize>,
    summary: RunSummary,
}

impl<'a> Pipeline<'a> {
    fn step(&mut self, task: &Task) -> Result<()> {
        match task {
            Task::Provision { map } => self.provision(map),
            Task::Run {
                algorithm,
                map,
                trial_index,
                direction,
                ordinal,
            } => self.run(algorithm, map, *trial_index, *direction, *ordinal),
            Task::CloseInstance { algorithm, map } => self.close_instance(algorithm, map),
            Task::Report { group } => self.report(group),
        }
    }

    fn provision(&mut self, map: &MapKey) -> Result<()> {
        self.control.set_active(TaskLabel::provision(map))?;
        let provisioned = self.provisioner.provision(map)?;
        if provisioned.generated {
            self.summary.maps_generated += 1;
        } else {
            self.summary.maps_reused += 1;
        }
        self.current_map = Some(provisioned.artifact);
        Ok(())
    }

    fn map_artifact(&mut self, map: &MapKey) -> Result<MapArtifact> {
        match &self.current_map {
            Some(current) if &current.key == map => Ok(current.clone()),
            _ => {
                let provisioned = self.provisioner.provision(map)?;
                self.current_map = Some(provisioned.artifact.clone());
                Ok(provisioned.artifact)
            }
        }
    }

    fn log_len(&mut self, algorithm: &str, group: &MapGroupKey, kind: LogKind) -> Result<usize> {
        let key = (algorithm.to_string(), group.name(), kind.extension());
        if let Some(len) = self.log_lens.get(&key) {
            return Ok(*len);
        }
        let len = self.store.len(algorithm, group, kind)?;
        self.log_lens.insert(key, len);
        Ok(len)
    }

    fn bump_log_len(&mut self, algorithm: &str, group: &MapGroupKey, kind: LogKind) {
        let key = (algorithm.to_string(), group.name(), kind.extension());
        *self.log_lens.entry(key).or_default() += 1;
    }

    fn run(
        &mut self,
        algorithm: &str,
        map: &MapKey,
        trial_index: u32,
        direction: Direction,
        ordinal: usize,
    ) -> Result<()> {
        let group = &map.group;
        let logged = self.log_len(algorithm, group, LogKind::Runs)?;
        if ordinal < logged {
            debug!(algorithm, map = %map, trial = trial_index, "already logged, skipping");
            self.summary.runs_skipped += 1;
            return Ok(());
        }
        if ordinal > logged {
            return Err(BenchError::CorruptLog {
                path: self.store.log_path(algorithm, group, LogKind::Runs),
                line: logged,
                reason: format!(
                    "run #{} is next in plan order but the log holds {} records",
                    ordinal, logged
                ),
            });
        }

        self.control
            .set_active(TaskLabel::run(algorithm, map, trial_index, direction))?;
        let artifact = self.map_artifact(map)?;
        let artifacts = self.runner.run(algorithm, &artifact, direction)?;
        let record = harvest(&artifacts, self.format)?;
        self.store.append(algorithm, group, &record)?;
        self.bump_log_len(algorithm, group, LogKind::Runs);
        self.summary.runs_executed += 1;
        info!(
            algorithm,
            map = %map,
            trial = trial_index,
            direction = %direction,
            perf = record.perf,
            dist = record.dist,
            cost = record.cost,
            "recorded run"
        );
        Ok(())
    }

    fn close_instance(&mut self, algorithm: &str, map: &MapKey) -> Result<()> {
        let group = &map.group;
        let have = self.log_len(algorithm, group, LogKind::TrialStd)?;
        let target = map.instance_index as usize;
        if have > target {
            return Ok(());
        }
        let records = self.store.read_all(algorithm, group)?;
        for instance in have..=target {
            let range = self.plan.instance_range(instance as u32);
            let slice = records
                .get(range.clone())
                .ok_or_else(|| BenchError::CorruptLog {
                    path: self.store.log_path(algorithm, group, LogKind::Runs),
                    line: records.len(),
                    reason: format!(
                        "instance {} needs records {}..{} but the log holds {}",
                        instance,
                        range.start,
                        range.end,
                        records.len()
                    ),
                })?;
            if let Some(std) = trial_std(slice) {
                self.store.append_std(algorithm, group, &std)?;
                self.bump_log_len(algorithm, group, LogKind::TrialStd);
                self.summary.std_records_appended += 1;
            }
        }
        Ok(())
    }

    fn report(&mut self, group: &MapGroupKey) -> Result<()> {
        let entries = write_group_report(&self.store, group, self.plan.algorithms())?;
        self.summary.reports.push(GroupReport {
            group: group.name(),
            path: self.store.group_dir(group).join(REPORT_FILE),
            entries,
        });
        Ok(())
    }
}

pub fn describe_matrix(config: &BenchConfig) -> Result<MatrixSummary> {
    config.validate()?;
    let plan = RunPlan::new(config);
    let store = DataStore::new(&config.layout.compiled_dir);

    let mut maps_present = 0;
    let mut runs_logged = 0;
    for group in plan.groups() {
        for instance in 0..plan.instances_per_size() {
            let map = group.instance(instance);
            if provision::locate(&config.layout, &config.artifact_format, &map).is_complete() {
                maps_present += 1;
            }
        }
        for algorithm in plan.algorithms() {
            let logged = store.len(algorithm, group, LogKind::Runs)?;
            runs_logged += logged.min(plan.records_per_log());
        }
    }

    Ok(MatrixSummary {
        groups: plan.groups().iter().map(|g| g.name()).collect(),
        algorithms: plan.algorithms().to_vec(),
        instances_per_size: config.instances_per_size,
        trials_per_run: config.trials_per_run,
        directions: config.directions.directions().to_vec(),
        maps_total: plan.map_count(),
        maps_present,
        runs_total: plan.run_count(),
        runs_logged,
        log_layout_digest: config.log_layout_digest(),
        compiled_dir: config.layout.compiled_dir.clone(),
    })
}

pub fn regenerate_reports(config: &BenchConfig) -> Result<Vec<GroupReport>> {
    let root = &config.layout.compiled_dir;
    if !root.exists() {
        return Ok(Vec::new());
    }
    let store = DataStore::new(root);
    let prefix = &config.layout.name_prefix;
    let data_ext = LogKind::Runs.extension();

    let mut found: BTreeMap<MapGroupKey, BTreeSet<String>> = BTreeMap::new();
    for entry in WalkDir::new(root).min_depth(2).max_depth(2) {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|e| e.to_str()) != Some(data_ext)
        {
            continue;
        }
        let (Some(algorithm), Some(dir)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.parent()
                .and_then(|p| p.file_name())
                .and_then(|s| s.to_str()),
        ) else {
            continue;
        };
        match MapGroupKey::parse_name(prefix, dir) {
            Some(group) => {
                found.entry(group).or_default().insert(algorithm.to_string());
            }
            None => warn!(dir, "skipping directory that is not a map group"),
        }
    }

    let mut reports = Vec::new();
    for (group, discovered) in found {
        let mut algorithms: Vec<String> = config
            .algorithms
            .iter()
            .filter(|a| discovered.contains(*a))
            .cloned()
            .collect();
        algorithms.extend(
            discovered
                .into_iter()
                .filter(|a| !config.algorithms.contains(a)),
        );
        let entries = write_group_report(&store, &group, &algorithms)?;
        reports.push(GroupReport {
            group: group.name(),
            path: store.group_dir(&group).join(REPORT_FILE),
            entries,
        });
    }
    Ok(reports)
}
