use std::fmt::Write as _;

use serde::Serialize;
use tracing::info;

use pathbench_core::{
    atomic_write_bytes, AggregateStats, BenchError, DataStore, MapGroupKey, Result, RunRecord,
    TrialStdRecord,
};

pub const REPORT_FILE: &str = "stats.txt";

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation dividing by N, not N - 1.
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

pub fn trial_std(records: &[RunRecord]) -> Option<TrialStdRecord> {
    let (perf, dist, cost) = columns(records);
    Some(TrialStdRecord {
        std_perf: population_std(&perf)?,
        std_dist: population_std(&dist)?,
        std_cost: population_std(&cost)?,
    })
}

fn columns(records: &[RunRecord]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let perf = records.iter().map(|r| r.perf as f64).collect();
    let dist = records.iter().map(|r| r.dist as f64).collect();
    let cost = records.iter().map(|r| r.cost as f64).collect();
    (perf, dist, cost)
}

pub fn reduce(store: &DataStore, algorithm: &str, group: &MapGroupKey) -> Result<AggregateStats> {
    let records = store.read_all(algorithm, group)?;
    let (perf, dist, cost) = columns(&records);
    let empty = || BenchError::EmptyLog {
        algorithm: algorithm.to_string(),
        group: group.name(),
    };
    let mean_perf = mean(&perf).ok_or_else(empty)?;
    let mean_dist = mean(&dist).ok_or_else(empty)?;
    let mean_cost = mean(&cost).ok_or_else(empty)?;

    let stds = store.read_std(algorithm, group)?;
    let std_perf: Vec<f64> = stds.iter().map(|s| s.std_perf).collect();
    let std_dist: Vec<f64> = stds.iter().map(|s| s.std_dist).collect();
    let std_cost: Vec<f64> = stds.iter().map(|s| s.std_cost).collect();
    let mean_std = match (mean(&std_perf), mean(&std_dist), mean(&std_cost)) {
        (Some(std_perf), Some(std_dist), Some(std_cost)) => Some(TrialStdRecord {
            std_perf,
            std_dist,
            std_cost,
        }),
        _ => None,
    };

    Ok(AggregateStats {
        algorithm: algorithm.to_string(),
        group: group.name(),
        mean_perf,
        mean_dist,
        mean_cost,
        mean_std,
        run_count: records.len(),
        instance_count: stds.len(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportEntry {
    Recorded(AggregateStats),
    Empty { algorithm: String },
}

impl ReportEntry {
    pub fn algorithm(&self) -> &str {
        match self {
            ReportEntry::Recorded(stats) => &stats.algorithm,
            ReportEntry::Empty { algorithm } => algorithm,
        }
    }
}

pub fn collect_group(
    store: &DataStore,
    group: &MapGroupKey,
    algorithms: &[String],
) -> Result<Vec<ReportEntry>> {
    algorithms
        .iter()
        .map(|algorithm| match reduce(store, algorithm, group) {
            Ok(stats) => Ok(ReportEntry::Recorded(stats)),
            Err(BenchError::EmptyLog { .. }) => Ok(ReportEntry::Empty {
                algorithm: algorithm.clone(),
            }),
            Err(e) => Err(e),
        })
        .collect()
}

pub fn render_group_report(entries: &[ReportEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let algorithm = entry.algorithm();
        let _ = writeln!(out, "{}", algorithm);
        let _ = writeln!(out, "{}", "-".repeat(algorithm.len()));
        match entry {
            ReportEntry::Empty { .. } => {
                let _ = writeln!(out, "no runs recorded");
            }
            ReportEntry::Recorded(stats) => {
                let _ = writeln!(out, "Average execution: {}", stats.mean_perf);
                let _ = writeln!(out, "Average distance: {}", stats.mean_dist);
                let _ = writeln!(out, "Average path cost: {}", stats.mean_cost);
                let spread = |f: fn(&TrialStdRecord) -> f64| {
                    stats
                        .mean_std
                        .as_ref()
                        .map(|s| f(s).to_string())
                        .unwrap_or_else(|| "n/a".to_string())
                };
                let _ = writeln!(out, "Average execution std: {}", spread(|s| s.std_perf));
                let _ = writeln!(out, "Average distance std: {}", spread(|s| s.std_dist));
                let _ = writeln!(out, "Average path cost std: {}", spread(|s| s.std_cost));
                let _ = writeln!(out, "Runs: {}", stats.run_count);
                let _ = writeln!(out, "Instances: {}", stats.instance_count);
            }
        }
        out.push('\n');
    }
    out
}

pub fn write_group_report(
    store: &DataStore,
    group: &MapGroupKey,
    algorithms: &[String],
) -> Result<Vec<ReportEntry>> {
    let entries = collect_group(store, group, algorithms)?;
    let path = store.group_dir(group).join(REPORT_FILE);
    atomic_write_bytes(&path, render_group_report(&entries).as_bytes())?;
    info!(group = %group, path = %path.display(), "wrote report");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::fs;
    use std::path::PathBuf;

    fn temp_store(tag: &str) -> (PathBuf, DataStore) {
        let root = std::env::temp_dir().join(format!(
            "pathbench_analysis_{}_{}_{}",
            tag,
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        fs::create_dir_all(&root).expect("temp root");
        let store = DataStore::new(&root);
        (root, store)
    }

    fn rec(perf: u64, dist: u64, cost: u64) -> RunRecord {
        RunRecord { perf, dist, cost }
    }

    #[test]
    fn population_std_divides_by_n() {
        assert_eq!(population_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), Some(2.0));
        assert_eq!(population_std(&[3.0]), Some(0.0));
        assert_eq!(population_std(&[]), None);
    }

    #[test]
    fn trial_std_covers_each_column() {
        let std = trial_std(&[rec(10, 5, 100), rec(14, 5, 104)]).expect("std");
        assert_eq!(std.std_perf, 2.0);
        assert_eq!(std.std_dist, 0.0);
        assert_eq!(std.std_cost, 2.0);
        assert!(trial_std(&[]).is_none());
    }

    #[test]
    fn reduce_means_match_arithmetic_mean() {
        let (root, store) = temp_store("mean");
        let group = MapGroupKey::new("run", 10, 10, 1);
        let perfs = [3u64, 7, 8, 10];
        for p in perfs {
            store.append("dijkstra", &group, &rec(p, 20, 30 + p)).expect("append");
        }
        store
            .append_std("dijkstra", &group, &TrialStdRecord { std_perf: 2.0, std_dist: 0.0, std_cost: 2.0 })
            .expect("std");
        store
            .append_std("dijkstra", &group, &TrialStdRecord { std_perf: 1.0, std_dist: 0.0, std_cost: 1.0 })
            .expect("std");

        let stats = reduce(&store, "dijkstra", &group).expect("reduce");
        assert_eq!(stats.mean_perf, 7.0);
        assert_eq!(stats.mean_dist, 20.0);
        assert_eq!(stats.mean_cost, 37.0);
        assert_eq!(stats.run_count, 4);
        assert_eq!(stats.instance_count, 2);
        let spread = stats.mean_std.expect("mean std");
        assert_eq!(spread.std_perf, 1.5);
        assert_eq!(spread.std_cost, 1.5);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn reduce_rejects_empty_log() {
        let (root, store) = temp_store("empty");
        let group = MapGroupKey::new("run", 10, 10, 1);
        match reduce(&store, "aStar", &group).expect_err("empty log must fail") {
            BenchError::EmptyLog { algorithm, group } => {
                assert_eq!(algorithm, "aStar");
                assert_eq!(group, "run_10x10_1");
            }
            other => panic!("unexpected error: {}", other),
        }
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn report_lists_every_algorithm_and_leaves_logs_untouched() {
        let (root, store) = temp_store("report");
        let group = MapGroupKey::new("run", 10, 10, 255);
        store.append("dijkstra", &group, &rec(5, 40, 812)).expect("append");
        store.append("dijkstra", &group, &rec(7, 40, 812)).expect("append");
        let log_path = store.log_path("dijkstra", &group, pathbench_core::LogKind::Runs);
        let before = fs::read(&log_path).expect("log");

        let algorithms = vec!["dijkstra".to_string(), "aStar".to_string()];
        let first = write_group_report(&store, &group, &algorithms).expect("report");
        let second = write_group_report(&store, &group, &algorithms).expect("report again");
        assert_eq!(first, second);
        assert_eq!(fs::read(&log_path).expect("log"), before);

        let text = fs::read_to_string(store.group_dir(&group).join(REPORT_FILE)).expect("stats");
        assert!(text.starts_with("dijkstra\n--------\nAverage execution: 6\n"), "{}", text);
        assert!(text.contains("Average path cost: 812\n"));
        assert!(text.contains("Average execution std: n/a\n"));
        assert!(text.contains("Runs: 2\n"));
        assert!(text.contains("aStar\n-----\nno runs recorded\n"));
        let _ = fs::remove_dir_all(root);
    }
}
