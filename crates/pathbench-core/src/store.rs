use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{BenchError, Result};
use crate::model::{MapGroupKey, RunRecord, TrialStdRecord};
use crate::ensure_dir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Runs,
    TrialStd,
}

impl LogKind {
    pub fn extension(&self) -> &'static str {
        match self {
            LogKind::Runs => "data",
            LogKind::TrialStd => "stddata",
        }
    }
}

/// Owns the logs under one root directory. Writers are assumed to be
/// single-threaded; a caller sharing a store across threads must serialize
/// appends per log.
#[derive(Debug, Clone)]
pub struct DataStore {
    root: PathBuf,
}

impl DataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn group_dir(&self, group: &MapGroupKey) -> PathBuf {
        self.root.join(group.name())
    }

    pub fn log_path(&self, algorithm: &str, group: &MapGroupKey, kind: LogKind) -> PathBuf {
        self.group_dir(group)
            .join(format!("{}.{}", algorithm, kind.extension()))
    }

    pub fn append(&self, algorithm: &str, group: &MapGroupKey, record: &RunRecord) -> Result<()> {
        let path = self.log_path(algorithm, group, LogKind::Runs);
        append_line(&path, &record.to_line())?;
        debug!(
            algorithm,
            group = %group,
            perf = record.perf,
            dist = record.dist,
            cost = record.cost,
            "appended run record"
        );
        Ok(())
    }

    pub fn append_std(
        &self,
        algorithm: &str,
        group: &MapGroupKey,
        record: &TrialStdRecord,
    ) -> Result<()> {
        let path = self.log_path(algorithm, group, LogKind::TrialStd);
        append_line(&path, &record.to_line())?;
        debug!(algorithm, group = %group, "appended trial std record");
        Ok(())
    }

    pub fn read_all(&self, algorithm: &str, group: &MapGroupKey) -> Result<Vec<RunRecord>> {
        let path = self.log_path(algorithm, group, LogKind::Runs);
        parse_lines(&path, RunRecord::parse_line)
    }

    pub fn read_std(&self, algorithm: &str, group: &MapGroupKey) -> Result<Vec<TrialStdRecord>> {
        let path = self.log_path(algorithm, group, LogKind::TrialStd);
        parse_lines(&path, TrialStdRecord::parse_line)
    }

    pub fn len(&self, algorithm: &str, group: &MapGroupKey, kind: LogKind) -> Result<usize> {
        Ok(complete_lines(&self.log_path(algorithm, group, kind))?.len())
    }
}

fn parse_lines<T>(path: &Path, parse: impl Fn(&str) -> Option<T>) -> Result<Vec<T>> {
    complete_lines(path)?
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            parse(line).ok_or_else(|| BenchError::CorruptLog {
                path: path.to_path_buf(),
                line: idx + 1,
                reason: format!("expected three numeric fields, got {:?}", line),
            })
        })
        .collect()
}

fn complete_lines(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)?;
    let mut lines: Vec<String> = raw
        .split('\n')
        .map(|l| l.trim_end_matches('\r').to_string())
        .collect();
    // `split` yields the text after the last newline as a final element:
    // empty for a well-formed log, a fragment after an interrupted write.
    if let Some(tail) = lines.pop() {
        if !tail.is_empty() {
            warn!(path = %path.display(), fragment = %tail, "ignoring unterminated log line");
        }
    }
    Ok(lines)
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    debug_assert!(line.ends_with('\n') && line.matches('\n').count() == 1);
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)?;
    drop_unterminated_tail(&mut file, path)?;
    // One write call for the whole line so no reader ever sees it half
    // finished under O_APPEND.
    file.write_all(line.as_bytes())?;
    file.sync_data()?;
    Ok(())
}

fn drop_unterminated_tail(file: &mut File, path: &Path) -> Result<()> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(());
    }

    let mut keep = 0u64;
    let mut end = len;
    let mut chunk = vec![0u8; 4096];
    while end > 0 {
        let start = end.saturating_sub(chunk.len() as u64);
        let buf = &mut chunk[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(buf)?;
        if let Some(pos) = buf.iter().rposition(|b| *b == b'\n') {
            keep = start + pos as u64 + 1;
            break;
        }
        end = start;
    }
    warn!(
        path = %path.display(),
        dropped_bytes = len - keep,
        "truncating unterminated log tail left by an interrupted write"
    );
    file.set_len(keep)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn temp_root(tag: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "pathbench_store_{}_{}_{}",
            tag,
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        ensure_dir(&root).expect("temp root");
        root
    }

    fn group() -> MapGroupKey {
        MapGroupKey::new("run", 10, 10, 1)
    }

    #[test]
    fn append_grows_log_by_exactly_one_record_at_the_end() {
        let root = temp_root("append");
        let store = DataStore::new(&root);
        let g = group();
        assert!(store.read_all("dijkstra", &g).expect("read").is_empty());

        let first = RunRecord { perf: 3, dist: 18, cost: 20 };
        let second = RunRecord { perf: 4, dist: 18, cost: 20 };
        store.append("dijkstra", &g, &first).expect("append");
        let before = store.read_all("dijkstra", &g).expect("read").len();
        store.append("dijkstra", &g, &second).expect("append");
        let after = store.read_all("dijkstra", &g).expect("read");
        assert_eq!(after.len(), before + 1);
        assert_eq!(after.last(), Some(&second));
        assert_eq!(after, vec![first, second]);

        let raw = fs::read_to_string(store.log_path("dijkstra", &g, LogKind::Runs)).expect("raw");
        assert_eq!(raw, "3 18 20\n4 18 20\n");
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn empty_log_file_reads_as_empty_sequence() {
        let root = temp_root("empty");
        let store = DataStore::new(&root);
        let g = group();
        let path = store.log_path("aStar", &g, LogKind::Runs);
        ensure_dir(path.parent().expect("parent")).expect("dir");
        fs::write(&path, "").expect("touch");
        assert!(store.read_all("aStar", &g).expect("read").is_empty());
        assert_eq!(store.len("aStar", &g, LogKind::Runs).expect("len"), 0);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn interrupted_write_fragment_is_invisible_and_replaced() {
        let root = temp_root("fragment");
        let store = DataStore::new(&root);
        let g = group();
        let path = store.log_path("fringe", &g, LogKind::Runs);
        ensure_dir(path.parent().expect("parent")).expect("dir");
        fs::write(&path, "1 2 3\n7 8").expect("seed");

        assert_eq!(
            store.read_all("fringe", &g).expect("read"),
            vec![RunRecord { perf: 1, dist: 2, cost: 3 }]
        );

        store
            .append("fringe", &g, &RunRecord { perf: 4, dist: 5, cost: 6 })
            .expect("append");
        assert_eq!(fs::read_to_string(&path).expect("raw"), "1 2 3\n4 5 6\n");
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn corrupt_line_reports_its_position() {
        let root = temp_root("corrupt");
        let store = DataStore::new(&root);
        let g = group();
        let path = store.log_path("bidir", &g, LogKind::Runs);
        ensure_dir(path.parent().expect("parent")).expect("dir");
        fs::write(&path, "1 2 3\nnot a record\n").expect("seed");
        match store.read_all("bidir", &g).expect_err("corrupt") {
            BenchError::CorruptLog { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {}", other),
        }
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn std_log_round_trips_fractional_values() {
        let root = temp_root("std");
        let store = DataStore::new(&root);
        let g = group();
        let rec = TrialStdRecord {
            std_perf: 0.5,
            std_dist: 0.0,
            std_cost: 12.25,
        };
        store.append_std("dijkstra", &g, &rec).expect("append");
        assert_eq!(store.read_std("dijkstra", &g).expect("read"), vec![rec]);
        assert_eq!(store.len("dijkstra", &g, LogKind::TrialStd).expect("len"), 1);
        assert_eq!(store.len("dijkstra", &g, LogKind::Runs).expect("len"), 0);
        let _ = fs::remove_dir_all(root);
    }
}
