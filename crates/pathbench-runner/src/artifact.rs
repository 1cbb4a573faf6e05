use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use serde::{Deserialize, Serialize};

use pathbench_core::{BenchError, Endpoints, Result};

pub const SUPPORTED_FORMAT_VERSIONS: &[&str] = &["v1"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArtifactFormat {
    pub version: String,
    pub perf_label: String,
    pub cost_label: String,
    pub tail_window: u64,
    pub world_ext: String,
    pub endpoint_ext: String,
    pub perf_ext: String,
    pub result_ext: String,
}

impl Default for ArtifactFormat {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            perf_label: "time: ".to_string(),
            cost_label: "Total Cost: ".to_string(),
            tail_window: 5,
            world_ext: ".world".to_string(),
            endpoint_ext: ".path".to_string(),
            perf_ext: ".perf".to_string(),
            result_ext: ".res".to_string(),
        }
    }
}

impl ArtifactFormat {
    pub fn problems(&self) -> Vec<String> {
        let mut out = Vec::new();
        if !SUPPORTED_FORMAT_VERSIONS.contains(&self.version.as_str()) {
            out.push(format!(
                "artifact_format.version {:?} is not supported (known: {})",
                self.version,
                SUPPORTED_FORMAT_VERSIONS.join(", ")
            ));
        }
        if self.perf_label.is_empty() {
            out.push("artifact_format.perf_label must not be empty".to_string());
        }
        if self.cost_label.is_empty() {
            out.push("artifact_format.cost_label must not be empty".to_string());
        }
        if self.cost_label.contains('\n') || self.perf_label.contains('\n') {
            out.push("artifact_format labels must be single-line".to_string());
        }
        if self.tail_window == 0 {
            out.push("artifact_format.tail_window must be > 0".to_string());
        }
        out
    }
}

pub fn parse_endpoints(path: &Path) -> Result<Endpoints> {
    if !path.exists() {
        return Err(BenchError::MissingArtifact {
            path: path.to_path_buf(),
        });
    }
    let raw = fs::read_to_string(path)?;
    let mut coords = [0u32; 4];
    let mut lines = raw.lines();
    for (idx, slot) in coords.iter_mut().enumerate() {
        let line = lines.next().ok_or_else(|| {
            BenchError::malformed(path, format!("expected 4 coordinate lines, found {}", idx))
        })?;
        *slot = line.trim().parse().map_err(|_| {
            BenchError::malformed(path, format!("line {} is not a coordinate: {:?}", idx + 1, line))
        })?;
    }
    Ok(Endpoints {
        start_x: coords[0],
        start_y: coords[1],
        end_x: coords[2],
        end_y: coords[3],
    })
}

pub fn parse_perf(path: &Path, format: &ArtifactFormat) -> Result<u64> {
    let raw = fs::read(path)?;
    let label = format.perf_label.as_bytes();
    if !raw.starts_with(label) {
        return Err(BenchError::malformed(
            path,
            format!(
                "expected label {:?}, found {:?}",
                format.perf_label,
                String::from_utf8_lossy(&raw[..raw.len().min(label.len())])
            ),
        ));
    }
    let rest = &raw[label.len()..];
    let line = rest.split(|b| *b == b'\n').next().unwrap_or_default();
    parse_number(path, line, "elapsed time")
}

/// Returns `(dist, cost)` from a result artifact.
pub fn parse_result(path: &Path, format: &ArtifactFormat) -> Result<(u64, u64)> {
    let mut file = File::open(path)?;

    let mut first = String::new();
    BufReader::new(&mut file).read_line(&mut first)?;
    if first.is_empty() {
        return Err(BenchError::malformed(path, "result artifact is empty"));
    }
    let dist = parse_number(path, first.as_bytes(), "path distance")?;

    let last = read_last_line(&mut file, format.tail_window)?;
    let label = format.cost_label.as_bytes();
    if !last.starts_with(label) {
        return Err(BenchError::malformed(
            path,
            format!(
                "last line {:?} does not start with label {:?}",
                String::from_utf8_lossy(&last),
                format.cost_label
            ),
        ));
    }
    let cost = parse_number(path, &last[label.len()..], "path cost")?;
    Ok((dist, cost))
}

fn parse_number(path: &Path, bytes: &[u8], what: &str) -> Result<u64> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BenchError::malformed(
            path,
            format!("{} is not a decimal integer: {:?}", what, text),
        ));
    }
    text.parse()
        .map_err(|e| BenchError::malformed(path, format!("{} out of range: {}", what, e)))
}

fn read_last_line<R: Read + Seek>(file: &mut R, window: u64) -> std::io::Result<Vec<u8>> {
    let len = file.seek(SeekFrom::End(0))?;
    let mut start = len;
    let mut step = window.max(1);
    let mut buf: Vec<u8> = Vec::new();
    loop {
        let new_start = start.saturating_sub(step);
        let mut chunk = vec![0u8; (start - new_start) as usize];
        file.seek(SeekFrom::Start(new_start))?;
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&buf);
        buf = chunk;
        start = new_start;

        let content_end = buf
            .iter()
            .rposition(|b| *b != b'\n' && *b != b'\r')
            .map(|p| p + 1);
        if let Some(end) = content_end {
            if let Some(nl) = buf[..end].iter().rposition(|b| *b == b'\n') {
                return Ok(buf[nl + 1..end].to_vec());
            }
            if start == 0 {
                return Ok(buf[..end].to_vec());
            }
        } else if start == 0 {
            return Ok(Vec::new());
        }
        step = step.saturating_mul(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn temp_file(tag: &str, content: &[u8]) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "pathbench_artifact_{}_{}_{}",
            tag,
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("artifact");
        fs::write(&path, content).expect("write artifact");
        (dir, path)
    }

    fn labelled(label: &str) -> ArtifactFormat {
        ArtifactFormat {
            cost_label: label.to_string(),
            ..ArtifactFormat::default()
        }
    }

    #[test]
    fn result_cost_found_regardless_of_intermediate_lines() {
        let format = labelled("somefixedlabel");
        for intermediate in [0usize, 1, 1000] {
            let mut content = String::from("42\n");
            for i in 0..intermediate {
                content.push_str(&format!("{} {}\n", i, i + 1));
            }
            content.push_str("somefixedlabel999\n");
            let (dir, path) = temp_file("scan", content.as_bytes());
            let (dist, cost) = parse_result(&path, &format).expect("parse");
            assert_eq!((dist, cost), (42, 999), "intermediate={}", intermediate);
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn result_written_by_algorithms_parses_with_default_labels() {
        let content = b"3\n0 0\n0 1\n1 1\nTotal Cost: 17\n";
        let (dir, path) = temp_file("default", content);
        assert_eq!(
            parse_result(&path, &ArtifactFormat::default()).expect("parse"),
            (3, 17)
        );
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn result_without_trailing_newline_or_with_crlf_still_parses() {
        let format = ArtifactFormat::default();
        for content in [
            &b"2\n1 1\nTotal Cost: 123456"[..],
            &b"2\r\n1 1\r\nTotal Cost: 123456\r\n"[..],
        ] {
            let (dir, path) = temp_file("endings", content);
            assert_eq!(parse_result(&path, &format).expect("parse"), (2, 123456));
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn result_with_wrong_label_is_malformed() {
        let (dir, path) = temp_file("label", b"42\n1 2\nTotal Kost: 999\n");
        match parse_result(&path, &ArtifactFormat::default()).expect_err("label drift") {
            BenchError::MalformedArtifact { reason, .. } => {
                assert!(reason.contains("Total Kost"), "{}", reason)
            }
            other => panic!("unexpected error: {}", other),
        }
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn result_with_single_line_is_malformed() {
        let (dir, path) = temp_file("single", b"42\n");
        let err = parse_result(&path, &ArtifactFormat::default()).expect_err("no cost line");
        assert_eq!(err.code(), "malformed_artifact");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn result_with_non_numeric_cost_is_malformed() {
        let (dir, path) = temp_file("nan", b"42\nTotal Cost: 9x9\n");
        let err = parse_result(&path, &ArtifactFormat::default()).expect_err("garbage");
        assert_eq!(err.code(), "malformed_artifact");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn empty_result_is_malformed() {
        let (dir, path) = temp_file("empty", b"");
        let err = parse_result(&path, &ArtifactFormat::default()).expect_err("empty");
        assert_eq!(err.code(), "malformed_artifact");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn last_line_scan_grows_past_the_initial_window() {
        let long = format!("head\n{}\n\n", "x".repeat(300));
        let mut cursor = Cursor::new(long.into_bytes());
        assert_eq!(read_last_line(&mut cursor, 5).expect("scan"), "x".repeat(300).into_bytes());
        let mut only = Cursor::new(b"solo".to_vec());
        assert_eq!(read_last_line(&mut only, 2).expect("scan"), b"solo".to_vec());
    }

    #[test]
    fn perf_reads_digits_after_label() {
        let format = ArtifactFormat::default();
        let (dir, path) = temp_file("perf", b"time: 1234");
        assert_eq!(parse_perf(&path, &format).expect("perf"), 1234);
        fs::write(&path, b"time: 77\nextra\n").expect("rewrite");
        assert_eq!(parse_perf(&path, &format).expect("perf"), 77);
        fs::write(&path, b"elapsed: 77").expect("rewrite");
        assert_eq!(parse_perf(&path, &format).expect_err("label").code(), "malformed_artifact");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn endpoints_need_four_numeric_lines() {
        let (dir, path) = temp_file("ep", b"1\n2\n8\n9\n");
        assert_eq!(
            parse_endpoints(&path).expect("endpoints"),
            Endpoints { start_x: 1, start_y: 2, end_x: 8, end_y: 9 }
        );
        fs::write(&path, b"1\n2\n8\n").expect("rewrite");
        assert_eq!(parse_endpoints(&path).expect_err("short").code(), "malformed_artifact");
        fs::write(&path, b"1\n2\nq\n9\n").expect("rewrite");
        assert_eq!(parse_endpoints(&path).expect_err("nan").code(), "malformed_artifact");
        let _ = fs::remove_dir_all(&dir);
        assert_eq!(parse_endpoints(&path).expect_err("gone").code(), "missing_artifact");
    }

    #[test]
    fn unknown_format_version_is_a_problem() {
        assert!(ArtifactFormat::default().problems().is_empty());
        let drifted = ArtifactFormat {
            version: "v2".to_string(),
            ..ArtifactFormat::default()
        };
        let problems = drifted.problems();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("\"v2\" is not supported"), "{:?}", problems);
    }
}
