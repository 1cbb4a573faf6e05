use pathbench_core::{BenchError, Result, RunRecord};

use crate::algorithm::RunArtifacts;
use crate::artifact::{parse_perf, parse_result, ArtifactFormat};

pub fn harvest(artifacts: &RunArtifacts, format: &ArtifactFormat) -> Result<RunRecord> {
    for path in [&artifacts.perf_path, &artifacts.result_path] {
        if !path.exists() {
            return Err(BenchError::MissingArtifact { path: path.clone() });
        }
    }
    let perf = parse_perf(&artifacts.perf_path, format)?;
    let (dist, cost) = parse_result(&artifacts.result_path, format)?;
    Ok(RunRecord { perf, dist, cost })
}
