use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::world::{SimulationSnapshot, World};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to create snapshot directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write snapshot {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read snapshot {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot json error")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub scenario: String,
    pub step: u64,
    pub sim_time: f64,
    /// Wall-clock time the file was written, RFC 3339.
    pub written_at: String,
    pub crate_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub metadata: SnapshotMetadata,
    pub snapshot: SimulationSnapshot,
}

/// Writes `<dir>/<scenario>/step_XXXXXX.json` every `interval_steps` steps.
pub struct SnapshotWriter {
    output_dir: PathBuf,
    interval_steps: u64,
}

impl SnapshotWriter {
    pub fn new(output_dir: impl AsRef<Path>, interval_steps: u64) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            interval_steps,
        }
    }

    pub fn should_write(&self, step: u64) -> bool {
        self.interval_steps > 0 && step > 0 && step % self.interval_steps == 0
    }

    pub fn maybe_write(&self, world: &World, scenario: &str, step: u64) -> Result<Option<PathBuf>, SnapshotError> {
        if !self.should_write(step) {
            return Ok(None);
        }
        self.write(world, scenario, step).map(Some)
    }

    pub fn write(&self, world: &World, scenario: &str, step: u64) -> Result<PathBuf, SnapshotError> {
        let dir = self.output_dir.join(scenario);
        fs::create_dir_all(&dir).map_err(|source| SnapshotError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        let path = dir.join(format!("step_{step:06}.json"));
        let file = SnapshotFile {
            metadata: SnapshotMetadata {
                scenario: scenario.to_string(),
                step,
                sim_time: world.time(),
                written_at: chrono::Utc::now().to_rfc3339(),
                crate_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            snapshot: world.snapshot(scenario),
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(&path, json).map_err(|source| SnapshotError::Write {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), step, "snapshot written");
        Ok(path)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<SnapshotFile, SnapshotError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| SnapshotError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::biome::BiomeType;
    use crate::config::SimulationConfig;
    use crate::spatial::RegionalGrid;
    use tempfile::tempdir;

    #[test]
    fn interval_controls_writes() {
        let writer = SnapshotWriter::new("unused", 5);
        assert!(!writer.should_write(0));
        assert!(!writer.should_write(4));
        assert!(writer.should_write(5));
        assert!(writer.should_write(10));
        assert!(!SnapshotWriter::new("unused", 0).should_write(5));
    }

    #[test]
    fn written_snapshot_loads_back() {
        let temp = tempdir().unwrap();
        let writer = SnapshotWriter::new(temp.path(), 1);
        let world = World::new(RegionalGrid::new(3, 2, BiomeType::Taiga), &SimulationConfig::default());
        let path = writer.maybe_write(&world, "valley", 7).unwrap().unwrap();
        assert!(path.ends_with("valley/step_000007.json"));
        let file = SnapshotWriter::load(&path).unwrap();
        assert_eq!(file.metadata.step, 7);
        assert_eq!(file.snapshot.regions.len(), 6);
        assert_eq!(file.snapshot.biome_distribution.get("taiga"), Some(&6));
    }
}
