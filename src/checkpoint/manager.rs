use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::checkpoint::snapshot::CheckpointSnapshot;
use crate::error::CheckpointError;

/// A checkpoint file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointEntry {
    pub epoch: usize,
    pub level: usize,
    pub path: PathBuf,
}

/// Reads and writes `step_{epoch}_level_{level}.json` files in one directory.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> CheckpointManager {
        CheckpointManager { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(epoch: usize, level: usize) -> String {
        format!("step_{}_level_{}.json", epoch, level)
    }

    /// Writes `snapshot` to a temporary file and renames it into place, so a
    /// crash never leaves a half-written checkpoint under the final name.
    /// A failed write removes the temporary file.
    pub fn save(&self, snapshot: &CheckpointSnapshot) -> Result<PathBuf, CheckpointError> {
        fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;
        let path = self
            .dir
            .join(Self::file_name(snapshot.epoch, snapshot.schedule_state.current_level));
        let temp_path = path.with_extension("json.tmp");

        let file = fs::File::create(&temp_path).map_err(io_err(&temp_path))?;
        if let Err(e) = write_and_rename(file, snapshot, &temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        tracing::info!(
            path = %path.display(),
            epoch = snapshot.epoch,
            level = snapshot.schedule_state.current_level,
            "saved checkpoint"
        );
        Ok(path)
    }

    /// Parses and validates a checkpoint. Nothing outside the returned
    /// snapshot is touched.
    pub fn load(path: &Path) -> Result<CheckpointSnapshot, CheckpointError> {
        let file = match fs::File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CheckpointError::NotFound { path: path.to_path_buf() })
            }
            Err(source) => return Err(CheckpointError::Io { path: path.to_path_buf(), source }),
        };
        let snapshot: CheckpointSnapshot = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| CheckpointError::Corrupt { path: path.to_path_buf(), reason: e.to_string() })?;
        snapshot
            .validate()
            .map_err(|reason| CheckpointError::Corrupt { path: path.to_path_buf(), reason })?;

        tracing::info!(path = %path.display(), epoch = snapshot.epoch, "loaded checkpoint");
        Ok(snapshot)
    }

    /// Checkpoints in the directory, ordered by epoch. A missing directory
    /// holds no checkpoints.
    pub fn list(&self) -> Result<Vec<CheckpointEntry>, CheckpointError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(CheckpointError::Io { path: self.dir.clone(), source }),
        };

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CheckpointError::Io { path: self.dir.clone(), source })?;
            let name = entry.file_name();
            if let Some((epoch, level)) = name.to_str().and_then(parse_file_name) {
                found.push(CheckpointEntry { epoch, level, path: entry.path() });
            }
        }
        found.sort_by_key(|e| e.epoch);
        Ok(found)
    }

    pub fn find(&self, epoch: usize) -> Result<PathBuf, CheckpointError> {
        let entries = self.list()?;
        match entries.iter().find(|e| e.epoch == epoch) {
            Some(entry) => Ok(entry.path.clone()),
            None => Err(CheckpointError::NoMatchingEpoch {
                epoch,
                dir: self.dir.clone(),
                available: entries.iter().map(|e| e.epoch).collect(),
            }),
        }
    }

    pub fn latest(&self) -> Result<Option<PathBuf>, CheckpointError> {
        Ok(self.list()?.pop().map(|e| e.path))
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> CheckpointError {
    let path = path.to_path_buf();
    move |source| CheckpointError::Io { path, source }
}

fn write_and_rename(
    file: fs::File,
    snapshot: &CheckpointSnapshot,
    temp_path: &Path,
    path: &Path,
) -> Result<(), CheckpointError> {
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, snapshot)
        .map_err(|e| CheckpointError::Io { path: temp_path.to_path_buf(), source: e.into() })?;
    writer.flush().map_err(io_err(temp_path))?;
    drop(writer);
    fs::rename(temp_path, path).map_err(io_err(path))
}

/// `step_{epoch}_level_{level}.json` → `(epoch, level)`.
fn parse_file_name(name: &str) -> Option<(usize, usize)> {
    let stem = name.strip_prefix("step_")?.strip_suffix(".json")?;
    let (epoch, level) = stem.split_once("_level_")?;
    Some((epoch.parse().ok()?, level.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_checkpoint_names() {
        assert_eq!(parse_file_name("step_12_level_3.json"), Some((12, 3)));
        assert_eq!(parse_file_name("step_12_level_3.json.tmp"), None);
        assert_eq!(parse_file_name("fake_1_2_3_0.5.png"), None);
        assert_eq!(CheckpointManager::file_name(4, 1), "step_4_level_1.json");
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().join("absent"));
        assert!(manager.list().unwrap().is_empty());
        assert_eq!(manager.latest().unwrap(), None);
        match manager.find(3) {
            Err(CheckpointError::NoMatchingEpoch { epoch: 3, available, .. }) => assert!(available.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            CheckpointManager::load(&dir.path().join("step_1_level_0.json")),
            Err(CheckpointError::NotFound { .. })
        ));
    }

    #[test]
    fn garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("step_1_level_0.json");
        std::fs::write(&path, "{\"epoch\": 1}").unwrap();
        match CheckpointManager::load(&path) {
            Err(CheckpointError::Corrupt { path: p, reason }) => {
                assert_eq!(p, path);
                assert!(reason.contains("missing field"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
