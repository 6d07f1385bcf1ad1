use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::AppError;
use crate::store::BlobStore;

/// One JSON file per logical key under a data directory. Writes go through
/// a temp file and rename so a crash never leaves a half-written blob.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|err| AppError::Internal(format!("failed to create data dir: {err}")))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl BlobStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(blob) => Ok(Some(blob)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AppError::Internal(format!("failed to read {key}: {err}"))),
        }
    }

    fn set(&self, key: &str, blob: &str) -> Result<(), AppError> {
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, blob)
            .map_err(|err| AppError::Internal(format!("failed to write {key}: {err}")))?;
        fs::rename(&tmp, self.path_for(key))
            .map_err(|err| AppError::Internal(format!("failed to persist {key}: {err}")))?;
        Ok(())
    }
}
