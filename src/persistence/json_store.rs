use super::SnapshotBackend;
use crate::error::CrisisResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// One pretty-printed JSON file per record inside a directory
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>) -> CrisisResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

#[async_trait]
impl SnapshotBackend for JsonFileStore {
    async fn write_record(&mut self, name: &str, payload: &str) -> CrisisResult<()> {
        // Write then rename so a crash never leaves a half-written record
        let path = self.record_path(name);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, payload).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn read_record(&mut self, name: &str) -> CrisisResult<Option<String>> {
        match tokio::fs::read_to_string(self.record_path(name)).await {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn backend_type(&self) -> &'static str {
        "JSON"
    }
}
