use crate::persist::{read_json, write_json};
use crate::types::{MemoryBank, MemoryError, MemoryKind};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Categorized notes that persist across sessions in a single JSON file.
/// Every operation re-reads the file so edits made elsewhere are picked up.
pub struct LongTermMemory {
    path: PathBuf,
}

impl LongTermMemory {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A corrupt file reads as an empty bank.
    pub async fn load(&self) -> MemoryBank {
        match read_json::<MemoryBank>(&self.path).await {
            Ok(Some(bank)) => bank,
            Ok(None) => MemoryBank::default(),
            Err(e) => {
                warn!(path = ?self.path, error = %e, "unreadable memory file, starting empty");
                MemoryBank::default()
            }
        }
    }

    /// Where an unparseable file is moved before it gets overwritten.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".bak");
        PathBuf::from(name)
    }

    /// Like `load`, but a file that no longer parses is moved aside first so
    /// the following save cannot destroy it.
    async fn load_for_update(&self) -> Result<MemoryBank, MemoryError> {
        match read_json::<MemoryBank>(&self.path).await {
            Ok(Some(bank)) => Ok(bank),
            Ok(None) => Ok(MemoryBank::default()),
            Err(MemoryError::Serialization(e)) => {
                let backup = self.backup_path();
                tokio::fs::rename(&self.path, &backup).await?;
                warn!(path = ?self.path, backup = ?backup, error = %e, "corrupt memory file moved aside");
                Ok(MemoryBank::default())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn save(&self, bank: &MemoryBank) -> Result<(), MemoryError> {
        write_json(&self.path, bank).await?;
        debug!(path = ?self.path, total = bank.total(), "saved memory bank");
        Ok(())
    }

    pub async fn remember(&self, kind: MemoryKind, key: &str, value: &str) -> Result<(), MemoryError> {
        let mut bank = self.load_for_update().await?;
        bank.insert(kind, key, value, Utc::now());
        self.save(&bank).await
    }

    /// `None` clears every section.
    pub async fn clear(&self, kind: Option<MemoryKind>) -> Result<(), MemoryError> {
        let mut bank = self.load_for_update().await?;
        bank.clear(kind);
        self.save(&bank).await
    }
}
