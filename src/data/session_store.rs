use crate::domain::repository::SessionStore;
use crate::domain::session::SessionRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    records: Arc<RwLock<Vec<SessionRecord>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self) -> Result<Vec<SessionRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn persist(&self, sessions: &[SessionRecord]) -> Result<()> {
        *self.records.write().await = sessions.to_vec();
        Ok(())
    }
}

/// Sessions serialized as a JSON array in a single file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Vec<SessionRecord>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Session file does not exist yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e).context("failed to read session file"),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let records: Vec<SessionRecord> =
            serde_json::from_str(&raw).context("session file is not valid JSON")?;
        debug!(count = records.len(), "Sessions loaded from file");
        Ok(records)
    }

    #[instrument(skip(self, sessions), fields(path = %self.path.display(), count = sessions.len()))]
    async fn persist(&self, sessions: &[SessionRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(sessions)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json)
            .await
            .context("failed to write session file")?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .context("failed to replace session file")?;
        debug!("Sessions persisted");
        Ok(())
    }
}
