//! Risk state persistence
//!
//! The risk manager saves its full [`RiskState`] after every mutation and
//! reloads it on startup, so a restart mid-day keeps daily P&L, the loss streak
//! and any active trip.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::domain::RiskState;
use crate::error::{GuardError, Result};

#[async_trait]
pub trait RiskStateStore: Send + Sync {
    /// Last saved state, `None` when nothing has been saved yet
    async fn load(&self) -> Result<Option<RiskState>>;

    async fn save(&self, state: &RiskState) -> Result<()>;
}

/// Single JSON document on disk, replaced atomically on each save
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "risk_state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl RiskStateStore for JsonFileStateStore {
    async fn load(&self) -> Result<Option<RiskState>> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no persisted risk state, starting fresh");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let state: RiskState = serde_json::from_slice(&raw).map_err(|e| {
            GuardError::Persistence(format!(
                "corrupt risk state at {}: {}",
                self.path.display(),
                e
            ))
        })?;
        debug!(path = %self.path.display(), day = %state.day_start, "loaded risk state");
        Ok(Some(state))
    }

    async fn save(&self, state: &RiskState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let payload = serde_json::to_vec_pretty(state)?;
        let tmp = self.temp_path();

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&payload).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, &self.path).await?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        sync_dir(dir).await
    }
}

/// Flush the directory entry so the rename itself survives a crash
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir).await?.sync_all().await?;
    Ok(())
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// In-memory store; `fail_saves` simulates a broken disk
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<RiskState>>,
    fail_saves: AtomicBool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Option<RiskState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl RiskStateStore for MemoryStateStore {
    async fn load(&self) -> Result<Option<RiskState>> {
        Ok(self.snapshot())
    }

    async fn save(&self, state: &RiskState) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(GuardError::Persistence("simulated write failure".into()));
        }
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = Some(state.clone());
        Ok(())
    }
}
