//! Kill switch
//!
//! An out-of-band stop signal checked immediately before every order-placing
//! call. It blocks new risk but never blocks cancellation.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::KillSwitchConfig;
use crate::error::Result;

pub trait KillSwitch: Send + Sync {
    /// Fast, non-blocking check
    fn is_engaged(&self) -> bool;

    /// Human-readable source for logs
    fn describe(&self) -> String;
}

/// Engaged while a marker file exists
#[derive(Debug, Clone)]
pub struct FileKillSwitch {
    path: PathBuf,
}

impl FileKillSwitch {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the marker file
    pub fn engage(&self, note: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, note)?;
        warn!(path = %self.path.display(), "Kill switch ENGAGED");
        Ok(())
    }

    /// Remove the marker file. Releasing an already released switch is a no-op.
    pub fn release(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Kill switch released");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl KillSwitch for FileKillSwitch {
    fn is_engaged(&self) -> bool {
        self.path.exists()
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

fn env_truthy(key: &str) -> bool {
    matches!(
        std::env::var(key)
            .ok()
            .as_deref()
            .map(str::trim)
            .map(str::to_ascii_lowercase)
            .as_deref(),
        Some("1" | "true" | "yes" | "y" | "on")
    )
}

/// Engaged while an environment variable is truthy
#[derive(Debug, Clone)]
pub struct EnvKillSwitch {
    var: String,
}

impl EnvKillSwitch {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl KillSwitch for EnvKillSwitch {
    fn is_engaged(&self) -> bool {
        env_truthy(&self.var)
    }

    fn describe(&self) -> String {
        format!("env:{}", self.var)
    }
}

/// In-process flag
#[derive(Debug, Default)]
pub struct MemoryKillSwitch {
    engaged: AtomicBool,
}

impl MemoryKillSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engage(&self) {
        self.engaged.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.engaged.store(false, Ordering::SeqCst);
    }
}

impl KillSwitch for MemoryKillSwitch {
    fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::SeqCst)
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Engaged if any inner switch is
#[derive(Default, Clone)]
pub struct AnyKillSwitch {
    switches: Vec<Arc<dyn KillSwitch>>,
}

impl AnyKillSwitch {
    pub fn new(switches: Vec<Arc<dyn KillSwitch>>) -> Self {
        Self { switches }
    }

    /// File sentinel plus the optional environment flag from config
    pub fn from_config(config: &KillSwitchConfig) -> Self {
        let mut switches: Vec<Arc<dyn KillSwitch>> =
            vec![Arc::new(FileKillSwitch::new(config.sentinel_path.clone()))];
        if let Some(var) = config.env_var.as_deref().filter(|v| !v.trim().is_empty()) {
            switches.push(Arc::new(EnvKillSwitch::new(var)));
        }
        Self { switches }
    }
}

impl KillSwitch for AnyKillSwitch {
    fn is_engaged(&self) -> bool {
        self.switches.iter().any(|s| s.is_engaged())
    }

    fn describe(&self) -> String {
        self.switches
            .iter()
            .map(|s| s.describe())
            .collect::<Vec<_>>()
            .join(",")
    }
}
