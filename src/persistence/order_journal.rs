//! Append-only order history
//!
//! Every lifecycle transition appends a full snapshot of the order as one JSON
//! object per line. The last snapshot of an order is its current state, which
//! is how resting orders are found again after a restart.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::domain::Order;
use crate::error::Result;

#[async_trait]
pub trait OrderJournal: Send + Sync {
    async fn append(&self, order: &Order) -> Result<()>;

    /// Latest snapshot of every journaled order, in order of first appearance
    async fn load(&self) -> Result<Vec<Order>>;
}

fn latest_per_order(records: Vec<Order>) -> Vec<Order> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut latest: Vec<Order> = Vec::new();
    for order in records {
        match index.get(&order.id) {
            Some(&pos) => latest[pos] = order,
            None => {
                index.insert(order.id.clone(), latest.len());
                latest.push(order);
            }
        }
    }
    latest
}

#[derive(Debug)]
pub struct JsonlOrderJournal {
    path: PathBuf,
    // Serializes appends so lines never interleave
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlOrderJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every journaled snapshot back, oldest first
    pub async fn read_all(&self) -> Result<Vec<Order>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Into::into))
            .collect()
    }
}

#[async_trait]
impl OrderJournal for JsonlOrderJournal {
    async fn append(&self, order: &Order) -> Result<()> {
        let mut line = serde_json::to_vec(order)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.sync_data().await?;
        Ok(())
    }

    async fn load(&self) -> Result<Vec<Order>> {
        Ok(latest_per_order(self.read_all().await?))
    }
}

#[derive(Debug, Default)]
pub struct MemoryOrderJournal {
    orders: Mutex<Vec<Order>>,
}

impl MemoryOrderJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every appended snapshot, oldest first
    pub fn records(&self) -> Vec<Order> {
        self.orders.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Latest snapshot per order
    pub fn orders(&self) -> Vec<Order> {
        latest_per_order(self.records())
    }
}

#[async_trait]
impl OrderJournal for MemoryOrderJournal {
    async fn append(&self, order: &Order) -> Result<()> {
        self.orders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(order.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Vec<Order>> {
        Ok(self.orders())
    }
}
