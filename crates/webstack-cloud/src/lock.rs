//! Per-deployment lease locks
//!
//! Only one driver may work on a deployment slot at a time. A lease is a small
//! JSON file under `<state_dir>/locks/<slot>.json`, created exclusively so
//! that concurrent drivers cannot both hold it. Leases older than the stale
//! threshold are assumed abandoned and taken over; a lease that cannot be
//! parsed is aged by its file modification time instead.

use crate::error::{CloudError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const LOCK_DIR: &str = "locks";
const MAX_ATTEMPTS: usize = 3;

static LEASE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Issues leases for deployment slots
pub struct LockManager {
    state_dir: PathBuf,
    stale_after: Duration,
}

impl LockManager {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            state_dir: state_dir.as_ref().to_path_buf(),
            stale_after: Duration::hours(1),
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    fn lock_dir(&self) -> PathBuf {
        self.state_dir.join(LOCK_DIR)
    }

    fn lock_path(&self, slot: &str) -> PathBuf {
        self.lock_dir().join(format!("{}.json", slot))
    }

    async fn ensure_lock_dir(&self) -> Result<()> {
        let dir = self.lock_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created lock directory: {}", dir.display());
        }
        Ok(())
    }

    /// Take the lease for `slot`
    pub async fn acquire(&self, slot: &str) -> Result<SlotLock> {
        self.ensure_lock_dir().await?;

        let lock_path = self.lock_path(slot);

        for _ in 0..MAX_ATTEMPTS {
            let lease = Lease::new(slot);
            match create_lease(&lock_path, &lease).await {
                Ok(()) => {
                    tracing::debug!("Acquired lock for '{}'", slot);
                    return Ok(SlotLock {
                        lock_path,
                        token: lease.token,
                        released: false,
                    });
                }
                Err(CloudError::Io(e)) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e),
            }

            let Some(content) = read_if_exists(&lock_path).await? else {
                continue;
            };

            match serde_json::from_slice::<Lease>(&content) {
                Ok(held) => {
                    if self.is_fresh(held.acquired_at) {
                        return Err(CloudError::LockError(format!(
                            "deployment '{}' is locked by {} (pid {}) since {}",
                            slot, held.holder, held.pid, held.acquired_at
                        )));
                    }
                    tracing::warn!(
                        "Taking over stale lock on '{}' held by {} since {}",
                        slot,
                        held.holder,
                        held.acquired_at
                    );
                }
                Err(err) => {
                    let modified = match fs::metadata(&lock_path).await {
                        Ok(metadata) => DateTime::<Utc>::from(metadata.modified()?),
                        Err(e) if e.kind() == ErrorKind::NotFound => continue,
                        Err(e) => return Err(e.into()),
                    };
                    if self.is_fresh(modified) {
                        return Err(CloudError::LockError(format!(
                            "deployment '{}' has an unreadable lease written at {}",
                            slot, modified
                        )));
                    }
                    tracing::warn!("Taking over unreadable lock on '{}': {}", slot, err);
                }
            }

            remove_if_unchanged(&lock_path, &content).await?;
        }

        Err(CloudError::LockError(format!(
            "deployment '{}' is contended, could not take over its lease",
            slot
        )))
    }

    fn is_fresh(&self, since: DateTime<Utc>) -> bool {
        Utc::now().signed_duration_since(since) < self.stale_after
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Lease {
    slot: String,
    holder: String,
    pid: u32,
    acquired_at: DateTime<Utc>,
    #[serde(default)]
    token: String,
}

impl Lease {
    fn new(slot: &str) -> Self {
        let acquired_at = Utc::now();
        let pid = std::process::id();
        let seq = LEASE_SEQ.fetch_add(1, Ordering::Relaxed);
        Self {
            slot: slot.to_string(),
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid,
            token: format!(
                "{}-{}-{}",
                pid,
                acquired_at.timestamp_nanos_opt().unwrap_or_default(),
                seq
            ),
            acquired_at,
        }
    }
}

async fn create_lease(path: &Path, lease: &Lease) -> Result<()> {
    let content = serde_json::to_string_pretty(lease)?;
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.sync_all().await?;
    Ok(())
}

async fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Remove the lease at `path` unless another driver replaced it meanwhile
async fn remove_if_unchanged(path: &Path, expected: &[u8]) -> Result<()> {
    if read_if_exists(path).await?.as_deref() != Some(expected) {
        return Ok(());
    }
    match fs::remove_file(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// RAII guard for a slot lease
///
/// Releasing only removes the lease file while it still carries this guard's
/// token; a lease taken over by another driver is left in place.
pub struct SlotLock {
    lock_path: PathBuf,
    token: String,
    released: bool,
}

impl SlotLock {
    fn owns(&self, content: &[u8]) -> bool {
        serde_json::from_slice::<Lease>(content).is_ok_and(|lease| lease.token == self.token)
    }

    pub async fn release(mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        match read_if_exists(&self.lock_path).await? {
            Some(content) if self.owns(&content) => {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released lock {}", self.lock_path.display());
            }
            Some(_) => tracing::warn!(
                "Lock {} was taken over by another run, leaving it in place",
                self.lock_path.display()
            ),
            None => {}
        }
        self.released = true;
        Ok(())
    }
}

impl Drop for SlotLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Ok(content) = std::fs::read(&self.lock_path)
            && self.owns(&content)
        {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
