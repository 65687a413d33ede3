use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

const LOCK_FILE: &str = "keys.lock";
const LOCK_WAIT: Duration = Duration::from_secs(2);
const LOCK_POLL: Duration = Duration::from_millis(25);

pub fn drip_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("DRIP_HOME") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".drip"))
}

pub fn ensure_drip_home() -> Result<PathBuf> {
    let dir = drip_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Which already-scheduled set a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCategory {
    Sessions,
    Content,
}

impl KeyCategory {
    pub const ALL: [KeyCategory; 2] = [KeyCategory::Sessions, KeyCategory::Content];

    pub fn storage_key(&self) -> &'static str {
        match self {
            KeyCategory::Sessions => "scheduled_session_notifications",
            KeyCategory::Content => "scheduled_content_notifications",
        }
    }
}

/// Device-local "already scheduled" key sets, one JSON array per category.
#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::new(ensure_drip_home()?))
    }

    pub fn path(&self, category: KeyCategory) -> PathBuf {
        self.dir.join(format!("{}.json", category.storage_key()))
    }

    /// Missing or corrupt files read as an empty set.
    pub fn load(&self, category: KeyCategory) -> BTreeSet<String> {
        let p = self.path(category);
        if !p.exists() {
            return BTreeSet::new();
        }
        let parsed = fs::read_to_string(&p)
            .map_err(anyhow::Error::from)
            .and_then(|s| serde_json::from_str::<Vec<String>>(&s).map_err(anyhow::Error::from));
        match parsed {
            Ok(keys) => keys.into_iter().collect(),
            Err(e) => {
                warn!(path = %p.display(), error = %e, "unreadable key store; starting empty");
                BTreeSet::new()
            }
        }
    }

    fn write(&self, category: KeyCategory, keys: &BTreeSet<String>) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| format!("create {}", self.dir.display()))?;
        let p = self.path(category);
        let tmp = p.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&keys.iter().collect::<Vec<_>>())?;
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &p)
            .with_context(|| format!("rename {} -> {}", tmp.display(), p.display()))?;
        Ok(())
    }

    /// Take the store's lock file, waiting up to `LOCK_WAIT` for another
    /// holder (thread or process) to let go.
    fn lock(&self) -> Result<StoreLock> {
        fs::create_dir_all(&self.dir).with_context(|| format!("create {}", self.dir.display()))?;
        let path = self.dir.join(LOCK_FILE);
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(StoreLock { path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if started.elapsed() >= LOCK_WAIT {
                        anyhow::bail!(
                            "key store is locked by another run ({}); \
                             remove it if no run is active",
                            path.display()
                        );
                    }
                    thread::sleep(LOCK_POLL);
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("create {}", path.display()));
                }
            }
        }
    }

    /// Read, plan, write as a single step under the store's lock file.
    ///
    /// `f` returns the new key set and a value handed back to the caller. When
    /// `f` fails nothing is written, so keys never get ahead of the work they
    /// stand for.
    pub fn update<T>(
        &self,
        category: KeyCategory,
        f: impl FnOnce(&BTreeSet<String>) -> Result<(BTreeSet<String>, T)>,
    ) -> Result<T> {
        let _lock = self.lock()?;
        let current = self.load(category);
        let (next, out) = f(&current)?;
        if next != current {
            self.write(category, &next)?;
        }
        Ok(out)
    }

    pub fn clear_all(&self) -> Result<()> {
        let _lock = self.lock()?;
        for category in KeyCategory::ALL {
            let p = self.path(category);
            if p.exists() {
                fs::remove_file(&p).with_context(|| format!("remove {}", p.display()))?;
            }
        }
        Ok(())
    }
}

/// Held while a key file is being read and rewritten; removes the lock file
/// on drop.
struct StoreLock {
    path: PathBuf,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release key store lock");
        }
    }
}

pub fn queue_dir() -> Result<PathBuf> {
    Ok(ensure_drip_home()?.join("queue"))
}

/// Handoff file for the platform notification scheduler.
pub fn outbox_path(queue: &Path) -> PathBuf {
    queue.join("notifications.jsonl")
}

/// Event-log sink.
pub fn event_log_path(queue: &Path) -> PathBuf {
    queue.join("notification_log.jsonl")
}

pub fn append_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    for row in rows {
        writeln!(f, "{}", serde_json::to_string(row)?)?;
    }
    Ok(())
}
