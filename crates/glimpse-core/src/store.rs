//! Key-value persistence for the client.
//!
//! The story feed is persisted as one serialized value under a well-known
//! key. `KeyValueStore` is the seam: `FileStore` keeps one JSON document per
//! key on disk, `MemoryStore` keeps values in a map for tests and embedding.
//!
//! File writes go through a temp file + rename so a crash never leaves a
//! half-written collection behind, and read-modify-write cycles hold an
//! advisory lock so two processes marking stories viewed do not clobber
//! each other.

use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Durable string-valued store addressed by key.
pub trait KeyValueStore: Send + Sync {
    /// Read the value for `key`, or `None` if nothing is stored.
    fn get(&self, key: &str) -> io::Result<Option<String>>;

    /// Overwrite the value for `key`.
    fn set(&self, key: &str, value: &str) -> io::Result<()>;

    /// Read-modify-write. `f` receives the current value and returns the
    /// replacement, or `None` to leave the stored value untouched.
    ///
    /// Must be atomic: no other `set` or `update` of the same key may land
    /// between the read and the write.
    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> Option<String>,
    ) -> io::Result<()>;
}

/// Check that `key` can name a stored value: non-empty ASCII alphanumerics,
/// dashes and underscores.
pub fn validate_key(key: &str) -> io::Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!(
                "Invalid store key '{}'. Keys must be alphanumeric with dashes and underscores only.",
                key
            ),
        ));
    }
    Ok(())
}

// ============================================================================
// FileStore
// ============================================================================

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the document backing `key`.
    pub fn value_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{}.lock", key))
    }

    fn read_value(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.value_path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        validate_key(key)?;
        self.read_value(key)
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        validate_key(key)?;
        let _lock = FileLock::acquire(&self.lock_path(key))?;
        atomic_write(&self.value_path(key), value.as_bytes())
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> Option<String>,
    ) -> io::Result<()> {
        validate_key(key)?;
        let _lock = FileLock::acquire(&self.lock_path(key))?;
        let current = self.read_value(key)?;
        if let Some(next) = f(current) {
            atomic_write(&self.value_path(key), next.as_bytes())?;
        }
        Ok(())
    }
}

/// Write to `<path>.tmp`, fsync, then rename over `path`.
fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)?;

    {
        let mut writer = BufWriter::new(&mut file);
        writer.write_all(contents)?;
        writer.flush()?;
    }
    file.sync_all()?;

    fs::rename(&tmp_path, path)
}

/// Exclusive advisory lock, released on drop.
struct FileLock {
    file: File,
}

impl FileLock {
    fn acquire(lock_path: &Path) -> io::Result<Self> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?;
        file.lock_exclusive()?;

        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-process store. Writes can be switched off to simulate an unavailable
/// backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw value, bypassing any failure switches.
    pub fn with_value(self, key: &str, value: impl Into<String>) -> Self {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn values(&self) -> io::Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| io::Error::other("memory store lock poisoned"))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(io::Error::other("storage unavailable"));
        }
        Ok(self.values()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::other("storage unavailable"));
        }
        self.values()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> Option<String>,
    ) -> io::Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(io::Error::other("storage unavailable"));
        }
        let mut values = self.values()?;
        if let Some(next) = f(values.get(key).cloned()) {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(io::Error::other("storage unavailable"));
            }
            values.insert(key.to_string(), next);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_missing_key_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        assert_eq!(store.get("stories").unwrap(), None);
    }

    #[test]
    fn test_file_store_set_then_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("nested"));

        store.set("stories", "[]").unwrap();
        store.set("stories", "[1]").unwrap();

        assert_eq!(store.get("stories").unwrap().as_deref(), Some("[1]"));
        assert!(store.value_path("stories").exists());
        assert!(
            !store.value_path("stories").with_extension("tmp").exists(),
            "temp file should be renamed away"
        );
    }

    #[test]
    fn test_file_store_rejects_path_like_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());

        let err = store.set("../escape", "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(store.get("").is_err());
    }

    #[test]
    fn test_file_store_update_skips_write_on_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        store.set("k", "old").unwrap();

        store.update("k", &mut |_| None).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("old"));

        store
            .update("k", &mut |cur| cur.map(|v| format!("{}-new", v)))
            .unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("old-new"));
    }

    #[test]
    fn test_file_store_update_serializes_across_threads() {
        use std::sync::Arc;
        use std::thread;

        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(FileStore::new(temp_dir.path()));
        store.set("counter", "0").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store
                        .update("counter", &mut |cur| {
                            let n: u32 = cur.and_then(|v| v.parse().ok()).unwrap_or(0);
                            Some((n + 1).to_string())
                        })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get("counter").unwrap().as_deref(), Some("8"));
    }

    #[test]
    fn test_memory_store_update_serializes_across_threads() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(MemoryStore::new().with_value("counter", "0"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        store
                            .update("counter", &mut |cur| {
                                let n: u32 = cur.and_then(|v| v.parse().ok()).unwrap_or(0);
                                thread::yield_now();
                                Some((n + 1).to_string())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get("counter").unwrap().as_deref(), Some("800"));
    }

    #[test]
    fn test_memory_store_update_respects_failure_switches() {
        let store = MemoryStore::new().with_value("k", "v");

        store.set_fail_writes(true);
        assert!(store.update("k", &mut |_| Some("w".to_string())).is_err());
        store.update("k", &mut |_| None).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));

        store.set_fail_reads(true);
        assert!(store.update("k", &mut |_| None).is_err());
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("stories").is_ok());
        assert!(validate_key("my_stories-2").is_ok());
        assert!(validate_key("my.stories").is_err());
        assert!(validate_key("").is_err());
    }

    #[test]
    fn test_memory_store_failure_switches() {
        let store = MemoryStore::new().with_value("k", "v");
        store.set_fail_writes(true);
        assert!(store.set("k", "w").is_err());
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));

        store.set_fail_reads(true);
        assert!(store.get("k").is_err());
    }
}
