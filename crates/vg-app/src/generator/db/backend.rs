//! Key-value media the record store can persist into.
//!
//! Every slot is a single string value under a fixed key. Backends report
//! failures as [`Error::Storage`]; the store above them decides to swallow.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use vg_core::error::Error;

pub type StorageResult<T> = Result<T, Error>;

#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn read(&self, key: &str) -> StorageResult<Option<String>>;
    async fn write(&self, key: &str, value: &str) -> StorageResult<()>;
    async fn delete(&self, key: &str) -> StorageResult<()>;
}

/// In-process map. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> StorageResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.slots
            .lock()
            .map_err(|_| Error::Storage("memory backend lock poisoned".to_string()))
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn read(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.slots()?.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        self.slots()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.slots()?.remove(key);
        Ok(())
    }
}

/// One file per key under `dir`. Writes land in a temp file first and are
/// renamed into place so a crash never leaves a half-written slot.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

fn io_error(action: &str, key: &str, e: std::io::Error) -> Error {
    Error::Storage(format!("failed to {action} '{key}': {e}"))
}

#[async_trait]
impl KvBackend for FileBackend {
    async fn read(&self, key: &str) -> StorageResult<Option<String>> {
        match tokio::fs::read_to_string(self.path(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("read", key, e)),
        }
    }

    async fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error("create directory for", key, e))?;

        let tmp = self.dir.join(format!(".{key}.tmp"));
        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| io_error("write", key, e))?;
        tokio::fs::rename(&tmp, self.path(key))
            .await
            .map_err(|e| io_error("commit", key, e))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete", key, e)),
        }
    }
}

/// A medium that is never available, for contexts without persistence.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledBackend;

#[async_trait]
impl KvBackend for DisabledBackend {
    async fn read(&self, _key: &str) -> StorageResult<Option<String>> {
        Err(Error::Storage("persistence is disabled".to_string()))
    }

    async fn write(&self, _key: &str, _value: &str) -> StorageResult<()> {
        Err(Error::Storage("persistence is disabled".to_string()))
    }

    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Err(Error::Storage("persistence is disabled".to_string()))
    }
}

/// Memory backend that counts writes, for asserting when persistence stops.
/// Reads can be slowed down to hold a read-modify-write cycle open.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct CountingBackend {
    inner: MemoryBackend,
    writes: std::sync::atomic::AtomicUsize,
    read_delay: Option<std::time::Duration>,
}

#[cfg(test)]
impl CountingBackend {
    pub fn with_read_delay(delay: std::time::Duration) -> Self {
        Self {
            read_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl KvBackend for CountingBackend {
    async fn read(&self, key: &str) -> StorageResult<Option<String>> {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        self.writes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.inner.write(key, value).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.writes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.inner.delete(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("store"));

        assert_eq!(backend.read("sora_generations").await.unwrap(), None);

        backend.write("sora_generations", "[]").await.unwrap();
        assert_eq!(
            backend.read("sora_generations").await.unwrap().as_deref(),
            Some("[]")
        );

        backend.delete("sora_generations").await.unwrap();
        assert_eq!(backend.read("sora_generations").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_backend_delete_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        assert!(backend.delete("nothing_here").await.is_ok());
    }

    #[tokio::test]
    async fn disabled_backend_always_fails() {
        let backend = DisabledBackend;
        assert!(matches!(backend.read("k").await, Err(Error::Storage(_))));
        assert!(backend.write("k", "v").await.is_err());
    }
}
