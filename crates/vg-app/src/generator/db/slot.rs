use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::backend::{KvBackend, StorageResult};

/// A bounded, ordered JSON array living under one key.
///
/// Read-modify-write cycles are serialized through `lock`; reads that only
/// observe the slot do not take it.
pub(crate) struct ListSlot<T> {
    backend: Arc<dyn KvBackend>,
    key: &'static str,
    cap: usize,
    lock: Arc<Mutex<()>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ListSlot<T> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            key: self.key,
            cap: self.cap,
            lock: self.lock.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> ListSlot<T> {
    pub(crate) fn new(backend: Arc<dyn KvBackend>, key: &'static str, cap: usize) -> Self {
        Self {
            backend,
            key,
            cap,
            lock: Arc::new(Mutex::new(())),
            _marker: PhantomData,
        }
    }

    /// Entries that decode as `T`, plus the raw entries that do not.
    /// A slot that is not a JSON array at all reads as empty.
    async fn load_checked(&self) -> StorageResult<(Vec<T>, Vec<Value>)> {
        let Some(raw) = self.backend.read(self.key).await? else {
            return Ok((Vec::new(), Vec::new()));
        };

        let entries: Vec<Value> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(key = self.key, error = %e, "Discarding malformed stored data");
                return Ok((Vec::new(), Vec::new()));
            }
        };

        let mut items = Vec::with_capacity(entries.len());
        let mut unreadable = Vec::new();
        for entry in entries {
            match serde_json::from_value::<T>(entry.clone()) {
                Ok(item) => items.push(item),
                Err(e) => {
                    warn!(key = self.key, error = %e, "Skipping unreadable stored entry");
                    unreadable.push(entry);
                }
            }
        }
        Ok((items, unreadable))
    }

    pub(crate) async fn load(&self) -> Vec<T> {
        match self.load_checked().await {
            Ok((items, _)) => items,
            Err(e) => {
                warn!(key = self.key, error = %e, "Storage read failed, treating as empty");
                Vec::new()
            }
        }
    }

    pub(crate) async fn modify<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut Vec<T>) -> bool,
    {
        self.modify_while(&|| true, f).await
    }

    /// Apply `f` to the stored list and persist the result, truncated to the
    /// cap. `f` returns whether it changed anything; nothing is written when
    /// it did not, when the slot could not be read, or when `live` turns
    /// false at any point before the write.
    ///
    /// Entries that could not be decoded are kept behind the decoded ones
    /// so that they are not lost on rewrite.
    pub(crate) async fn modify_while<F>(&self, live: &(dyn Fn() -> bool + Sync), f: F) -> bool
    where
        F: FnOnce(&mut Vec<T>) -> bool,
    {
        let _guard = self.lock.lock().await;
        if !live() {
            return false;
        }

        let (mut items, unreadable) = match self.load_checked().await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(key = self.key, error = %e, "Storage unavailable, skipping write");
                return false;
            }
        };

        if !f(&mut items) {
            return false;
        }

        let mut entries = match items.iter().map(serde_json::to_value).collect::<Result<Vec<_>, _>>() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(key = self.key, error = %e, "Failed to serialize slot");
                return false;
            }
        };
        entries.extend(unreadable);
        entries.truncate(self.cap);

        let raw = match serde_json::to_string(&entries) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = self.key, error = %e, "Failed to serialize slot");
                return false;
            }
        };

        if !live() {
            debug!(key = self.key, "Write abandoned after cancellation");
            return false;
        }
        match self.backend.write(self.key, &raw).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = self.key, error = %e, "Storage write failed");
                false
            }
        }
    }

    pub(crate) async fn clear(&self) {
        let _guard = self.lock.lock().await;
        if let Err(e) = self.backend.delete(self.key).await {
            warn!(key = self.key, error = %e, "Storage delete failed");
        }
    }
}
