use redb::{ReadableTable, ReadableTableMetadata};

use super::db::{Database, DatabaseError};
use super::models::{KeyEntry, ResourceDescriptor, StoredValue};
use super::tables::*;

/// Sentinel key written by [`KeyStore::probe`]. Also a reserved route name.
pub const PROBE_KEY: &str = "ping";
const PROBE_VALUE: &str = "pong";

/// Persistent mapping from short keys to stored values.
///
/// Every write is its own redb write transaction; redb serializes writers
/// internally, so callers share a `KeyStore` freely across tasks.
#[derive(Clone)]
pub struct KeyStore {
    db: Database,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl KeyStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn open<P: AsRef<std::path::Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        Ok(Self::new(Database::open(data_dir)?))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Get the value stored under `key`. Missing and expired keys are `None`.
    pub fn get(&self, key: &str) -> Result<Option<StoredValue>, DatabaseError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KEYS)?;

        match table.get(key)? {
            Some(data) => {
                let entry: KeyEntry = rmp_serde::from_slice(data.value())?;
                if entry.is_expired(now()) {
                    return Ok(None);
                }
                Ok(Some(StoredValue::from_raw(entry.value)))
            }
            None => Ok(None),
        }
    }

    /// Get the descriptor stored under `key`, ignoring values of any other shape.
    pub fn get_descriptor(&self, key: &str) -> Result<Option<ResourceDescriptor>, DatabaseError> {
        Ok(self.get(key)?.and_then(|v| v.descriptor()))
    }

    /// Whether `key` currently holds a live entry.
    pub fn exists(&self, key: &str) -> Result<bool, DatabaseError> {
        Ok(self.get(key)?.is_some())
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> Result<u64, DatabaseError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KEYS)?;
        Ok(table.len()?)
    }

    pub fn is_empty(&self) -> Result<bool, DatabaseError> {
        Ok(self.len()? == 0)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Store `value` under `key`, overwriting whatever was there.
    pub fn set(&self, key: &str, value: &StoredValue) -> Result<(), DatabaseError> {
        self.write_entry(
            key,
            &KeyEntry {
                value: value.to_raw(),
                expires_at: None,
            },
        )
    }

    /// Like [`set`](Self::set), but the entry expires after `ttl_seconds`.
    /// Fractional seconds are rounded up.
    pub fn set_with_ttl(
        &self,
        key: &str,
        value: &StoredValue,
        ttl_seconds: f64,
    ) -> Result<(), DatabaseError> {
        let ttl = ttl_seconds.max(0.0).ceil() as i64;
        self.write_entry(
            key,
            &KeyEntry {
                value: value.to_raw(),
                expires_at: Some(now().saturating_add(ttl)),
            },
        )
    }

    /// Store `value` only if `key` has no live entry. Returns whether it was stored.
    ///
    /// Check and insert happen inside one write transaction.
    pub fn set_if_absent(&self, key: &str, value: &StoredValue) -> Result<bool, DatabaseError> {
        let entry = KeyEntry {
            value: value.to_raw(),
            expires_at: None,
        };
        let data = rmp_serde::to_vec_named(&entry)?;

        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(KEYS)?;
            let live = match table.get(key)? {
                Some(existing) => {
                    let existing: KeyEntry = rmp_serde::from_slice(existing.value())?;
                    !existing.is_expired(now())
                }
                None => false,
            };
            if !live {
                table.insert(key, data.as_slice())?;
            }
            !live
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    pub fn put_descriptor(
        &self,
        key: &str,
        descriptor: &ResourceDescriptor,
    ) -> Result<(), DatabaseError> {
        self.set(key, &StoredValue::structured(descriptor)?)
    }

    /// Remove `key`. Returns whether anything was removed; a missing key is not an error.
    pub fn delete(&self, key: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(KEYS)?;
            let removed = table.remove(key)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// Sweep every entry whose TTL has elapsed. Returns the number removed.
    pub fn expire_all(&self) -> Result<u64, DatabaseError> {
        let now = now();
        let write_txn = self.db.begin_write()?;
        let mut removed = 0;
        {
            let mut table = write_txn.open_table(KEYS)?;
            let mut expired = Vec::new();
            for result in table.iter()? {
                let (key, value) = result?;
                let entry: KeyEntry = rmp_serde::from_slice(value.value())?;
                if entry.is_expired(now) {
                    expired.push(key.value().to_string());
                }
            }
            for key in expired {
                table.remove(key.as_str())?;
                removed += 1;
            }
        }
        write_txn.commit()?;
        tracing::info!(removed, "Expired key store entries");
        Ok(removed)
    }

    fn write_entry(&self, key: &str, entry: &KeyEntry) -> Result<(), DatabaseError> {
        let data = rmp_serde::to_vec_named(entry)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(KEYS)?;
            table.insert(key, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // ========================================================================
    // Liveness
    // ========================================================================

    /// Write the sentinel and read it back. The store is usable only if the
    /// value read matches exactly what was written.
    pub fn probe(&self) -> bool {
        let expected = StoredValue::from(PROBE_VALUE);
        if let Err(e) = self.set(PROBE_KEY, &expected) {
            tracing::error!(error = %e, "Key store probe write failed");
            return false;
        }
        match self.get(PROBE_KEY) {
            Ok(Some(value)) if value == expected => {
                tracing::info!("Key store probe succeeded");
                true
            }
            Ok(other) => {
                tracing::error!(read = ?other, "Key store probe read back a different value");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Key store probe read failed");
                false
            }
        }
    }
}
