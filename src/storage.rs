//! Persistent record store backed by RocksDB.
//!
//! All durable rows (seed pairs, ledger operations, round records, counters)
//! live here under prefixed keys. Hot state is cached in concurrent maps by
//! the owning subsystems; this layer is the source of truth across restarts.

use crate::errors::{CoreResult, StorageError};
use rocksdb::{Options, WriteBatch, WriteOptions, DB};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct RecordStore {
    db: Arc<DB>,
    sync_writes: bool,
}

impl RecordStore {
    pub fn open<P: AsRef<Path>>(path: P, sync_writes: bool) -> CoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(64 * 1024 * 1024);
        opts.set_max_write_buffer_number(4);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path)
            .map_err(|e| StorageError::OpenFailed(e.to_string()))?;
        Ok(Self {
            db: Arc::new(db),
            sync_writes,
        })
    }

    fn write_opts(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }

    /// Read a raw value. A missing key is `Ok(None)`; a failed read is an
    /// error, never absence, so invariant checks built on top of this can
    /// not be bypassed by an unhealthy database.
    pub fn get_raw(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map_err(|e| StorageError::ReadFailed(e.to_string()).into())
    }

    pub fn put_raw(&self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        self.db
            .put_opt(key, value, &self.write_opts())
            .map_err(|e| StorageError::WriteFailed(e.to_string()).into())
    }

    /// Load and decode a bincode row. Missing key is `Ok(None)`; a row that
    /// fails to decode is corruption, not absence.
    pub fn get_record<T: DeserializeOwned>(&self, key: &[u8]) -> CoreResult<Option<T>> {
        let Some(bytes) = self.get_raw(key)? else {
            return Ok(None);
        };
        let record = bincode::deserialize(&bytes).map_err(|e| {
            StorageError::CorruptedData(format!(
                "Failed to decode record at {}: {}",
                String::from_utf8_lossy(key),
                e
            ))
        })?;
        Ok(Some(record))
    }

    pub fn put_record<T: Serialize>(&self, key: &[u8], record: &T) -> CoreResult<()> {
        let bytes = bincode::serialize(record)
            .map_err(|e| StorageError::WriteFailed(format!("Failed to encode record: {}", e)))?;
        self.put_raw(key, &bytes)
    }

    /// Write several rows as one atomic batch.
    pub fn batch_write(&self, items: &[(Vec<u8>, Vec<u8>)]) -> CoreResult<()> {
        let mut batch = WriteBatch::default();
        for (key, value) in items {
            batch.put(key, value);
        }
        self.db
            .write_opt(batch, &self.write_opts())
            .map_err(|e| StorageError::WriteFailed(e.to_string()).into())
    }

    /// Scan keys under `prefix`, optionally resuming strictly after `cursor`,
    /// returning up to `limit` (key, value) pairs in key order.
    pub fn scan_prefix(
        &self,
        prefix: &[u8],
        cursor: Option<&[u8]>,
        limit: usize,
    ) -> Vec<(Vec<u8>, Vec<u8>)> {
        let start: Vec<u8> = match cursor {
            Some(c) => {
                // Resume one past the cursor key.
                let mut s = c.to_vec();
                s.push(0);
                s
            }
            None => prefix.to_vec(),
        };

        let mut rows = Vec::new();
        let iter = self.db.iterator(rocksdb::IteratorMode::From(
            &start,
            rocksdb::Direction::Forward,
        ));
        for item in iter {
            let Ok((key, value)) = item else { break };
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key.to_vec(), value.to_vec()));
            if rows.len() >= limit {
                break;
            }
        }
        rows
    }
}
