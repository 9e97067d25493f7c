//! In-memory backend
//!
//! Behaves like the hosted service minus the network: records get sequential
//! ids, deletes are filter-based, and blobs live in a map. Individual calls can
//! be made to fail to exercise error paths.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use crate::backend::{Backend, BackendError};
use crate::record::{FirmwareRecord, NewFirmwareRecord, RecordFilter};

const PUBLIC_BASE: &str = "memory://public";

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    records: Vec<FirmwareRecord>,
    blobs: BTreeMap<String, Vec<u8>>,
    fail_store: bool,
    fail_insert: bool,
    fail_query: bool,
    fail_delete_records: bool,
    delete_record_calls: usize,
    failing_blob_deletes: HashSet<String>,
}

/// Backend holding everything in process memory
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // Poisoning only happens if a caller panicked while holding the lock
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of every stored record
    pub fn records(&self) -> Vec<FirmwareRecord> {
        self.lock().records.clone()
    }

    /// Names of every stored blob, sorted
    pub fn blob_names(&self) -> Vec<String> {
        self.lock().blobs.keys().cloned().collect()
    }

    /// Contents of a stored blob
    pub fn blob(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().blobs.get(name).cloned()
    }

    /// Make every blob upload fail
    pub fn fail_store(&self, fail: bool) {
        self.lock().fail_store = fail;
    }

    /// Make every record insert fail
    pub fn fail_insert(&self, fail: bool) {
        self.lock().fail_insert = fail;
    }

    /// Make every record query fail
    pub fn fail_query(&self, fail: bool) {
        self.lock().fail_query = fail;
    }

    /// Make every record delete fail
    pub fn fail_delete_records(&self, fail: bool) {
        self.lock().fail_delete_records = fail;
    }

    /// Number of record delete calls received, including failed ones
    pub fn delete_record_calls(&self) -> usize {
        self.lock().delete_record_calls
    }

    /// Make deleting the named blob fail
    pub fn fail_blob_delete(&self, name: &str) {
        self.lock().failing_blob_deletes.insert(name.to_string());
    }
}

fn injected(what: &str) -> BackendError {
    BackendError::Status {
        status: 500,
        body: format!("injected {} failure", what),
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn store_blob(&self, name: &str, data: Vec<u8>) -> Result<(), BackendError> {
        let mut state = self.lock();
        if state.fail_store {
            return Err(injected("store"));
        }
        if state.blobs.contains_key(name) {
            return Err(BackendError::Status {
                status: 409,
                body: format!("The resource already exists: {}", name),
            });
        }
        state.blobs.insert(name.to_string(), data);
        Ok(())
    }

    async fn delete_blob(&self, name: &str) -> Result<(), BackendError> {
        let mut state = self.lock();
        if state.failing_blob_deletes.contains(name) {
            return Err(injected("blob delete"));
        }
        match state.blobs.remove(name) {
            Some(_) => Ok(()),
            None => Err(BackendError::Status {
                status: 404,
                body: format!("Object not found: {}", name),
            }),
        }
    }

    async fn query_records(&self, filter: &RecordFilter) -> Result<Vec<FirmwareRecord>, BackendError> {
        let state = self.lock();
        if state.fail_query {
            return Err(injected("query"));
        }
        Ok(state
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn insert_record(&self, record: &NewFirmwareRecord) -> Result<(), BackendError> {
        let mut state = self.lock();
        if state.fail_insert {
            return Err(injected("insert"));
        }
        state.next_id += 1;
        let id = state.next_id;
        state.records.push(FirmwareRecord {
            id: Some(id),
            version: record.version.clone(),
            device_type: record.device_type.clone(),
            binary_url: Some(record.binary_url.clone()),
            is_mandatory: record.is_mandatory,
            release_notes: Some(record.release_notes.clone()),
            created_at: None,
        });
        Ok(())
    }

    async fn delete_records(&self, filter: &RecordFilter) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.delete_record_calls += 1;
        if state.fail_delete_records {
            return Err(injected("record delete"));
        }
        state.records.retain(|r| !filter.matches(r));
        Ok(())
    }

    fn public_url(&self, name: &str) -> String {
        format!("{}/{}", PUBLIC_BASE, name)
    }
}
