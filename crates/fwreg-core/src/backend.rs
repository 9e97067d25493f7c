//! Backend capability trait
//!
//! Registry operations only talk to the outside world through [`Backend`],
//! so they can run against the hosted service or an in-memory fake.

use async_trait::async_trait;
use thiserror::Error;

use crate::record::{FirmwareRecord, NewFirmwareRecord, RecordFilter};

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Invalid response: {0}")]
    Decode(String),
}

/// Blob storage plus record table operations
#[async_trait]
pub trait Backend: Send + Sync {
    /// Store raw bytes under `name`
    async fn store_blob(&self, name: &str, data: Vec<u8>) -> Result<(), BackendError>;

    /// Delete the blob stored under `name`
    async fn delete_blob(&self, name: &str) -> Result<(), BackendError>;

    /// Fetch every record matching `filter`
    async fn query_records(&self, filter: &RecordFilter) -> Result<Vec<FirmwareRecord>, BackendError>;

    /// Insert one record
    async fn insert_record(&self, record: &NewFirmwareRecord) -> Result<(), BackendError>;

    /// Delete every record matching `filter` in one call
    async fn delete_records(&self, filter: &RecordFilter) -> Result<(), BackendError>;

    /// Public URL at which a stored blob can be fetched
    fn public_url(&self, name: &str) -> String;
}
