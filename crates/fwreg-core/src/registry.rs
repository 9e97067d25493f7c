//! Firmware registry operations
//!
//! Every operation runs its backend calls strictly one after another:
//! - Upload: existence check, blob store, record insert
//! - Delete: query, batch row delete, best-effort blob deletes
//! - Auto-upload: upload each local binary with a generated version
//!
//! Nothing here is transactional. A failure between blob store and record
//! insert leaves an orphaned blob, and a forced upload leaves the previous
//! record in place next to the new one.

use chrono::{DateTime, Local};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::backend::{Backend, BackendError};
use crate::config::RegistryConfig;
use crate::local::{list_binaries, LocalBinary};
use crate::record::{FirmwareRecord, NewFirmwareRecord, RecordFilter};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Firmware version {version} for {device_type} already exists. Use --force to overwrite.")]
    AlreadyExists { version: String, device_type: String },
    #[error("No matching firmware versions found")]
    NoMatch,
    #[error("No binary files found in {}", .dir.display())]
    NoBinaries { dir: PathBuf },
}

/// Source of the current local time
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Parameters for a single upload
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub version: String,
    pub device_type: String,
    pub is_mandatory: bool,
    /// Register even if the version already exists
    pub force: bool,
    /// Release notes; generated when absent
    pub release_notes: Option<String>,
}

impl UploadRequest {
    pub fn new(path: impl Into<PathBuf>, version: &str, device_type: &str) -> Self {
        Self {
            path: path.into(),
            version: version.to_string(),
            device_type: device_type.to_string(),
            is_mandatory: false,
            force: false,
            release_notes: None,
        }
    }
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub blob_name: String,
    pub binary_url: String,
    pub size: u64,
    /// SHA-256 of the image, hex encoded
    pub sha256: String,
}

/// What to delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    Version { version: String, device_type: String },
    All,
}

impl DeleteTarget {
    fn filter(&self) -> RecordFilter {
        match self {
            DeleteTarget::Version {
                version,
                device_type,
            } => RecordFilter::exact(version, device_type),
            DeleteTarget::All => RecordFilter::all(),
        }
    }
}

/// Result of a delete
///
/// The delete succeeded once the rows were removed; blob failures are
/// reported here but do not undo it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteReport {
    pub records_deleted: usize,
    pub blobs_deleted: Vec<String>,
    pub blob_failures: Vec<BlobFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlobFailure {
    pub name: String,
    pub error: String,
}

/// Outcome of one file in an auto-upload batch
#[derive(Debug)]
pub struct BatchItem {
    pub file: String,
    pub version: String,
    pub device_type: String,
    pub result: Result<UploadOutcome, RegistryError>,
}

/// Result of an auto-upload batch
#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    /// True only if every file uploaded
    pub fn all_succeeded(&self) -> bool {
        self.items.iter().all(|item| item.result.is_ok())
    }

    pub fn failures(&self) -> usize {
        self.items.iter().filter(|item| item.result.is_err()).count()
    }
}

/// Blob name for an upload: `{device}_{version}_{YYYYmmddHHMMSS}{ext}`
pub fn blob_name(device_type: &str, version: &str, at: DateTime<Local>, extension: &str) -> String {
    format!(
        "{}_{}_{}{}",
        device_type,
        version,
        at.format("%Y%m%d%H%M%S"),
        extension
    )
}

/// Version generated for auto-uploaded files, with millisecond precision
pub fn auto_version(at: DateTime<Local>) -> String {
    at.format("%y.%m.%d.%H%M%S.%3f").to_string()
}

/// Compute SHA256 hash of data and return as hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Registry client bound to one backend and configuration
pub struct FirmwareRegistry<B> {
    backend: B,
    config: RegistryConfig,
    clock: Clock,
}

impl<B: Backend> FirmwareRegistry<B> {
    pub fn new(backend: B, config: RegistryConfig) -> Self {
        Self {
            backend,
            config,
            clock: Arc::new(Local::now),
        }
    }

    /// Replace the time source used for blob names and auto versions
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// List records, optionally filtered by device type and version
    pub async fn list(
        &self,
        device_type: Option<&str>,
        version: Option<&str>,
    ) -> Result<Vec<FirmwareRecord>, RegistryError> {
        let filter = RecordFilter {
            version: version.map(str::to_string),
            device_type: device_type.map(str::to_string),
            ..Default::default()
        };
        let records = self.backend.query_records(&filter).await?;
        debug!(count = records.len(), ?filter, "Queried firmware records");
        Ok(records)
    }

    /// Check whether a record exists for `(version, device_type)`
    pub async fn version_exists(&self, version: &str, device_type: &str) -> Result<bool, RegistryError> {
        let records = self
            .backend
            .query_records(&RecordFilter::exact(version, device_type))
            .await?;
        Ok(!records.is_empty())
    }

    /// Upload a binary and register it
    pub async fn upload(&self, request: &UploadRequest) -> Result<UploadOutcome, RegistryError> {
        let version = request.version.as_str();
        let device_type = request.device_type.as_str();

        if !request.force && self.version_exists(version, device_type).await? {
            return Err(RegistryError::AlreadyExists {
                version: version.to_string(),
                device_type: device_type.to_string(),
            });
        }

        let data = std::fs::read(&request.path).map_err(|source| RegistryError::Io {
            path: request.path.clone(),
            source,
        })?;
        let size = data.len() as u64;
        let sha256 = sha256_hex(&data);

        let name = blob_name(device_type, version, (self.clock)(), &self.config.storage.extension);
        info!(
            blob = %name,
            size,
            sha256 = %&sha256[..16],
            "Uploading firmware binary"
        );
        self.backend.store_blob(&name, data).await?;
        info!(blob = %name, "Binary uploaded successfully to storage");

        let binary_url = self.backend.public_url(&name);
        let record = NewFirmwareRecord {
            version: version.to_string(),
            device_type: device_type.to_string(),
            binary_url: binary_url.clone(),
            is_mandatory: request.is_mandatory,
            release_notes: request
                .release_notes
                .clone()
                .unwrap_or_else(|| NewFirmwareRecord::default_release_notes(version, device_type)),
        };

        if let Err(e) = self.backend.insert_record(&record).await {
            warn!(blob = %name, "Record insert failed, stored blob is orphaned");
            return Err(e.into());
        }

        info!(
            version = %version,
            device_type = %device_type,
            mandatory = request.is_mandatory,
            "Firmware version registered successfully"
        );

        Ok(UploadOutcome {
            blob_name: name,
            binary_url,
            size,
            sha256,
        })
    }

    /// Delete records and their blobs
    pub async fn delete(&self, target: &DeleteTarget) -> Result<DeleteReport, RegistryError> {
        let filter = target.filter();

        let records = self.backend.query_records(&filter).await?;
        if records.is_empty() {
            return Err(RegistryError::NoMatch);
        }
        info!(count = records.len(), "Found firmware version(s) to delete");

        self.backend.delete_records(&filter).await?;
        info!(count = records.len(), "Deleted firmware version(s) from database");

        let mut report = DeleteReport {
            records_deleted: records.len(),
            ..Default::default()
        };

        for name in records.iter().filter_map(FirmwareRecord::blob_name) {
            match self.backend.delete_blob(name).await {
                Ok(()) => {
                    debug!(blob = %name, "Deleted storage file");
                    report.blobs_deleted.push(name.to_string());
                }
                Err(e) => {
                    warn!(blob = %name, error = %e, "Could not delete storage file");
                    report.blob_failures.push(BlobFailure {
                        name: name.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Binaries available in the configured directory
    pub fn local_binaries(&self) -> Result<Vec<LocalBinary>, RegistryError> {
        let dir = &self.config.storage.bin_dir;
        list_binaries(dir, &self.config.storage.extension).map_err(|source| RegistryError::Io {
            path: dir.clone(),
            source,
        })
    }

    /// Upload every binary in the configured directory
    ///
    /// Device types are detected from file names and versions generated from
    /// the clock. A failed file does not stop the batch.
    pub async fn auto_upload(&self) -> Result<BatchReport, RegistryError> {
        let binaries = self.local_binaries()?;
        if binaries.is_empty() {
            return Err(RegistryError::NoBinaries {
                dir: self.config.storage.bin_dir.clone(),
            });
        }

        info!(
            count = binaries.len(),
            dir = %self.config.storage.bin_dir.display(),
            "Found binary file(s)"
        );

        let mut report = BatchReport::default();
        for binary in binaries {
            let device_type = self.config.detection.detect(&binary.name);
            let version = auto_version((self.clock)());
            info!(file = %binary.name, device_type = %device_type, version = %version, "Processing");

            let request = UploadRequest::new(&binary.path, &version, &device_type);
            let result = self.upload(&request).await;
            if let Err(e) = &result {
                error!(file = %binary.name, error = %e, "Upload failed");
            }

            report.items.push(BatchItem {
                file: binary.name,
                version,
                device_type,
                result,
            });
        }

        Ok(report)
    }

    /// Default binary directory
    pub fn bin_dir(&self) -> &Path {
        &self.config.storage.bin_dir
    }
}
