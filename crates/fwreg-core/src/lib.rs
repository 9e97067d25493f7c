//! fwreg Core - Firmware records, device detection, and registry operations
//!
//! This crate provides everything the `fwreg` tool does apart from HTTP:
//! - Firmware record types and query filters
//! - Device-type detection from binary file names
//! - Binary path resolution and local directory listing
//! - Configuration and credential loading
//! - The [`Backend`] capability trait plus an in-memory implementation
//! - Upload, list, delete and batch auto-upload operations

pub mod backend;
pub mod config;
pub mod detect;
pub mod local;
pub mod memory;
pub mod record;
pub mod registry;

pub use backend::{Backend, BackendError};
pub use config::{load_config, ConfigError, Credentials, RegistryConfig};
pub use detect::DeviceDetector;
pub use local::{list_binaries, resolve_binary_path, LocalBinary};
pub use memory::MemoryBackend;
pub use record::{FirmwareRecord, NewFirmwareRecord, RecordFilter};
pub use registry::{
    BatchItem, BatchReport, BlobFailure, Clock, DeleteReport, DeleteTarget, FirmwareRegistry,
    RegistryError, UploadOutcome, UploadRequest,
};
