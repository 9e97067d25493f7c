//! Command handlers
//!
//! Each handler prints its results and returns whether the command succeeded;
//! `main` turns that into the exit code.

use anyhow::{Context, Result};
use fwreg_core::{
    resolve_binary_path, Backend, Credentials, DeleteTarget, FirmwareRecord, FirmwareRegistry,
    LocalBinary, RegistryConfig, RegistryError, UploadRequest,
};
use tracing::info;

use crate::supabase::SupabaseBackend;

/// Optional upload settings
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub is_mandatory: bool,
    pub force: bool,
    pub notes: Option<String>,
}

/// Resolve credentials and build a registry against the hosted backend
pub fn connect(config: RegistryConfig) -> Result<FirmwareRegistry<SupabaseBackend>> {
    let credentials = Credentials::from_env(&config.credentials.env_file)?;
    info!(base_url = %credentials.base_url, "Using firmware registry");

    let backend = SupabaseBackend::new(credentials, &config.storage.bucket, &config.storage.table)
        .context("Failed to set up registry backend")?;
    Ok(FirmwareRegistry::new(backend, config))
}

pub async fn upload<B: Backend>(
    registry: &FirmwareRegistry<B>,
    path: &str,
    version: &str,
    device_type: &str,
    options: UploadOptions,
) -> Result<bool> {
    let storage = &registry.config().storage;
    let resolved = resolve_binary_path(path, &storage.bin_dir, &storage.extension);

    if !resolved.exists() {
        eprintln!("Binary file not found: {}", resolved.display());
        eprintln!("Checked in default directory: {}", storage.bin_dir.display());
        return Ok(false);
    }

    let request = UploadRequest {
        path: resolved,
        version: version.to_string(),
        device_type: device_type.to_string(),
        is_mandatory: options.is_mandatory,
        force: options.force,
        release_notes: options.notes,
    };

    match registry.upload(&request).await {
        Ok(outcome) => {
            println!("Firmware version {} registered successfully", version);
            println!("  Blob:   {}", outcome.blob_name);
            println!("  URL:    {}", outcome.binary_url);
            println!("  Size:   {:.1} KB", outcome.size as f64 / 1024.0);
            println!("  SHA256: {}", outcome.sha256);
            Ok(true)
        }
        Err(e) => {
            report_error(&e);
            Ok(false)
        }
    }
}

pub async fn list<B: Backend>(
    registry: &FirmwareRegistry<B>,
    device_type: Option<&str>,
    version: Option<&str>,
) -> Result<bool> {
    let records = match registry.list(device_type, version).await {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Error retrieving firmware versions: {}", e);
            return Ok(false);
        }
    };

    if records.is_empty() {
        println!("No firmware versions found");
    } else {
        println!("Found {} firmware version(s):", records.len());
        for record in &records {
            println!("{}", format_record(record));
        }
    }

    Ok(true)
}

pub fn binaries(config: &RegistryConfig) -> Result<bool> {
    let dir = &config.storage.bin_dir;
    if !dir.is_dir() {
        println!("Default binary directory does not exist: {}", dir.display());
        return Ok(true);
    }

    let binaries = fwreg_core::list_binaries(dir, &config.storage.extension)
        .with_context(|| format!("Failed to list {}", dir.display()))?;

    if binaries.is_empty() {
        println!("No binary files found in {}", dir.display());
    } else {
        println!("Found {} binary file(s) in {}:", binaries.len(), dir.display());
        for binary in &binaries {
            println!("{}", format_binary(binary));
        }
    }

    Ok(true)
}

pub async fn delete<B: Backend>(
    registry: &FirmwareRegistry<B>,
    version: Option<String>,
    device_type: Option<String>,
    all: bool,
) -> Result<bool> {
    let target = match (all, version, device_type) {
        (true, _, _) => DeleteTarget::All,
        (false, Some(version), Some(device_type)) => DeleteTarget::Version {
            version,
            device_type,
        },
        _ => {
            eprintln!("Error: Either specify version and device_type, or use --all flag");
            return Ok(false);
        }
    };

    match registry.delete(&target).await {
        Ok(report) => {
            println!(
                "Successfully deleted {} firmware version(s) from database",
                report.records_deleted
            );
            for name in &report.blobs_deleted {
                println!("Deleted storage file: {}", name);
            }
            for failure in &report.blob_failures {
                println!("Warning: Could not delete storage file: {}", failure.name);
            }
            Ok(true)
        }
        Err(e) => {
            report_error(&e);
            Ok(false)
        }
    }
}

pub async fn auto_upload<B: Backend>(registry: &FirmwareRegistry<B>) -> Result<bool> {
    println!("Running in automatic mode - detecting and uploading binaries...");
    println!("Looking for binary files in: {}", registry.bin_dir().display());

    let report = match registry.auto_upload().await {
        Ok(report) => report,
        Err(e) => {
            report_error(&e);
            return Ok(false);
        }
    };

    for item in &report.items {
        match &item.result {
            Ok(outcome) => println!(
                "  {} -> {} v{} ({})",
                item.file, item.device_type, item.version, outcome.blob_name
            ),
            Err(e) => println!("  {} -> FAILED: {}", item.file, e),
        }
    }

    let succeeded = report.all_succeeded();
    println!(
        "Uploaded {} of {} binary file(s)",
        report.items.len() - report.failures(),
        report.items.len()
    );
    Ok(succeeded)
}

fn report_error(e: &RegistryError) {
    match e {
        RegistryError::Backend(_) => eprintln!("Error: {}", e),
        _ => eprintln!("{}", e),
    }
}

/// Multi-line listing entry for a record
pub fn format_record(record: &FirmwareRecord) -> String {
    format!(
        "  {} v{} - {}\n    URL: {}\n    Notes: {}\n",
        record.device_type,
        record.version,
        record.mandatory_label(),
        record.binary_url.as_deref().unwrap_or("-"),
        record.release_notes.as_deref().unwrap_or("-"),
    )
}

/// One-line listing entry for a local binary
pub fn format_binary(binary: &LocalBinary) -> String {
    format!("  {} ({:.1} KB)", binary.name, binary.size_kb())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwreg_core::MemoryBackend;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn make_registry(bin_dir: PathBuf) -> FirmwareRegistry<MemoryBackend> {
        let mut config = RegistryConfig::default();
        config.storage.bin_dir = bin_dir;
        FirmwareRegistry::new(MemoryBackend::new(), config)
    }

    #[test]
    fn test_format_record() {
        let record = FirmwareRecord {
            id: Some(3),
            version: "1.0.0".to_string(),
            device_type: "esp32".to_string(),
            binary_url: Some("https://host/firmware/esp32.bin".to_string()),
            is_mandatory: true,
            release_notes: None,
            created_at: None,
        };
        assert_eq!(
            format_record(&record),
            "  esp32 v1.0.0 - MANDATORY\n    URL: https://host/firmware/esp32.bin\n    Notes: -\n"
        );
    }

    #[test]
    fn test_format_binary() {
        let binary = LocalBinary {
            name: "esp32_blink.bin".to_string(),
            path: PathBuf::from("/tmp/esp32_blink.bin"),
            size: 1536,
        };
        assert_eq!(format_binary(&binary), "  esp32_blink.bin (1.5 KB)");
    }

    #[tokio::test]
    async fn test_upload_resolves_bare_name() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("fwreg_cmd_test_rp2040.bin"), b"image").unwrap();
        let registry = make_registry(temp_dir.path().to_path_buf());

        let ok = upload(&registry, "fwreg_cmd_test_rp2040", "0.3.0", "rp2040", UploadOptions::default())
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(registry.backend().records().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_missing_binary_fails() {
        let temp_dir = TempDir::new().unwrap();
        let registry = make_registry(temp_dir.path().to_path_buf());

        let ok = upload(&registry, "fwreg_cmd_missing", "0.3.0", "rp2040", UploadOptions::default())
            .await
            .unwrap();
        assert!(!ok);
        assert!(registry.backend().records().is_empty());
    }

    #[tokio::test]
    async fn test_delete_requires_target() {
        let temp_dir = TempDir::new().unwrap();
        let registry = make_registry(temp_dir.path().to_path_buf());

        assert!(!delete(&registry, Some("1.0.0".to_string()), None, false).await.unwrap());
        // Nothing registered, so --all has nothing to delete
        assert!(!delete(&registry, None, None, true).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_empty_succeeds() {
        let temp_dir = TempDir::new().unwrap();
        let registry = make_registry(temp_dir.path().to_path_buf());
        assert!(list(&registry, Some("esp32"), None).await.unwrap());
    }
}
