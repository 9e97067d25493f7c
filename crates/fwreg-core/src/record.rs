//! Firmware record types stored in the registry table
//!
//! A record describes one firmware version for one device type and points
//! at the blob holding the image. `(version, device_type)` is the logical key,
//! but the backing table does not enforce it; uniqueness is only checked by
//! the client before inserting.

use serde::{Deserialize, Deserializer, Serialize};

/// A firmware row as returned by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmwareRecord {
    /// Row identifier assigned by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Version string (free-form, e.g. "1.0.0" or "26.10.19.143015.123")
    pub version: String,
    /// Device family tag (e.g. "esp32")
    pub device_type: String,
    /// Public URL of the stored binary
    #[serde(default)]
    pub binary_url: Option<String>,
    /// Whether devices must install this version
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_mandatory: bool,
    /// Free-text release notes
    #[serde(default)]
    pub release_notes: Option<String>,
    /// Creation timestamp as reported by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// The column is nullable on older tables
fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl FirmwareRecord {
    /// Storage object name of the blob this record points at
    ///
    /// Taken from the last path segment of `binary_url`. Returns None when the
    /// record has no URL or the URL ends in a slash.
    pub fn blob_name(&self) -> Option<&str> {
        self.binary_url
            .as_deref()
            .and_then(|url| url.rsplit('/').next())
            .filter(|name| !name.is_empty())
    }

    /// Label used when listing records
    pub fn mandatory_label(&self) -> &'static str {
        if self.is_mandatory {
            "MANDATORY"
        } else {
            "optional"
        }
    }
}

/// A firmware row to be inserted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFirmwareRecord {
    pub version: String,
    pub device_type: String,
    pub binary_url: String,
    pub is_mandatory: bool,
    pub release_notes: String,
}

impl NewFirmwareRecord {
    /// Release notes written when the operator does not supply any
    pub fn default_release_notes(version: &str, device_type: &str) -> String {
        format!("Release {} for {}", version, device_type)
    }
}

/// Equality filters applied to queries and deletes
///
/// A default filter selects every record. [`RecordFilter::all`] instead
/// selects every row with a positive id, which is the clause a bulk DELETE
/// must carry; lookups that precede such a delete use the same filter so they
/// see exactly the rows that will be removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub version: Option<String>,
    pub device_type: Option<String>,
    /// Only rows whose id is greater than zero
    pub positive_ids_only: bool,
}

impl RecordFilter {
    /// Filter matching every row with a positive id
    pub fn all() -> Self {
        Self {
            positive_ids_only: true,
            ..Self::default()
        }
    }

    /// Filter matching a single `(version, device_type)` pair
    pub fn exact(version: &str, device_type: &str) -> Self {
        Self {
            version: Some(version.to_string()),
            device_type: Some(device_type.to_string()),
            positive_ids_only: false,
        }
    }

    /// Filter on device type only
    pub fn device(device_type: &str) -> Self {
        Self {
            version: None,
            device_type: Some(device_type.to_string()),
            positive_ids_only: false,
        }
    }

    /// Check a record against every set field
    pub fn matches(&self, record: &FirmwareRecord) -> bool {
        let version_ok = self
            .version
            .as_deref()
            .map_or(true, |v| record.version == v);
        let device_ok = self
            .device_type
            .as_deref()
            .map_or(true, |d| record.device_type == d);
        let id_ok = !self.positive_ids_only || record.id.map_or(false, |id| id > 0);
        version_ok && device_ok && id_ok
    }
}
