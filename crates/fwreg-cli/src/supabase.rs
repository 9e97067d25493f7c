//! HTTP backend for a Supabase-style service
//!
//! Blobs go to the storage API (`/storage/v1/object/{bucket}/{name}`), records
//! to the REST API (`/rest/v1/{table}`) using PostgREST `eq.` filters. Every
//! request carries the API key both as bearer token and `apikey` header.

use anyhow::{Context, Result};
use async_trait::async_trait;
use fwreg_core::{Backend, BackendError, Credentials, FirmwareRecord, NewFirmwareRecord, RecordFilter};
use reqwest::{RequestBuilder, Response};
use tracing::debug;

/// Backend talking to the hosted storage and REST endpoints
pub struct SupabaseBackend {
    /// HTTP client
    client: reqwest::Client,
    credentials: Credentials,
    bucket: String,
    table: String,
}

impl SupabaseBackend {
    pub fn new(credentials: Credentials, bucket: &str, table: &str) -> Result<Self> {
        // No request timeout; transfers run until the server answers
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            credentials,
            bucket: bucket.to_string(),
            table: table.to_string(),
        })
    }

    /// Storage API URL for an object
    pub fn object_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.credentials.base_url, self.bucket, name
        )
    }

    /// REST API URL for the firmware table
    pub fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.credentials.base_url, self.table)
    }

    /// PostgREST query parameters for a filter
    ///
    /// DELETE without a WHERE clause is refused by the REST layer, so an empty
    /// filter becomes `id=gt.0` when `require_clause` is set.
    pub fn filter_params(filter: &RecordFilter, require_clause: bool) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(version) = &filter.version {
            params.push(("version", format!("eq.{}", version)));
        }
        if let Some(device_type) = &filter.device_type {
            params.push(("device_type", format!("eq.{}", device_type)));
        }
        if filter.positive_ids_only || (params.is_empty() && require_clause) {
            params.push(("id", "gt.0".to_string()));
        }
        params
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.credentials.api_key)
            .header("apikey", &self.credentials.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        Ok(response)
    }
}

#[async_trait]
impl Backend for SupabaseBackend {
    async fn store_blob(&self, name: &str, data: Vec<u8>) -> Result<(), BackendError> {
        let url = self.object_url(name);
        debug!(url = %url, size = data.len(), "Storing blob");
        let request = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data);
        self.send(request).await?;
        Ok(())
    }

    async fn delete_blob(&self, name: &str) -> Result<(), BackendError> {
        let url = self.object_url(name);
        debug!(url = %url, "Deleting blob");
        self.send(self.client.delete(&url)).await?;
        Ok(())
    }

    async fn query_records(&self, filter: &RecordFilter) -> Result<Vec<FirmwareRecord>, BackendError> {
        let url = self.table_url();
        let params = Self::filter_params(filter, false);
        debug!(url = %url, ?params, "Querying records");
        let response = self.send(self.client.get(&url).query(&params)).await?;
        response
            .json::<Vec<FirmwareRecord>>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn insert_record(&self, record: &NewFirmwareRecord) -> Result<(), BackendError> {
        let url = self.table_url();
        debug!(url = %url, version = %record.version, device_type = %record.device_type, "Inserting record");
        let request = self
            .client
            .post(&url)
            .header("Prefer", "return=minimal")
            .json(record);
        self.send(request).await?;
        Ok(())
    }

    async fn delete_records(&self, filter: &RecordFilter) -> Result<(), BackendError> {
        let url = self.table_url();
        let params = Self::filter_params(filter, true);
        debug!(url = %url, ?params, "Deleting records");
        let request = self
            .client
            .delete(&url)
            .header("Prefer", "return=minimal")
            .query(&params);
        self.send(request).await?;
        Ok(())
    }

    fn public_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.credentials.base_url, self.bucket, name
        )
    }
}
