// # Cloudflare Zone Updater
//
// This crate provides the Cloudflare implementation of `ZoneUpdater`.
//
// ## Behavior
//
// One `UpdateBatch` maps to one Cloudflare zone:
//
// 1. For each change, look up an existing record with the same name and type
// 2. Send a single batch request: `puts` for records that exist, `posts`
//    for records that don't
//
// Cloudflare applies the batch atomically, so a zone is either fully
// updated or left as it was.
//
// ## Trust Level: Untrusted (DNS Provider)
//
// - ✅ Perform HTTP/HTTPS API calls to Cloudflare only
// - ✅ Parse provider-specific responses
// - ❌ Retry or back off (a failed batch is retried on the next cycle)
// - ❌ Access the record store
// - ❌ Spawn tasks or cache state beyond a single batch
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - Updater fails fast if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Batch DNS Records: POST `/zones/:zone_id/dns_records/batch`

use async_trait::async_trait;
use ddns_core::model::{RecordChange, UpdateBatch};
use ddns_core::traits::ZoneUpdater;
use ddns_core::{Error, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable selecting live or dry-run mode
pub const MODE_ENV_VAR: &str = "DDNS_MODE";

const PROVIDER: &str = "cloudflare";

/// Envelope wrapping every Cloudflare API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

/// The part of a DNS record we read back
#[derive(Debug, Deserialize)]
struct ExistingRecord {
    id: String,
}

/// A record inside a batch request
#[derive(Debug, Serialize)]
struct BatchRecord<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: &'a str,
    #[serde(rename = "type")]
    record_type: &'static str,
    content: &'a str,
    ttl: u32,
    comment: &'a str,
}

/// Body of `POST /zones/:zone_id/dns_records/batch`
#[derive(Debug, Default, Serialize)]
struct BatchRequest<'a> {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    posts: Vec<BatchRecord<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    puts: Vec<BatchRecord<'a>>,
}

/// Cloudflare zone updater
///
/// # Trust Level: Untrusted
///
/// Stateless and single-shot. Scheduling is owned by `DdnsEngine`.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the updater will:
/// - Perform the record lookups
/// - Log the intended batch payload
/// - **NOT** send the batch
pub struct CloudflareZoneUpdater {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API base URL
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform lookups but skip the batch request
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareZoneUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareZoneUpdater")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareZoneUpdater {
    /// Create a new Cloudflare zone updater
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `dry_run`: If true, perform lookups but skip the batch request
    pub fn new(api_token: impl Into<String>, dry_run: bool) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Create a new updater in live mode
    pub fn new_live(api_token: impl Into<String>) -> Result<Self> {
        Self::new(api_token, false)
    }

    /// Create a new updater in dry-run mode
    pub fn new_dry_run(api_token: impl Into<String>) -> Result<Self> {
        Self::new(api_token, true)
    }

    /// Create a new updater, choosing the mode from `DDNS_MODE`
    pub fn from_env(api_token: impl Into<String>) -> Result<Self> {
        let dry_run = is_dry_run(std::env::var(MODE_ENV_VAR).ok().as_deref());
        if dry_run {
            tracing::warn!("Cloudflare updater running in DRY-RUN mode - no changes will be made");
        }
        Self::new(api_token, dry_run)
    }

    /// Point the updater at another API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Find the id of the record with this name and type, if any
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=home.example.com&type=A
    /// Authorization: Bearer <token>
    /// ```
    async fn find_record_id(
        &self,
        zone_id: &str,
        change: &RecordChange,
    ) -> Result<Option<String>> {
        tracing::debug!(
            "Looking up record ID: {} (type: {})",
            change.fqdn,
            change.record_type
        );

        let url = format!("{}/zones/{}/dns_records", self.base_url, zone_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .query(&[
                ("name", change.fqdn.as_str()),
                ("type", change.record_type.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let records: Vec<ExistingRecord> = read_result(response, "Record lookup").await?;
        Ok(records.into_iter().next().map(|record| record.id))
    }

    /// Send the batch request
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /zones/:zone_id/dns_records/batch
    /// {
    ///   "posts": [{ "name": ..., "type": "A", "content": ..., "ttl": 300, "comment": ... }],
    ///   "puts":  [{ "id": ..., "name": ..., "type": "A", "content": ..., "ttl": 300, "comment": ... }]
    /// }
    /// ```
    async fn send_batch(&self, zone_id: &str, request: &BatchRequest<'_>) -> Result<()> {
        let url = format!("{}/zones/{}/dns_records/batch", self.base_url, zone_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let _: serde_json::Value = read_result(response, "Batch update").await?;
        Ok(())
    }
}

#[async_trait]
impl ZoneUpdater for CloudflareZoneUpdater {
    async fn apply_batch(&self, batch: &UpdateBatch) -> Result<()> {
        tracing::info!(
            "Updating Cloudflare zone {}: {} change(s) [mode: {}]",
            batch.zone_id,
            batch.changes.len(),
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );

        let mut request = BatchRequest::default();
        for change in &batch.changes {
            let id = self.find_record_id(&batch.zone_id, change).await?;
            let record = BatchRecord {
                id,
                name: &change.fqdn,
                record_type: change.record_type.as_str(),
                content: &change.value,
                ttl: change.ttl,
                comment: &batch.comment,
            };
            if record.id.is_some() {
                request.puts.push(record);
            } else {
                request.posts.push(record);
            }
        }

        if request.posts.is_empty() && request.puts.is_empty() {
            return Ok(());
        }

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send batch to zone {} with payload: {}",
                batch.zone_id,
                serde_json::to_string(&request)?
            );
            return Ok(());
        }

        self.send_batch(&batch.zone_id, &request).await?;

        tracing::info!(
            "Cloudflare zone {} updated: {} created, {} replaced",
            batch.zone_id,
            request.posts.len(),
            request.puts.len()
        );
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Whether a `DDNS_MODE` value selects dry-run mode
pub fn is_dry_run(mode: Option<&str>) -> bool {
    mode.is_some_and(|mode| mode.trim().eq_ignore_ascii_case("dry-run"))
}

/// Check the status and envelope of a response and extract its result
async fn read_result<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        return Err(status_error(status, context, &error_text));
    }

    let envelope: ApiResponse<T> = response
        .json()
        .await
        .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;

    if !envelope.success {
        let messages: Vec<String> = envelope
            .errors
            .iter()
            .map(|e| format!("{} ({})", e.message, e.code))
            .collect();
        return Err(Error::provider(
            PROVIDER,
            format!("{} rejected: {}", context, messages.join("; ")),
        ));
    }

    envelope.result.ok_or_else(|| {
        Error::provider(PROVIDER, format!("{}: response has no result", context))
    })
}

/// Map an HTTP error status to an error
fn status_error(status: StatusCode, context: &str, error_text: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid API token or insufficient permissions. Status: {}",
            status
        )),
        404 => Error::not_found(format!("{}: zone or record not found", context)),
        429 => Error::rate_limited(format!(
            "Rate limit exceeded. Please retry later. Status: {}",
            status
        )),
        500..=599 => Error::provider(
            PROVIDER,
            format!("Cloudflare server error (transient): {} - {}", status, error_text),
        ),
        _ => Error::provider(
            PROVIDER,
            format!("{} failed: {} - {}", context, status, error_text),
        ),
    }
}
