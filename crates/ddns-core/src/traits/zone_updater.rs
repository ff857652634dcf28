// # Zone Updater Trait
//
// Defines the interface to the upstream DNS hosting provider.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
//
// The provider receives one [`UpdateBatch`] per zone and either applies it
// or fails. The engine treats provider errors opaquely.

use async_trait::async_trait;

use crate::model::UpdateBatch;

/// Trait for DNS provider implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Return success or failure
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (a failed batch is retried on the next cycle)
/// - ❌ Access the record store
/// - ❌ Spawn tasks or cache state between calls
#[async_trait]
pub trait ZoneUpdater: Send + Sync {
    /// Apply every upsert in `batch` to the zone `batch.zone_id`
    async fn apply_batch(&self, batch: &UpdateBatch) -> Result<(), crate::Error>;

    /// Provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
