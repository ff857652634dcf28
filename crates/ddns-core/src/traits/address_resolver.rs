// # Address Resolver Trait
//
// Defines the interface for discovering the externally visible addresses.
//
// ## Implementations
//
// - HTTP "what is my IP" endpoints: `ddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::AddressResolver;
//
// let address = resolver.resolve().await;
// if let Some(v4) = address.v4 {
//     println!("public IPv4: {}", v4);
// }
// ```

use async_trait::async_trait;

use crate::model::PublicAddress;

/// Trait for public address discovery
///
/// IPv4 and IPv6 are resolved independently. A family that fails leaves
/// its slot in [`PublicAddress`] empty; the failure itself is reported
/// through logging, never as an error from this call.
///
/// # Trust Level: Semi-Trusted
///
/// Resolvers may perform network I/O to their configured endpoints only.
/// They must not touch the record store, decide whether an update is
/// needed, or retry on their own.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve the current public addresses
    ///
    /// Dropping the returned future aborts any in-flight request.
    async fn resolve(&self) -> PublicAddress;
}
