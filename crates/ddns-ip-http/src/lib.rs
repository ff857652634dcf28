// # HTTP Address Resolver
//
// This crate provides the HTTP-based address resolver for the DDNS system.
//
// ## Architecture
//
// Each family has its own "what is my IP" endpoint (e.g. api.ipify.org and
// api6.ipify.org) that answers a GET with the bare address as the body.
// Both endpoints are queried concurrently on every resolve; a family whose
// request fails is logged and left empty for that cycle.
//
// ## Request Pipeline
//
// build request → execute → require 200 → read body → trim → parse as the
// family's address type. Any step failing is a resolution error for that
// family only.

use ddns_core::config::ResolverConfig;
use ddns_core::model::{IpFamily, PublicAddress};
use ddns_core::traits::AddressResolver;
use ddns_core::{Error, Result};

use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, error};

/// Default IPv4 endpoint
pub const DEFAULT_IPV4_ENDPOINT: &str = "https://api.ipify.org";

/// Default IPv6 endpoint
pub const DEFAULT_IPV6_ENDPOINT: &str = "https://api6.ipify.org";

/// Per-request timeout
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// HTTP-based public address resolver
pub struct HttpAddressResolver {
    /// URL answering with the public IPv4 address
    ipv4_url: String,

    /// URL answering with the public IPv6 address
    ipv6_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpAddressResolver {
    /// Create a resolver for the configured endpoints
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        Self::with_endpoints(&config.ipv4.endpoint, &config.ipv6.endpoint)
    }

    /// Create a resolver for explicit endpoint URLs
    pub fn with_endpoints(
        ipv4_url: impl Into<String>,
        ipv6_url: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            ipv4_url: ipv4_url.into(),
            ipv6_url: ipv6_url.into(),
            client,
        })
    }

    /// Resolve the public IPv4 address
    pub async fn resolve_v4(&self) -> Result<Ipv4Addr> {
        let body = self.fetch(&self.ipv4_url, IpFamily::V4).await?;
        body.parse().map_err(|_| {
            Error::resolution(IpFamily::V4, format!("Invalid IPv4 address: {:?}", body))
        })
    }

    /// Resolve the public IPv6 address
    pub async fn resolve_v6(&self) -> Result<Ipv6Addr> {
        let body = self.fetch(&self.ipv6_url, IpFamily::V6).await?;
        body.parse().map_err(|_| {
            Error::resolution(IpFamily::V6, format!("Invalid IPv6 address: {:?}", body))
        })
    }

    /// GET `url` and return the trimmed body of a 200 response
    async fn fetch(&self, url: &str, family: IpFamily) -> Result<String> {
        let request = self
            .client
            .get(url)
            .build()
            .map_err(|e| Error::resolution(family, format!("Invalid request: {}", e)))?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| Error::resolution(family, format!("Request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::resolution(
                family,
                format!("Unexpected status: {}", status),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::resolution(family, format!("Failed to read response: {}", e)))?;

        Ok(body.trim().to_string())
    }
}

#[async_trait::async_trait]
impl AddressResolver for HttpAddressResolver {
    async fn resolve(&self) -> PublicAddress {
        let (v4, v6) = tokio::join!(self.resolve_v4(), self.resolve_v6());

        let v4 = v4
            .inspect_err(|e| {
                error!(
                    "Failed to resolve public IPv4 address via {}: {}",
                    self.ipv4_url, e
                )
            })
            .ok();
        let v6 = v6
            .inspect_err(|e| {
                error!(
                    "Failed to resolve public IPv6 address via {}: {}",
                    self.ipv6_url, e
                )
            })
            .ok();

        debug!("Resolved public address: v4={:?} v6={:?}", v4, v6);
        PublicAddress { v4, v6 }
    }
}
