//! Devbox search API adapter
//!
//! Resolves package versions against the Devbox search service.
//! API endpoints:
//! - `{base}/v2/resolve?name={package}&version={version}`
//! - `{base}/v2/pkg?name={package}`

use crate::error::AppError;
use crate::registry::{HttpClient, PackageInfo, RegistryApi, ResolvedPackage};
use async_trait::async_trait;

/// Devbox search service base URL
pub const DEVBOX_SEARCH_URL: &str = "https://search.devbox.sh";

/// Devbox search API adapter
pub struct NixhubApi {
    client: HttpClient,
    base_url: String,
}

impl NixhubApi {
    /// Create a new adapter against the public search service
    pub fn new(client: HttpClient) -> Self {
        Self::with_base_url(client, DEVBOX_SEARCH_URL)
    }

    /// Create a new adapter against a custom search service
    pub fn with_base_url(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn resolve_url(&self) -> String {
        format!("{}/v2/resolve", self.base_url)
    }

    fn package_url(&self) -> String {
        format!("{}/v2/pkg", self.base_url)
    }
}

#[async_trait]
impl RegistryApi for NixhubApi {
    async fn resolve(&self, name: &str, version: &str) -> Result<ResolvedPackage, AppError> {
        self.client
            .get_json(&self.resolve_url(), &[("name", name), ("version", version)], name)
            .await
    }

    async fn package_info(&self, name: &str) -> Result<PackageInfo, AppError> {
        self.client
            .get_json(&self.package_url(), &[("name", name)], name)
            .await
    }
}
