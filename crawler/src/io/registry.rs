//! Latest-version lookups against an npm-compatible registry.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::{debug, instrument};

/// "Latest published version of package X", or an error when unknown.
pub trait RegistryLookup: Sync {
    fn latest_version(&self, package: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct LatestDocument {
    version: String,
}

/// Blocking HTTP client for `GET {base_url}/{package}/latest`.
pub struct NpmRegistry {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl NpmRegistry {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("crawler/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build registry client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// URL of the `latest` dist-tag document; scoped names keep their `@` but escape `/`.
    pub fn latest_url(&self, package: &str) -> String {
        format!("{}/{}/latest", self.base_url, package.replace('/', "%2f"))
    }
}

impl RegistryLookup for NpmRegistry {
    #[instrument(skip(self))]
    fn latest_version(&self, package: &str) -> Result<String> {
        let url = self.latest_url(package);
        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("request {url}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("registry returned {status} for {package}"));
        }
        let document: LatestDocument = response
            .json()
            .with_context(|| format!("parse registry response for {package}"))?;
        debug!(version = %document.version, "latest version resolved");
        Ok(document.version)
    }
}
