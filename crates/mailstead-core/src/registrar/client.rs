//! HTTP client for the registrar's zone API
//!
//! The API is command-oriented: a `get_hosts` command returns the full
//! record list for a zone and a `set_hosts` command replaces it
//! wholesale. Error entries in the response body are checked before the
//! payload is trusted, and are mapped to distinct error kinds because
//! recovery differs: authorization failures need operator action,
//! validation failures need a corrected request, connectivity failures
//! are retryable.

use async_trait::async_trait;
use mailstead_common::config::RegistrarConfig;
use mailstead_common::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// A record as held at the registrar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRecord {
    /// Zone-relative host name ("@" for the apex)
    #[serde(rename = "host")]
    pub host: String,
    /// Registrar type string ("A", "MX", "TXT", "CNAME", ...)
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(rename = "value")]
    pub value: String,
    #[serde(rename = "ttl")]
    pub ttl: u32,
    /// MX priority, absent for other types
    #[serde(rename = "mx_pref", skip_serializing_if = "Option::is_none")]
    pub mx_pref: Option<u16>,
}

/// Whole-zone read and replace operations.
///
/// `write_zone` replaces the entire zone; callers own the construction
/// of a complete, correct list. There is no partial update.
#[async_trait]
pub trait RegistrarClient: Send + Sync {
    async fn read_zone(&self, parent_zone: &str) -> Result<Vec<ZoneRecord>>;
    async fn write_zone(&self, parent_zone: &str, records: &[ZoneRecord]) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    command: &'a str,
    api_user: &'a str,
    api_key: &'a str,
    client_ip: &'a str,
    sld: &'a str,
    tld: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    hosts: Option<&'a [ZoneRecord]>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    errors: Vec<ApiError>,
    #[serde(default)]
    hosts: Vec<ZoneRecord>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: u32,
    message: String,
}

impl ApiError {
    fn into_error(self) -> Error {
        // 1xxx codes are credential and whitelist failures,
        // 2xxx codes are request validation failures
        match self.code {
            1000..=1999 => Error::Authorization(format!("{} (code {})", self.message, self.code)),
            2000..=2999 => Error::Validation(format!("{} (code {})", self.message, self.code)),
            _ => Error::Validation(format!("{} (code {})", self.message, self.code)),
        }
    }
}

/// Registrar client over the JSON command API
pub struct HttpRegistrarClient {
    http: Client,
    config: RegistrarConfig,
}

impl HttpRegistrarClient {
    pub fn new(config: RegistrarConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    async fn call(&self, command: &str, parent_zone: &str, hosts: Option<&[ZoneRecord]>) -> Result<ApiResponse> {
        let (sld, tld) = split_zone(parent_zone)?;

        let request = ApiRequest {
            command,
            api_user: &self.config.api_user,
            api_key: &self.config.api_key,
            client_ip: &self.config.client_ip,
            sld,
            tld,
            hosts,
        };

        debug!(command, parent_zone, "Calling registrar API");

        let response = self
            .http
            .post(&self.config.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Connectivity(format!("Registrar request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Connectivity(format!(
                "Registrar returned HTTP {status}"
            )));
        }

        let mut body: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Connectivity(format!("Malformed registrar response: {e}")))?;

        // Errors invalidate the whole response, payload included
        if let Some(first) = body.errors.drain(..).next() {
            warn!(command, parent_zone, code = first.code, "Registrar API error");
            return Err(first.into_error());
        }

        Ok(body)
    }
}

#[async_trait]
impl RegistrarClient for HttpRegistrarClient {
    async fn read_zone(&self, parent_zone: &str) -> Result<Vec<ZoneRecord>> {
        let body = self.call("get_hosts", parent_zone, None).await?;
        Ok(body.hosts)
    }

    async fn write_zone(&self, parent_zone: &str, records: &[ZoneRecord]) -> Result<()> {
        self.call("set_hosts", parent_zone, Some(records)).await?;
        Ok(())
    }
}

/// Split a registrable zone into second-level and top-level parts
fn split_zone(parent_zone: &str) -> Result<(&str, &str)> {
    parent_zone
        .split_once('.')
        .filter(|(sld, tld)| !sld.is_empty() && !tld.is_empty())
        .ok_or_else(|| Error::Validation(format!("Not a registrable zone: {parent_zone}")))
}
