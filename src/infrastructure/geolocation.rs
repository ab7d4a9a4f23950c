use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoInfo {
    pub ip: String,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub flag: Option<String>,
}

#[async_trait]
pub trait GeoLocator: Send + Sync {
    /// `ip` is the caller's address as seen by the server, if known.
    async fn locate(&self, ip: Option<&str>) -> Result<GeoInfo>;
}

/// Used when no lookup endpoint is configured.
pub struct DisabledGeoLocator;

#[async_trait]
impl GeoLocator for DisabledGeoLocator {
    async fn locate(&self, _ip: Option<&str>) -> Result<GeoInfo> {
        bail!("IP lookup is disabled")
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    ip: Option<String>,
    #[serde(alias = "countryCode")]
    country_code: Option<String>,
    country_name: Option<String>,
}

/// Queries a JSON IP-lookup endpoint. `{ip}` in the URL template is replaced
/// with the caller's address; when it is unknown the placeholder is dropped so
/// the endpoint reports on the requesting host.
pub struct HttpGeoLocator {
    client: reqwest::Client,
    url_template: String,
}

impl HttpGeoLocator {
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            url_template: url_template.into(),
        }
    }

    fn url_for(&self, ip: Option<&str>) -> String {
        match ip {
            Some(ip) => self.url_template.replace("{ip}", ip),
            None => self.url_template.replace("{ip}/", "").replace("{ip}", ""),
        }
    }
}

#[async_trait]
impl GeoLocator for HttpGeoLocator {
    #[instrument(skip(self))]
    async fn locate(&self, ip: Option<&str>) -> Result<GeoInfo> {
        let url = self.url_for(ip);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("IP lookup request failed")?
            .error_for_status()
            .context("IP lookup returned an error status")?;
        let body: LookupResponse = response.json().await.context("IP lookup body was not JSON")?;

        let resolved_ip = body
            .ip
            .or_else(|| ip.map(str::to_string))
            .context("IP lookup did not return an address")?;
        let country_code = body.country_code.map(|c| c.to_ascii_uppercase());
        let flag = country_code.as_deref().and_then(country_flag);
        debug!(ip = %resolved_ip, country = ?country_code, "IP lookup succeeded");

        Ok(GeoInfo {
            ip: resolved_ip,
            country_code,
            country_name: body.country_name,
            flag,
        })
    }
}

/// Regional-indicator emoji for a two-letter ISO country code.
pub fn country_flag(code: &str) -> Option<String> {
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    code.to_ascii_uppercase()
        .chars()
        .map(|c| char::from_u32(0x1F1E6 + (c as u32 - 'A' as u32)))
        .collect()
}
