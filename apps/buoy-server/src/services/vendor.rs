use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value as JsonValue;
use url::Url;

use crate::time::QueryWindow;

#[derive(Debug, thiserror::Error)]
pub enum VendorError {
    #[error("invalid vendor url: {0}")]
    Url(String),
    #[error("vendor request timed out after {0:?}")]
    Timeout(Duration),
    #[error("vendor request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("vendor responded with HTTP {0}")]
    Status(StatusCode),
    #[error("vendor returned an empty body")]
    EmptyBody,
    #[error("vendor returned malformed JSON: {0}")]
    Malformed(#[source] serde_json::Error),
}

impl VendorError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, VendorError::Status(status) if *status == StatusCode::TOO_MANY_REQUESTS)
    }

    /// The vendor answered, but with something unusable (rate limit page,
    /// empty or non-JSON body).
    pub fn is_degraded_answer(&self) -> bool {
        self.is_rate_limited() || matches!(self, VendorError::EmptyBody | VendorError::Malformed(_))
    }
}

/// Client for the buoy telemetry vendor. Holds the device id and the static
/// token that the vendor expects as a query parameter.
#[derive(Clone)]
pub struct VendorClient {
    http: reqwest::Client,
    base_url: Url,
    device_id: String,
    token: String,
    timeout: Duration,
}

impl VendorClient {
    pub fn new(
        http: reqwest::Client,
        base_url: Url,
        device_id: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url,
            device_id: device_id.into(),
            token: token.into(),
            timeout,
        }
    }

    /// `{base}/{device}/{category}/{sensor}[/{start}/{end}]?token=…`
    pub fn series_url(
        &self,
        category: &str,
        sensor: &str,
        window: Option<&QueryWindow>,
    ) -> Result<Url, VendorError> {
        let mut segments = vec![
            self.device_id.clone(),
            category.to_string(),
            sensor.to_string(),
        ];
        if let Some(window) = window {
            segments.push(window.vendor_start());
            segments.push(window.vendor_end());
        }
        self.build_url(&segments)
    }

    /// `{base}/lastStatus/{device}/{station}/recent/?token=…`
    pub fn status_url(&self, station: &str) -> Result<Url, VendorError> {
        self.build_url(&[
            "lastStatus".to_string(),
            self.device_id.clone(),
            station.to_string(),
            "recent".to_string(),
            String::new(),
        ])
    }

    fn build_url(&self, segments: &[String]) -> Result<Url, VendorError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| VendorError::Url(format!("{} cannot be a base", self.base_url)))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        url.query_pairs_mut().append_pair("token", &self.token);
        Ok(url)
    }

    pub async fn fetch_series(
        &self,
        category: &str,
        sensor: &str,
        window: Option<&QueryWindow>,
    ) -> Result<JsonValue, VendorError> {
        let url = self.series_url(category, sensor, window)?;
        self.fetch_json(url, self.timeout).await
    }

    pub async fn fetch_status(
        &self,
        station: &str,
        timeout: Duration,
    ) -> Result<JsonValue, VendorError> {
        let url = self.status_url(station)?;
        self.fetch_json(url, timeout).await
    }

    async fn fetch_json(&self, url: Url, timeout: Duration) -> Result<JsonValue, VendorError> {
        let path = url.path().to_string();
        tracing::debug!(%path, "fetching vendor telemetry");

        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| classify_transport(err, timeout))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%path, %status, "vendor returned non-success status");
            return Err(VendorError::Status(status));
        }

        let body = response
            .text()
            .await
            .map_err(|err| classify_transport(err, timeout))?;
        parse_body(&body)
    }
}

fn classify_transport(err: reqwest::Error, timeout: Duration) -> VendorError {
    if err.is_timeout() {
        VendorError::Timeout(timeout)
    } else {
        VendorError::Transport(err.without_url())
    }
}

pub fn parse_body(body: &str) -> Result<JsonValue, VendorError> {
    if body.trim().is_empty() {
        return Err(VendorError::EmptyBody);
    }
    serde_json::from_str(body).map_err(VendorError::Malformed)
}
