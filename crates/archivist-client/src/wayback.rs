use archivist_core::classify;
use archivist_core::error::AppError;
use archivist_core::models::{CaptureJob, ClosestSnapshot, StatusPayload};
use archivist_core::traits::CaptureApi;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::config::WaybackConfig;

/// Wayback Machine "Save Page Now" and availability client.
///
/// One `reqwest::Client` is shared by all three endpoints; cloning is cheap.
#[derive(Clone)]
pub struct WaybackClient {
    client: Client,
    save_url: Url,
    availability_url: Url,
    authorization: String,
    js_behavior_timeout: String,
    timeout_secs: u64,
}

impl WaybackClient {
    pub fn new(config: &WaybackConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(concat!("Archivist/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            save_url: parse_endpoint("save", &config.save_url)?,
            availability_url: parse_endpoint("availability", &config.availability_url)?,
            authorization: config.authorization(),
            js_behavior_timeout: config.js_behavior_timeout.to_string(),
            timeout_secs: config.request_timeout.as_secs(),
        })
    }

    /// `{save_url}/status/{job_id}`
    fn status_url(&self, job_id: &str) -> Result<Url, AppError> {
        let mut url = self.save_url.clone();
        url.path_segments_mut()
            .map_err(|()| AppError::ConfigError(format!("Save URL cannot be a base: {}", self.save_url)))?
            .pop_if_empty()
            .extend(["status", job_id]);
        Ok(url)
    }

    fn authenticated(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, AppError> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        })
    }
}

fn parse_endpoint(name: &str, raw: &str) -> Result<Url, AppError> {
    Url::parse(raw).map_err(|e| AppError::ConfigError(format!("Invalid {name} URL '{raw}': {e}")))
}

// ---- Wayback API types ----

#[derive(Deserialize)]
struct SubmitResponse {
    job_id: Option<String>,
    status_ext: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct AvailabilityResponse {
    #[serde(default)]
    archived_snapshots: ArchivedSnapshots,
}

#[derive(Deserialize, Default)]
struct ArchivedSnapshots {
    closest: Option<ClosestSnapshot>,
}

fn http_status_error(status: StatusCode, url: &str) -> AppError {
    AppError::HttpError(format!(
        "HTTP {} for capture submission of {url}",
        status.as_u16()
    ))
}

/// Turn a parsed submission body into a job or a classified rejection.
fn submission_result(url: &str, body: SubmitResponse) -> Result<CaptureJob, AppError> {
    if let Some(job_id) = body.job_id.filter(|id| !id.is_empty()) {
        return Ok(CaptureJob {
            job_id,
            submitted_url: url.to_string(),
        });
    }
    match body.status_ext {
        Some(code) => {
            tracing::warn!(%url, %code, message = ?body.message, "Capture submission rejected");
            let retryable = classify::is_retryable(&code);
            Err(AppError::CaptureJob { code, retryable })
        }
        None => Err(AppError::HttpError(format!(
            "Capture submission for {url} returned no job_id"
        ))),
    }
}

impl CaptureApi for WaybackClient {
    async fn submit(&self, url: &str) -> Result<CaptureJob, AppError> {
        let form = [
            ("url", url),
            ("skip_first_archive", "1"),
            ("js_behavior_timeout", self.js_behavior_timeout.as_str()),
        ];
        let request = self.authenticated(self.client.post(self.save_url.clone())).form(&form);
        let response = self.send(request).await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimitExceeded);
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))?;

        match serde_json::from_str::<SubmitResponse>(&body) {
            // Rejections come back as JSON with a status_ext code, sometimes under a 4xx.
            Ok(parsed) if status.is_success() || parsed.status_ext.is_some() => {
                submission_result(url, parsed)
            }
            Ok(_) => Err(http_status_error(status, url)),
            Err(_) if !status.is_success() => Err(http_status_error(status, url)),
            Err(e) => Err(AppError::HttpError(format!(
                "Failed to parse capture submission response: {e}"
            ))),
        }
    }

    async fn capture_status(&self, job_id: &str) -> Result<StatusPayload, AppError> {
        let url = self.status_url(job_id)?;
        let response = self.send(self.authenticated(self.client.get(url))).await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimitExceeded);
        }
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for capture status of job {job_id}",
                status.as_u16()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to parse capture status: {e}")))
    }

    async fn closest_snapshot(&self, url: &str) -> Result<Option<ClosestSnapshot>, AppError> {
        let mut lookup = self.availability_url.clone();
        lookup.query_pairs_mut().append_pair("url", url);

        let response = self
            .send(
                self.client
                    .get(lookup)
                    .header(reqwest::header::ACCEPT, "application/json"),
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for availability lookup of {url}",
                status.as_u16()
            )));
        }

        let parsed: AvailabilityResponse = response
            .json()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to parse availability response: {e}")))?;
        Ok(parsed.archived_snapshots.closest)
    }
}
