//! Authenticated session against the telemetry provider.
//!
//! The session is the single owner of the bearer credential. It logs in
//! lazily, and when the provider answers 401 it re-authenticates once and
//! replays the request once. Nothing else in the crate touches the token.

use chrono::Utc;
use reqwest::StatusCode;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::TelemetryConfig;
use crate::error::{RelayError, RelayResult};
use crate::sensors::SensorId;

use super::types::{
    Credential, LoginRequest, LoginResponse, TelemetryReading, TelemetrySeries, TelemetryWindow,
};

/// Login path, relative to the provider base URL.
const LOGIN_PATH: &str = "api/Auth/Login";

/// Grouped telemetry path, relative to the provider base URL.
const TELEMETRY_PATH: &str = "api/Device/GetDeviceTelemetryV2";

/// Aggregation granularity requested from the provider.
const GROUP_BY: &str = "1m";

/// Session manager for the telemetry provider.
pub struct TelemetrySession {
    client: reqwest::Client,
    login_url: Url,
    telemetry_url: Url,
    email: String,
    password: String,
    time_zone: String,
    credential: Mutex<Option<Credential>>,
}

impl TelemetrySession {
    /// Create a session with no credential held.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: &TelemetryConfig) -> RelayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("telemetry http client: {e}")))?;

        Ok(Self {
            client,
            login_url: endpoint(&config.base_url, LOGIN_PATH)?,
            telemetry_url: endpoint(&config.base_url, TELEMETRY_PATH)?,
            email: config.email.clone(),
            password: config.password.clone(),
            time_zone: config.time_zone.clone(),
            credential: Mutex::new(None),
        })
    }

    /// Return the held credential, logging in first if none is held.
    ///
    /// # Errors
    /// Returns `RelayError::Auth` if a required login fails.
    pub async fn ensure_authenticated(&self) -> RelayResult<Credential> {
        let mut held = self.credential.lock().await;
        if let Some(credential) = held.as_ref() {
            return Ok(credential.clone());
        }
        let credential = self.request_token().await?;
        *held = Some(credential.clone());
        Ok(credential)
    }

    /// Log in and store the new credential.
    ///
    /// On failure the previously held credential, if any, is kept.
    ///
    /// # Errors
    /// Returns `RelayError::Auth` if the provider does not report success.
    pub async fn login(&self) -> RelayResult<Credential> {
        let mut held = self.credential.lock().await;
        let credential = self.request_token().await?;
        *held = Some(credential.clone());
        Ok(credential)
    }

    #[cfg(test)]
    pub(crate) async fn is_authenticated(&self) -> bool {
        self.credential.lock().await.is_some()
    }

    /// Fetch the most recent per-minute reading for `sensor` over the last ten minutes.
    ///
    /// # Errors
    /// Returns `RelayError::Auth` if the initial login fails, and
    /// `RelayError::Telemetry` for every other failure, including a 401 that
    /// survives one re-authentication.
    pub async fn fetch_telemetry(&self, sensor: &SensorId) -> RelayResult<TelemetryReading> {
        let response = self
            .send_authorized(|client, credential| {
                let window = TelemetryWindow::ending_at(Utc::now());
                client
                    .get(self.telemetry_url.clone())
                    .query(&[
                        ("deviceId", sensor.as_str()),
                        ("startDate", window.start.as_str()),
                        ("endDate", window.end.as_str()),
                        ("groupBy", GROUP_BY),
                        ("timeZone", self.time_zone.as_str()),
                        ("isFlair1", "false"),
                    ])
                    .bearer_auth(credential.as_str())
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Telemetry(format!(
                "provider returned status {status} for sensor {sensor}"
            )));
        }

        let series: TelemetrySeries = response
            .json()
            .await
            .map_err(|e| RelayError::Telemetry(format!("malformed telemetry body: {e}")))?;

        let first = series
            .data
            .into_iter()
            .next()
            .ok_or_else(|| RelayError::Telemetry("empty telemetry series".to_string()))?;

        debug!(sensor = %sensor, "telemetry bucket received");
        Ok(TelemetryReading::from(first))
    }

    /// Authenticate, attempt once; on 401 re-authenticate and attempt exactly once more.
    ///
    /// `build` is invoked once per attempt so each attempt carries its own
    /// credential and freshly computed parameters.
    async fn send_authorized<F>(&self, build: F) -> RelayResult<reqwest::Response>
    where
        F: Fn(&reqwest::Client, &Credential) -> reqwest::RequestBuilder,
    {
        let credential = self.ensure_authenticated().await?;
        let response = send_telemetry(build(&self.client, &credential)).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!("telemetry token rejected, refreshing");
        let refreshed = self.refresh(&credential).await.map_err(|e| {
            RelayError::Telemetry(format!("re-authentication after 401 failed: {e}"))
        })?;

        let retried = send_telemetry(build(&self.client, &refreshed)).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            self.invalidate(&refreshed).await;
            return Err(RelayError::Telemetry(
                "still unauthorized after re-authentication".to_string(),
            ));
        }
        Ok(retried)
    }

    /// Replace a credential the provider rejected.
    ///
    /// If a concurrent request already swapped `stale` for a new token, that
    /// token is reused instead of logging in again.
    async fn refresh(&self, stale: &Credential) -> RelayResult<Credential> {
        let mut held = self.credential.lock().await;
        if let Some(current) = held.as_ref() {
            if current != stale {
                debug!("credential already refreshed by a concurrent request");
                return Ok(current.clone());
            }
        }
        *held = None;
        let credential = self.request_token().await?;
        *held = Some(credential.clone());
        Ok(credential)
    }

    async fn invalidate(&self, stale: &Credential) {
        let mut held = self.credential.lock().await;
        if held.as_ref() == Some(stale) {
            *held = None;
        }
    }

    /// POST the account credentials and extract the token. Does not touch state.
    async fn request_token(&self) -> RelayResult<Credential> {
        info!("logging in to telemetry provider");
        let response = self
            .client
            .post(self.login_url.clone())
            .json(&LoginRequest {
                email: &self.email,
                password: &self.password,
            })
            .send()
            .await
            .map_err(|e| RelayError::Auth(describe_transport(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Auth(format!("login returned status {status}")));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| RelayError::Auth(format!("malformed login body: {e}")))?;

        body.into_token()
            .map(Credential::new)
            .ok_or_else(|| RelayError::Auth("login was not reported as successful".to_string()))
    }
}

async fn send_telemetry(request: reqwest::RequestBuilder) -> RelayResult<reqwest::Response> {
    request
        .send()
        .await
        .map_err(|e| RelayError::Telemetry(describe_transport(&e)))
}

/// Human-readable description of a transport failure.
pub(crate) fn describe_transport(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        format!("request failed: {err}")
    }
}

/// Join `path` onto `base`, keeping any path prefix on the base URL.
pub(crate) fn endpoint(base: &str, path: &str) -> RelayResult<Url> {
    let joined = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    Url::parse(&joined).map_err(|e| RelayError::Config(format!("invalid URL {joined}: {e}")))
}
