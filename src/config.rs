//! Configuration for the relay.
//!
//! Values come from the process environment (optionally seeded from a `.env`
//! file by the bootstrap). Secrets have no defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::error::{RelayError, RelayResult};

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default telemetry provider base URL.
const DEFAULT_TELEMETRY_BASE_URL: &str = "https://thinkliteairwebapiprod.azurewebsites.net";

/// Default sensor metadata lookup URL.
const DEFAULT_SENSOR_METADATA_URL: &str = "https://www.anapana.mx/server/getsensor.php";

/// Default completion model.
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Top-level relay configuration.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RelayConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Telemetry provider settings.
    pub telemetry: TelemetryConfig,
    /// Sensor metadata provider settings.
    pub sensors: SensorConfig,
    /// Completion provider settings.
    pub completion: CompletionConfig,
}

impl RelayConfig {
    /// Build the configuration from process environment variables.
    ///
    /// # Errors
    /// Returns an error if a variable is present but unparseable, or if the
    /// resulting configuration fails validation.
    pub fn from_env() -> RelayResult<Self> {
        let mut config = Self::default();

        if let Some(port) = env_parse::<u16>("PORT")? {
            config.server.port = port;
        }
        if let Some(path) = env_var("AIRWISE_SYSTEM_PROMPT") {
            config.server.system_prompt_path = PathBuf::from(path);
        }
        if let Some(secs) = env_parse::<u64>("AIRWISE_HTTP_TIMEOUT_SECS")? {
            let timeout = Duration::from_secs(secs);
            config.telemetry.request_timeout = timeout;
            config.sensors.request_timeout = timeout;
            config.completion.request_timeout = timeout;
        }

        if let Some(base_url) = env_var("TELEMETRY_BASE_URL") {
            config.telemetry.base_url = base_url;
        }
        config.telemetry.email = env_var("TELEMETRY_EMAIL").unwrap_or_default();
        config.telemetry.password = env_var("TELEMETRY_PASSWORD").unwrap_or_default();
        if let Some(tz) = env_var("TELEMETRY_TIME_ZONE") {
            config.telemetry.time_zone = tz;
        }

        if let Some(url) = env_var("SENSOR_METADATA_URL") {
            config.sensors.metadata_url = url;
        }

        config.completion.api_key = env_var("OPENAI_API_KEY").unwrap_or_default();
        if let Some(model) = env_var("AIRWISE_MODEL") {
            config.completion.model = model;
        }
        if let Some(max_tokens) = env_parse::<u64>("AIRWISE_MAX_TOKENS")? {
            config.completion.max_tokens = max_tokens;
        }
        if let Some(temperature) = env_parse::<f64>("AIRWISE_TEMPERATURE")? {
            config.completion.temperature = temperature;
        }
        config.completion.base_url = env_var("AIRWISE_OPENAI_BASE_URL");

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> RelayResult<()> {
        require_url("telemetry.base_url", &self.telemetry.base_url)?;
        require_url("sensors.metadata_url", &self.sensors.metadata_url)?;
        if let Some(base_url) = &self.completion.base_url {
            require_url("completion.base_url", base_url)?;
        }

        if self.telemetry.email.trim().is_empty() || self.telemetry.password.is_empty() {
            return Err(RelayError::Config(
                "TELEMETRY_EMAIL and TELEMETRY_PASSWORD must be set".to_string(),
            ));
        }

        if self.completion.api_key.trim().is_empty() {
            return Err(RelayError::Config("OPENAI_API_KEY must be set".to_string()));
        }

        if self.completion.max_tokens == 0 {
            return Err(RelayError::Config(
                "completion.max_tokens must be > 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return Err(RelayError::Config(
                "completion.temperature must be within [0, 2]".to_string(),
            ));
        }

        for (name, timeout) in [
            ("telemetry.request_timeout", self.telemetry.request_timeout),
            ("sensors.request_timeout", self.sensors.request_timeout),
            ("completion.request_timeout", self.completion.request_timeout),
        ] {
            if timeout.is_zero() {
                return Err(RelayError::Config(format!("{name} must be > 0")));
            }
        }

        Ok(())
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
    /// File holding the system prompt prepended to every conversation.
    pub system_prompt_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            system_prompt_path: PathBuf::from("system_prompt.txt"),
        }
    }
}

/// Telemetry provider settings.
#[derive(Clone, Debug, Serialize)]
pub struct TelemetryConfig {
    /// Base URL of the telemetry web API.
    pub base_url: String,
    /// Account email used for login.
    pub email: String,
    /// Account password used for login.
    #[serde(skip_serializing)]
    pub password: String,
    /// Time zone passed to the telemetry endpoint.
    pub time_zone: String,
    /// Timeout applied to every call to the provider.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TELEMETRY_BASE_URL.to_string(),
            email: String::new(),
            password: String::new(),
            time_zone: "America/New_York".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl TelemetryConfig {
    /// Point the client at another base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the login account.
    #[must_use]
    pub fn with_account(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.email = email.into();
        self.password = password.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Sensor metadata provider settings.
#[derive(Clone, Debug, Serialize)]
pub struct SensorConfig {
    /// Lookup URL; the sensor id is appended as the `sensor_id` query parameter.
    pub metadata_url: String,
    /// Timeout applied to every lookup.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            metadata_url: DEFAULT_SENSOR_METADATA_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl SensorConfig {
    /// Point the client at another lookup URL.
    #[must_use]
    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = url.into();
        self
    }

    /// Set the lookup timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Completion provider settings.
#[derive(Clone, Debug, Serialize)]
pub struct CompletionConfig {
    /// Provider API key.
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Optional override of the provider base URL.
    pub base_url: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Maximum output tokens per completion.
    pub max_tokens: u64,
    /// Sampling temperature.
    pub temperature: f64,
    /// Timeout applied to every completion call.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 150,
            temperature: 0.7,
            request_timeout: Duration::from_secs(30),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str) -> RelayResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_var(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| RelayError::Config(format!("{name}={raw}: {e}")))
        })
        .transpose()
}

fn require_url(name: &str, value: &str) -> RelayResult<()> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| RelayError::Config(format!("{name} is not a valid URL: {e}")))
}

/// Serializes a `Duration` as whole seconds.
mod duration_serde {
    use serde::{Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.telemetry = config.telemetry.with_account("ops@example.com", "secret");
        config.completion.api_key = "sk-test".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.completion.model, "gpt-3.5-turbo");
        assert_eq!(config.completion.max_tokens, 150);
        assert_eq!(config.telemetry.time_zone, "America/New_York");
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_secrets_rejected() {
        let config = RelayConfig::default();
        assert!(matches!(config.validate(), Err(RelayError::Config(_))));

        let mut config = valid_config();
        config.completion.api_key = "  ".to_string();
        assert!(matches!(config.validate(), Err(RelayError::Config(_))));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let mut config = valid_config();
        config.completion.temperature = 3.5;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.completion.max_tokens = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.sensors = config.sensors.with_metadata_url("not a url");
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.telemetry = config.telemetry.with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secrets_not_serialized() {
        let json = serde_json::to_string(&valid_config()).unwrap_or_default();
        assert!(!json.contains("secret"));
        assert!(!json.contains("sk-test"));
    }
}
