use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

const fn default_http_timeout_ms() -> u64 {
    30_000
}

/// Settings of the standard output sink.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StdoutSinkConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// Settings of the HTTP sink.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpSinkConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Endpoint receiving one `POST` per change record.
    #[serde(default)]
    pub url: Option<String>,
    /// Upper bound for a single request, including reading the response body.
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for HttpSinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            timeout_ms: default_http_timeout_ms(),
        }
    }
}

impl HttpSinkConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.enabled {
            return Ok(());
        }

        if self.url.as_deref().is_none_or(str::is_empty) {
            return Err(ValidationError::MissingHttpUrl);
        }

        if self.timeout_ms == 0 {
            return Err(ValidationError::HttpTimeoutZero);
        }

        Ok(())
    }
}

/// The set of sinks records are fanned out to.
///
/// Sinks receive records in the order their fields are declared here: stdout first, then http.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SinksConfig {
    #[serde(default)]
    pub stdout: StdoutSinkConfig,
    #[serde(default)]
    pub http: HttpSinkConfig,
}

impl SinksConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.http.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sinks_are_disabled_by_default() {
        let config: SinksConfig = serde_json::from_str("{}").unwrap();

        assert!(!config.stdout.enabled);
        assert!(!config.http.enabled);
        assert_eq!(config.http.timeout_ms, 30_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn enabled_http_sink_requires_url() {
        let config: SinksConfig =
            serde_json::from_str(r#"{ "http": { "enabled": true } }"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingHttpUrl)
        ));

        let config: SinksConfig =
            serde_json::from_str(r#"{ "http": { "enabled": true, "url": "" } }"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingHttpUrl)
        ));
    }

    #[test]
    fn disabled_http_sink_ignores_missing_url() {
        let config = HttpSinkConfig {
            enabled: false,
            url: None,
            timeout_ms: 0,
        };
        assert!(config.validate().is_ok());
    }
}
