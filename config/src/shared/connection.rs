use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio_postgres::{Config as TokioPgConnectOptions, config::SslMode as TokioPgSslMode};

use crate::shared::ValidationError;

/// Static PostgreSQL connection options that ensure sane defaults.
///
/// These options are applied to every replication connection so that the text values emitted by
/// the decoding plugin look the same across differently configured servers.
pub struct DefaultPgConnectionOptions;

impl DefaultPgConnectionOptions {
    /// Returns the options as a string suitable for tokio-postgres options parameter.
    pub fn to_options_string() -> String {
        "-c datestyle=ISO -c intervalstyle=postgres -c extra_float_digits=3 -c client_encoding=UTF8"
            .to_string()
    }
}

/// Configuration for connecting to the source Postgres database.
///
/// This intentionally does not implement [`serde::Serialize`] so that the password cannot leak
/// into serialized forms.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PgConnectionConfig {
    /// Hostname or IP address of the Postgres server.
    pub host: String,
    /// Port number on which the Postgres server is listening.
    pub port: u16,
    /// Name of the Postgres database to connect to.
    pub name: String,
    /// Username for authenticating with the Postgres server.
    pub username: String,
    /// Password for the specified user. Redacted in debug output.
    #[serde(default)]
    pub password: Option<SecretString>,
    /// TLS configuration for secure connections.
    #[serde(default)]
    pub tls: TlsConfig,
}

/// TLS settings for secure Postgres connections.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TlsConfig {
    /// PEM-encoded trusted root certificates.
    #[serde(default)]
    pub trusted_root_certs: String,
    /// Whether TLS is enabled for the connection.
    #[serde(default)]
    pub enabled: bool,
}

impl TlsConfig {
    /// Validates the [`TlsConfig`].
    ///
    /// Returns [`ValidationError::MissingTrustedRootCerts`] if TLS is enabled but no certificates
    /// are provided.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enabled && self.trusted_root_certs.is_empty() {
            return Err(ValidationError::MissingTrustedRootCerts);
        }

        Ok(())
    }
}

/// Converts a connection config into driver specific connect options.
pub trait IntoConnectOptions<Output> {
    /// Creates connection options without selecting a database.
    fn without_db(&self) -> Output;

    /// Creates connection options for the configured database.
    fn with_db(&self) -> Output;
}

impl IntoConnectOptions<TokioPgConnectOptions> for PgConnectionConfig {
    fn without_db(&self) -> TokioPgConnectOptions {
        let ssl_mode = if self.tls.enabled {
            TokioPgSslMode::Require
        } else {
            TokioPgSslMode::Prefer
        };
        let mut config = TokioPgConnectOptions::new();
        config
            .host(self.host.clone())
            .port(self.port)
            .user(self.username.clone())
            .options(DefaultPgConnectionOptions::to_options_string())
            // Trusted roots are applied by the rustls connector, tokio-postgres only sees the mode.
            .ssl_mode(ssl_mode);

        if let Some(password) = &self.password {
            config.password(password.expose_secret());
        }

        config
    }

    fn with_db(&self) -> TokioPgConnectOptions {
        let mut options: TokioPgConnectOptions = self.without_db();
        options.dbname(self.name.clone());
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection_config(tls: TlsConfig) -> PgConnectionConfig {
        PgConnectionConfig {
            host: "localhost".to_string(),
            port: 5432,
            name: "app".to_string(),
            username: "replicant".to_string(),
            password: Some(SecretString::new("hunter2".to_string())),
            tls,
        }
    }

    #[test]
    fn test_options_string_format() {
        let options_string = DefaultPgConnectionOptions::to_options_string();

        assert_eq!(
            options_string,
            "-c datestyle=ISO -c intervalstyle=postgres -c extra_float_digits=3 -c client_encoding=UTF8"
        );
    }

    #[test]
    fn test_with_db_sets_all_parameters() {
        let options: TokioPgConnectOptions = connection_config(TlsConfig::default()).with_db();

        assert_eq!(options.get_dbname(), Some("app"));
        assert_eq!(options.get_user(), Some("replicant"));
        assert_eq!(options.get_ports(), &[5432]);
        assert_eq!(options.get_password(), Some("hunter2".as_bytes()));
        assert_eq!(options.get_ssl_mode(), TokioPgSslMode::Prefer);
    }

    #[test]
    fn test_tls_enabled_requires_ssl() {
        let tls = TlsConfig {
            trusted_root_certs: "cert".to_string(),
            enabled: true,
        };
        let options: TokioPgConnectOptions = connection_config(tls).without_db();

        assert_eq!(options.get_dbname(), None);
        assert_eq!(options.get_ssl_mode(), TokioPgSslMode::Require);
    }

    #[test]
    fn test_tls_validation() {
        let missing = TlsConfig {
            trusted_root_certs: String::new(),
            enabled: true,
        };
        assert!(matches!(
            missing.validate(),
            Err(ValidationError::MissingTrustedRootCerts)
        ));
        assert!(TlsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_password_is_redacted_in_debug() {
        let debug = format!("{:?}", connection_config(TlsConfig::default()));
        assert!(!debug.contains("hunter2"));
    }
}
