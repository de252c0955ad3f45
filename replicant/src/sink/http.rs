use std::time::Duration;

use async_trait::async_trait;
use config::shared::HttpSinkConfig;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::decoding::wal2json::payload_snippet;
use crate::encryption::install_crypto_provider;
use crate::error::{ErrorKind, ReplicantResult};
use crate::sink::Sink;
use crate::types::ChangeRecord;
use crate::{bail, replicant_error};

/// Bytes of a rejected response body kept in the error detail.
const MAX_BODY_SNIPPET_LEN: usize = 512;

/// Posts every record as a JSON document to a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    url: String,
    name: String,
}

impl HttpSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> ReplicantResult<Self> {
        install_crypto_provider();

        let url = url.into();
        let client = Client::builder().timeout(timeout).build().map_err(|err| {
            replicant_error!(
                ErrorKind::ConfigError,
                "Failed to build the http client",
                detail = err.to_string(),
                source: err
            )
        })?;

        Ok(Self {
            client,
            name: format!("http({url})"),
            url,
        })
    }

    pub fn from_config(config: &HttpSinkConfig) -> ReplicantResult<Self> {
        let Some(url) = config.url.as_deref() else {
            bail!(
                ErrorKind::ConfigError,
                "Http sink has no url",
                "`sinks.http.url` must be set when the http sink is enabled"
            );
        };

        Self::new(url, Duration::from_millis(config.timeout_ms))
    }
}

#[async_trait]
impl Sink for HttpSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, record: &ChangeRecord) -> ReplicantResult<()> {
        let body = serde_json::to_vec(record).map_err(|err| {
            replicant_error!(
                ErrorKind::SinkEncodingFailed,
                "Can't encode the record for the http output",
                detail = err.to_string(),
                source: err
            )
        })?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| {
                replicant_error!(
                    ErrorKind::SinkTransportFailed,
                    "Can't write to the http output",
                    detail = format!("{}: {err}", self.url),
                    source: err
                )
            })?;

        let status = response.status();
        // The body is drained on every path so the connection can be reused.
        let response_body = response.bytes().await;

        if status != StatusCode::OK {
            let snippet = response_body
                .map(|bytes| payload_snippet(&bytes, MAX_BODY_SNIPPET_LEN))
                .unwrap_or_default();
            bail!(
                ErrorKind::SinkRemoteRejected,
                "Http output rejected the record",
                detail = format!("{} responded with {status}: {snippet}", self.url)
            );
        }

        if let Err(err) = response_body {
            warn!(sink = %self.name, "failed to read the response body: {}", err);
        }

        debug!(sink = %self.name, table = %record.table, "record posted");

        Ok(())
    }
}
