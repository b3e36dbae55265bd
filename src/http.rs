use crate::client::INTERNAL_TARGET;
use crate::dsn::Dsn;
use crate::event::Event;
use crate::transport::{EventTransport, TransportError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use urlencoding;

const PROTOCOL_VERSION: u32 = 7;
const CLIENT_NAME: &str = concat!("tracing-error-hook/", env!("CARGO_PKG_VERSION"));

/// [`EventTransport`] that posts events as JSON to the store endpoint
/// derived from a [`Dsn`].
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    dsn: Dsn,
    debug: bool,
}

impl HttpTransport {
    /// Build a transport for `dsn`.
    ///
    /// **Parameters**
    /// - `dsn`: parsed endpoint identifier.
    /// - `timeout`: upper bound for a single request.
    /// - `debug`: log every payload at debug level before sending it.
    pub fn new(dsn: Dsn, timeout: Duration, debug: bool) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, dsn, debug })
    }

    fn endpoint(&self) -> String {
        let mut query = format!(
            "sentry_version={}&sentry_client={}&sentry_key={}",
            PROTOCOL_VERSION,
            urlencoding::encode(CLIENT_NAME),
            urlencoding::encode(&self.dsn.public_key)
        );
        if let Some(secret) = &self.dsn.secret_key {
            query.push_str(&format!("&sentry_secret={}", urlencoding::encode(secret)));
        }

        format!("{}?{}", self.dsn.store_url(), query)
    }
}

#[async_trait]
impl EventTransport for HttpTransport {
    async fn send(&self, event: &Event) -> Result<(), TransportError> {
        let body = serde_json::to_string(event)?;
        if self.debug {
            tracing::debug!(target: INTERNAL_TARGET, dsn = %self.dsn, payload = %body, "sending event");
        }

        let resp = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(format!("event rejected with status {}: {}", status, text).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_carries_encoded_auth() {
        let dsn = Dsn::parse("https://pub key:sec@errors.example.com/3").unwrap();
        let transport = HttpTransport::new(dsn, Duration::from_secs(1), false).unwrap();
        let endpoint = transport.endpoint();

        assert!(endpoint.starts_with("https://errors.example.com/api/3/store/?sentry_version=7"));
        assert!(endpoint.contains("sentry_key=pub%20key"));
        assert!(endpoint.contains("sentry_secret=sec"));
        assert!(endpoint.contains("sentry_client=tracing-error-hook%2F"));
    }
}
