//! Observer client for the live event channel.

use async_trait::async_trait;
use bytes::Bytes;
use eventsource_stream::Eventsource;
use farmctl_core::Event;
use futures::{StreamExt, stream::BoxStream};
use thiserror::Error;

use super::policy::ReconnectPolicy;

/// Raw body chunks of an open channel.
pub type ByteStream = BoxStream<'static, Result<Bytes, ConnectError>>;

/// Failure to open or read the channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Unexpected status {0}")]
    Status(u16),
    #[error("Stream error: {0}")]
    Stream(String),
}

/// The observer ran out of reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Gave up after {attempts} reconnect attempts")]
pub struct GaveUp {
    pub attempts: u32,
}

/// Opens the channel.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self) -> Result<ByteStream, ConnectError>;
}

/// Connector for `GET {base}/api/events`.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
    url: String,
}

impl HttpConnector {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    #[must_use]
    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            client,
            url: format!("{}/api/events", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn open(&self) -> Result<ByteStream, ConnectError> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| ConnectError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ConnectError::Status(response.status().as_u16()));
        }
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ConnectError::Stream(e.to_string())))
            .boxed())
    }
}

/// Decode structured events from raw channel bytes.
///
/// Comment frames (heartbeats) and payloads that are not a known event are
/// skipped. The stream ends with an error item if the channel breaks.
pub fn decode_events(stream: ByteStream) -> BoxStream<'static, Result<Event, ConnectError>> {
    stream
        .eventsource()
        .filter_map(|item| async move {
            match item {
                Ok(message) => match serde_json::from_str::<Event>(&message.data) {
                    Ok(event) => Some(Ok(event)),
                    Err(e) => {
                        tracing::debug!("Skipping unparseable event: {e}");
                        None
                    }
                },
                Err(e) => Some(Err(ConnectError::Stream(e.to_string()))),
            }
        })
        .boxed()
}

/// Keeps an observer attached, reconnecting per [`ReconnectPolicy`].
pub struct ObserverClient<C> {
    connector: C,
    policy: ReconnectPolicy,
}

impl<C: Connector> ObserverClient<C> {
    #[must_use]
    pub fn new(connector: C) -> Self {
        Self::with_policy(connector, ReconnectPolicy::default())
    }

    #[must_use]
    pub const fn with_policy(connector: C, policy: ReconnectPolicy) -> Self {
        Self { connector, policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Deliver events to `on_event` until the retry ceiling is reached.
    ///
    /// Drop the future to detach; no timer outlives it.
    pub async fn run<F>(&mut self, mut on_event: F) -> GaveUp
    where
        F: FnMut(Event) + Send,
    {
        loop {
            match self.connector.open().await {
                Ok(stream) => {
                    self.policy.on_open();
                    tracing::info!("Observer connected");
                    let mut events = decode_events(stream);
                    while let Some(item) = events.next().await {
                        match item {
                            Ok(event) => on_event(event),
                            Err(e) => {
                                tracing::warn!("Observer channel broke: {e}");
                                break;
                            }
                        }
                    }
                }
                Err(e) => tracing::warn!("Observer connect failed: {e}"),
            }

            let Some(delay) = self.policy.on_close() else {
                let attempts = self.policy.attempts();
                tracing::error!(attempts, "Observer giving up");
                return GaveUp { attempts };
            };
            tracing::info!(
                attempt = self.policy.attempts(),
                ?delay,
                "Observer reconnecting"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
