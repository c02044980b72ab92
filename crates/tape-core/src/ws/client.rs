//! Single WebSocket subscription over tokio-tungstenite.
//!
//! Each `WsSubscription`:
//! 1. Connects to the exchange WebSocket endpoint (TLS).
//! 2. Sends the subscription message, if any.
//! 3. Hands text frames to the caller one at a time.
//! 4. Answers server pings with pongs.
//!
//! Reconnecting is deliberately not done here: any close, read error or
//! receive timeout is returned as [`RecorderError::Transport`] so the
//! supervisor that owns the subscription decides what happens next.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderMap, HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::error::RecorderError;
use crate::feed::{Feed, StreamSpec, Subscription};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`Feed`] backed by real WebSocket connections.
#[derive(Debug, Clone)]
pub struct WsFeed {
    recv_timeout: Duration,
    headers: HeaderMap,
}

impl WsFeed {
    /// `recv_timeout` bounds both the handshake and the gap between frames.
    pub fn new(
        recv_timeout: Duration,
        extra_headers: &HashMap<String, String>,
    ) -> Result<Self, RecorderError> {
        let mut headers = HeaderMap::new();
        for (key, value) in extra_headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| RecorderError::Config(format!("invalid header name '{key}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| RecorderError::Config(format!("invalid header value for '{key}': {e}")))?;
            headers.insert(name, value);
        }
        Ok(Self { recv_timeout, headers })
    }

    pub fn from_config(config: &FeedConfig) -> Result<Self, RecorderError> {
        Self::new(
            config.effective_recv_timeout(),
            &config.extra_headers.clone().unwrap_or_default(),
        )
    }
}

#[async_trait]
impl Feed for WsFeed {
    type Subscription = WsSubscription;

    async fn connect(&self, spec: &StreamSpec) -> Result<WsSubscription, RecorderError> {
        let label = &spec.label;
        info!("[ws:{label}] connecting to {}", spec.url);

        let mut request = spec
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| RecorderError::Transport(format!("invalid request for {}: {e}", spec.url)))?;
        for (name, value) in &self.headers {
            request.headers_mut().insert(name.clone(), value.clone());
        }

        let (mut stream, _response) =
            tokio::time::timeout(self.recv_timeout, tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| {
                    RecorderError::Transport(format!(
                        "handshake timed out after {:?}",
                        self.recv_timeout
                    ))
                })?
                .map_err(|e| RecorderError::Transport(format!("connect failed: {e}")))?;

        if let Some(sub_msg) = &spec.subscribe_msg {
            debug!("[ws:{label}] subscribing: {sub_msg}");
            stream
                .send(Message::text(sub_msg.clone()))
                .await
                .map_err(|e| RecorderError::Transport(format!("subscribe send failed: {e}")))?;
        }

        info!("[ws:{label}] connected");
        Ok(WsSubscription {
            label: label.clone(),
            stream,
            recv_timeout: self.recv_timeout,
        })
    }
}

/// An open WebSocket stream.
pub struct WsSubscription {
    label: String,
    stream: WsStream,
    recv_timeout: Duration,
}

#[async_trait]
impl Subscription for WsSubscription {
    async fn recv_next(&mut self) -> Result<String, RecorderError> {
        loop {
            let next = tokio::time::timeout(self.recv_timeout, self.stream.next())
                .await
                .map_err(|_| {
                    RecorderError::Transport(format!("no frame within {:?}", self.recv_timeout))
                })?;

            match next {
                Some(Ok(Message::Text(text))) => return Ok(text.to_string()),
                Some(Ok(Message::Ping(data))) => {
                    self.stream
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| RecorderError::Transport(format!("pong send failed: {e}")))?;
                }
                Some(Ok(Message::Binary(data))) => {
                    return Err(RecorderError::Transport(format!(
                        "unexpected binary frame ({} bytes)",
                        data.len()
                    )));
                }
                Some(Ok(Message::Close(frame))) => {
                    warn!("[ws:{}] received close frame: {frame:?}", self.label);
                    return Err(RecorderError::Transport("closed by peer".into()));
                }
                Some(Err(e)) => {
                    return Err(RecorderError::Transport(format!("read error: {e}")));
                }
                None => return Err(RecorderError::Transport("stream ended".into())),
                _ => {} // Pong, Frame: ignore
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("[ws:{}] close: {e}", self.label);
        }
    }
}
