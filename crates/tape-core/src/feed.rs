//! Feed capability: the boundary to the exchange's streaming transport.
//!
//! A [`Feed`] opens [`Subscription`]s described by a [`StreamSpec`]. A
//! subscription yields raw text frames until the transport fails; every
//! failure comes back as [`RecorderError::Transport`] and is left to the
//! caller's reconnect logic. The production implementation is
//! [`crate::ws::WsFeed`].

use async_trait::async_trait;

use crate::error::RecorderError;

/// What to connect to for one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSpec {
    /// Label used in log prefixes (e.g. `"ticker"`, `"depth:BTCUSDT"`).
    pub label: String,
    /// Full WebSocket URL.
    pub url: String,
    /// Message sent right after the handshake (subscription request).
    pub subscribe_msg: Option<String>,
}

/// Opens subscriptions.
#[async_trait]
pub trait Feed: Send + Sync + 'static {
    type Subscription: Subscription;

    async fn connect(&self, spec: &StreamSpec) -> Result<Self::Subscription, RecorderError>;
}

/// One open stream.
#[async_trait]
pub trait Subscription: Send {
    /// Next text frame. Control frames are handled internally.
    async fn recv_next(&mut self) -> Result<String, RecorderError>;

    /// Release the connection. Errors are logged, not returned.
    async fn close(&mut self);
}
