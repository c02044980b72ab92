//! WebSocket implementation of the [`Feed`](crate::feed::Feed) capability.

pub mod client;

pub use client::{WsFeed, WsSubscription};
