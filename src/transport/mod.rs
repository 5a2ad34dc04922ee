//! The LNS transport boundary: a `Transport` trait carrying framed
//! text/binary messages, so the S2E core never names a concrete WebSocket
//! crate. `ws` provides the `tokio-tungstenite` implementation used by
//! `main.rs`; tests substitute an in-memory double.

pub mod ws;

use async_trait::async_trait;

use crate::error::Result;

/// One message as it crosses the WS boundary in either direction. Text
/// carries the `serde_json`-tagged S2E protocol; Binary carries remote-shell
/// frames (`byte0` = session index, rest opaque, empty payload = EOF).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMessage {
    Text(String),
    Binary(Vec<u8>),
}

/// A persistent, full-duplex connection to the LNS. Implementors own
/// reconnection policy; `recv` returning `Ok(None)` means the peer closed
/// the connection cleanly and the caller should treat the station as
/// disconnected (the reconnect loop lives in `station.rs`, not here).
#[async_trait]
pub trait Transport: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;

    async fn send_binary(&mut self, data: Vec<u8>) -> Result<()>;

    async fn recv(&mut self) -> Result<Option<TransportMessage>>;

    async fn close(&mut self) -> Result<()>;
}
