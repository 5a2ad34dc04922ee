//! `tokio-tungstenite`-backed [`Transport`]. Connects once (TLS handshake and
//! certificate validation are delegated entirely to `tokio-tungstenite`'s
//! `rustls` connector); reconnection policy and the TC (transport-control)
//! handshake timeout live in `station.rs`, which treats a `WsTransport` as
//! disposable and builds a fresh one per connection attempt.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::{Result, StationError};
use crate::logging::log_debug;

use super::{Transport, TransportMessage};

pub struct WsTransport {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    /// Connects to `uri` (`ws://` or `wss://`), performing the WS upgrade
    /// handshake. The caller supplies a fully-formed URI including the
    /// `/router-<eui>` path component the LNS expects.
    pub async fn connect(uri: &Url) -> Result<Self> {
        let (socket, response) = tokio_tungstenite::connect_async(uri.as_str())
            .await
            .map_err(|e| StationError::Transport(format!("connect to {uri}: {e}")))?;
        log_debug(&format!("ws connected to {uri}, handshake status {}", response.status()));
        Ok(WsTransport { socket })
    }
}

#[async_trait::async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.socket
            .send(Message::Text(text))
            .await
            .map_err(|e| StationError::Transport(format!("send text: {e}")))
    }

    async fn send_binary(&mut self, data: Vec<u8>) -> Result<()> {
        self.socket
            .send(Message::Binary(data))
            .await
            .map_err(|e| StationError::Transport(format!("send binary: {e}")))
    }

    /// Reads the next application message, transparently answering `Ping`
    /// with `Pong` and treating `Close` as end-of-stream rather than an
    /// error (a clean LNS-initiated disconnect, not a transport fault).
    async fn recv(&mut self) -> Result<Option<TransportMessage>> {
        loop {
            match self.socket.next().await {
                None => return Ok(None),
                Some(Ok(Message::Text(t))) => return Ok(Some(TransportMessage::Text(t))),
                Some(Ok(Message::Binary(b))) => return Ok(Some(TransportMessage::Binary(b))),
                Some(Ok(Message::Ping(payload))) => {
                    self.socket
                        .send(Message::Pong(payload))
                        .await
                        .map_err(|e| StationError::Transport(format!("pong: {e}")))?;
                }
                Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(Message::Frame(_))) => continue,
                Some(Err(e)) => return Err(StationError::Transport(format!("recv: {e}"))),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.socket
            .close(None)
            .await
            .map_err(|e| StationError::Transport(format!("close: {e}")))
    }
}

/// An in-memory [`Transport`] double for tests: a pair of queues standing in
/// for the wire, so `station.rs`'s dispatch logic can be exercised without a
/// real socket.
#[cfg(test)]
pub struct MockTransport {
    pub outbox: Vec<TransportMessage>,
    pub inbox: std::collections::VecDeque<TransportMessage>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        MockTransport { outbox: Vec::new(), inbox: std::collections::VecDeque::new() }
    }

    pub fn push_incoming(&mut self, msg: TransportMessage) {
        self.inbox.push_back(msg);
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.outbox.push(TransportMessage::Text(text));
        Ok(())
    }

    async fn send_binary(&mut self, data: Vec<u8>) -> Result<()> {
        self.outbox.push(TransportMessage::Binary(data));
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<TransportMessage>> {
        Ok(self.inbox.pop_front())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
