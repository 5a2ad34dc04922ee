//! # Station Error Handling
//!
//! This module defines the `StationError` enum, which represents the
//! different error types that can occur across the station core: event
//! loop, TX/RX pools, time-sync, region policy, scheduler, S2E message
//! handling, and the RAL master/slave IPC.

/// Represents the different error types that can occur in the station core.
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    /// The TX job pool has no free slots left.
    #[error("TX job pool exhausted (capacity {capacity})")]
    TxPoolExhausted { capacity: usize },

    /// The shared TX data arena has no room for a frame of this length.
    #[error("TX data arena exhausted: need {need} bytes, {available} available")]
    TxDataExhausted { need: usize, available: usize },

    /// The RX FIFO has no room for a frame of this length.
    #[error("RX FIFO exhausted: need {need} bytes, {available} available")]
    RxDataExhausted { need: usize, available: usize },

    /// A downlink was admitted too far into the future.
    #[error("txtime {txtime} is more than TX_MAX_AHEAD beyond now ({now})")]
    TxTooFarAhead { txtime: i64, now: i64 },

    /// No admissible TX time could be found for a job (all fallbacks exhausted).
    #[error("no admissible TX slot for device {deveui:016X} diid={diid}")]
    TxNoSlot { deveui: u64, diid: i64 },

    /// A time-sync conversion could not be completed (missing reference).
    #[error("time conversion failed: {0}")]
    TimeSyncUnavailable(&'static str),

    /// A time-sync sample was rejected (quality, drift, or session mismatch).
    #[error("time sync sample rejected: {0}")]
    TimeSyncRejected(&'static str),

    /// A JSON message was structurally valid but violated a required field.
    #[error("protocol violation in {msgtype}: {reason}")]
    ProtocolViolation { msgtype: String, reason: String },

    /// An unrecognised `msgtype` arrived from the LNS.
    #[error("unknown msgtype: {0}")]
    UnknownMsgType(String),

    /// JSON encode/decode failure at the WS boundary.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// A byte-level LoRaWAN frame could not be parsed.
    #[error("LoRaWAN frame parse error: {0}")]
    FrameParseError(String),

    /// The RAL pipe carried a record that failed to decode.
    #[error("RAL wire decode error: {0}")]
    WireDecodeError(String),

    /// A non-blocking pipe I/O operation failed for reasons other than EAGAIN.
    #[error("pipe I/O error on slave {txunit}: {source}")]
    PipeIo {
        txunit: u8,
        #[source]
        source: std::io::Error,
    },

    /// The concentrator driver reported a transmit failure.
    #[error("radio TX failed on antenna {txunit}: {reason}")]
    RadioTxFailed { txunit: u8, reason: String },

    /// The concentrator driver reported channel access denied (LBT/CCA).
    #[error("radio TX denied (no channel access) on antenna {txunit}")]
    RadioNoChannelAccess { txunit: u8 },

    /// A slave process died and could not be restarted within the velocity limit.
    #[error("slave {txunit} exceeded restart velocity limit ({restarts} restarts)")]
    SlaveRestartLimitExceeded { txunit: u8, restarts: u32 },

    /// Configuration was fatally malformed (unusable hwspec, oversized sx130x JSON, channel
    /// allocation failure).
    #[error("fatal configuration error: {0}")]
    ConfigFatal(String),

    /// The WS send buffer had no room; the frame was dropped.
    #[error("WS send buffer full, dropping {kind} frame")]
    SendBufferFull { kind: &'static str },

    /// Transport-level failure (connect, TLS, framing) from the WS layer.
    #[error("transport error: {0}")]
    Transport(String),

    /// I/O failure reading or writing a config/state file.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for uncategorized cases, with context preserved via `anyhow`.
    #[error("station error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StationError>;
