//! # station-core
//!
//! The station-to-network-server (S2E) engine of a LoRaWAN basestation
//! packet forwarder: receives uplink frames from one or more concentrator
//! chips via the RAL master/slave split, schedules and dispatches downlink
//! frames with microsecond-precise air timing, maintains host/concentrator/
//! GPS clock synchronisation, and enforces per-region regulatory
//! constraints (duty cycle, CCA, dwell time).
//!
//! TLS/WebSocket framing, JSON decoding, CUPS, remote-shell, and the
//! concrete concentrator driver are collaborators outside this crate's
//! scope (see `SPEC_FULL.md` §6); this crate consumes them through narrow
//! traits (`Transport`, `ConfigStore`, `Concentrator`).

pub mod config;
pub mod constants;
pub mod error;
pub mod eventloop;
pub mod fatal;
pub mod gps;
pub mod logging;
pub mod ral;
pub mod region;
pub mod s2e;
pub mod scheduler;
pub mod station;
pub mod transport;
pub mod txrx;

pub use error::{Result, StationError};
pub use logging::init_logger;
pub use station::Station;
