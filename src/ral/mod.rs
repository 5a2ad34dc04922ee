//! Radio abstraction layer: the master/slave IPC boundary between the
//! station core and each concentrator's driver process. `wire` defines the
//! pipe record encoding, `concentrator` the driver trait a slave polls,
//! `master`/`slave` the two sides of the fork boundary.

pub mod concentrator;
pub mod master;
pub mod slave;
pub mod wire;

pub use concentrator::{Concentrator, ConcentratorRxFrame, TxStatus};
pub use master::Master;
pub use slave::Slave;
pub use wire::{ChDef, RalCmd, RalRecord};
