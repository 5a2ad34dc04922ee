//! TX and RX job pools.
//!
//! Fixed-capacity arenas addressed by small integer handles rather than
//! pointers, so that the scheduler's intrusive per-antenna lists are
//! borrow-free and trivially compactable. Ported from the reference
//! implementation's `xq.h` (`txq_t`/`rxq_t`).

mod rxpool;
mod txjob;
mod txpool;

pub use rxpool::{RxJob, RxPool};
pub use txjob::{TxFlags, TxIdx, TxJob, TxOff};
pub use txpool::TxPool;
