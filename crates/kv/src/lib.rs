//! C3: the transactional ordered KV interface (spec.md §4.3).
//!
//! Two views over a `rocksdb::TransactionDB`: [`WriteTxn`] (locking reads,
//! batched writes, RYW) and [`ReadSnapshot`] (non-locking reads against a
//! point-in-time view). Everything above this crate — `k9db-storage` and up
//! — talks only to the traits, never to `rocksdb` directly.

mod error;
mod store;
mod txn;

pub use error::KvError;
pub use store::{RocksReadSnapshot, RocksWriteTxn, Store, StoreOptions};
pub use txn::{Entry, PrefixIter, ReadSnapshot, WriteTxn};
