//! C12: the metadata catalog (spec.md §4.12).
//!
//! `CREATE TABLE`/`CREATE INDEX`/`CREATE VIEW` persist their original DDL
//! verbatim into a reserved column family, keyed by a monotonic counter so
//! `Initialize` can replay them back in the order they were declared.

mod error;

pub use error::CatalogError;

use k9db_kv::{ReadSnapshot, WriteTxn};

/// The column family every DDL statement (and the counter that orders them)
/// lives in. Must be passed to `Store::open`'s `cf_names` alongside every
/// table/index CF.
pub const CATALOG_CF: &str = "k9db__catalog";

const COUNTER_KEY: &[u8] = b"c";
const ENTRY_PREFIX: &[u8] = b"d";

fn entry_key(seq: u64) -> Vec<u8> {
    let mut key = ENTRY_PREFIX.to_vec();
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn decode_counter(bytes: &[u8]) -> Result<u64, CatalogError> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| CatalogError::CorruptCounter(bytes.len()))?;
    Ok(u64::from_be_bytes(arr))
}

/// Metadata catalog operations. Stateless: every method takes the live
/// transaction or snapshot, matching `k9db-storage::Table`'s model.
pub struct Catalog;

impl Catalog {
    /// Append `ddl` as the next entry, returning its assigned sequence
    /// number. Locks the counter for update so two concurrent `CREATE`s
    /// never reuse a sequence.
    pub fn record_ddl(txn: &dyn WriteTxn, ddl: &str) -> Result<u64, CatalogError> {
        let seq = match txn.get_for_update(CATALOG_CF, COUNTER_KEY)? {
            Some(bytes) => decode_counter(&bytes)? + 1,
            None => 0,
        };
        txn.put(CATALOG_CF, COUNTER_KEY, &seq.to_be_bytes())?;
        txn.put(CATALOG_CF, &entry_key(seq), ddl.as_bytes())?;
        Ok(seq)
    }

    /// Every persisted DDL statement, in the order it was declared
    /// (spec.md §4.12, "On `Initialize`, replay in order").
    pub fn replay(snapshot: &dyn ReadSnapshot) -> Result<Vec<String>, CatalogError> {
        snapshot
            .iter_prefix(CATALOG_CF, ENTRY_PREFIX)?
            .map(|entry| {
                let (_, value) = entry?;
                Ok(String::from_utf8(Vec::from(value))?)
            })
            .collect()
    }
}
