use crate::error::KvError;

/// A single key/value pair yielded by a prefix iterator.
pub type Entry = (Box<[u8]>, Box<[u8]>);

/// Wraps a raw rocksdb iterator and enforces the prefix bound ourselves.
///
/// `rocksdb`'s own `prefix_same_as_start` read option is not honored by the
/// write-batch-aware iterator a live transaction uses, so every entry is
/// checked against the seek prefix here; the first mismatch ends iteration
/// (spec.md §4.3).
pub struct PrefixIter<I> {
    inner: I,
    prefix: Vec<u8>,
    done: bool,
}

impl<I> PrefixIter<I> {
    pub fn new(inner: I, prefix: Vec<u8>) -> Self {
        Self { inner, prefix, done: false }
    }
}

impl<I> Iterator for PrefixIter<I>
where
    I: Iterator<Item = Result<Entry, rocksdb::Error>>,
{
    type Item = Result<Entry, KvError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next() {
            None => {
                self.done = true;
                None
            }
            Some(Err(e)) => {
                self.done = true;
                Some(Err(e.into()))
            }
            Some(Ok((k, v))) => {
                if k.starts_with(self.prefix.as_slice()) {
                    Some(Ok((k, v)))
                } else {
                    self.done = true;
                    None
                }
            }
        }
    }
}

/// Locking reads, batched writes. Not `Send`: one write transaction belongs
/// to one session (spec.md §4.3, §9 "Global mutable state").
pub trait WriteTxn {
    fn put(&self, cf: &str, key: &[u8], value: &[u8]) -> Result<(), KvError>;
    fn delete(&self, cf: &str, key: &[u8]) -> Result<(), KvError>;

    /// Locking read: escalates to a write lock so a concurrent transaction
    /// cannot commit a change to this key underneath us.
    fn get_for_update(&self, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>, KvError>;
    fn multi_get_for_update(
        &self,
        cf: &str,
        keys: &[&[u8]],
    ) -> Result<Vec<Option<Vec<u8>>>, KvError>;

    /// A prefix-respecting iterator; each key advanced past is locked like a
    /// `get_for_update`.
    fn iter_prefix<'a>(
        &'a self,
        cf: &str,
        prefix: &[u8],
    ) -> Result<Box<dyn Iterator<Item = Result<Entry, KvError>> + 'a>, KvError>;

    /// Idempotent: the second and later calls (after either `commit` or
    /// `rollback` has run once) are no-ops that return `Ok(())`.
    fn commit(&self) -> Result<(), KvError>;
    fn rollback(&self) -> Result<(), KvError>;
}

/// Non-locking reads bound to a snapshot taken lazily on first read.
pub trait ReadSnapshot {
    fn get(&self, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>, KvError>;
    fn multi_get(&self, cf: &str, keys: &[&[u8]]) -> Result<Vec<Option<Vec<u8>>>, KvError>;
    fn iter_prefix<'a>(
        &'a self,
        cf: &str,
        prefix: &[u8],
    ) -> Result<Box<dyn Iterator<Item = Result<Entry, KvError>> + 'a>, KvError>;
}
