//! Generic key/value datastore interface
//!
//! Lets a [`ZipDatastore`](crate::ZipDatastore) stand in wherever a plain
//! keyed store is expected. Querying is part of the interface but not of this
//! backend: [`Datastore::query`] on a zip store always fails with
//! `Unsupported`.

use crate::core::error::Result;
use crate::core::key::Key;

/// Query over all records, optionally under a key prefix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub prefix: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

/// One query result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEntry {
    pub key: Key,
    pub value: Vec<u8>,
}

/// Keyed byte store
pub trait Datastore {
    /// Store `value` under `key`
    fn put(&mut self, key: &Key, value: Vec<u8>) -> Result<()>;

    /// Fetch the value for `key`, `NotFound` if absent
    fn get(&mut self, key: &Key) -> Result<Vec<u8>>;

    fn has(&self, key: &Key) -> Result<bool>;

    /// Remove `key`; removing a missing key is not an error
    fn delete(&mut self, key: &Key) -> Result<()>;

    /// Value length in bytes, `NotFound` if absent
    fn get_size(&self, key: &Key) -> Result<usize>;

    fn query(&self, query: &Query) -> Result<Vec<QueryEntry>>;
}
