//! Storage engine internals
//!
//! - [`key`] - datastore keys and CID to entry-name canonicalization
//! - [`index`] - frozen name index over the archive as of open
//! - [`cache`] - in-memory overlay of payloads and tombstones
//! - [`codec`] - archive writing and file replacement
//! - [`store`] - the engine combining index and cache
//! - [`datastore`] - generic keyed-store interface
//! - [`config`] - rewrite settings
//! - [`error`] - error type

pub mod cache;
pub mod codec;
pub mod config;
pub mod datastore;
pub mod error;
pub mod index;
pub mod key;
pub mod store;

pub use store::ZipDatastore;
