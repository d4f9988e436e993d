//! # zipcar - Content-Addressed Datastore in a ZIP Archive
//!
//! `zipcar-rs` stores blocks keyed by CID inside an ordinary ZIP file:
//!
//! - **One entry per block**, named by the CID's canonical string
//!   (base58btc for CIDv0, base32 for later versions), holding the raw bytes
//! - **No manifest**: the archive's entry list *is* the record set, so
//!   `unzip -l` shows every CID
//! - **Lazy reads**: open only parses the central directory
//! - **Staged writes**: puts and deletes stay in memory until
//!   [`ZipDatastore::close`] rewrites the archive in one pass
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zipcar::{Result, ZipDatastore};
//! use zipcar::cid::Cid;
//!
//! # fn main() -> Result<()> {
//! let cid: Cid = "bafkreihwkf6mtnjobdqrkiksr7qhp6tiiqywux64aylunbvmfhzeql2coa".parse().unwrap();
//!
//! let mut store = ZipDatastore::open("example.zcar")?;
//! store.put_cid(&cid, b"random meaningless bytes")?;
//!
//! let got = store.get_cid(&cid)?;
//! assert_eq!(got, b"random meaningless bytes");
//!
//! // Writes the archive
//! store.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configured Stores
//!
//! ```rust,no_run
//! use zipcar::{CompressionMethod, Result, ZipDatastoreBuilder};
//!
//! # fn main() -> Result<()> {
//! let store = ZipDatastoreBuilder::new()
//!     .path("/data/blocks.zcar")
//!     .compression(CompressionMethod::Zstd)
//!     .compression_level(9)
//!     .atomic_replace(true)
//!     .open()?;
//! # store.close()
//! # }
//! ```
//!
//! ## Scaling
//!
//! Any mutation makes close load every surviving record into memory and write
//! the whole archive again. Size archives with that in mind.

pub mod core;

pub use crate::core::{
    config::{CompressionMethod, StoreConfig},
    datastore::{Datastore, Query, QueryEntry},
    error::{Result, ZipcarError},
    key::{canonical_name, cid_to_name, Key},
    store::ZipDatastore,
};

pub use cid;

use std::path::PathBuf;
use tracing::debug;

/// Builder for configured stores
///
/// # Examples
///
/// ```rust,no_run
/// use zipcar::ZipDatastoreBuilder;
///
/// # fn main() -> zipcar::Result<()> {
/// let store = ZipDatastoreBuilder::new()
///     .path("blocks.zcar")
///     .create_if_missing(false)
///     .open()?;
/// # store.close()
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ZipDatastoreBuilder {
    path: Option<PathBuf>,
    config: StoreConfig,
}

impl ZipDatastoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn compression(mut self, method: CompressionMethod) -> Self {
        self.config.compression = method;
        self
    }

    pub fn compression_level(mut self, level: i64) -> Self {
        self.config.compression_level = Some(level);
        self
    }

    pub fn atomic_replace(mut self, enabled: bool) -> Self {
        self.config.atomic_replace = enabled;
        self
    }

    pub fn create_if_missing(mut self, enabled: bool) -> Self {
        self.config.create_if_missing = enabled;
        self
    }

    pub fn open(self) -> Result<ZipDatastore> {
        let path = self
            .path
            .ok_or_else(|| ZipcarError::Config("path must be set".to_string()))?;

        debug!("Building zip datastore at {:?} with {:?}", path, self.config);
        ZipDatastore::open_with(path, self.config)
    }
}
