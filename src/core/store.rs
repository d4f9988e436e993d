//! ZIP-backed content-addressed datastore
//!
//! Reads go through two layers:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ MutationCache (BTreeMap)     │  payloads and tombstones since open
//! ├──────────────────────────────┤
//! │ ArchiveIndex (HashMap)       │  central directory as of open, frozen
//! ├──────────────────────────────┤
//! │ ZIP file on disk             │  payloads read lazily by entry index
//! └──────────────────────────────┘
//! ```
//!
//! Precedence is tombstone > cached payload > index entry > absent.
//!
//! A finalized ZIP cannot be edited in place, so mutations only touch the cache.
//! At close a dirty store loads every surviving record into memory and writes
//! a brand-new archive over the old one. A clean store just drops its handle.

use crate::core::cache::{MutationCache, Slot};
use crate::core::codec;
use crate::core::config::StoreConfig;
use crate::core::datastore::{Datastore, Query, QueryEntry};
use crate::core::error::{Result, ZipcarError};
use crate::core::index::{ArchiveIndex, EntryRef};
use crate::core::key::{canonical_name, cid_to_name, Key};
use cid::Cid;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Where a name currently resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolved<'a> {
    Tombstoned,
    Cached(&'a [u8]),
    Indexed(EntryRef),
    Absent,
}

impl Resolved<'_> {
    fn exists(&self) -> bool {
        matches!(self, Resolved::Cached(_) | Resolved::Indexed(_))
    }
}

/// Content-addressed datastore persisted as a ZIP archive
///
/// Every record is one archive entry named by its CID's canonical string.
/// Mutations are staged in memory and written out as a whole new archive by
/// [`close`](Self::close).
///
/// # Examples
///
/// ```rust,no_run
/// use zipcar::{Key, ZipDatastore};
/// use zipcar::cid::Cid;
///
/// # fn main() -> zipcar::Result<()> {
/// let cid: Cid = "bafkreihwkf6mtnjobdqrkiksr7qhp6tiiqywux64aylunbvmfhzeql2coa".parse().unwrap();
///
/// let mut store = ZipDatastore::open("blocks.zcar")?;
/// store.put_cid(&cid, b"random meaningless bytes")?;
/// assert_eq!(store.get_cid(&cid)?, b"random meaningless bytes");
/// store.close()?;
/// # Ok(())
/// # }
/// ```
///
/// Not safe to share between threads without external locking. Every
/// mutating call takes `&mut self`.
pub struct ZipDatastore {
    path: PathBuf,
    config: StoreConfig,
    index: ArchiveIndex,
    cache: MutationCache,
    /// Comment as written at close, byte for byte
    raw_comment: Vec<u8>,
    /// Lossy UTF-8 view of `raw_comment`
    comment: String,
    dirty: bool,
    /// Path held no archive at open; close must write one even when clean
    created: bool,
    closed: bool,
}

impl ZipDatastore {
    /// Open or create a store at `path` with the default configuration
    ///
    /// A missing path yields a new, empty store. An existing path must hold a
    /// readable ZIP archive (a zero-length file counts as empty).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, StoreConfig::default())
    }

    /// Open or create a store at `path` with `config`
    pub fn open_with<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        let exists = match std::fs::metadata(&path) {
            Ok(_) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        let (index, created) = if exists {
            let file = OpenOptions::new().read(true).open(&path)?;
            if file.metadata()?.len() == 0 {
                warn!("{:?} is empty, treating it as a new store", path);
                (ArchiveIndex::fresh(file), true)
            } else {
                (ArchiveIndex::load(file)?, false)
            }
        } else {
            if !config.create_if_missing {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} does not exist", path.display()),
                )
                .into());
            }
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&path)?;
            (ArchiveIndex::fresh(file), true)
        };

        if created {
            info!("Created zip datastore at {:?}", path);
        } else {
            info!("Opened zip datastore at {:?} ({} entries)", path, index.len());
        }

        let raw_comment = index.comment().to_vec();
        let comment = String::from_utf8_lossy(&raw_comment).into_owned();

        Ok(ZipDatastore {
            path,
            config,
            index,
            cache: MutationCache::new(),
            raw_comment,
            comment,
            dirty: false,
            created,
            closed: false,
        })
    }

    /// Start a [`ZipDatastoreBuilder`](crate::ZipDatastoreBuilder)
    pub fn builder() -> crate::ZipDatastoreBuilder {
        crate::ZipDatastoreBuilder::new()
    }

    fn resolve(&self, name: &str) -> Resolved<'_> {
        match self.cache.lookup(name) {
            Some(Slot::Tombstone) => Resolved::Tombstoned,
            Some(Slot::Payload(bytes)) => Resolved::Cached(bytes),
            None => match self.index.lookup(name) {
                Some(entry_ref) => Resolved::Indexed(*entry_ref),
                None => Resolved::Absent,
            },
        }
    }

    /// Stage a record.
    ///
    /// First put wins: if `key` already resolves to a record, the call is a
    /// silent no-op and `value` is discarded without comparing bytes. Records
    /// are content-addressed, so a second put under the same CID is assumed to
    /// carry the same content.
    pub fn put(&mut self, key: &Key, value: impl Into<Vec<u8>>) -> Result<()> {
        let name = canonical_name(key)?;
        self.put_name(name, value.into());
        Ok(())
    }

    /// Fetch a record, reading it from the archive on first access
    pub fn get(&mut self, key: &Key) -> Result<Vec<u8>> {
        let name = canonical_name(key)?;
        self.get_name(name)
    }

    pub fn has(&self, key: &Key) -> Result<bool> {
        let name = canonical_name(key)?;
        Ok(self.resolve(&name).exists())
    }

    /// Delete a record. Deleting a missing record still marks the store dirty.
    pub fn delete(&mut self, key: &Key) -> Result<()> {
        let name = canonical_name(key)?;
        self.delete_name(name);
        Ok(())
    }

    /// Payload length in bytes, from entry metadata when not cached
    pub fn get_size(&self, key: &Key) -> Result<usize> {
        let name = canonical_name(key)?;
        self.size_name(name)
    }

    pub fn put_cid(&mut self, cid: &Cid, value: impl Into<Vec<u8>>) -> Result<()> {
        let name = cid_to_name(cid)?;
        self.put_name(name, value.into());
        Ok(())
    }

    pub fn get_cid(&mut self, cid: &Cid) -> Result<Vec<u8>> {
        let name = cid_to_name(cid)?;
        self.get_name(name)
    }

    pub fn has_cid(&self, cid: &Cid) -> Result<bool> {
        let name = cid_to_name(cid)?;
        Ok(self.resolve(&name).exists())
    }

    pub fn delete_cid(&mut self, cid: &Cid) -> Result<()> {
        let name = cid_to_name(cid)?;
        self.delete_name(name);
        Ok(())
    }

    pub fn get_size_cid(&self, cid: &Cid) -> Result<usize> {
        let name = cid_to_name(cid)?;
        self.size_name(name)
    }

    fn put_name(&mut self, name: String, value: Vec<u8>) {
        if self.resolve(&name).exists() {
            debug!("Ignoring duplicate put of {}", name);
            return;
        }

        debug!("Staging {} bytes as {}", value.len(), name);
        self.dirty = true;
        self.cache.set(name, value);
    }

    fn get_name(&mut self, name: String) -> Result<Vec<u8>> {
        match self.resolve(&name) {
            Resolved::Cached(bytes) => Ok(bytes.to_vec()),
            Resolved::Tombstoned | Resolved::Absent => Err(ZipcarError::NotFound(name)),
            Resolved::Indexed(entry_ref) => {
                let payload = self.index.read_payload(&entry_ref)?;
                // Read-through memoization, not a mutation
                self.cache.set(name, payload.clone());
                Ok(payload)
            }
        }
    }

    fn delete_name(&mut self, name: String) {
        debug!("Deleting {}", name);
        self.dirty = true;
        self.cache.tombstone(name);
    }

    fn size_name(&self, name: String) -> Result<usize> {
        match self.resolve(&name) {
            Resolved::Cached(bytes) => Ok(bytes.len()),
            Resolved::Indexed(entry_ref) => Ok(entry_ref.size as usize),
            Resolved::Tombstoned | Resolved::Absent => Err(ZipcarError::NotFound(name)),
        }
    }

    /// Archive comment (empty if none)
    ///
    /// Bytes that are not valid UTF-8 show up as U+FFFD here but are written
    /// back unchanged unless the comment is replaced.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Archive comment exactly as stored
    pub fn raw_comment(&self) -> &[u8] {
        &self.raw_comment
    }

    /// Replace the archive comment. A changed comment marks the store dirty.
    pub fn set_comment(&mut self, comment: impl Into<String>) {
        let comment = comment.into();
        if comment != self.comment {
            self.raw_comment = comment.as_bytes().to_vec();
            self.comment = comment;
            self.dirty = true;
        }
    }

    /// Querying is not supported by this backend
    pub fn query(&self, _query: &Query) -> Result<Vec<QueryEntry>> {
        Err(ZipcarError::Unsupported("query"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// True once any put, delete or comment change has been staged
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// True if the path held no archive when the store was opened
    pub fn is_new(&self) -> bool {
        self.created
    }

    /// Finalize the store.
    ///
    /// Clean stores only release the file handle. Dirty (or newly created)
    /// stores are rewritten: every live record is loaded into memory, the
    /// handle is released, and a new archive holding exactly the live records
    /// replaces the file.
    ///
    /// Unless `atomic_replace` is set, the rewrite truncates the file first.
    /// A failure after that point leaves a partial archive on disk.
    pub fn close(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if !self.dirty && !self.created {
            drop(std::mem::replace(&mut self.index, ArchiveIndex::empty()));
            debug!("Closed {:?} without changes", self.path);
            return Ok(());
        }

        // Materialize every surviving record the cache has not seen yet
        let pending: Vec<(String, EntryRef)> = self
            .index
            .entries()
            .filter(|(name, _)| !self.cache.contains(name))
            .map(|(name, entry_ref)| (name.to_string(), *entry_ref))
            .collect();

        for (name, entry_ref) in pending {
            let payload = self.index.read_payload(&entry_ref)?;
            self.cache.set(name, payload);
        }

        // Release the old handle before the file is replaced
        drop(std::mem::replace(&mut self.index, ArchiveIndex::empty()));

        codec::replace_archive(
            &self.path,
            self.cache.payloads(),
            &self.raw_comment,
            &self.config,
        )?;

        info!(
            "Rewrote {:?} with {} records",
            self.path,
            self.cache.payloads().count()
        );
        Ok(())
    }
}

impl Drop for ZipDatastore {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if self.dirty {
            warn!("{:?} dropped without close, finalizing", self.path);
        }
        if let Err(e) = self.finish() {
            error!("Failed to finalize {:?}: {}", self.path, e);
        }
    }
}

impl std::fmt::Debug for ZipDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipDatastore")
            .field("path", &self.path)
            .field("indexed", &self.index.len())
            .field("cached", &self.cache.len())
            .field("dirty", &self.dirty)
            .field("created", &self.created)
            .finish()
    }
}

impl Datastore for ZipDatastore {
    fn put(&mut self, key: &Key, value: Vec<u8>) -> Result<()> {
        ZipDatastore::put(self, key, value)
    }

    fn get(&mut self, key: &Key) -> Result<Vec<u8>> {
        ZipDatastore::get(self, key)
    }

    fn has(&self, key: &Key) -> Result<bool> {
        ZipDatastore::has(self, key)
    }

    fn delete(&mut self, key: &Key) -> Result<()> {
        ZipDatastore::delete(self, key)
    }

    fn get_size(&self, key: &Key) -> Result<usize> {
        ZipDatastore::get_size(self, key)
    }

    fn query(&self, query: &Query) -> Result<Vec<QueryEntry>> {
        ZipDatastore::query(self, query)
    }
}
