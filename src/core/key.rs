//! Datastore keys and CID canonicalization
//!
//! A [`Key`] is an opaque datastore key. Keys produced from CIDs carry the
//! CID's binary form as unpadded upper-case RFC 4648 base32 behind a leading
//! slash (`/CIQ...`, `/AFK...`), which is the layout generic datastores use for
//! binary keys.
//!
//! Archive entries are named by the *canonical name* of the CID rather than by
//! the key:
//!
//! - version 0 CIDs are written as bare base58btc (`Qm...`)
//! - every later version is written as lower-case base32 with its multibase
//!   prefix (`bafy...`, `bafk...`)
//!
//! The split keeps archives interchangeable with other implementations of the
//! same layout, so it must not change.

use crate::core::error::{Result, ZipcarError};
use cid::multibase::{self, Base};
use cid::{Cid, Version};

/// Opaque datastore key
///
/// # Examples
///
/// ```
/// use zipcar::Key;
/// use zipcar::cid::Cid;
///
/// let cid: Cid = "bafkreihwkf6mtnjobdqrkiksr7qhp6tiiqywux64aylunbvmfhzeql2coa".parse().unwrap();
/// let key = Key::from_cid(&cid);
///
/// assert!(key.as_str().starts_with('/'));
/// assert_eq!(key.to_cid().unwrap(), cid);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    /// Wrap an arbitrary key string. No validation happens until the key is used.
    pub fn new(key: impl Into<String>) -> Self {
        Key(key.into())
    }

    /// Build the datastore key for a CID
    pub fn from_cid(cid: &Cid) -> Self {
        let encoded = multibase::encode(Base::Base32Upper, cid.to_bytes());
        // Drop the multibase prefix character; the key carries raw base32.
        Key(format!("/{}", &encoded[1..]))
    }

    /// Decode the key back to the CID it was built from
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the key is not `/` + base32 of a complete CID.
    pub fn to_cid(&self) -> Result<Cid> {
        let body = self
            .0
            .strip_prefix('/')
            .filter(|body| !body.is_empty())
            .ok_or_else(|| ZipcarError::InvalidKey(format!("'{}' is not a binary key", self.0)))?;

        let (_, bytes) = multibase::decode(format!("B{}", body))
            .map_err(|e| ZipcarError::InvalidKey(format!("'{}': {}", self.0, e)))?;

        let cid = Cid::try_from(bytes.as_slice())?;

        // Reject trailing bytes after a valid CID prefix
        let consumed = cid.to_bytes().len();
        if consumed != bytes.len() {
            return Err(ZipcarError::InvalidKey(format!(
                "'{}' has {} trailing bytes after the CID",
                self.0,
                bytes.len() - consumed
            )));
        }

        Ok(cid)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&Cid> for Key {
    fn from(cid: &Cid) -> Self {
        Key::from_cid(cid)
    }
}

impl From<Cid> for Key {
    fn from(cid: Cid) -> Self {
        Key::from_cid(&cid)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encoding scheme used for a CID's archive entry name
pub fn name_base(cid: &Cid) -> Base {
    match cid.version() {
        Version::V0 => Base::Base58Btc,
        _ => Base::Base32Lower,
    }
}

/// Canonical archive entry name for a CID
pub fn cid_to_name(cid: &Cid) -> Result<String> {
    cid.to_string_of_base(name_base(cid))
        .map_err(|e| ZipcarError::InvalidKey(format!("{}: {}", cid, e)))
}

/// Canonical archive entry name for a datastore key
///
/// # Errors
///
/// Returns `InvalidKey` if the key does not decode to a CID.
pub fn canonical_name(key: &Key) -> Result<String> {
    let cid = key.to_cid()?;
    cid_to_name(&cid)
}
