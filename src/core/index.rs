//! Read-only view of the archive as of open time
//!
//! The index is built once from the central directory. Payloads stay on disk
//! until something asks for them, so opening a large archive costs one pass
//! over entry headers and nothing more.

use crate::core::error::Result;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use tracing::{debug, warn};
use zip::ZipArchive;

/// Largest up-front buffer reserved for a single payload read
const MAX_SIZE_HINT: u64 = 1 << 20;

/// Reference to an entry resident in the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRef {
    /// Position in the central directory
    pub index: usize,

    /// Uncompressed payload length in bytes
    pub size: u64,

    /// Bytes the payload occupies on disk
    pub compressed_size: u64,

    /// Method the entry was written with
    pub compression: zip::CompressionMethod,
}

/// Name index over an archive opened for reading
pub struct ArchiveIndex {
    archive: Option<ZipArchive<File>>,
    /// Handle on a newly created file that holds no archive yet
    placeholder: Option<File>,
    entries: HashMap<String, EntryRef>,
    /// Raw comment bytes, no encoding assumed
    comment: Vec<u8>,
}

impl ArchiveIndex {
    /// Index with nothing behind it
    pub fn empty() -> Self {
        ArchiveIndex {
            archive: None,
            placeholder: None,
            entries: HashMap::new(),
            comment: Vec::new(),
        }
    }

    /// Empty index that keeps `file` (new or zero-length) open until release
    pub fn fresh(file: File) -> Self {
        ArchiveIndex {
            placeholder: Some(file),
            ..Self::empty()
        }
    }

    /// Enumerate the central directory of `file`
    ///
    /// # Errors
    ///
    /// Returns `Archive` if the file is not a readable ZIP container.
    pub fn load(file: File) -> Result<Self> {
        let mut archive = ZipArchive::new(file)?;
        let mut entries = HashMap::with_capacity(archive.len());

        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            if entry.is_dir() {
                continue;
            }

            let entry_ref = EntryRef {
                index: i,
                size: entry.size(),
                compressed_size: entry.compressed_size(),
                compression: entry.compression(),
            };

            // Duplicate names: the later central directory record wins.
            if entries.insert(entry.name().to_string(), entry_ref).is_some() {
                warn!("Duplicate archive entry {}", entry.name());
            }
        }

        let comment = archive.comment().to_vec();
        debug!("Indexed {} archive entries", entries.len());

        Ok(ArchiveIndex {
            archive: Some(archive),
            placeholder: None,
            entries,
            comment,
        })
    }

    pub fn lookup(&self, name: &str) -> Option<&EntryRef> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &EntryRef)> {
        self.entries.iter().map(|(name, entry_ref)| (name.as_str(), entry_ref))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Archive comment read at open, exactly as stored
    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    /// Decompress and read one entry's payload
    pub fn read_payload(&mut self, entry_ref: &EntryRef) -> Result<Vec<u8>> {
        let archive = self.archive.as_mut().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "entry reference without a backing archive",
            )
        })?;

        let mut entry = archive.by_index(entry_ref.index)?;
        // Declared sizes are untrusted; cap the hint and let the read grow it
        let mut payload = Vec::with_capacity(entry_ref.size.min(MAX_SIZE_HINT) as usize);
        entry.read_to_end(&mut payload)?;

        debug!("Read {} bytes from entry {}", payload.len(), entry.name());
        Ok(payload)
    }

}

impl std::fmt::Debug for ArchiveIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveIndex")
            .field("entries", &self.entries.len())
            .field("backed", &self.archive.is_some())
            .field("fresh", &self.placeholder.is_some())
            .field("comment", &String::from_utf8_lossy(&self.comment))
            .finish()
    }
}
