//! Archive write path
//!
//! Two ways of replacing the file at close:
//!
//! - **In place** (default): truncate the original and stream the new archive
//!   into it. If the process dies or an I/O error hits midway, the path is left
//!   holding a partial archive. Nothing tries to recover it.
//! - **Atomic**: stream into a temp file in the same directory, sync it, then
//!   rename it over the original. Readers see either the old archive or the
//!   new one.

use crate::core::config::StoreConfig;
use crate::core::error::Result;
use chrono::{Datelike, Local, Timelike};
use std::fs::{File, OpenOptions};
use std::io::{Seek, Write};
use std::path::Path;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{DateTime, ZipWriter};

/// Entry options for a rewrite under `config`
pub fn entry_options(config: &StoreConfig) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(config.compression.to_zip())
        .compression_level(config.compression_level)
        .last_modified_time(now_dos())
}

/// Current local time as a DOS timestamp, clamped to the 1980 epoch on failure
fn now_dos() -> DateTime {
    let now = Local::now();
    DateTime::from_date_and_time(
        now.year().clamp(1980, 2107) as u16,
        now.month() as u8,
        now.day() as u8,
        now.hour() as u8,
        now.minute() as u8,
        now.second().min(59) as u8,
    )
    .unwrap_or_else(|_| {
        warn!("Clock outside DOS timestamp range, using 1980-01-01");
        DateTime::default()
    })
}

/// Stream `entries` into a fresh archive on `sink` and finalize it
///
/// `comment` is written byte for byte, so comments in legacy encodings survive.
/// Returns the sink once the central directory has been written.
pub fn write_archive<'a, W, I>(
    sink: W,
    entries: I,
    comment: &[u8],
    options: SimpleFileOptions,
) -> Result<W>
where
    W: Write + Seek,
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut writer = ZipWriter::new(sink);
    let mut count = 0usize;

    for (name, payload) in entries {
        writer.start_file(name, options)?;
        writer.write_all(payload)?;
        count += 1;
    }

    if !comment.is_empty() {
        writer.set_raw_comment(Box::from(comment));
    }

    let sink = writer.finish()?;
    debug!("Finalized archive with {} entries", count);
    Ok(sink)
}

/// Replace the archive at `path` with `entries`
///
/// The caller must already have released its own handle on `path`.
pub fn replace_archive<'a, I>(
    path: &Path,
    entries: I,
    comment: &[u8],
    config: &StoreConfig,
) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let options = entry_options(config);

    if config.atomic_replace {
        // Rename onto the file a symlink points at, never over the link itself
        let (target, permissions) = match std::fs::canonicalize(path) {
            Ok(target) => {
                let permissions = std::fs::metadata(&target)?.permissions();
                (target, Some(permissions))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (path.to_path_buf(), None),
            Err(e) => return Err(e.into()),
        };
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let temp = tempfile::NamedTempFile::new_in(dir)?;
        let temp = write_archive(temp, entries, comment, options)?;
        // Temp files are created owner-only; carry the original mode over
        if let Some(permissions) = permissions {
            temp.as_file().set_permissions(permissions)?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&target).map_err(|e| e.error)?;
        debug!("Atomically replaced {:?}", target);
    } else {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let file: File = write_archive(file, entries, comment, options)?;
        file.sync_all()?;
        debug!("Rewrote {:?} in place", path);
    }

    Ok(())
}
