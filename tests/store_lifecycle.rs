//! Open / mutate / close / reopen cycles against real archive files

mod common;

use common::*;
use std::io::Write;
use tempfile::TempDir;
use zipcar::cid::Cid;
use zipcar::{cid_to_name, Key, Result, StoreConfig, ZipDatastore, ZipcarError};

fn blocks() -> Vec<(Cid, Vec<u8>)> {
    [b"aaaa", b"bbbb", b"cccc"]
        .iter()
        .map(|data| (raw_cid(*data), data.to_vec()))
        .collect()
}

#[test]
fn test_three_block_scenario() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("abc.zcar");
    let blocks = blocks();

    let mut store = ZipDatastore::open(&path)?;
    for (cid, data) in &blocks {
        store.put(&key(cid), data.clone())?;
    }
    store.close()?;

    let mut store = ZipDatastore::open(&path)?;
    for (cid, data) in &blocks {
        assert!(store.has(&key(cid))?);
        assert_eq!(&store.get(&key(cid))?, data);
        assert_eq!(store.get_size(&key(cid))?, 4);
    }
    store.delete(&key(&blocks[1].0))?;
    store.close()?;

    let mut store = ZipDatastore::open(&path)?;
    assert_eq!(store.get(&key(&blocks[0].0))?, b"aaaa");
    assert_eq!(store.get(&key(&blocks[2].0))?, b"cccc");
    assert!(!store.has(&key(&blocks[1].0))?);
    assert!(store.get(&key(&blocks[1].0)).unwrap_err().is_not_found());
    assert!(store.get_size(&key(&blocks[1].0)).unwrap_err().is_not_found());
    store.close()
}

#[test]
fn test_entry_names_are_canonical() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("names.zcar");

    let v1 = raw_cid(b"random meaningless bytes");
    let v0 = cid_v0(b"a v0 block");

    let mut store = ZipDatastore::open(&path)?;
    store.put_cid(&v1, b"random meaningless bytes")?;
    store.put_cid(&v0, b"a v0 block")?;
    store.close()?;

    let names: Vec<String> = archive_entries(&path).into_iter().map(|(n, _)| n).collect();
    assert!(names.contains(&"bafkreihwkf6mtnjobdqrkiksr7qhp6tiiqywux64aylunbvmfhzeql2coa".to_string()));
    assert!(names.contains(&v0.to_string()));
    assert!(v0.to_string().starts_with("Qm"));
    assert_eq!(names.len(), 2);
    Ok(())
}

#[test]
fn test_cross_scheme_records_are_independent() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("schemes.zcar");

    // Same multihash, different versions
    let v0 = cid_v0(b"shared");
    let v1 = Cid::new_v1(DAG_PB, *v0.hash());
    assert_ne!(cid_to_name(&v0)?, cid_to_name(&v1)?);

    let mut store = ZipDatastore::open(&path)?;
    store.put_cid(&v0, b"zero")?;
    store.put_cid(&v1, b"one")?;
    store.close()?;

    let mut store = ZipDatastore::open(&path)?;
    assert_eq!(store.get_cid(&v0)?, b"zero");
    assert_eq!(store.get_cid(&v1)?, b"one");

    store.delete_cid(&v0)?;
    assert!(!store.has_cid(&v0)?);
    assert!(store.has_cid(&v1)?);
    store.close()
}

#[test]
fn test_first_put_wins_across_reopen() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("dupes.zcar");
    let cid = raw_cid(b"original");

    let mut store = ZipDatastore::open(&path)?;
    store.put_cid(&cid, b"original")?;
    store.put_cid(&cid, b"impostor")?;
    assert_eq!(store.get_cid(&cid)?, b"original");
    store.close()?;

    let mut store = ZipDatastore::open(&path)?;
    store.put_cid(&cid, b"impostor")?;
    assert!(!store.is_dirty(), "put of an archived record is a no-op");
    assert_eq!(store.get_cid(&cid)?, b"original");
    store.close()
}

#[test]
fn test_unmodified_close_leaves_file_untouched() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("clean.zcar");

    let mut store = ZipDatastore::open(&path)?;
    for (cid, data) in blocks() {
        store.put_cid(&cid, data)?;
    }
    store.close()?;

    let before = std::fs::read(&path).unwrap();

    // Reads, size lookups and has checks are not mutations
    let mut store = ZipDatastore::open(&path)?;
    for (cid, _) in blocks() {
        store.get_cid(&cid)?;
        store.get_size_cid(&cid)?;
        store.has_cid(&cid)?;
    }
    assert!(!store.is_dirty());
    store.close()?;

    assert_eq!(std::fs::read(&path).unwrap(), before);
    Ok(())
}

#[test]
fn test_build_read_modify_read() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cycle.zcar");

    let raw: Vec<Cid> = [b"aaaa", b"bbbb", b"cccc"].iter().map(|d| raw_cid(*d)).collect();
    let pb: Vec<(Cid, Vec<u8>)> = (1..=3)
        .map(|i| {
            let body = format!("proto node {}", i).into_bytes();
            (cid_v0(&body), body)
        })
        .collect();
    let cbor: Vec<(Cid, Vec<u8>)> = ["foo", "bar", "baz"]
        .iter()
        .map(|s| {
            let body = s.as_bytes().to_vec();
            (cid_v1(DAG_CBOR, &body), body)
        })
        .collect();
    let late = raw_cid(b"zzzz");

    // Build
    {
        let mut store = ZipDatastore::open(&path)?;
        for (cid, data) in raw.iter().zip([b"aaaa", b"bbbb", b"cccc"]) {
            store.put_cid(cid, *data)?;
        }
        for (cid, body) in pb.iter().chain(cbor.iter()) {
            store.put_cid(cid, body.clone())?;
        }
        store.set_comment(cbor[2].0.to_string());
        store.close()?;
    }

    // Read existing
    {
        let mut store = ZipDatastore::open(&path)?;
        assert_eq!(store.comment(), cbor[2].0.to_string());
        for (cid, body) in pb.iter().chain(cbor.iter()) {
            assert_eq!(&store.get_cid(cid)?, body);
        }
        assert!(!store.has_cid(&raw_cid(b"dddd"))?);
        store.close()?;
    }

    // Modify
    {
        let mut store = ZipDatastore::open(&path)?;
        store.put_cid(&late, b"zzzz")?;
        store.delete_cid(&raw[1])?;
        store.delete_cid(&pb[1].0)?;
        store.delete_cid(&cbor[1].0)?;
        store.set_comment(cbor[1].0.to_string());

        assert!(!store.has_cid(&raw[1])?);
        assert!(store.has_cid(&late)?);
        store.close()?;
    }

    // Read modified
    {
        let mut store = ZipDatastore::open(&path)?;
        assert_eq!(store.comment(), cbor[1].0.to_string());

        for removed in [&raw[1], &pb[1].0, &cbor[1].0] {
            assert!(!store.has_cid(removed)?);
        }
        for kept in [&raw[0], &raw[2], &late, &pb[0].0, &pb[2].0, &cbor[0].0, &cbor[2].0] {
            assert!(store.has_cid(kept)?);
        }
        assert_eq!(store.get_cid(&late)?, b"zzzz");
        assert_eq!(store.get_size_cid(&raw[0])?, 4);
        store.close()?;
    }

    assert_eq!(archive_entries(&path).len(), 7);
    Ok(())
}

#[test]
fn test_reads_foreign_stored_archive() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("foreign.zcar");
    let cid = raw_cid(b"foreign");

    // Archive produced by another tool: stored entries, no comment
    {
        let mut writer = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        writer.start_file(cid_to_name(&cid)?, options).unwrap();
        writer.write_all(b"foreign").unwrap();
        writer.finish().unwrap();
    }

    let mut store = ZipDatastore::open(&path)?;
    assert!(!store.is_new());
    assert_eq!(store.get_size_cid(&cid)?, 7);
    assert_eq!(store.get_cid(&cid)?, b"foreign");

    // Rewrite switches the entry to the configured method
    store.put_cid(&raw_cid(b"local"), b"local")?;
    store.close()?;

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
    let name = cid_to_name(&cid)?;
    let entry = archive.by_name(&name).unwrap();
    assert_eq!(entry.compression(), zip::CompressionMethod::Deflated);
    Ok(())
}

#[test]
fn test_uncompressed_and_zstd_rewrites() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let payload = b"compressible ".repeat(200);
    let cid = raw_cid(&payload);

    for (file, config, method) in [
        ("stored.zcar", StoreConfig::uncompressed(), zip::CompressionMethod::Stored),
        ("zstd.zcar", StoreConfig::zstd(3), zip::CompressionMethod::Zstd),
    ] {
        let path = temp_dir.path().join(file);

        let mut store = ZipDatastore::open_with(&path, config.clone())?;
        store.put_cid(&cid, payload.clone())?;
        store.close()?;

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.by_index(0).unwrap().compression(), method);
        drop(archive);

        // Readable regardless of the configured method
        let mut store = ZipDatastore::open(&path)?;
        assert_eq!(store.get_cid(&cid)?, payload);
        assert_eq!(store.get_size_cid(&cid)?, payload.len());
        store.close()?;
    }
    Ok(())
}

#[test]
fn test_atomic_replace_round_trip() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("atomic.zcar");
    let config = StoreConfig {
        atomic_replace: true,
        ..Default::default()
    };

    let mut store = ZipDatastore::open_with(&path, config.clone())?;
    for (cid, data) in blocks() {
        store.put_cid(&cid, data)?;
    }
    store.close()?;

    let mut store = ZipDatastore::open_with(&path, config)?;
    store.delete_cid(&blocks()[0].0)?;
    store.close()?;

    let entries = archive_entries(&path);
    assert_eq!(entries.len(), 2);
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    Ok(())
}

#[test]
fn test_zero_length_file_opens_empty() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("zero.zcar");
    std::fs::write(&path, b"").unwrap();

    let store = ZipDatastore::open(&path)?;
    assert!(store.is_new());
    store.close()?;

    assert!(archive_entries(&path).is_empty());
    Ok(())
}

#[test]
fn test_open_rejects_non_archive() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("garbage.zcar");
    std::fs::write(&path, b"definitely not a zip file").unwrap();

    let err = ZipDatastore::open(&path).unwrap_err();
    assert!(matches!(err, ZipcarError::Archive(_)));
    // Failed open must not touch the file
    assert_eq!(std::fs::read(&path).unwrap(), b"definitely not a zip file");
}

#[test]
fn test_invalid_key_rejected_everywhere() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let mut store = ZipDatastore::open(temp_dir.path().join("keys.zcar"))?;

    for bad in [Key::new("/hello/world"), Key::new("plain"), Key::new("/MFRGGZDF")] {
        assert!(store.put(&bad, b"x".to_vec()).unwrap_err().is_invalid_key());
        assert!(store.get(&bad).unwrap_err().is_invalid_key());
        assert!(store.has(&bad).unwrap_err().is_invalid_key());
        assert!(store.delete(&bad).unwrap_err().is_invalid_key());
        assert!(store.get_size(&bad).unwrap_err().is_invalid_key());
    }

    assert!(!store.is_dirty());
    store.close()
}

#[test]
fn test_delete_then_put_survives_rewrite() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("readd.zcar");
    let cid = raw_cid(b"phoenix");

    let mut store = ZipDatastore::open(&path)?;
    store.put_cid(&cid, b"phoenix")?;
    store.close()?;

    let mut store = ZipDatastore::open(&path)?;
    store.delete_cid(&cid)?;
    store.put_cid(&cid, b"phoenix")?;
    store.close()?;

    let mut store = ZipDatastore::open(&path)?;
    assert_eq!(store.get_cid(&cid)?, b"phoenix");
    store.close()
}

#[test]
fn test_non_utf8_comment_survives_rewrite() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cp437.zcar");
    let legacy = [0xC8u8, 0xE9, 0x80];

    {
        let mut writer = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        writer.set_raw_comment(Box::from(&legacy[..]));
        writer.finish().unwrap();
    }

    let mut store = ZipDatastore::open(&path)?;
    assert_eq!(store.raw_comment(), &legacy[..]);
    store.put_cid(&raw_cid(b"aaaa"), b"aaaa")?;
    store.close()?;

    let archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
    assert_eq!(archive.comment(), &legacy[..]);
    drop(archive);

    // Replacing the comment writes the new text
    let mut store = ZipDatastore::open(&path)?;
    store.set_comment("fresh");
    assert_eq!(store.raw_comment(), b"fresh");
    store.close()?;

    let store = ZipDatastore::open(&path)?;
    assert_eq!(store.comment(), "fresh");
    store.close()
}

#[cfg(unix)]
#[test]
fn test_atomic_rewrite_keeps_file_mode() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("mode.zcar");
    let config = StoreConfig {
        atomic_replace: true,
        ..Default::default()
    };

    let mut store = ZipDatastore::open_with(&path, config.clone())?;
    store.put_cid(&raw_cid(b"aaaa"), b"aaaa")?;
    store.close()?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

    let mut store = ZipDatastore::open_with(&path, config)?;
    store.put_cid(&raw_cid(b"bbbb"), b"bbbb")?;
    store.close()?;

    let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o644);
    assert_eq!(archive_entries(&path).len(), 2);
    Ok(())
}
