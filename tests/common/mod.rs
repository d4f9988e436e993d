//! Shared fixtures for integration tests

#![allow(dead_code)]

use sha2::{Digest, Sha256};
use zipcar::cid::multihash::Multihash;
use zipcar::cid::Cid;
use zipcar::Key;

pub const RAW: u64 = 0x55;
pub const DAG_PB: u64 = 0x70;
pub const DAG_CBOR: u64 = 0x71;
const SHA2_256: u64 = 0x12;

pub fn sha256(data: &[u8]) -> Multihash<64> {
    Multihash::wrap(SHA2_256, &Sha256::digest(data)).unwrap()
}

/// CIDv1 over raw bytes
pub fn raw_cid(data: &[u8]) -> Cid {
    Cid::new_v1(RAW, sha256(data))
}

pub fn cid_v1(codec: u64, data: &[u8]) -> Cid {
    Cid::new_v1(codec, sha256(data))
}

/// CIDv0 (implicitly dag-pb)
pub fn cid_v0(data: &[u8]) -> Cid {
    Cid::new_v0(sha256(data)).unwrap()
}

pub fn key(cid: &Cid) -> Key {
    Key::from_cid(cid)
}

/// Names and payloads of every entry in the archive at `path`
pub fn archive_entries(path: &std::path::Path) -> Vec<(String, Vec<u8>)> {
    use std::io::Read;

    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        entries.push((entry.name().to_string(), data));
    }
    entries.sort();
    entries
}
