//! In-memory overlay of records touched since open
//!
//! Three states per name:
//! - absent: defer to the archive index
//! - [`Slot::Payload`]: authoritative bytes, possibly newer than the archive
//! - [`Slot::Tombstone`]: authoritative "deleted", whatever the archive holds
//!
//! There is no eviction. Everything the store touches stays resident until
//! close, and a dirty close pulls the rest of the archive in as well.

use std::collections::BTreeMap;

/// Cached state for one canonical name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Payload(Vec<u8>),
    Tombstone,
}

impl Slot {
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Slot::Payload(bytes) => Some(bytes.as_slice()),
            Slot::Tombstone => None,
        }
    }
}

/// Name-ordered mutation cache
#[derive(Debug, Default)]
pub struct MutationCache {
    slots: BTreeMap<String, Slot>,
}

impl MutationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, name: &str) -> Option<&Slot> {
        self.slots.get(name)
    }

    /// Payload for `name`, if one is cached and not tombstoned
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.slots.get(name).and_then(Slot::payload)
    }

    /// Cache a payload, replacing any tombstone
    pub fn set(&mut self, name: impl Into<String>, payload: Vec<u8>) {
        self.slots.insert(name.into(), Slot::Payload(payload));
    }

    pub fn tombstone(&mut self, name: impl Into<String>) {
        self.slots.insert(name.into(), Slot::Tombstone);
    }

    pub fn is_tombstoned(&self, name: &str) -> bool {
        matches!(self.slots.get(name), Some(Slot::Tombstone))
    }

    /// True if a real payload is cached for `name`
    pub fn has_local(&self, name: &str) -> bool {
        matches!(self.slots.get(name), Some(Slot::Payload(_)))
    }

    /// True if `name` has any cached state, tombstones included
    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Every cached slot in name order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Slot)> {
        self.slots.iter().map(|(name, slot)| (name.as_str(), slot))
    }

    /// Live `(name, payload)` pairs in name order
    pub fn payloads(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.slots
            .iter()
            .filter_map(|(name, slot)| slot.payload().map(|bytes| (name.as_str(), bytes)))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
