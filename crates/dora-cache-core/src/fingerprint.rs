use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::{fmt, str::FromStr};

use crate::event::EventData;

/// Number of hex characters kept from the SHA-256 digest.
///
/// Keys are truncated to 64 bits on purpose: they stay short enough to log and
/// index cheaply, at the cost of a collision bound of roughly 2^32 distinct
/// events. A local event cache never approaches that volume.
pub const KEY_LEN: usize = 16;

/// Joins the identifying fields before hashing.
const SEPARATOR: &str = "|";

/// Cache key derived from an event's identifying fields.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct EventKey(String);

impl EventKey {
    /// Fingerprint an event.
    #[must_use]
    pub fn for_event(event: &EventData) -> Self {
        fingerprint(event)
    }

    /// Borrow the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raised when a raw string is not a well-formed [`EventKey`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyParseError {
    /// Wrong number of characters.
    #[error("event key must be 16 characters, got {0}")]
    Length(usize),
    /// Contains something other than lowercase hex digits.
    #[error("event key must be lowercase hex: {0}")]
    NotHex(String),
}

impl FromStr for EventKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != KEY_LEN {
            return Err(KeyParseError::Length(s.len()));
        }
        if !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(KeyParseError::NotHex(s.to_owned()));
        }
        Ok(Self(s.to_owned()))
    }
}

impl Serialize for EventKey {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EventKey {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Derive the cache key for an event.
///
/// Only `name`, `start_date`, `location` and `url` participate, so two
/// payloads that differ in description or extra fields share a key. A `null`
/// or missing field hashes like an empty string.
#[must_use]
pub fn fingerprint(event: &EventData) -> EventKey {
    fingerprint_fields(
        &event.name(),
        &event.start_date(),
        &event.location(),
        &event.url(),
    )
}

/// Derive a cache key from raw identifying fields.
#[must_use]
pub fn fingerprint_fields(name: &str, start_date: &str, location: &str, url: &str) -> EventKey {
    let joined = [name, start_date, location, url].join(SEPARATOR);
    let mut digest = hex::encode(Sha256::digest(joined.as_bytes()));
    digest.truncate(KEY_LEN);
    EventKey(digest)
}
