//! Content identifiers.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Path prefix used by the node for immutable content paths.
pub const IPFS_PATH_PREFIX: &str = "/ipfs/";

/// An opaque content identifier returned by a CAS node.
///
/// No internal structure is assumed beyond equality and the string form the
/// node hands back. Two uploads of equal content yield equal identifiers.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentId(String);

impl ContentId {
    /// Parse an identifier, accepting an optional `/ipfs/` prefix.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix(IPFS_PATH_PREFIX).unwrap_or(s);

        if s.is_empty() {
            return Err(Error::invalid_cid("identifier is empty"));
        }

        if let Some(bad) = s.chars().find(|c| c.is_whitespace() || *c == '/') {
            return Err(Error::invalid_cid(format!(
                "unexpected character {:?} in {}",
                bad, s
            )));
        }

        Ok(ContentId(s.to_string()))
    }

    /// Mint an identifier from a 32-byte digest (used by the in-memory node).
    pub(crate) fn from_digest(digest: &[u8; 32]) -> Self {
        ContentId(format!("b3{}", hex::encode(digest)))
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The immutable path form, `/ipfs/<cid>`.
    pub fn to_ipfs_path(&self) -> String {
        format!("{}{}", IPFS_PATH_PREFIX, self.0)
    }
}

impl FromStr for ContentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ContentId::parse(s)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.0)
    }
}

impl Serialize for ContentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ContentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ContentId::parse(&s).map_err(serde::de::Error::custom)
    }
}
