//! Object identifier (SHA-1 digest)
//!
//! Object IDs are the 20 raw bytes of the SHA-1 digest computed over an object's
//! framed encoding. They identify objects and double as their storage key.
//!
//! ## Format
//!
//! - Full: 40 hex characters (e.g., "abc123...def")
//! - Short: First 7 characters (e.g., "abc123f")
//!
//! ## Storage
//!
//! Loose objects live in `objects/<first-2-chars>/<remaining-38-chars>`

use crate::artifacts::objects::{OBJECT_ID_LENGTH, OBJECT_ID_RAW_LENGTH};
use crate::errors::{Error, Result};
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

/// Shortest prefix accepted for abbreviated lookups
pub const MIN_PREFIX_LENGTH: usize = 4;

/// Length of the abbreviated form shown to users
const SHORT_OID_LENGTH: usize = 7;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId([u8; OBJECT_ID_RAW_LENGTH]);

impl ObjectId {
    pub const ZERO: ObjectId = ObjectId([0; OBJECT_ID_RAW_LENGTH]);

    pub fn from_raw(bytes: [u8; OBJECT_ID_RAW_LENGTH]) -> Self {
        ObjectId(bytes)
    }

    /// Parse and validate an object ID from its 40-character hex form
    pub fn try_parse(id: &str) -> Result<Self> {
        if id.len() != OBJECT_ID_LENGTH {
            return Err(Error::invalid("object id", id));
        }

        let mut raw = [0u8; OBJECT_ID_RAW_LENGTH];
        hex::decode_to_slice(id, &mut raw).map_err(|_| Error::invalid("object id", id))?;

        Ok(Self(raw))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; OBJECT_ID_RAW_LENGTH] = bytes
            .try_into()
            .map_err(|_| Error::malformed("object id", format!("{} bytes", bytes.len())))?;

        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_RAW_LENGTH] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Write the object ID in binary format (20 bytes)
    ///
    /// Used when serializing tree entries and index entries.
    pub fn write_h40_to<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.0)
    }

    /// Read an object ID from binary format (20 bytes)
    pub fn read_h40_from<R: io::Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let mut raw = [0u8; OBJECT_ID_RAW_LENGTH];
        reader.read_exact(&mut raw)?;

        Ok(Self(raw))
    }

    /// Convert to the loose object path
    ///
    /// Splits the hash as `XX/YYYYYY...` where XX is the first byte.
    pub fn to_path(&self) -> PathBuf {
        let hex = self.to_hex();
        let (dir, file) = hex.split_at(2);
        PathBuf::from(dir).join(file)
    }

    /// First 7 characters of the hash
    pub fn to_short_oid(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(SHORT_OID_LENGTH);
        hex
    }

    pub fn starts_with(&self, prefix: &OidPrefix) -> bool {
        self.to_hex().starts_with(prefix.as_str())
    }
}

impl AsRef<[u8]> for ObjectId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::try_parse(s)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

/// Validated abbreviated object ID (4 to 40 lowercase hex characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OidPrefix(String);

impl OidPrefix {
    pub fn try_parse(prefix: &str) -> Result<Self> {
        if prefix.len() < MIN_PREFIX_LENGTH
            || prefix.len() > OBJECT_ID_LENGTH
            || !prefix.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(Error::invalid("object id prefix", prefix));
        }

        Ok(Self(prefix.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_full(&self) -> bool {
        self.0.len() == OBJECT_ID_LENGTH
    }

    /// The fan-out directory (first two hex characters) every match lives in
    pub fn fan_out(&self) -> &str {
        &self.0[..2]
    }
}

impl std::fmt::Display for OidPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
