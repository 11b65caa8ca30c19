//! Git blob object
//!
//! Blobs store file content in Git. They contain only the raw file data,
//! without any metadata like filename or permissions (those are stored in trees).
//!
//! ## Format
//!
//! On disk: `blob <size>\0<content>`

use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::Result;
use bytes::Bytes;
use derive_new::new;
use std::io::BufRead;

/// Opaque file content; may hold arbitrary bytes
#[derive(Debug, Clone, PartialEq, Eq, Default, new)]
pub struct Blob {
    content: Bytes,
}

impl Blob {
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Whether the content looks like binary data (a NUL in the first 8000 bytes)
    pub fn is_binary(&self) -> bool {
        self.content.iter().take(8000).any(|byte| *byte == 0)
    }
}

impl From<&[u8]> for Blob {
    fn from(content: &[u8]) -> Self {
        Blob::new(Bytes::copy_from_slice(content))
    }
}

impl Packable for Blob {
    fn serialize(&self) -> Result<Bytes> {
        Ok(self.content.clone())
    }
}

impl Unpackable for Blob {
    fn deserialize(mut reader: impl BufRead) -> Result<Self> {
        // the header has already been read
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;

        Ok(Self::new(Bytes::from(content)))
    }
}

impl Object for Blob {
    fn object_type(&self) -> ObjectType {
        ObjectType::Blob
    }

    fn display(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}
