use crate::artifacts::index::{HEADER_SIZE, SIGNATURE, VERSION};
use crate::artifacts::objects::object::{Packable, Unpackable};
use crate::errors::{Error, Result};
use byteorder::{ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use std::io::{BufRead, Write};

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct IndexHeader {
    pub(crate) marker: String,
    pub(crate) version: u32,
    pub(crate) entries_count: u32,
}

impl IndexHeader {
    pub(crate) fn with_count(entries_count: u32) -> Self {
        IndexHeader {
            marker: String::from(SIGNATURE),
            version: VERSION,
            entries_count,
        }
    }
}

impl Packable for IndexHeader {
    fn serialize(&self) -> Result<Bytes> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        bytes.write_all(self.marker.as_bytes())?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.version)?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.entries_count)?;

        Ok(Bytes::from(bytes))
    }
}

impl Unpackable for IndexHeader {
    fn deserialize(mut reader: impl BufRead) -> Result<Self> {
        let truncated = |_: std::io::Error| Error::malformed("index header", "truncated");

        let mut marker = [0u8; 4];
        reader.read_exact(&mut marker).map_err(truncated)?;
        let marker = String::from_utf8(marker.to_vec())
            .map_err(|_| Error::malformed("index header", "invalid signature"))?;
        let version = reader.read_u32::<byteorder::NetworkEndian>().map_err(truncated)?;
        let entries_count = reader.read_u32::<byteorder::NetworkEndian>().map_err(truncated)?;

        if marker != SIGNATURE {
            return Err(Error::malformed("index header", format!("signature {marker:?}")));
        }
        if version != VERSION {
            return Err(Error::malformed("index header", format!("unsupported version {version}")));
        }

        Ok(IndexHeader {
            marker,
            version,
            entries_count,
        })
    }
}
