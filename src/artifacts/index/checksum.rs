//! SHA-1 trailer of the index file
//!
//! Every byte read or written through a [`Checksum`] feeds the digest, so the
//! trailer can be verified (or produced) once the body has gone through.

use crate::artifacts::index::CHECKSUM_SIZE;
use crate::errors::{Error, Result};
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::io::{Read, Write};

#[derive(Debug)]
pub struct Checksum<T> {
    inner: T,
    digest: Sha1,
    consumed: usize,
}

impl<T> Checksum<T> {
    pub(crate) fn new(inner: T) -> Self {
        Checksum {
            inner,
            digest: Sha1::new(),
            consumed: 0,
        }
    }

    /// Bytes hashed so far
    pub(crate) fn consumed(&self) -> usize {
        self.consumed
    }

    pub(crate) fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read> Checksum<T> {
    pub(crate) fn read(&mut self, size: usize) -> Result<Bytes> {
        let mut buffer = vec![0; size];
        self.inner
            .read_exact(&mut buffer)
            .map_err(|_| Error::malformed("index", "unexpected end of file"))?;

        self.digest.update(&buffer);
        self.consumed += size;
        Ok(Bytes::from(buffer))
    }

    pub(crate) fn verify(&mut self) -> Result<()> {
        let mut expected_checksum = [0u8; CHECKSUM_SIZE];
        self.inner
            .read_exact(&mut expected_checksum)
            .map_err(|_| Error::malformed("index", "missing checksum"))?;

        let actual_checksum = self.digest.clone().finalize();
        if expected_checksum != actual_checksum.as_slice() {
            return Err(Error::malformed(
                "index",
                "checksum does not match value stored on disk",
            ));
        }

        Ok(())
    }
}

impl<T: Write> Checksum<T> {
    pub(crate) fn write(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data)?;
        self.digest.update(data);
        self.consumed += data.len();
        Ok(())
    }

    pub(crate) fn write_checksum(&mut self) -> Result<()> {
        let checksum = self.digest.clone().finalize();
        self.inner.write_all(checksum.as_slice())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn written_trailer_verifies() {
        let mut writer = Checksum::new(Vec::new());
        writer.write(b"DIRC").unwrap();
        writer.write_checksum().unwrap();
        let bytes = writer.into_inner();

        let mut reader = Checksum::new(Cursor::new(bytes));
        reader.read(4).unwrap();
        reader.verify().unwrap();
        assert_eq!(reader.consumed(), 4);
    }

    #[test]
    fn corrupted_body_fails_verification() {
        let mut writer = Checksum::new(Vec::new());
        writer.write(b"DIRC").unwrap();
        writer.write_checksum().unwrap();
        let mut bytes = writer.into_inner();
        bytes[0] = b'X';

        let mut reader = Checksum::new(Cursor::new(bytes));
        reader.read(4).unwrap();
        assert!(reader.verify().is_err());
    }
}
