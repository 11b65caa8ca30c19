//! Streaming reads and writes
//!
//! A write stream hashes the body as it arrives, so the object id is known the
//! moment the last byte has been written. Nothing becomes visible in the store
//! until [`OdbWriteStream::finalize`] succeeds; dropping the stream discards it.
//! An object some backend already holds is never committed a second time.

use crate::artifacts::database::backend::OdbBackend;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, Result};
use sha1::{Digest, Sha1};
use std::io::{self, Read, Write};

/// Incremental reader over one object's body
pub struct OdbReadStream {
    object_type: ObjectType,
    size: usize,
    reader: Box<dyn Read + Send>,
}

impl OdbReadStream {
    pub fn new(object_type: ObjectType, size: usize, reader: Box<dyn Read + Send>) -> Self {
        OdbReadStream {
            object_type,
            size,
            reader,
        }
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl Read for OdbReadStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl std::fmt::Debug for OdbReadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OdbReadStream")
            .field("object_type", &self.object_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Backend side of a write stream
///
/// Dropping a sink without committing must leave the backend untouched.
pub trait ObjectSink: Write {
    fn commit(self: Box<Self>, oid: &ObjectId) -> Result<()>;
}

/// Sink that keeps the body in memory and stores it in one call on commit
pub struct BufferedSink<'b, B: OdbBackend + ?Sized> {
    backend: &'b B,
    object_type: ObjectType,
    buffer: Vec<u8>,
}

impl<'b, B: OdbBackend + ?Sized> BufferedSink<'b, B> {
    pub fn new(backend: &'b B, object_type: ObjectType, size: usize) -> Self {
        BufferedSink {
            backend,
            object_type,
            buffer: Vec::with_capacity(size),
        }
    }
}

impl<B: OdbBackend + ?Sized> Write for BufferedSink<'_, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<B: OdbBackend + ?Sized> ObjectSink for BufferedSink<'_, B> {
    fn commit(self: Box<Self>, oid: &ObjectId) -> Result<()> {
        self.backend.write(oid, self.object_type, &self.buffer)
    }
}

type StoredCheck<'a> = Box<dyn Fn(&ObjectId) -> bool + 'a>;

/// Writer for an object whose size is declared up front
pub struct OdbWriteStream<'a> {
    object_type: ObjectType,
    declared_size: usize,
    written: usize,
    hasher: Sha1,
    sink: Box<dyn ObjectSink + 'a>,
    already_stored: Option<StoredCheck<'a>>,
}

impl<'a> OdbWriteStream<'a> {
    pub fn new(object_type: ObjectType, declared_size: usize, sink: Box<dyn ObjectSink + 'a>) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(object_type.header(declared_size).as_bytes());

        OdbWriteStream {
            object_type,
            declared_size,
            written: 0,
            hasher,
            sink,
            already_stored: None,
        }
    }

    /// Skip the commit when `check` reports the finished id as present
    pub fn skip_if_stored(mut self, check: impl Fn(&ObjectId) -> bool + 'a) -> Self {
        self.already_stored = Some(Box::new(check));
        self
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// Check the declared size, publish the object and return its id
    pub fn finalize(mut self) -> Result<ObjectId> {
        if self.written != self.declared_size {
            return Err(Error::malformed(
                "object stream",
                format!(
                    "declared {} bytes, received {}",
                    self.declared_size, self.written
                ),
            ));
        }

        self.sink.flush()?;
        let oid = ObjectId::from_raw(self.hasher.finalize().into());
        if self.already_stored.as_ref().is_some_and(|stored| stored(&oid)) {
            tracing::trace!(%oid, "object already stored");
            return Ok(oid);
        }

        self.sink.commit(&oid)?;
        tracing::debug!(%oid, object_type = %self.object_type, "stream write finalized");

        Ok(oid)
    }

    /// Discard everything written so far
    pub fn abort(self) {
        tracing::debug!(object_type = %self.object_type, written = self.written, "stream write aborted");
    }
}

impl Write for OdbWriteStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written + buf.len() > self.declared_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "object stream overflow: declared {} bytes",
                    self.declared_size
                ),
            ));
        }

        self.sink.write_all(buf)?;
        self.hasher.update(buf);
        self.written += buf.len();

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}
