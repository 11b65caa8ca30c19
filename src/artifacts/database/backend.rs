use crate::artifacts::database::raw_object::RawObject;
use crate::artifacts::database::stream::{BufferedSink, ObjectSink, OdbReadStream};
use crate::artifacts::objects::object_id::{ObjectId, OidPrefix};
use crate::artifacts::objects::object_type::{ObjectHeader, ObjectType};
use crate::errors::{Error, Result};
use std::io::Cursor;

/// A place objects can be read from and, optionally, written to
///
/// Lookups return `Ok(None)` when the backend does not hold the object so the
/// store can move on to the next backend. `Err` is reserved for objects that
/// are present but unreadable.
pub trait OdbBackend: Send + Sync + std::fmt::Debug {
    /// Short label used in log lines
    fn name(&self) -> &'static str;

    fn exists(&self, oid: &ObjectId) -> Result<bool>;

    fn read(&self, oid: &ObjectId) -> Result<Option<RawObject>>;

    fn read_header(&self, oid: &ObjectId) -> Result<Option<ObjectHeader>> {
        Ok(self.read(oid)?.map(|object| object.header()))
    }

    /// Every stored id starting with `prefix`
    fn prefix_matches(&self, prefix: &OidPrefix) -> Result<Vec<ObjectId>>;

    fn is_writable(&self) -> bool {
        false
    }

    /// Store an object whose id has already been computed
    fn write(&self, _oid: &ObjectId, _object_type: ObjectType, _data: &[u8]) -> Result<()> {
        Err(Error::ReadOnly)
    }

    fn open_read_stream(&self, oid: &ObjectId) -> Result<Option<OdbReadStream>> {
        Ok(self.read(oid)?.map(|object| {
            OdbReadStream::new(
                object.object_type,
                object.size(),
                Box::new(Cursor::new(object.data)),
            )
        }))
    }

    /// Destination for a streamed write of `size` bytes
    ///
    /// The default buffers the body and hands it to [`OdbBackend::write`] on commit.
    fn open_write_sink(&self, object_type: ObjectType, size: usize) -> Result<Box<dyn ObjectSink + '_>> {
        if !self.is_writable() {
            return Err(Error::ReadOnly);
        }

        Ok(Box::new(BufferedSink::new(self, object_type, size)))
    }
}
