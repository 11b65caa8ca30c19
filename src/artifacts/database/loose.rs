//! Loose object backend
//!
//! Each object lives zlib-compressed in `objects/<first-2-hex>/<remaining-38-hex>`.
//! New objects are written to a temporary file in the objects directory and
//! renamed into place, so readers never observe a partial object.

use crate::artifacts::database::backend::OdbBackend;
use crate::artifacts::database::raw_object::RawObject;
use crate::artifacts::database::stream::{ObjectSink, OdbReadStream};
use crate::artifacts::objects::object_id::{ObjectId, OidPrefix};
use crate::artifacts::objects::object_type::{ObjectHeader, ObjectType};
use crate::errors::{Error, IoContext, Result};
use bytes::Bytes;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
pub struct LooseBackend {
    objects_dir: PathBuf,
    compression: Compression,
    writable: bool,
}

impl LooseBackend {
    pub fn new(objects_dir: impl Into<PathBuf>, compression: Compression) -> Self {
        LooseBackend {
            objects_dir: objects_dir.into(),
            compression,
            writable: true,
        }
    }

    /// Backend over an alternate's objects directory; never written to
    pub fn read_only(objects_dir: impl Into<PathBuf>) -> Self {
        LooseBackend {
            objects_dir: objects_dir.into(),
            compression: Compression::default(),
            writable: false,
        }
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    fn object_path(&self, oid: &ObjectId) -> PathBuf {
        self.objects_dir.join(oid.to_path())
    }

    /// Open the object for inflating, `None` if the file is absent
    fn open_inflated(&self, oid: &ObjectId) -> Result<Option<BufReader<ZlibDecoder<File>>>> {
        let path = self.object_path(oid);

        match File::open(&path) {
            Ok(file) => Ok(Some(BufReader::new(ZlibDecoder::new(file)))),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error).at(&path),
        }
    }

    fn publish(&self, oid: &ObjectId, temp: NamedTempFile) -> Result<()> {
        let object_path = self.object_path(oid);
        if object_path.exists() {
            return Ok(());
        }

        let object_dir = object_path
            .parent()
            .ok_or_else(|| Error::PathNotFound(object_path.clone()))?;
        std::fs::create_dir_all(object_dir).at(object_dir)?;

        match temp.persist(&object_path) {
            Ok(_) => {}
            // another writer published the same content first
            Err(_) if object_path.exists() => {}
            Err(error) => return Err(error.error).at(&object_path),
        }

        tracing::debug!(%oid, "loose object written");
        Ok(())
    }
}

impl OdbBackend for LooseBackend {
    fn name(&self) -> &'static str {
        "loose"
    }

    fn exists(&self, oid: &ObjectId) -> Result<bool> {
        Ok(self.object_path(oid).is_file())
    }

    fn read(&self, oid: &ObjectId) -> Result<Option<RawObject>> {
        let Some(mut reader) = self.open_inflated(oid)? else {
            return Ok(None);
        };
        let path = self.object_path(oid);

        let header = ObjectType::parse_object_header(&mut reader)?;
        let mut data = Vec::with_capacity(header.size);
        reader.read_to_end(&mut data).at(&path)?;

        if data.len() != header.size {
            return Err(Error::malformed(
                "loose object",
                format!(
                    "{oid} declares {} bytes but holds {}",
                    header.size,
                    data.len()
                ),
            ));
        }

        tracing::trace!(%oid, object_type = %header.object_type, "loose object read");
        Ok(Some(RawObject::new(*oid, header.object_type, Bytes::from(data))))
    }

    fn read_header(&self, oid: &ObjectId) -> Result<Option<ObjectHeader>> {
        // only as much as the header needs is inflated
        match self.open_inflated(oid)? {
            Some(mut reader) => Ok(Some(ObjectType::parse_object_header(&mut reader)?)),
            None => Ok(None),
        }
    }

    fn prefix_matches(&self, prefix: &OidPrefix) -> Result<Vec<ObjectId>> {
        let dir_path = self.objects_dir.join(prefix.fan_out());
        if !dir_path.is_dir() {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        for entry in std::fs::read_dir(&dir_path).at(&dir_path)? {
            let entry = entry.at(&dir_path)?;
            let full_oid = format!("{}{}", prefix.fan_out(), entry.file_name().to_string_lossy());

            if full_oid.starts_with(prefix.as_str())
                && let Ok(oid) = ObjectId::try_parse(&full_oid)
            {
                matches.push(oid);
            }
        }

        Ok(matches)
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn write(&self, oid: &ObjectId, object_type: ObjectType, data: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(Error::ReadOnly);
        }
        if self.object_path(oid).exists() {
            return Ok(());
        }

        let mut sink = LooseSink::create(self, object_type, data.len())?;
        sink.write_all(data)?;
        Box::new(sink).commit(oid)
    }

    fn open_read_stream(&self, oid: &ObjectId) -> Result<Option<OdbReadStream>> {
        let Some(mut reader) = self.open_inflated(oid)? else {
            return Ok(None);
        };
        let header = ObjectType::parse_object_header(&mut reader)?;

        Ok(Some(OdbReadStream::new(
            header.object_type,
            header.size,
            Box::new(reader.take(header.size as u64)),
        )))
    }

    fn open_write_sink(&self, object_type: ObjectType, size: usize) -> Result<Box<dyn ObjectSink + '_>> {
        if !self.writable {
            return Err(Error::ReadOnly);
        }

        Ok(Box::new(LooseSink::create(self, object_type, size)?))
    }
}

/// Compresses straight into a temporary file next to the final location
struct LooseSink<'b> {
    backend: &'b LooseBackend,
    encoder: ZlibEncoder<NamedTempFile>,
}

impl<'b> LooseSink<'b> {
    fn create(backend: &'b LooseBackend, object_type: ObjectType, size: usize) -> Result<Self> {
        let objects_dir = backend.objects_dir.as_path();
        std::fs::create_dir_all(objects_dir).at(objects_dir)?;

        let temp = tempfile::Builder::new()
            .prefix("tmp_obj_")
            .tempfile_in(objects_dir)
            .at(objects_dir)?;
        let mut encoder = ZlibEncoder::new(temp, backend.compression);
        encoder
            .write_all(object_type.header(size).as_bytes())
            .at(objects_dir)?;

        Ok(LooseSink { backend, encoder })
    }
}

impl Write for LooseSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

impl ObjectSink for LooseSink<'_> {
    fn commit(self: Box<Self>, oid: &ObjectId) -> Result<()> {
        let LooseSink { backend, encoder } = *self;
        let temp = encoder.finish().at(backend.objects_dir())?;

        backend.publish(oid, temp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::codec;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn backend() -> (TempDir, LooseBackend) {
        let dir = TempDir::new().unwrap();
        let backend = LooseBackend::new(dir.path().join("objects"), Compression::default());
        (dir, backend)
    }

    #[rstest]
    fn written_objects_land_in_fan_out_directories(backend: (TempDir, LooseBackend)) {
        let (_dir, backend) = backend;
        let oid = codec::hash(ObjectType::Blob, b"hello\n");

        backend.write(&oid, ObjectType::Blob, b"hello\n").unwrap();

        assert!(
            backend
                .objects_dir()
                .join("ce")
                .join("013625030ba8dba906f756967f9e9ca394464a")
                .is_file()
        );
        let object = backend.read(&oid).unwrap().unwrap();
        assert_eq!(object.data.as_ref(), b"hello\n");
        assert_eq!(
            backend.read_header(&oid).unwrap(),
            Some(ObjectHeader {
                object_type: ObjectType::Blob,
                size: 6
            })
        );
    }

    #[rstest]
    fn missing_objects_are_none(backend: (TempDir, LooseBackend)) {
        let (_dir, backend) = backend;
        let oid = ObjectId::from_raw([9; 20]);

        assert_eq!(backend.read(&oid).unwrap(), None);
        assert!(!backend.exists(&oid).unwrap());
    }

    #[rstest]
    fn dropped_sinks_leave_no_files(backend: (TempDir, LooseBackend)) {
        let (_dir, backend) = backend;

        {
            let mut sink = backend.open_write_sink(ObjectType::Blob, 3).unwrap();
            sink.write_all(b"abc").unwrap();
        }

        let leftovers = std::fs::read_dir(backend.objects_dir()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[rstest]
    fn read_only_backends_refuse_writes(backend: (TempDir, LooseBackend)) {
        let (_dir, backend) = backend;
        let read_only = LooseBackend::read_only(backend.objects_dir());

        let error = read_only
            .write(&ObjectId::from_raw([1; 20]), ObjectType::Blob, b"")
            .unwrap_err();
        assert_eq!(error.code(), crate::errors::ErrorCode::ReadOnly);
    }

    #[rstest]
    fn corrupt_objects_are_errors(backend: (TempDir, LooseBackend)) {
        let (_dir, backend) = backend;
        let oid = ObjectId::from_raw([3; 20]);
        let path = backend.objects_dir().join(oid.to_path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"blob 10\0abc").unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        assert!(backend.read(&oid).is_err());
    }
}
