//! Object store
//!
//! The store owns a priority-ordered list of backends. Reads walk the list and the
//! first backend holding the object wins; writes go to the highest-priority
//! writable backend that is not an alternate. Writing the same content twice
//! returns the same id and stores nothing new.

use crate::artifacts::database::backend::OdbBackend;
use crate::artifacts::database::loose::LooseBackend;
use crate::artifacts::database::pack::PackBackend;
use crate::artifacts::database::raw_object::RawObject;
use crate::artifacts::database::stream::{OdbReadStream, OdbWriteStream};
use crate::artifacts::database::{LOOSE_PRIORITY, PACKED_PRIORITY};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::codec;
use crate::artifacts::objects::commit::{Commit, SlimCommit};
use crate::artifacts::objects::object::{Object, ObjectBox};
use crate::artifacts::objects::object_id::{MIN_PREFIX_LENGTH, ObjectId, OidPrefix};
use crate::artifacts::objects::object_type::{ObjectHeader, ObjectType};
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::Tree;
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::errors::{Error, IoContext, Result};
use flate2::Compression;
use sha1::{Digest, Sha1};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct BackendSlot {
    priority: i32,
    alternate: bool,
    backend: Arc<dyn OdbBackend>,
}

#[derive(Debug, Clone, Default)]
pub struct Database {
    objects_dir: Option<PathBuf>,
    backends: Vec<BackendSlot>,
}

impl Database {
    /// A store with no backends; add some with [`Database::add_backend`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `objects/` with its loose and pack backends and any alternates
    pub fn open(objects_dir: &Path, compression: Compression) -> Result<Self> {
        let mut database = Database {
            objects_dir: Some(objects_dir.to_path_buf()),
            backends: Vec::new(),
        };

        database.add_backend(Arc::new(LooseBackend::new(objects_dir, compression)), LOOSE_PRIORITY);
        database.add_backend(Arc::new(PackBackend::open(objects_dir)?), PACKED_PRIORITY);

        for alternate in Self::read_alternates(objects_dir)? {
            if !alternate.is_dir() {
                tracing::warn!(alternate = %alternate.display(), "alternate object directory is missing");
                continue;
            }
            database.add_alternate(Arc::new(LooseBackend::read_only(&alternate)), LOOSE_PRIORITY);
            database.add_alternate(Arc::new(PackBackend::open(&alternate)?), PACKED_PRIORITY);
        }

        Ok(database)
    }

    fn read_alternates(objects_dir: &Path) -> Result<Vec<PathBuf>> {
        let alternates_path = objects_dir.join("info").join("alternates");
        if !alternates_path.is_file() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&alternates_path).at(&alternates_path)?;

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| objects_dir.join(line))
            .collect())
    }

    pub fn objects_dir(&self) -> Option<&Path> {
        self.objects_dir.as_deref()
    }

    /// Register a backend; higher priorities are consulted first, ties in insertion order
    pub fn add_backend(&mut self, backend: Arc<dyn OdbBackend>, priority: i32) {
        self.insert_slot(BackendSlot {
            priority,
            alternate: false,
            backend,
        });
    }

    /// Register a backend that is only ever read from
    pub fn add_alternate(&mut self, backend: Arc<dyn OdbBackend>, priority: i32) {
        self.insert_slot(BackendSlot {
            priority,
            alternate: true,
            backend,
        });
    }

    fn insert_slot(&mut self, slot: BackendSlot) {
        tracing::debug!(backend = slot.backend.name(), priority = slot.priority, alternate = slot.alternate, "backend added");

        let position = self
            .backends
            .iter()
            .position(|existing| existing.priority < slot.priority)
            .unwrap_or(self.backends.len());
        self.backends.insert(position, slot);
    }

    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    fn writable_backend(&self) -> Result<&dyn OdbBackend> {
        self.backends
            .iter()
            .find(|slot| !slot.alternate && slot.backend.is_writable())
            .map(|slot| slot.backend.as_ref())
            .ok_or(Error::ReadOnly)
    }

    /// Run `lookup` against each backend in order and return the first hit
    ///
    /// A backend failing on an object it holds does not hide the object in a
    /// later backend; its error is only reported when nobody else has it.
    fn first_hit<T>(
        &self,
        oid: &ObjectId,
        lookup: impl Fn(&dyn OdbBackend) -> Result<Option<T>>,
    ) -> Result<T> {
        let mut failure = None;

        for slot in &self.backends {
            match lookup(slot.backend.as_ref()) {
                Ok(Some(found)) => return Ok(found),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(%oid, backend = slot.backend.name(), %error, "backend lookup failed");
                    failure.get_or_insert(error);
                }
            }
        }

        Err(failure.unwrap_or(Error::ObjectNotFound(*oid)))
    }

    pub fn exists(&self, oid: &ObjectId) -> bool {
        self.backends.iter().any(|slot| {
            slot.backend.exists(oid).unwrap_or_else(|error| {
                tracing::warn!(%oid, backend = slot.backend.name(), %error, "existence check failed");
                false
            })
        })
    }

    pub fn read(&self, oid: &ObjectId) -> Result<RawObject> {
        tracing::trace!(%oid, "reading object");
        self.first_hit(oid, |backend| backend.read(oid))
    }

    pub fn read_header(&self, oid: &ObjectId) -> Result<ObjectHeader> {
        self.first_hit(oid, |backend| backend.read_header(oid))
    }

    /// Expand an abbreviated id to the single object it names
    pub fn resolve_prefix(&self, prefix: &str) -> Result<ObjectId> {
        let prefix = OidPrefix::try_parse(prefix)?;
        if prefix.is_full() {
            let oid = ObjectId::try_parse(prefix.as_str())?;
            return if self.exists(&oid) {
                Ok(oid)
            } else {
                Err(Error::ObjectNotFound(oid))
            };
        }

        let matches = self.prefix_matches(&prefix)?;
        let mut matches = matches.into_iter();
        match (matches.next(), matches.len()) {
            (None, _) => Err(Error::PrefixNotFound(prefix.to_string())),
            (Some(oid), 0) => Ok(oid),
            (Some(_), rest) => Err(Error::AmbiguousPrefix {
                prefix: prefix.to_string(),
                candidates: rest + 1,
            }),
        }
    }

    /// Distinct ids across all backends starting with `prefix`
    pub fn prefix_matches(&self, prefix: &OidPrefix) -> Result<BTreeSet<ObjectId>> {
        let mut matches = BTreeSet::new();
        for slot in &self.backends {
            matches.extend(slot.backend.prefix_matches(prefix)?);
        }

        Ok(matches)
    }

    pub fn read_prefix(&self, prefix: &str) -> Result<RawObject> {
        let oid = self.resolve_prefix(prefix)?;
        self.read(&oid)
    }

    /// Shortest abbreviation, at least `min_length` long, naming only `oid`
    pub fn shortest_unique_prefix(&self, oid: &ObjectId, min_length: usize) -> Result<String> {
        let hex = oid.to_hex();
        let start = min_length.clamp(MIN_PREFIX_LENGTH, OBJECT_ID_LENGTH);
        let candidates = self.prefix_matches(&OidPrefix::try_parse(&hex[..start])?)?;

        let length = (start..=OBJECT_ID_LENGTH)
            .find(|length| {
                candidates
                    .iter()
                    .all(|candidate| candidate == oid || !candidate.to_hex().starts_with(&hex[..*length]))
            })
            .unwrap_or(OBJECT_ID_LENGTH);

        Ok(hex[..length].to_string())
    }

    /// Store `data` as an object of `object_type` and return its id
    pub fn write(&self, object_type: ObjectType, data: &[u8]) -> Result<ObjectId> {
        let oid = codec::hash(object_type, data);
        if self.exists(&oid) {
            tracing::trace!(%oid, "object already stored");
            return Ok(oid);
        }

        let backend = self.writable_backend()?;
        backend.write(&oid, object_type, data)?;
        tracing::debug!(%oid, %object_type, size = data.len(), backend = backend.name(), "object written");

        Ok(oid)
    }

    pub fn store(&self, object: &impl Object) -> Result<ObjectId> {
        self.write(object.object_type(), &object.serialize()?)
    }

    pub fn open_read_stream(&self, oid: &ObjectId) -> Result<OdbReadStream> {
        self.first_hit(oid, |backend| backend.open_read_stream(oid))
    }

    /// Writer for an object of exactly `size` bytes
    pub fn open_write_stream(&self, size: usize, object_type: ObjectType) -> Result<OdbWriteStream<'_>> {
        let sink = self.writable_backend()?.open_write_sink(object_type, size)?;
        Ok(OdbWriteStream::new(object_type, size, sink).skip_if_stored(|oid| self.exists(oid)))
    }

    /// Id `data` would get, without storing it
    pub fn hash(object_type: ObjectType, data: &[u8]) -> ObjectId {
        codec::hash(object_type, data)
    }

    /// Id the file's content would get as `object_type`, without storing it
    pub fn hash_file(path: &Path, object_type: ObjectType) -> Result<ObjectId> {
        let mut file = File::open(path).at(path)?;
        let size = file.metadata().at(path)?.len() as usize;

        let mut hasher = Sha1::new();
        hasher.update(object_type.header(size).as_bytes());

        let mut buffer = [0u8; 8192];
        let mut hashed = 0;
        loop {
            let read = file.read(&mut buffer).at(path)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            hashed += read;
        }

        if hashed != size {
            return Err(Error::malformed(
                "file",
                format!("{} changed while hashing", path.display()),
            ));
        }

        Ok(ObjectId::from_raw(hasher.finalize().into()))
    }

    pub fn parse_object(&self, oid: &ObjectId) -> Result<ObjectBox> {
        self.read(oid)?.decode()
    }

    fn expect_type(&self, oid: &ObjectId, expected: ObjectType) -> Result<RawObject> {
        let object = self.read(oid)?;
        if object.object_type != expected {
            return Err(Error::TypeMismatch {
                oid: *oid,
                expected,
                actual: object.object_type,
            });
        }

        Ok(object)
    }

    pub fn parse_blob(&self, oid: &ObjectId) -> Result<Blob> {
        let object = self.expect_type(oid, ObjectType::Blob)?;
        Ok(Blob::new(object.data))
    }

    pub fn parse_tree(&self, oid: &ObjectId) -> Result<Tree> {
        match self.expect_type(oid, ObjectType::Tree)?.decode()? {
            ObjectBox::Tree(tree) => Ok(tree),
            other => Err(self.mismatch(oid, ObjectType::Tree, &other)),
        }
    }

    pub fn parse_commit(&self, oid: &ObjectId) -> Result<Commit> {
        match self.expect_type(oid, ObjectType::Commit)?.decode()? {
            ObjectBox::Commit(commit) => Ok(*commit),
            other => Err(self.mismatch(oid, ObjectType::Commit, &other)),
        }
    }

    pub fn parse_tag(&self, oid: &ObjectId) -> Result<Tag> {
        match self.expect_type(oid, ObjectType::Tag)?.decode()? {
            ObjectBox::Tag(tag) => Ok(*tag),
            other => Err(self.mismatch(oid, ObjectType::Tag, &other)),
        }
    }

    fn mismatch(&self, oid: &ObjectId, expected: ObjectType, actual: &ObjectBox) -> Error {
        Error::TypeMismatch {
            oid: *oid,
            expected,
            actual: actual.object_type(),
        }
    }

    /// Parents and committer time of a commit
    pub fn load_slim_commit(&self, oid: &ObjectId) -> Result<SlimCommit> {
        Ok(self.parse_commit(oid)?.to_slim(*oid))
    }

    /// Follow annotated tags until a non-tag object is reached
    pub fn peel_tags(&self, oid: &ObjectId) -> Result<(ObjectId, ObjectType)> {
        let mut current = *oid;
        let mut object_type = self.read_header(&current)?.object_type;

        while object_type == ObjectType::Tag {
            let tag = self.parse_tag(&current)?;
            current = *tag.target();
            object_type = self.read_header(&current)?.object_type;
        }

        Ok((current, object_type))
    }
}
