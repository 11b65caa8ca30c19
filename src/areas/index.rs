//! Index (staging area)
//!
//! An ordered, path-keyed set of staged entries, unique per `(path, stage)`.
//! Entries are flushed into tree objects with [`Index::create_tree`].
//!
//! ## Index File Format
//!
//! See [`crate::artifacts::index`]. Reading takes a shared lock and verifies the
//! trailing checksum; writing goes through `index.lock` and a rename, so a failed
//! write leaves the previous file in place.

use crate::areas::database::Database;
use crate::areas::workspace::Workspace;
use crate::artifacts::core::WalkControl;
use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::{ENTRY_BLOCK, ENTRY_MIN_SIZE, IndexEntry, Stage};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::{CHECKSUM_SIZE, EXTENSION_HEADER_SIZE, HEADER_SIZE};
use crate::artifacts::lockfile::LockFile;
use crate::artifacts::objects::object::{Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::{Tree, TreeBuilder, TreeWalkMode};
use crate::errors::{Error, IoContext, Result};
use bstr::{BStr, BString, ByteSlice};
use byteorder::ByteOrder;
use std::collections::BTreeMap;
use std::ops::DerefMut;
use std::path::{Path, PathBuf};

type EntryKey = (BString, Stage);

/// Directory hierarchy assembled from entry paths while building trees
#[derive(Debug, Default)]
struct TreeNode {
    files: BTreeMap<BString, (ObjectId, EntryMode)>,
    dirs: BTreeMap<BString, TreeNode>,
}

impl TreeNode {
    fn insert(&mut self, path: &BStr, oid: ObjectId, mode: EntryMode) -> Result<()> {
        match path.split_once_str("/") {
            None => {
                if self.dirs.contains_key(path) {
                    return Err(Error::malformed("index", format!("{path} is both a file and a directory")));
                }
                self.files.insert(path.to_owned(), (oid, mode));
            }
            Some((dir, rest)) => {
                let dir = dir.as_bstr();
                if self.files.contains_key(dir) {
                    return Err(Error::malformed("index", format!("{dir} is both a file and a directory")));
                }
                self.dirs
                    .entry(dir.to_owned())
                    .or_default()
                    .insert(rest.as_bstr(), oid, mode)?;
            }
        }

        Ok(())
    }

    /// Write subtrees first so every parent can reference their ids
    fn write(&self, database: &Database) -> Result<ObjectId> {
        let mut builder = TreeBuilder::new();

        for (name, node) in &self.dirs {
            let oid = node.write(database)?;
            builder.insert(name, oid, EntryMode::Directory)?;
        }
        for (name, (oid, mode)) in &self.files {
            builder.insert(name, *oid, *mode)?;
        }

        builder.write(database)
    }
}

/// Staging area bound to an object store and, when not bare, a work tree
#[derive(Debug)]
pub struct Index<'r> {
    path: PathBuf,
    database: &'r Database,
    workspace: Option<&'r Workspace>,
    entries: BTreeMap<EntryKey, IndexEntry>,
    changed: bool,
}

impl<'r> Index<'r> {
    pub fn new(path: impl Into<PathBuf>, database: &'r Database, workspace: Option<&'r Workspace>) -> Self {
        Index {
            path: path.into(),
            database,
            workspace,
            entries: BTreeMap::new(),
            changed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether entries changed since the last `read` or `write`
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.changed = true;
    }

    /// Reload from disk, discarding unsaved entries
    ///
    /// A missing or empty file reads as an empty index.
    pub fn read(&mut self) -> Result<()> {
        self.entries.clear();
        self.changed = false;

        if !self.path.is_file() {
            return Ok(());
        }

        let path = self.path.clone();
        let mut index_file = std::fs::File::open(&path).at(&path)?;
        let mut lock = file_guard::lock(&mut index_file, file_guard::Lock::Shared, 0, 1).at(&path)?;

        let file_size = lock.deref_mut().metadata().at(&path)?.len() as usize;
        if file_size == 0 {
            return Ok(());
        }

        let mut reader = Checksum::new(lock.deref_mut());
        let entries_count = self.parse_header(&mut reader)?;
        self.parse_entries(entries_count, &mut reader)?;
        Self::skip_extensions(&mut reader, file_size)?;

        reader.verify()?;
        tracing::trace!(path = %path.display(), entries = self.entries.len(), "index read");

        Ok(())
    }

    fn parse_header<R: std::io::Read>(&self, reader: &mut Checksum<R>) -> Result<u32> {
        let header_bytes = reader.read(HEADER_SIZE)?;
        let header = IndexHeader::deserialize(std::io::Cursor::new(header_bytes))?;

        Ok(header.entries_count)
    }

    /// Read each entry, extending by 8-byte blocks until its NUL padding shows up
    fn parse_entries<R: std::io::Read>(&mut self, entries_count: u32, reader: &mut Checksum<R>) -> Result<()> {
        for _ in 0..entries_count {
            let mut entry_bytes = reader.read(ENTRY_MIN_SIZE)?.to_vec();

            while entry_bytes.last() != Some(&0) {
                entry_bytes.extend_from_slice(&reader.read(ENTRY_BLOCK)?);
            }

            let entry = IndexEntry::deserialize(std::io::Cursor::new(entry_bytes))?;
            self.entries.insert((entry.path.clone(), entry.stage), entry);
        }

        Ok(())
    }

    fn skip_extensions<R: std::io::Read>(reader: &mut Checksum<R>, file_size: usize) -> Result<()> {
        let body_size = file_size
            .checked_sub(CHECKSUM_SIZE)
            .ok_or_else(|| Error::malformed("index", "file is too short"))?;

        while reader.consumed() + EXTENSION_HEADER_SIZE <= body_size {
            let header = reader.read(EXTENSION_HEADER_SIZE)?;
            let signature = String::from_utf8_lossy(&header[..4]).into_owned();
            let size = byteorder::NetworkEndian::read_u32(&header[4..8]) as usize;
            tracing::trace!(signature, size, "skipping index extension");
            reader.read(size)?;
        }

        Ok(())
    }

    /// Persist all entries atomically
    pub fn write(&mut self) -> Result<()> {
        let lock = LockFile::acquire(&self.path)?;
        let mut writer = Checksum::new(lock);

        let header = IndexHeader::with_count(self.entries.len() as u32);
        writer.write(&header.serialize()?)?;
        for entry in self.entries.values() {
            writer.write(&entry.serialize()?)?;
        }
        writer.write_checksum()?;

        writer.into_inner().commit()?;
        self.changed = false;
        tracing::debug!(path = %self.path.display(), entries = self.entries.len(), "index written");

        Ok(())
    }

    /// Stage the current work tree content of `path`
    ///
    /// The blob id of an unchanged file (same stat data) is reused; anything else
    /// is hashed and written to the object store.
    pub fn add(&mut self, path: &str, stage: Stage) -> Result<&IndexEntry> {
        let workspace = self
            .workspace
            .ok_or_else(|| Error::invalid("work tree", "bare repository has no work tree to add from"))?;
        let metadata = workspace.stat_file(path)?;
        if metadata.mode.is_tree() {
            return Err(Error::invalid("index path", format!("{path} is a directory")));
        }

        let reusable = self
            .entries
            .get(&(BString::from(path), stage))
            .filter(|existing| existing.stat_match(&metadata) && existing.times_match(&metadata))
            .map(|existing| existing.oid);

        let oid = match reusable {
            Some(oid) => oid,
            None => {
                let content = workspace.read_file(path)?;
                self.database.write(ObjectType::Blob, &content)?
            }
        };

        self.add_entry(IndexEntry::new(path, oid, stage, metadata))
    }

    /// Insert or replace the entry at its `(path, stage)`
    ///
    /// A merged entry also drops the conflict stages of its path, file entries at
    /// its parent directories and entries below it.
    pub fn add_entry(&mut self, entry: IndexEntry) -> Result<&IndexEntry> {
        validate_path(entry.path.as_bstr())?;

        if entry.stage == Stage::Merged {
            self.remove_stages(&entry.path);
            for parent in entry.parent_dirs() {
                self.remove_stages(parent);
            }
            self.remove_children(&entry.path);
        }

        let key = (entry.path.clone(), entry.stage);
        self.entries.insert(key.clone(), entry);
        self.changed = true;

        self.entries
            .get(&key)
            .ok_or_else(|| Error::PathNotFound(key.0.to_path_lossy().into_owned()))
    }

    fn remove_stages(&mut self, path: &[u8]) -> usize {
        let before = self.entries.len();
        for stage in [Stage::Merged, Stage::Ancestor, Stage::Ours, Stage::Theirs] {
            self.entries.remove(&(BString::from(path), stage));
        }

        before - self.entries.len()
    }

    fn remove_children(&mut self, path: &[u8]) -> usize {
        let mut prefix = BString::from(path);
        prefix.push(b'/');
        let children = self
            .entries
            .range((prefix.clone(), Stage::Merged)..)
            .take_while(|((child, _), _)| child.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();

        for key in &children {
            self.entries.remove(key);
        }

        children.len()
    }

    /// Drop every stage of `path`, or everything below it when it is a directory
    pub fn remove(&mut self, path: &str) -> Result<()> {
        let removed = self.remove_stages(path.as_bytes()) + self.remove_children(path.as_bytes());
        if removed == 0 {
            return Err(Error::PathNotFound(PathBuf::from(path)));
        }

        self.changed = true;
        Ok(())
    }

    /// Replace the merged entries with the flattened content of `tree`
    pub fn read_tree(&mut self, tree: &Tree) -> Result<()> {
        self.entries.retain(|(_, stage), _| stage.is_conflict());

        let mut flattened = Vec::new();
        tree.walk(self.database, TreeWalkMode::Pre, |root, entry| {
            if !entry.is_tree() {
                let mut path = BString::from(root);
                path.extend_from_slice(entry.name());
                flattened.push(IndexEntry::from_tree_entry(path, entry.oid(), entry.mode()));
            }
            WalkControl::Continue
        })?;

        for entry in flattened {
            self.entries.insert((entry.path.clone(), Stage::Merged), entry);
        }
        self.changed = true;

        Ok(())
    }

    /// Write the tree hierarchy of the merged entries, returning the root id
    pub fn create_tree(&self) -> Result<ObjectId> {
        let unmerged = self.unmerged_count();
        if unmerged > 0 {
            return Err(Error::UnmergedEntries(unmerged));
        }

        let mut root = TreeNode::default();
        for entry in self.entries.values() {
            root.insert(entry.path.as_bstr(), entry.oid, entry.mode())?;
        }

        let oid = root.write(self.database)?;
        tracing::debug!(%oid, entries = self.entries.len(), "tree created from index");

        Ok(oid)
    }

    /// Drop conflict stages of every path that also has a merged entry
    pub fn unique(&mut self) {
        let merged = self
            .entries
            .keys()
            .filter(|(_, stage)| *stage == Stage::Merged)
            .map(|(path, _)| path.clone())
            .collect::<Vec<_>>();

        let before = self.entries.len();
        self.entries
            .retain(|(path, stage), _| !stage.is_conflict() || merged.binary_search(path).is_err());
        self.changed |= before != self.entries.len();
    }

    /// Position of the first entry of `path`, any stage
    pub fn find(&self, path: impl AsRef<[u8]>) -> Option<usize> {
        let path = path.as_ref();
        self.entries.keys().position(|(entry_path, _)| entry_path.as_slice() == path)
    }

    pub fn get(&self, position: usize) -> Option<&IndexEntry> {
        self.entries.values().nth(position)
    }

    pub fn entry(&self, path: impl AsRef<[u8]>, stage: Stage) -> Option<&IndexEntry> {
        self.entries.get(&(BString::from(path.as_ref()), stage))
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unmerged_count(&self) -> usize {
        self.entries
            .keys()
            .filter(|(_, stage)| stage.is_conflict())
            .count()
    }

    /// Conflict sides staged for `path`, ancestor first
    pub fn unmerged(&self, path: impl AsRef<[u8]>) -> Vec<&IndexEntry> {
        let path = path.as_ref();
        [Stage::Ancestor, Stage::Ours, Stage::Theirs]
            .into_iter()
            .filter_map(|stage| self.entry(path, stage))
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }
}

fn validate_path(path: &BStr) -> Result<()> {
    let invalid = path.is_empty()
        || path.starts_with(b"/")
        || path.ends_with(b"/")
        || path.contains(&0)
        || path.split_str("/").any(|component| {
            component.is_empty() || component == b"." || component == b".." || component == b".git"
        });

    if invalid {
        return Err(Error::invalid("index path", path.to_str_lossy()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::database::memory::MemoryBackend;
    use crate::artifacts::index::index_entry::EntryMetadata;
    use crate::artifacts::objects::codec;
    use crate::artifacts::objects::object::Object;
    use crate::artifacts::objects::EMPTY_TREE_ID;
    use crate::errors::ErrorCode;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use std::sync::Arc;

    fn oid(fill: u8) -> ObjectId {
        ObjectId::from_raw([fill; 20])
    }

    #[fixture]
    fn database() -> Database {
        let mut database = Database::new();
        database.add_backend(Arc::new(MemoryBackend::new()), 1);
        database
    }

    fn staged(path: &str, fill: u8, stage: Stage) -> IndexEntry {
        IndexEntry::new(
            path,
            oid(fill),
            stage,
            EntryMetadata {
                mode: EntryMode::REGULAR,
                ..Default::default()
            },
        )
    }

    fn staged_bytes(path: &[u8], fill: u8) -> IndexEntry {
        IndexEntry::from_tree_entry(path, oid(fill), EntryMode::REGULAR)
    }

    #[rstest]
    fn entries_are_ordered_by_path_then_stage(database: Database) {
        let mut index = Index::new("index", &database, None);
        index.add_entry(staged("b", 1, Stage::Merged)).unwrap();
        index.add_entry(staged("a", 2, Stage::Theirs)).unwrap();
        index.add_entry(staged("a", 3, Stage::Ours)).unwrap();

        let keys = index
            .entries()
            .map(|entry| (entry.path.to_string(), entry.stage))
            .collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec![
                ("a".to_string(), Stage::Ours),
                ("a".to_string(), Stage::Theirs),
                ("b".to_string(), Stage::Merged)
            ]
        );
        assert_eq!(index.find("b"), Some(2));
        assert_eq!(index.get(0).unwrap().oid, oid(3));
        assert_eq!(index.unmerged("a").len(), 2);
    }

    #[rstest]
    fn merged_entries_replace_files_and_directories(database: Database) {
        let mut index = Index::new("index", &database, None);
        index.add_entry(staged("a", 1, Stage::Merged)).unwrap();
        index.add_entry(staged("a/b", 2, Stage::Merged)).unwrap();
        assert_eq!(index.entry_count(), 1);
        assert!(index.entry("a", Stage::Merged).is_none());

        index.add_entry(staged("a/c", 3, Stage::Merged)).unwrap();
        index.add_entry(staged("a", 4, Stage::Merged)).unwrap();
        let paths = index.entries().map(|entry| entry.path.clone()).collect::<Vec<_>>();
        assert_eq!(paths, vec!["a"]);
    }

    #[rstest]
    fn create_tree_refuses_conflicts(database: Database) {
        let mut index = Index::new("index", &database, None);
        let blob = database.write(ObjectType::Blob, b"hello\n").unwrap();
        index
            .add_entry(IndexEntry::from_tree_entry("hello.txt", blob, EntryMode::REGULAR))
            .unwrap();
        index.add_entry(staged("conflict.txt", 9, Stage::Ours)).unwrap();

        let error = index.create_tree().unwrap_err();
        assert_eq!(error.code(), ErrorCode::UnmergedEntries);

        index.remove("conflict.txt").unwrap();
        let tree_oid = index.create_tree().unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(b"100644 hello.txt\0");
        expected.extend_from_slice(blob.as_bytes());
        assert_eq!(tree_oid, codec::digest(&codec::frame(ObjectType::Tree, &expected)));
    }

    #[rstest]
    fn empty_index_builds_the_empty_tree(database: Database) {
        let index = Index::new("index", &database, None);

        assert_eq!(index.create_tree().unwrap().to_string(), EMPTY_TREE_ID);
    }

    #[rstest]
    fn nested_paths_become_subtrees(database: Database) {
        let mut index = Index::new("index", &database, None);
        let blob = database.write(ObjectType::Blob, b"x").unwrap();
        for path in ["src/main.rs", "src/bin/tool.rs", "README", "src.txt"] {
            index
                .add_entry(IndexEntry::from_tree_entry(path, blob, EntryMode::REGULAR))
                .unwrap();
        }

        let root = database.parse_tree(&index.create_tree().unwrap()).unwrap();
        let names = root.entries().iter().map(|entry| entry.name()).collect::<Vec<_>>();
        assert_eq!(names, vec!["README", "src.txt", "src"]);

        let mut reloaded = Index::new("index", &database, None);
        reloaded.read_tree(&root).unwrap();
        let paths = reloaded.entries().map(|entry| entry.path.clone()).collect::<Vec<_>>();
        assert_eq!(paths, vec!["README", "src.txt", "src/bin/tool.rs", "src/main.rs"]);
        assert_eq!(reloaded.create_tree().unwrap(), root.object_id().unwrap());
    }

    #[rstest]
    fn non_utf8_paths_sort_by_bytes_and_survive_a_rewrite(database: Database) {
        let dir = assert_fs::TempDir::new().unwrap();
        let path = dir.child("index");
        let mut index = Index::new(path.path(), &database, None);
        index.add_entry(staged_bytes(b"caf\xe9", 1)).unwrap();
        index.add_entry(staged_bytes(b"cafz", 2)).unwrap();
        index.write().unwrap();

        let mut reloaded = Index::new(path.path(), &database, None);
        reloaded.read().unwrap();

        let paths = reloaded.entries().map(|entry| entry.path.clone()).collect::<Vec<_>>();
        assert_eq!(paths, vec![BString::from("cafz"), BString::from(&b"caf\xe9"[..])]);
        assert_eq!(reloaded.entry(b"caf\xe9", Stage::Merged).unwrap().oid, oid(1));

        let root = database.parse_tree(&reloaded.create_tree().unwrap()).unwrap();
        assert_eq!(root.entry_by_name(b"caf\xe9").unwrap().oid(), oid(1));
    }

    #[rstest]
    fn unique_drops_superseded_conflicts(database: Database) {
        let mut index = Index::new("index", &database, None);
        index.add_entry(staged("a", 1, Stage::Ours)).unwrap();
        index.add_entry(staged("a", 2, Stage::Theirs)).unwrap();
        index.add_entry(staged("b", 3, Stage::Ours)).unwrap();
        // bypass add_entry so the conflict stages survive next to the merged one
        index.entries.insert(("a".into(), Stage::Merged), staged("a", 4, Stage::Merged));

        index.unique();

        assert_eq!(index.unmerged_count(), 1);
        assert_eq!(index.entry("a", Stage::Merged).unwrap().oid, oid(4));
    }

    #[rstest]
    fn removing_unknown_paths_fails(database: Database) {
        let mut index = Index::new("index", &database, None);

        assert!(index.remove("missing").unwrap_err().is_not_found());
    }

    #[rstest]
    #[case("")]
    #[case("/abs")]
    #[case("a//b")]
    #[case("a/../b")]
    #[case(".git/config")]
    fn invalid_paths_are_rejected(database: Database, #[case] path: &str) {
        let mut index = Index::new("index", &database, None);

        let error = index.add_entry(staged(path, 1, Stage::Merged)).unwrap_err();
        assert_eq!(error.code(), ErrorCode::InvalidSpec);
    }

    #[rstest]
    fn write_then_read_keeps_entries_and_stages(database: Database) {
        let dir = assert_fs::TempDir::new().unwrap();
        let path = dir.child("index");

        let mut index = Index::new(path.path(), &database, None);
        index.add_entry(staged("dir/file.txt", 1, Stage::Merged)).unwrap();
        index.add_entry(staged("conflict", 2, Stage::Ancestor)).unwrap();
        index.add_entry(staged("conflict", 3, Stage::Theirs)).unwrap();
        index.write().unwrap();
        assert!(!index.is_changed());
        assert!(!dir.child("index.lock").exists());

        let mut reloaded = Index::new(path.path(), &database, None);
        reloaded.read().unwrap();
        assert_eq!(
            reloaded.entries().cloned().collect::<Vec<_>>(),
            index.entries().cloned().collect::<Vec<_>>()
        );

        reloaded.add_entry(staged("scratch", 4, Stage::Merged)).unwrap();
        reloaded.read().unwrap();
        assert_eq!(reloaded.entry_count(), 3);
    }

    #[rstest]
    fn corrupted_files_fail_the_checksum(database: Database) {
        let dir = assert_fs::TempDir::new().unwrap();
        let path = dir.child("index");
        let mut index = Index::new(path.path(), &database, None);
        index.add_entry(staged("file", 1, Stage::Merged)).unwrap();
        index.write().unwrap();

        let mut bytes = std::fs::read(path.path()).unwrap();
        bytes[HEADER_SIZE + 40] ^= 0xff;
        std::fs::write(path.path(), bytes).unwrap();

        let error = Index::new(path.path(), &database, None).read().unwrap_err();
        assert_eq!(error.code(), ErrorCode::MalformedObject);
    }

    #[rstest]
    fn extensions_are_skipped(database: Database) {
        use sha1::{Digest, Sha1};

        let dir = assert_fs::TempDir::new().unwrap();
        let path = dir.child("index");
        let mut index = Index::new(path.path(), &database, None);
        index.add_entry(staged("file", 1, Stage::Merged)).unwrap();
        index.write().unwrap();

        let bytes = std::fs::read(path.path()).unwrap();
        let mut body = bytes[..bytes.len() - CHECKSUM_SIZE].to_vec();
        body.extend_from_slice(b"TREE\0\0\0\x03abc");
        let checksum = Sha1::digest(&body);
        body.extend_from_slice(&checksum);
        std::fs::write(path.path(), body).unwrap();

        let mut reloaded = Index::new(path.path(), &database, None);
        reloaded.read().unwrap();
        assert_eq!(reloaded.entry("file", Stage::Merged).unwrap().oid, oid(1));
    }

    #[rstest]
    fn adding_reuses_unchanged_blobs(database: Database) {
        let dir = assert_fs::TempDir::new().unwrap();
        dir.child("hello.txt").write_str("hello\n").unwrap();
        let workspace = Workspace::new(dir.path());

        let mut index = Index::new(dir.child("index").path(), &database, Some(&workspace));
        let first = index.add("hello.txt", Stage::Merged).unwrap().oid;
        assert_eq!(first.to_string(), "ce013625030ba8dba906f756967f9e9ca394464a");
        assert!(database.exists(&first));

        let second = index.add("hello.txt", Stage::Merged).unwrap().oid;
        assert_eq!(first, second);

        assert!(index.add("missing.txt", Stage::Merged).unwrap_err().is_not_found());
    }
}
