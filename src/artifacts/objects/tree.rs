//! Git tree object
//!
//! Trees represent directory snapshots in Git. They contain entries for files (blobs),
//! subdirectories (other trees), symlinks and submodule commit links.
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`
//! Each entry: `<mode> <name>\0<20-byte-sha1>`
//!
//! ## Ordering
//!
//! Entries are sorted by name byte-wise, where a subtree name compares as if it
//! were followed by `/`. Decoding rejects any other order and duplicate names.
//! Names are raw bytes; nothing requires them to be UTF-8.

use crate::areas::database::Database;
use crate::artifacts::core::WalkControl;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, Result};
use bstr::{BStr, BString, ByteSlice};
use bytes::Bytes;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    name: BString,
    mode: EntryMode,
    oid: ObjectId,
}

impl TreeEntry {
    pub fn new(name: impl Into<BString>, mode: EntryMode, oid: ObjectId) -> Result<Self> {
        let name = name.into();
        validate_entry_name(&name)?;

        Ok(TreeEntry { name, mode, oid })
    }

    pub fn name(&self) -> &BStr {
        self.name.as_bstr()
    }

    pub fn mode(&self) -> EntryMode {
        self.mode
    }

    pub fn oid(&self) -> ObjectId {
        self.oid
    }

    pub fn object_type(&self) -> ObjectType {
        self.mode.object_type()
    }

    pub fn is_tree(&self) -> bool {
        self.mode.is_tree()
    }

    /// Name as compared in canonical order (subtrees get a trailing `/`)
    fn sort_key(&self) -> Cow<'_, [u8]> {
        sort_key(&self.name, self.mode)
    }
}

fn sort_key(name: &[u8], mode: EntryMode) -> Cow<'_, [u8]> {
    if mode.is_tree() {
        let mut key = name.to_vec();
        key.push(b'/');
        Cow::Owned(key)
    } else {
        Cow::Borrowed(name)
    }
}

/// Canonical ordering between two tree entries
pub fn canonical_cmp(left: &TreeEntry, right: &TreeEntry) -> Ordering {
    left.sort_key().cmp(&right.sort_key())
}

fn validate_entry_name(name: &[u8]) -> Result<()> {
    if name.is_empty() || name == b"." || name == b".." || name.contains(&b'/') || name.contains(&0) {
        return Err(Error::invalid("tree entry name", name.to_str_lossy()));
    }

    Ok(())
}

/// Git tree object representing a directory snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

/// Order in which [`Tree::walk`] visits entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeWalkMode {
    /// Parents before their children
    Pre,
    /// Children before their parents
    Post,
}

impl Tree {
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> impl Iterator<Item = TreeEntry> {
        self.entries.into_iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TreeEntry> {
        self.entries.get(index)
    }

    pub fn entry_by_name(&self, name: impl AsRef<[u8]>) -> Option<&TreeEntry> {
        let name = name.as_ref();
        self.entries.iter().find(|entry| entry.name.as_slice() == name)
    }

    pub fn entry_by_id(&self, oid: &ObjectId) -> Option<&TreeEntry> {
        self.entries.iter().find(|entry| &entry.oid == oid)
    }

    /// Look up a slash separated path, descending through subtrees
    pub fn entry_by_path(&self, database: &Database, path: &str) -> Result<TreeEntry> {
        let not_found = || Error::PathNotFound(path.into());
        let mut components = path.split('/').filter(|component| !component.is_empty());

        let first = components.next().ok_or_else(not_found)?;
        let mut entry = self.entry_by_name(first).cloned().ok_or_else(not_found)?;

        for component in components {
            if !entry.is_tree() {
                return Err(not_found());
            }
            let subtree = database.parse_tree(&entry.oid)?;
            entry = subtree.entry_by_name(component).cloned().ok_or_else(not_found)?;
        }

        Ok(entry)
    }

    /// Visit every entry recursively
    ///
    /// The visitor receives the parent path (empty or ending in `/`) and the entry.
    /// Paths are built from raw entry names, so they are bytes too.
    /// `WalkControl::Skip` in pre-order keeps the walk out of that subtree;
    /// `WalkControl::Stop` ends it with `Error::Aborted`.
    pub fn walk<F>(&self, database: &Database, mode: TreeWalkMode, mut visitor: F) -> Result<()>
    where
        F: FnMut(&BStr, &TreeEntry) -> WalkControl,
    {
        self.walk_at(database, mode, b"".as_bstr(), &mut visitor)
    }

    fn walk_at<F>(&self, database: &Database, mode: TreeWalkMode, root: &BStr, visitor: &mut F) -> Result<()>
    where
        F: FnMut(&BStr, &TreeEntry) -> WalkControl,
    {
        for entry in &self.entries {
            if mode == TreeWalkMode::Pre {
                match visitor(root, entry) {
                    WalkControl::Stop => return Err(Error::Aborted),
                    WalkControl::Skip => continue,
                    WalkControl::Continue => {}
                }
            }

            if entry.is_tree() {
                let subtree = database.parse_tree(&entry.oid)?;
                let mut subroot = BString::from(root);
                subroot.extend_from_slice(&entry.name);
                subroot.push(b'/');
                subtree.walk_at(database, mode, subroot.as_bstr(), visitor)?;
            }

            if mode == TreeWalkMode::Post && visitor(root, entry) == WalkControl::Stop {
                return Err(Error::Aborted);
            }
        }

        Ok(())
    }
}

impl Packable for Tree {
    fn serialize(&self) -> Result<Bytes> {
        let mut content = Vec::new();

        for entry in &self.entries {
            content.extend_from_slice(entry.mode.as_str().as_bytes());
            content.push(b' ');
            content.extend_from_slice(&entry.name);
            content.push(0);
            entry.oid.write_h40_to(&mut content)?;
        }

        Ok(Bytes::from(content))
    }
}

impl Unpackable for Tree {
    fn deserialize(mut reader: impl BufRead) -> Result<Self> {
        let mut entries: Vec<TreeEntry> = Vec::new();

        // Reuse scratch buffers to reduce allocs
        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            // Read "mode " (space-delimited)
            let n = reader.read_until(b' ', &mut mode_bytes)?;
            if n == 0 {
                break; // clean EOF: no more entries
            }
            if mode_bytes.pop() != Some(b' ') {
                return Err(Error::malformed("tree", "unexpected EOF in mode"));
            }

            let mode = std::str::from_utf8(&mode_bytes)
                .map_err(|_| Error::malformed("tree", "mode is not ascii"))?;
            let mode = EntryMode::from_octal_str(mode)?;

            // Read "name\0"
            name_bytes.clear();
            reader.read_until(b'\0', &mut name_bytes)?;
            if name_bytes.pop() != Some(b'\0') {
                return Err(Error::malformed("tree", "missing NUL after entry name"));
            }
            let name = BString::from(name_bytes.as_slice());

            let oid = ObjectId::read_h40_from(&mut reader)
                .map_err(|_| Error::malformed("tree", format!("truncated object id for {name}")))?;

            let entry = TreeEntry::new(name, mode, oid)
                .map_err(|error| Error::malformed("tree", error.to_string()))?;

            if let Some(previous) = entries.last()
                && canonical_cmp(previous, &entry) != Ordering::Less
            {
                return Err(Error::malformed(
                    "tree",
                    format!("entry {} is out of order or duplicated", entry.name),
                ));
            }

            entries.push(entry);
        }

        Ok(Tree { entries })
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn display(&self) -> String {
        self.entries
            .iter()
            .map(|entry| {
                format!(
                    "{:0>6} {} {}\t{}",
                    entry.mode.as_str(),
                    entry.object_type(),
                    entry.oid,
                    entry.name
                )
            })
            .collect::<Vec<String>>()
            .join("\n")
    }
}

/// Mutable set of entries that produces a canonically ordered [`Tree`]
///
/// Entries are keyed by their canonical sort key, so iteration order is the
/// order in which they are written.
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    entries: BTreeMap<Vec<u8>, TreeEntry>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tree(tree: &Tree) -> Self {
        let entries = tree
            .entries
            .iter()
            .map(|entry| (entry.sort_key().into_owned(), entry.clone()))
            .collect();

        TreeBuilder { entries }
    }

    /// Add or replace the entry called `name`
    pub fn insert(&mut self, name: impl AsRef<[u8]>, oid: ObjectId, mode: EntryMode) -> Result<()> {
        let name = name.as_ref();
        let entry = TreeEntry::new(name, mode, oid)?;

        // a file and a directory of the same name would both survive otherwise
        self.entries.remove(name);
        self.entries.remove(&directory_key(name));
        self.entries.insert(entry.sort_key().into_owned(), entry);

        Ok(())
    }

    pub fn remove(&mut self, name: impl AsRef<[u8]>) -> Result<TreeEntry> {
        let name = name.as_ref();
        self.entries
            .remove(name)
            .or_else(|| self.entries.remove(&directory_key(name)))
            .ok_or_else(|| Error::PathNotFound(name.to_path_lossy().into_owned()))
    }

    pub fn get(&self, name: impl AsRef<[u8]>) -> Option<&TreeEntry> {
        let name = name.as_ref();
        self.entries
            .get(name)
            .or_else(|| self.entries.get(&directory_key(name)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Keep only the entries the predicate accepts
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&TreeEntry) -> bool,
    {
        self.entries.retain(|_, entry| keep(entry));
    }

    pub fn build(&self) -> Tree {
        Tree {
            entries: self.entries.values().cloned().collect(),
        }
    }

    pub fn write(&self, database: &Database) -> Result<ObjectId> {
        database.store(&self.build())
    }
}

fn directory_key(name: &[u8]) -> Vec<u8> {
    sort_key(name, EntryMode::Directory).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::codec;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn oid(fill: u8) -> ObjectId {
        ObjectId::from_raw([fill; 20])
    }

    fn raw_tree<N: AsRef<[u8]>>(entries: &[(&str, N, u8)]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for (mode, name, fill) in entries {
            bytes.extend_from_slice(format!("{mode} ").as_bytes());
            bytes.extend_from_slice(name.as_ref());
            bytes.push(0);
            bytes.extend_from_slice(&[*fill; 20]);
        }
        bytes
    }

    #[test]
    fn subtrees_sort_as_if_followed_by_slash() {
        let mut builder = TreeBuilder::new();
        builder.insert("foo", oid(1), EntryMode::Directory).unwrap();
        builder.insert("foo.txt", oid(2), EntryMode::REGULAR).unwrap();
        builder.insert("foo-bar", oid(3), EntryMode::REGULAR).unwrap();

        let names = builder
            .build()
            .entries()
            .iter()
            .map(|entry| entry.name().to_string())
            .collect::<Vec<_>>();

        // '-' (0x2d) < '.' (0x2e) < '/' (0x2f)
        assert_eq!(names, vec!["foo-bar", "foo.txt", "foo"]);
    }

    #[test]
    fn encoded_trees_decode_to_the_same_entries() {
        let mut builder = TreeBuilder::new();
        builder.insert("b.txt", oid(1), EntryMode::REGULAR).unwrap();
        builder.insert("a", oid(2), EntryMode::Directory).unwrap();
        builder.insert("run.sh", oid(3), EntryMode::EXECUTABLE).unwrap();
        builder.insert("link", oid(4), EntryMode::Symlink).unwrap();
        builder.insert("vendor", oid(5), EntryMode::Submodule).unwrap();
        let tree = builder.build();

        let body = tree.serialize().unwrap();
        let decoded = Tree::deserialize(Cursor::new(body.clone())).unwrap();

        assert_eq!(decoded, tree);
        assert_eq!(decoded.serialize().unwrap(), body);
        assert_eq!(
            decoded.entry_by_name("vendor").unwrap().object_type(),
            ObjectType::Commit
        );
    }

    #[test]
    fn out_of_order_entries_are_malformed() {
        let body = raw_tree(&[("100644", "b", 1), ("100644", "a", 2)]);
        let error = codec::decode(ObjectType::Tree, &body).unwrap_err();

        assert_eq!(error.code(), crate::errors::ErrorCode::MalformedObject);
    }

    #[test]
    fn names_are_bytes_and_sort_on_their_bytes() {
        // 0xe9 sorts after every ASCII letter
        let body = raw_tree(&[
            ("100644", &b"cafz"[..], 1),
            ("100644", &b"caf\xe9"[..], 2),
        ]);

        let tree = Tree::deserialize(Cursor::new(body.clone())).unwrap();

        assert_eq!(tree.get(1).unwrap().name().as_bytes(), b"caf\xe9");
        assert_eq!(tree.entry_by_name(b"caf\xe9").unwrap().oid(), oid(2));
        assert_eq!(tree.serialize().unwrap().as_ref(), body.as_slice());
        assert!(tree.display().ends_with("\tcaf\u{fffd}"));

        let mut builder = TreeBuilder::new();
        builder.insert(b"caf\xe9", oid(2), EntryMode::REGULAR).unwrap();
        builder.insert("cafz", oid(1), EntryMode::REGULAR).unwrap();
        assert_eq!(builder.build(), tree);

        let reversed = raw_tree(&[
            ("100644", &b"caf\xe9"[..], 2),
            ("100644", &b"cafz"[..], 1),
        ]);
        assert!(codec::decode(ObjectType::Tree, &reversed).is_err());
    }

    #[test]
    fn duplicate_entries_are_malformed() {
        let body = raw_tree(&[("100644", "a", 1), ("100644", "a", 2)]);

        assert!(codec::decode(ObjectType::Tree, &body).is_err());
    }

    #[test]
    fn bad_modes_and_truncated_ids_are_malformed() {
        let body = raw_tree(&[("100600", "a", 1)]);
        assert!(codec::decode(ObjectType::Tree, &body).is_err());

        let mut body = raw_tree(&[("100644", "a", 1)]);
        body.truncate(body.len() - 3);
        assert!(codec::decode(ObjectType::Tree, &body).is_err());

        assert!(codec::decode(ObjectType::Tree, b"100644 a").is_err());
    }

    #[test]
    fn builder_replaces_file_with_directory_of_same_name() {
        let mut builder = TreeBuilder::new();
        builder.insert("a", oid(1), EntryMode::REGULAR).unwrap();
        builder.insert("a", oid(2), EntryMode::Directory).unwrap();

        assert_eq!(builder.len(), 1);
        assert!(builder.get("a").unwrap().is_tree());

        builder.remove("a").unwrap();
        assert!(builder.is_empty());
        assert!(builder.remove("a").is_err());
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut builder = TreeBuilder::new();

        assert!(builder.insert("", oid(1), EntryMode::REGULAR).is_err());
        assert!(builder.insert("a/b", oid(1), EntryMode::REGULAR).is_err());
        assert!(builder.insert("..", oid(1), EntryMode::REGULAR).is_err());
    }

    #[test]
    fn display_pads_directory_modes() {
        let mut builder = TreeBuilder::new();
        builder.insert("src", oid(1), EntryMode::Directory).unwrap();

        assert_eq!(
            builder.build().display(),
            format!("040000 tree {}\tsrc", oid(1))
        );
    }
}
