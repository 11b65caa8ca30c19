//! Reference store
//!
//! References are human-readable names pointing at objects (direct) or at other
//! references (symbolic). Loose files under the git directory take precedence over
//! entries of `packed-refs`.
//!
//! Every file is rewritten through a `<file>.lock`, so a concurrent writer fails
//! with `Error::Locked` instead of interleaving with this one. Every update is
//! appended to the reference's reflog under `logs/`, unless the context limits
//! logging to `HEAD` and the branch, remote and note namespaces.

use crate::areas::database::Database;
use crate::artifacts::core::WalkControl;
use crate::artifacts::lockfile::LockFile;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::refs::list_filter::RefListFilter;
use crate::artifacts::refs::packed_refs::{PackedRef, PackedRefs};
use crate::artifacts::refs::ref_name::validate_ref_name;
use crate::artifacts::refs::reference::Reference;
use crate::artifacts::refs::reflog::{Reflog, ReflogEntry};
use crate::artifacts::refs::{HEAD, HEADS_PREFIX, NOTES_PREFIX, PACKED_REFS, REFS_PREFIX, REMOTES_PREFIX};
use crate::context::Context;
use crate::errors::{Error, ErrorCode, IoContext, Result};
use file_guard::Lock;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::ops::DerefMut;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use walkdir::WalkDir;

/// Regex pattern for parsing symbolic references
const SYMREF_REGEX: &str = r"^ref: (.+)$";

static SYMREF: LazyLock<std::result::Result<regex::Regex, regex::Error>> =
    LazyLock::new(|| regex::Regex::new(SYMREF_REGEX));

/// Where a reference's file waits while its name changes into a parent or child path
const RENAME_PARKING: &str = "RENAME_REF";

/// Value of a loose reference file
#[derive(Debug, Clone, PartialEq, Eq)]
enum SymRefOrOid {
    SymRef(String),
    Oid(ObjectId),
}

impl SymRefOrOid {
    fn read(path: &Path) -> Result<Option<SymRefOrOid>> {
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).at(path)?;
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        let symref = SYMREF
            .as_ref()
            .map_err(|error| Error::invalid("symref pattern", error.to_string()))?;
        if let Some(captures) = symref.captures(content) {
            return Ok(Some(SymRefOrOid::SymRef(captures[1].trim().to_string())));
        }

        ObjectId::try_parse(content)
            .map(|oid| Some(SymRefOrOid::Oid(oid)))
            .map_err(|_| Error::malformed("reference", format!("{}: {content}", path.display())))
    }

    fn serialize(&self) -> String {
        match self {
            SymRefOrOid::SymRef(target) => format!("ref: {target}\n"),
            SymRefOrOid::Oid(oid) => format!("{oid}\n"),
        }
    }

    fn from_reference(reference: &Reference) -> Self {
        match reference {
            Reference::Direct { oid, .. } => SymRefOrOid::Oid(*oid),
            Reference::Symbolic { target, .. } => SymRefOrOid::SymRef(target.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Refs {
    /// The git directory
    path: PathBuf,
    context: Arc<Context>,
}

impl Refs {
    pub fn new(path: impl Into<PathBuf>, context: Arc<Context>) -> Self {
        Refs {
            path: path.into(),
            context,
        }
    }

    pub fn git_dir(&self) -> &Path {
        &self.path
    }

    fn ref_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    fn log_path(&self, name: &str) -> PathBuf {
        self.path.join("logs").join(name)
    }

    fn packed_refs_path(&self) -> PathBuf {
        self.path.join(PACKED_REFS)
    }

    pub fn refs_path(&self) -> PathBuf {
        self.path.join("refs")
    }

    fn read_packed_refs(&self) -> Result<PackedRefs> {
        let path = self.packed_refs_path();
        if !path.is_file() {
            return Ok(PackedRefs::default());
        }

        let mut file = std::fs::File::open(&path).at(&path)?;
        let mut lock = file_guard::lock(&mut file, Lock::Shared, 0, 1).at(&path)?;
        let mut content = String::new();
        lock.deref_mut().read_to_string(&mut content).at(&path)?;

        PackedRefs::parse(&content)
    }

    fn write_packed_refs(&self, packed_refs: &PackedRefs) -> Result<()> {
        let mut lock = LockFile::acquire(&self.packed_refs_path())?;
        lock.write_all(packed_refs.serialize().as_bytes())?;
        lock.commit()
    }

    /// Find a reference by its full name, loose files first
    pub fn lookup(&self, name: &str) -> Result<Reference> {
        validate_ref_name(name)?;
        tracing::trace!(name, "looking up reference");

        match SymRefOrOid::read(&self.ref_path(name))? {
            Some(SymRefOrOid::SymRef(target)) => return Ok(Reference::symbolic(name, target)),
            Some(SymRefOrOid::Oid(oid)) => return Ok(Reference::direct(name, oid)),
            None => {}
        }

        match self.read_packed_refs()?.get(name) {
            Some(packed) => Ok(Reference::Direct {
                name: name.to_string(),
                oid: packed.oid,
                peeled: packed.peeled,
                packed: true,
            }),
            None => Err(Error::ReferenceNotFound(name.to_string())),
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.lookup(name).is_ok()
    }

    /// Follow symbolic references down to the direct reference they end at
    ///
    /// More nested hops than the context allows, or a loop, fail with
    /// `Error::ResolutionCycle`; a dangling target fails with `Error::ReferenceNotFound`.
    pub fn resolve(&self, reference: &Reference) -> Result<Reference> {
        let mut current = reference.clone();
        let mut hops = 0;

        while let Reference::Symbolic { target, .. } = &current {
            if hops == self.context.max_symref_depth() {
                return Err(Error::ResolutionCycle(reference.name().to_string()));
            }
            let target = target.clone();
            current = self.lookup(&target)?;
            hops += 1;
        }

        Ok(current)
    }

    pub fn resolve_name(&self, name: &str) -> Result<Reference> {
        self.resolve(&self.lookup(name)?)
    }

    /// Object id a reference name ultimately points at
    pub fn name_to_oid(&self, name: &str) -> Result<ObjectId> {
        self.resolve_name(name)?
            .target()
            .ok_or_else(|| Error::ResolutionCycle(name.to_string()))
    }

    /// Name `HEAD` points at, if `HEAD` is symbolic
    pub fn head_target(&self) -> Result<Option<String>> {
        Ok(self
            .lookup(HEAD)?
            .symbolic_target()
            .map(str::to_string))
    }

    pub fn create_direct(&self, name: &str, oid: ObjectId, force: bool, message: &str) -> Result<Reference> {
        validate_ref_name(name)?;
        let old = self.existing_for_create(name, force)?;

        self.write_loose(name, &SymRefOrOid::Oid(oid))?;
        let old_oid = old.and_then(|reference| reference.target()).unwrap_or(ObjectId::ZERO);
        self.log_update(name, old_oid, oid, message)?;
        tracing::debug!(name, %oid, "direct reference created");

        Ok(Reference::direct(name, oid))
    }

    pub fn create_symbolic(&self, name: &str, target: &str, force: bool, message: &str) -> Result<Reference> {
        validate_ref_name(name)?;
        validate_ref_name(target)?;
        let old = self.existing_for_create(name, force)?;

        let old_oid = match old {
            Some(reference) => self.oid_or_zero(&reference)?,
            None => ObjectId::ZERO,
        };
        self.write_loose(name, &SymRefOrOid::SymRef(target.to_string()))?;
        let new_oid = self.oid_or_zero(&Reference::symbolic(name, target))?;
        self.log_update(name, old_oid, new_oid, message)?;
        tracing::debug!(name, target, "symbolic reference created");

        Ok(Reference::symbolic(name, target))
    }

    /// Write `HEAD` of a fresh repository; nothing is logged, as nothing changed yet
    pub fn initialize_head(&self, target: &str) -> Result<()> {
        validate_ref_name(target)?;
        self.write_loose(HEAD, &SymRefOrOid::SymRef(target.to_string()))
    }

    /// Id at the end of `reference`'s chain, zero when the chain ends unborn or loops
    fn oid_or_zero(&self, reference: &Reference) -> Result<ObjectId> {
        match self.resolve(reference) {
            Ok(resolved) => Ok(resolved.target().unwrap_or(ObjectId::ZERO)),
            Err(error) if error.is_not_found() || error.code() == ErrorCode::ResolutionCycle => {
                Ok(ObjectId::ZERO)
            }
            Err(error) => Err(error),
        }
    }

    fn existing_for_create(&self, name: &str, force: bool) -> Result<Option<Reference>> {
        match self.lookup(name) {
            Ok(_) if !force => Err(Error::AlreadyExists(name.to_string())),
            Ok(existing) => Ok(Some(existing)),
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Point an existing direct reference at `oid`
    pub fn set_target(&self, name: &str, oid: ObjectId, message: &str) -> Result<Reference> {
        let old = match self.lookup(name)? {
            Reference::Direct { oid, .. } => oid,
            Reference::Symbolic { .. } => return Err(Error::invalid("direct reference", name)),
        };

        self.write_loose(name, &SymRefOrOid::Oid(oid))?;
        self.log_update(name, old, oid, message)?;
        tracing::debug!(name, %old, new = %oid, "reference updated");

        Ok(Reference::direct(name, oid))
    }

    /// Point an existing symbolic reference at another reference name
    pub fn set_symbolic_target(&self, name: &str, target: &str, message: &str) -> Result<Reference> {
        validate_ref_name(target)?;
        let old = self.lookup(name)?;
        if !old.is_symbolic() {
            return Err(Error::invalid("symbolic reference", name));
        }

        let old_oid = self.oid_or_zero(&old)?;
        self.write_loose(name, &SymRefOrOid::SymRef(target.to_string()))?;
        let new_oid = self.oid_or_zero(&Reference::symbolic(name, target))?;
        self.log_update(name, old_oid, new_oid, message)?;
        tracing::debug!(name, target, "symbolic reference retargeted");

        Ok(Reference::symbolic(name, target))
    }

    /// Update the direct reference at the end of `name`'s symbolic chain
    ///
    /// An unborn target (such as the branch `HEAD` names before the first commit)
    /// is created. Every reference of the chain gets a reflog entry.
    pub fn update_through(&self, name: &str, oid: ObjectId, message: &str) -> Result<ObjectId> {
        validate_ref_name(name)?;

        let mut chain = Vec::new();
        let mut current = name.to_string();
        let old = loop {
            match self.lookup(&current) {
                Ok(Reference::Symbolic { target, .. }) => {
                    if chain.len() == self.context.max_symref_depth() {
                        return Err(Error::ResolutionCycle(name.to_string()));
                    }
                    chain.push(current);
                    current = target;
                }
                Ok(Reference::Direct { oid, .. }) => break oid,
                Err(error) if error.is_not_found() => break ObjectId::ZERO,
                Err(error) => return Err(error),
            }
        };

        self.write_loose(&current, &SymRefOrOid::Oid(oid))?;
        self.log_update(&current, old, oid, message)?;
        for symbolic in &chain {
            self.log_update(symbolic, old, oid, message)?;
        }
        tracing::debug!(name, target = current, %old, new = %oid, "reference updated through symbolic chain");

        Ok(old)
    }

    /// Rename a reference, carrying its reflog along
    ///
    /// The new name is written before the old one goes away, so a failure at any
    /// point leaves the value reachable under at least one of them. Only a rename
    /// into a parent or child path (`a` to `a/b`) has to remove the old file first;
    /// its value is parked meanwhile.
    ///
    /// A symbolic `HEAD` naming the old reference is redirected to the new one.
    pub fn rename(&self, old_name: &str, new_name: &str, force: bool, message: &str) -> Result<Reference> {
        validate_ref_name(new_name)?;
        let reference = self.lookup(old_name)?;
        if old_name == new_name {
            return Ok(reference);
        }
        let replaced = self.exists(new_name);
        if replaced && !force {
            return Err(Error::AlreadyExists(new_name.to_string()));
        }

        let content = SymRefOrOid::from_reference(&reference);
        if is_nested(old_name, new_name) {
            self.rename_through_parking(old_name, new_name, &content)?;
        } else {
            self.write_then_remove(old_name, new_name, &content)?;
        }

        if replaced {
            self.delete_reflog(new_name)?;
        }
        self.rename_reflog(old_name, new_name)?;
        if let Some(oid) = reference.target() {
            self.log_update(new_name, oid, oid, message)?;
        }

        if self.head_target()?.as_deref() == Some(old_name) {
            self.write_loose(HEAD, &SymRefOrOid::SymRef(new_name.to_string()))?;
            let oid = self.oid_or_zero(&Reference::symbolic(HEAD, new_name))?;
            self.log_update(HEAD, oid, oid, message)?;
        }
        tracing::debug!(old_name, new_name, "reference renamed");

        Ok(match reference {
            Reference::Direct { oid, .. } => Reference::direct(new_name, oid),
            Reference::Symbolic { target, .. } => Reference::symbolic(new_name, target),
        })
    }

    /// Both lock files are taken before anything changes
    fn write_then_remove(&self, old_name: &str, new_name: &str, content: &SymRefOrOid) -> Result<()> {
        let old_path = self.ref_path(old_name);
        let old_lock = if old_path.is_file() {
            Some(LockFile::acquire(&old_path)?)
        } else {
            None
        };

        self.check_directory_conflict(new_name)?;
        let mut new_lock = LockFile::acquire(&self.ref_path(new_name))?;
        new_lock.write_all(content.serialize().as_bytes())?;
        new_lock.commit()?;

        if let Some(lock) = old_lock {
            std::fs::remove_file(&old_path).at(&old_path)?;
            drop(lock);
            self.prune_empty_parent_dirs(&old_path, &self.refs_path())?;
        }

        // the loose file of the new name shadows a stale packed entry, but drop it too
        let mut packed_refs = self.read_packed_refs()?;
        let old_packed = packed_refs.remove(old_name).is_some();
        let new_packed = packed_refs.remove(new_name).is_some();
        if old_packed || new_packed {
            self.write_packed_refs(&packed_refs)?;
        }

        Ok(())
    }

    fn rename_through_parking(&self, old_name: &str, new_name: &str, content: &SymRefOrOid) -> Result<()> {
        let old_path = self.ref_path(old_name);
        let parked = self.path.join(RENAME_PARKING);

        let was_loose = old_path.is_file();
        if was_loose {
            let lock = LockFile::acquire(&old_path)?;
            std::fs::rename(&old_path, &parked).at(&old_path)?;
            drop(lock);
            self.prune_empty_parent_dirs(&old_path, &self.refs_path())?;
        }

        let mut packed_refs = self.read_packed_refs()?;
        if packed_refs.remove(old_name).is_some() {
            self.write_packed_refs(&packed_refs)?;
        }

        if let Err(error) = self.write_loose(new_name, content) {
            // put the old name back so a failed rename loses nothing
            self.write_loose(old_name, content)?;
            if was_loose {
                std::fs::remove_file(&parked).at(&parked)?;
            }
            return Err(error);
        }

        if was_loose {
            std::fs::remove_file(&parked).at(&parked)?;
        }

        Ok(())
    }

    /// Remove a reference from loose and packed storage, with its reflog
    pub fn delete(&self, name: &str) -> Result<Reference> {
        let reference = self.lookup(name)?;

        self.remove_storage(name)?;
        self.delete_reflog(name)?;
        tracing::debug!(name, "reference deleted");

        Ok(reference)
    }

    fn remove_storage(&self, name: &str) -> Result<()> {
        let path = self.ref_path(name);
        if path.is_file() {
            let lock = LockFile::acquire(&path)?;
            std::fs::remove_file(&path).at(&path)?;
            drop(lock);
            self.prune_empty_parent_dirs(&path, &self.refs_path())?;
        }

        let mut packed_refs = self.read_packed_refs()?;
        if packed_refs.remove(name).is_some() {
            self.write_packed_refs(&packed_refs)?;
        }

        Ok(())
    }

    fn write_loose(&self, name: &str, content: &SymRefOrOid) -> Result<()> {
        self.check_directory_conflict(name)?;

        let mut lock = LockFile::acquire(&self.ref_path(name))?;
        lock.write_all(content.serialize().as_bytes())?;
        lock.commit()
    }

    /// `refs/heads/a` and `refs/heads/a/b` cannot both exist
    fn check_directory_conflict(&self, name: &str) -> Result<()> {
        let packed_refs = self.read_packed_refs()?;
        let conflict = || Error::AlreadyExists(name.to_string());

        let mut prefix = String::new();
        let mut components = name.split('/').peekable();
        while let Some(component) = components.next() {
            if components.peek().is_none() {
                break;
            }
            prefix.push_str(component);
            if self.ref_path(&prefix).is_file() || packed_refs.contains(&prefix) {
                return Err(conflict());
            }
            prefix.push('/');
        }

        let path = self.ref_path(name);
        if path.is_dir() {
            let has_files = WalkDir::new(&path)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .any(|entry| entry.file_type().is_file());
            if has_files {
                return Err(conflict());
            }
            std::fs::remove_dir_all(&path).at(&path)?;
        }
        if packed_refs.has_children(name) {
            return Err(conflict());
        }

        Ok(())
    }

    fn prune_empty_parent_dirs(&self, path: &Path, stop_at: &Path) -> Result<()> {
        // namespace directories such as refs/heads stay
        if let Some(parent) = path.parent()
            && parent
                .parent()
                .is_some_and(|grandparent| grandparent != stop_at && grandparent.starts_with(stop_at))
            && parent.read_dir().at(parent)?.next().is_none()
        {
            std::fs::remove_dir(parent).at(parent)?;
            self.prune_empty_parent_dirs(parent, stop_at)?;
        }

        Ok(())
    }

    /// Names of all references under `refs/` the filter accepts, sorted
    pub fn list(&self, filter: RefListFilter) -> Result<Vec<String>> {
        Ok(self.collect(filter)?.into_keys().collect())
    }

    /// Visit every reference the filter accepts in name order
    ///
    /// A visitor answering `WalkControl::Stop` ends the iteration with `Error::Aborted`.
    pub fn for_each<F>(&self, filter: RefListFilter, mut visitor: F) -> Result<()>
    where
        F: FnMut(&Reference) -> WalkControl,
    {
        for reference in self.collect(filter)?.values() {
            if visitor(reference) == WalkControl::Stop {
                return Err(Error::Aborted);
            }
        }

        Ok(())
    }

    fn collect(&self, filter: RefListFilter) -> Result<BTreeMap<String, Reference>> {
        let mut references = BTreeMap::new();
        let loose = self.loose_names()?;

        for name in &loose {
            if !filter.accepts(name, false) {
                continue;
            }
            match self.lookup(name) {
                Ok(reference) => {
                    references.insert(name.clone(), reference);
                }
                Err(error) => tracing::warn!(name, %error, "skipping unreadable reference"),
            }
        }

        for (name, packed) in self.read_packed_refs()?.iter() {
            if loose.contains(name) || !filter.accepts(name, true) {
                continue;
            }
            references.insert(
                name.clone(),
                Reference::Direct {
                    name: name.clone(),
                    oid: packed.oid,
                    peeled: packed.peeled,
                    packed: true,
                },
            );
        }

        Ok(references)
    }

    fn loose_names(&self) -> Result<Vec<String>> {
        let refs_path = self.refs_path();
        if !refs_path.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = WalkDir::new(&refs_path)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&self.path).ok()?;
                let name = relative.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/");
                (!name.ends_with(".lock")).then_some(name)
            })
            .collect::<Vec<_>>();
        names.sort();

        Ok(names)
    }

    /// Move every loose direct reference into `packed-refs`
    ///
    /// Annotated tags get their peeled target recorded. Symbolic references stay
    /// loose. No reflog entries are written.
    pub fn pack_all(&self, database: &Database) -> Result<usize> {
        let mut packed_refs = self.read_packed_refs()?;
        let mut packed = Vec::new();

        for name in self.loose_names()? {
            let Some(SymRefOrOid::Oid(oid)) = SymRefOrOid::read(&self.ref_path(&name))? else {
                continue;
            };

            let peeled = match database.read_header(&oid) {
                Ok(header) if header.object_type == ObjectType::Tag => match database.peel_tags(&oid) {
                    Ok((peeled, _)) => Some(peeled),
                    Err(error) => {
                        tracing::warn!(name, %error, "cannot peel tag while packing");
                        None
                    }
                },
                _ => None,
            };
            packed_refs.insert(name.clone(), PackedRef { oid, peeled });
            packed.push((name, oid));
        }

        self.write_packed_refs(&packed_refs)?;

        for (name, oid) in &packed {
            let path = self.ref_path(name);
            // a concurrent update since the read keeps its loose file
            if SymRefOrOid::read(&path)? == Some(SymRefOrOid::Oid(*oid)) {
                std::fs::remove_file(&path).at(&path)?;
                self.prune_empty_parent_dirs(&path, &self.refs_path())?;
            }
        }
        tracing::debug!(count = packed.len(), "references packed");

        Ok(packed.len())
    }

    /// An existing log is always extended; new logs follow the context
    fn should_log(&self, name: &str) -> bool {
        if self.log_path(name).is_file() {
            return true;
        }
        if !self.context.log_ref_updates() {
            return false;
        }

        !self.context.reflog_namespaces_only()
            || name == HEAD
            || name.starts_with(HEADS_PREFIX)
            || name.starts_with(REMOTES_PREFIX)
            || name.starts_with(NOTES_PREFIX)
    }

    fn log_update(&self, name: &str, old: ObjectId, new: ObjectId, message: &str) -> Result<()> {
        if !self.should_log(name) {
            return Ok(());
        }

        self.append_reflog(name, old, new, message)
    }

    /// Append one entry to `logs/<name>`, creating the log if needed
    pub fn append_reflog(&self, name: &str, old: ObjectId, new: ObjectId, message: &str) -> Result<()> {
        let entry = ReflogEntry::new(old, new, self.context.reflog_signature(), message);
        let path = self.log_path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).at(parent)?;
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .at(&path)?;
        let mut lock = file_guard::lock(&mut file, Lock::Exclusive, 0, 1).at(&path)?;
        writeln!(lock.deref_mut(), "{entry}").at(&path)?;

        Ok(())
    }

    /// Log of `name`; empty when nothing was ever logged
    pub fn reflog(&self, name: &str) -> Result<Reflog> {
        let path = self.log_path(name);
        if !path.is_file() {
            return Ok(Reflog::new(name));
        }

        let content = std::fs::read_to_string(&path).at(&path)?;
        Reflog::parse(name, &content)
    }

    /// Replace the whole log, as after [`Reflog::remove`]
    pub fn write_reflog(&self, reflog: &Reflog) -> Result<()> {
        let mut lock = LockFile::acquire(&self.log_path(reflog.name()))?;
        lock.write_all(reflog.serialize().as_bytes())?;
        lock.commit()
    }

    pub fn delete_reflog(&self, name: &str) -> Result<()> {
        let path = self.log_path(name);
        if path.is_file() {
            std::fs::remove_file(&path).at(&path)?;
            self.prune_empty_parent_dirs(&path, &self.path.join("logs").join("refs"))?;
        }

        Ok(())
    }

    pub fn rename_reflog(&self, old_name: &str, new_name: &str) -> Result<()> {
        validate_ref_name(new_name)?;
        let old_path = self.log_path(old_name);
        if !old_path.is_file() {
            return Ok(());
        }

        // park the log first: the new name may need the old file's path as a directory
        let parked = self.path.join("logs").join(".rename-in-progress");
        std::fs::rename(&old_path, &parked).at(&old_path)?;
        self.prune_empty_parent_dirs(&old_path, &self.path.join("logs").join("refs"))?;

        let new_path = self.log_path(new_name);
        if let Some(parent) = new_path.parent() {
            std::fs::create_dir_all(parent).at(parent)?;
        }
        std::fs::rename(&parked, &new_path).at(&new_path)
    }
}

/// `a` and `a/b` cannot both exist, so one is a parent path of the other
fn is_nested(old_name: &str, new_name: &str) -> bool {
    let under = |name: &str, parent: &str| {
        name.strip_prefix(parent)
            .is_some_and(|rest| rest.starts_with('/'))
    };

    under(new_name, old_name) || under(old_name, new_name)
}
