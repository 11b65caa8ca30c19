//! Notes attached to objects without rewriting them
//!
//! A notes reference (`refs/notes/commits` unless the caller names another) points at
//! a commit whose tree maps the hex id of each annotated object to a blob holding the
//! note. Every change lands as one new commit on that reference.

use crate::areas::repository::Repository;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::signature::Signature;
use crate::artifacts::objects::tree::{Tree, TreeBuilder};
use crate::artifacts::refs::DEFAULT_NOTES_REF;
use crate::errors::{Error, Result};
use bytes::Bytes;
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    oid: ObjectId,
    message: Bytes,
}

impl Note {
    /// Id of the blob holding the note
    pub fn oid(&self) -> ObjectId {
        self.oid
    }

    pub fn message(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.message)
    }

    pub fn message_bytes(&self) -> &[u8] {
        &self.message
    }
}

impl Repository {
    pub fn default_note_ref(&self) -> &'static str {
        DEFAULT_NOTES_REF
    }

    /// Attach `message` to `target`, returning the id of the note blob
    ///
    /// Fails with [`Error::NoteExists`] when `target` already has a note, unless `force`
    /// is set, in which case the old note is replaced.
    pub fn create_note(
        &self,
        notes_ref: Option<&str>,
        author: &Signature,
        committer: &Signature,
        target: &ObjectId,
        message: &str,
        force: bool,
    ) -> Result<ObjectId> {
        let notes_ref = notes_ref.unwrap_or(DEFAULT_NOTES_REF);
        let tip = self.notes_tip(notes_ref)?;
        let key = target.to_hex();

        let mut builder = match &tip {
            Some((_, tree)) => TreeBuilder::from_tree(tree),
            None => TreeBuilder::new(),
        };
        if !force && builder.get(&key).is_some() {
            return Err(Error::NoteExists(*target));
        }

        let blob = self.database().write(ObjectType::Blob, message.as_bytes())?;
        builder.insert(&key, blob, EntryMode::REGULAR)?;
        self.commit_notes(
            notes_ref,
            &builder,
            tip.map(|(commit, _)| commit),
            author,
            committer,
            "Notes added by 'gitcore notes add'",
        )?;
        tracing::debug!(%target, %blob, notes_ref, "note created");

        Ok(blob)
    }

    pub fn read_note(&self, notes_ref: Option<&str>, target: &ObjectId) -> Result<Note> {
        let notes_ref = notes_ref.unwrap_or(DEFAULT_NOTES_REF);
        let (_, tree) = self.notes_tip(notes_ref)?.ok_or(Error::NoteNotFound(*target))?;
        let entry = tree
            .entry_by_name(target.to_hex())
            .ok_or(Error::NoteNotFound(*target))?;
        let blob = self.database().parse_blob(&entry.oid())?;

        Ok(Note {
            oid: entry.oid(),
            message: blob.content().clone(),
        })
    }

    /// Drop the note on `target`, returning the notes commit that records the removal
    pub fn remove_note(
        &self,
        notes_ref: Option<&str>,
        author: &Signature,
        committer: &Signature,
        target: &ObjectId,
    ) -> Result<ObjectId> {
        let notes_ref = notes_ref.unwrap_or(DEFAULT_NOTES_REF);
        let (tip, tree) = self.notes_tip(notes_ref)?.ok_or(Error::NoteNotFound(*target))?;

        let mut builder = TreeBuilder::from_tree(&tree);
        builder
            .remove(target.to_hex())
            .map_err(|_| Error::NoteNotFound(*target))?;

        self.commit_notes(
            notes_ref,
            &builder,
            Some(tip),
            author,
            committer,
            "Notes removed by 'gitcore notes remove'",
        )
    }

    /// Tip commit of a notes reference and its tree; `None` before the first note
    fn notes_tip(&self, notes_ref: &str) -> Result<Option<(ObjectId, Tree)>> {
        let commit = match self.refs().name_to_oid(notes_ref) {
            Ok(oid) => oid,
            Err(error) if error.is_not_found() => return Ok(None),
            Err(error) => return Err(error),
        };
        let tree = *self.database().parse_commit(&commit)?.tree();

        Ok(Some((commit, self.database().parse_tree(&tree)?)))
    }

    fn commit_notes(
        &self,
        notes_ref: &str,
        builder: &TreeBuilder,
        parent: Option<ObjectId>,
        author: &Signature,
        committer: &Signature,
        message: &str,
    ) -> Result<ObjectId> {
        let tree = builder.write(self.database())?;
        let commit = Commit::new(
            tree,
            parent.into_iter().collect(),
            author.clone(),
            committer.clone(),
            format!("{message}\n"),
        );
        let oid = self.database().store(&commit)?;
        self.refs().update_through(notes_ref, oid, &format!("notes: {message}"))?;

        Ok(oid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::errors::ErrorCode;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use std::sync::Arc;

    fn signature(seconds: i64) -> Signature {
        Signature::at("A U Thor", "author@example.com", seconds, 0).unwrap()
    }

    #[fixture]
    fn repository() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let context = Arc::new(Context::default().with_author("A U Thor", "author@example.com"));
        let repository = Repository::init(dir.path(), false, context).unwrap();
        (dir, repository)
    }

    fn annotate(repository: &Repository, target: &ObjectId, message: &str, seconds: i64) -> ObjectId {
        repository
            .create_note(None, &signature(seconds), &signature(seconds), target, message, false)
            .unwrap()
    }

    #[rstest]
    fn notes_live_on_the_default_ref(repository: (TempDir, Repository)) {
        let (_dir, repository) = repository;
        let target = repository.create_blob(b"annotated").unwrap();

        let blob = annotate(&repository, &target, "reviewed\n", 10);
        let note = repository.read_note(None, &target).unwrap();

        assert_eq!(repository.default_note_ref(), "refs/notes/commits");
        assert_eq!(note.oid(), blob);
        assert_eq!(note.message(), "reviewed\n");

        let tip = repository.refs().name_to_oid("refs/notes/commits").unwrap();
        let commit = repository.database().parse_commit(&tip).unwrap();
        let tree = repository.database().parse_tree(commit.tree()).unwrap();
        let entry = tree.entry_by_name(target.to_hex()).unwrap();
        assert_eq!(entry.oid(), blob);
        assert_eq!(entry.mode(), EntryMode::REGULAR);
    }

    #[rstest]
    fn every_change_is_one_commit(repository: (TempDir, Repository)) {
        let (_dir, repository) = repository;
        let first = repository.create_blob(b"one").unwrap();
        let second = repository.create_blob(b"two").unwrap();

        annotate(&repository, &first, "first\n", 10);
        let after_add = repository.refs().name_to_oid(DEFAULT_NOTES_REF).unwrap();
        annotate(&repository, &second, "second\n", 20);
        let after_second = repository.refs().name_to_oid(DEFAULT_NOTES_REF).unwrap();
        let removal = repository
            .remove_note(None, &signature(30), &signature(30), &first)
            .unwrap();

        let commit = repository.database().parse_commit(&removal).unwrap();
        assert_eq!(commit.parents(), &[after_second]);
        let previous = repository.database().parse_commit(&after_second).unwrap();
        assert_eq!(previous.parents(), &[after_add]);
        assert!(
            repository
                .database()
                .parse_commit(&after_add)
                .unwrap()
                .parents()
                .is_empty()
        );

        assert_eq!(repository.refs().name_to_oid(DEFAULT_NOTES_REF).unwrap(), removal);
        assert_eq!(repository.read_note(None, &second).unwrap().message(), "second\n");
        let error = repository.read_note(None, &first).unwrap_err();
        assert_eq!(error.code(), ErrorCode::NotFound);

        let log = repository.refs().reflog(DEFAULT_NOTES_REF).unwrap();
        assert_eq!(log.len(), 3);
    }

    #[rstest]
    fn existing_notes_need_force(repository: (TempDir, Repository)) {
        let (_dir, repository) = repository;
        let target = repository.create_blob(b"annotated").unwrap();
        annotate(&repository, &target, "old\n", 10);

        let error = repository
            .create_note(None, &signature(20), &signature(20), &target, "new\n", false)
            .unwrap_err();
        assert_eq!(error.code(), ErrorCode::AlreadyExists);

        repository
            .create_note(None, &signature(20), &signature(20), &target, "new\n", true)
            .unwrap();
        assert_eq!(repository.read_note(None, &target).unwrap().message(), "new\n");
    }

    #[rstest]
    fn custom_refs_are_kept_apart(repository: (TempDir, Repository)) {
        let (_dir, repository) = repository;
        let target = repository.create_blob(b"annotated").unwrap();

        repository
            .create_note(
                Some("refs/notes/review"),
                &signature(10),
                &signature(10),
                &target,
                "lgtm\n",
                false,
            )
            .unwrap();

        assert_eq!(
            repository
                .read_note(Some("refs/notes/review"), &target)
                .unwrap()
                .message(),
            "lgtm\n"
        );
        assert_eq!(
            repository.read_note(None, &target).unwrap_err().code(),
            ErrorCode::NotFound
        );
    }

    #[rstest]
    fn removing_a_missing_note_fails(repository: (TempDir, Repository)) {
        let (_dir, repository) = repository;
        let target = repository.create_blob(b"plain").unwrap();

        let error = repository
            .remove_note(None, &signature(10), &signature(10), &target)
            .unwrap_err();
        assert_eq!(error.code(), ErrorCode::NotFound);

        let other = repository.create_blob(b"other").unwrap();
        annotate(&repository, &other, "x\n", 10);
        let error = repository
            .remove_note(None, &signature(20), &signature(20), &target)
            .unwrap_err();
        assert_eq!(error.code(), ErrorCode::NotFound);
    }
}
