//! Repository facade
//!
//! Ties the object store, the reference store and the optional work tree of one
//! git directory together, and offers the object and reference operations that
//! need more than one of them (commits move branches, tags check their targets).

use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::refs::Refs;
use crate::areas::workspace::Workspace;
use crate::artifacts::core::WalkControl;
use crate::artifacts::log::rev_walk::RevWalk;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::{Object, ObjectBox};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::signature::Signature;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::{Tree, TreeEntry, TreeWalkMode};
use crate::artifacts::refs::list_filter::RefListFilter;
use crate::artifacts::refs::ref_name::{BranchName, TagName};
use crate::artifacts::refs::reference::Reference;
use crate::artifacts::refs::{HEAD, HEADS_PREFIX, TAGS_PREFIX};
use crate::artifacts::revision::Revision;
use crate::context::Context;
use crate::errors::{Error, IoContext, Result};
use bstr::BStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const GIT_DIR: &str = ".git";
const INDEX_FILE: &str = "index";
const CONFIG_FILE: &str = "config";

#[derive(Debug)]
pub struct Repository {
    git_dir: PathBuf,
    /// `None` for a bare repository
    workspace: Option<Workspace>,
    context: Arc<Context>,
    database: Database,
    refs: Refs,
}

impl Repository {
    /// Create the git directory layout under `path`, or reopen an existing one
    ///
    /// Re-running `init` keeps `HEAD` and every stored object.
    pub fn init(path: &Path, bare: bool, context: Arc<Context>) -> Result<Self> {
        let git_dir = if bare { path.to_path_buf() } else { path.join(GIT_DIR) };

        for dir in [
            git_dir.join("objects").join("info"),
            git_dir.join("objects").join("pack"),
            git_dir.join("refs").join("heads"),
            git_dir.join("refs").join("tags"),
        ] {
            fs::create_dir_all(&dir).at(&dir)?;
        }

        let config_path = git_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            let config = format!(
                "[core]\n\trepositoryformatversion = 0\n\tfilemode = true\n\tbare = {bare}\n"
            );
            fs::write(&config_path, config).at(&config_path)?;
        }

        let repository = Self::assemble(git_dir, (!bare).then(|| path.to_path_buf()), context)?;
        if !repository.git_dir.join(HEAD).is_file() {
            let branch = BranchName::try_parse(repository.context.default_branch())?;
            repository.refs.initialize_head(&branch.to_ref_name())?;
        }
        tracing::debug!(git_dir = %repository.git_dir.display(), bare, "repository initialized");

        Ok(repository)
    }

    /// Open the repository whose work tree or bare git directory is `path`
    pub fn open(path: &Path, context: Arc<Context>) -> Result<Self> {
        let dot_git = path.join(GIT_DIR);
        if dot_git.join(HEAD).is_file() {
            return Self::assemble(dot_git, Some(path.to_path_buf()), context);
        }
        if path.join(HEAD).is_file() && path.join("objects").is_dir() {
            return Self::assemble(path.to_path_buf(), None, context);
        }

        Err(Error::PathNotFound(dot_git))
    }

    fn assemble(git_dir: PathBuf, work_tree: Option<PathBuf>, context: Arc<Context>) -> Result<Self> {
        let database = Database::open(&git_dir.join("objects"), context.compression())?;
        let refs = Refs::new(&git_dir, context.clone());

        Ok(Repository {
            workspace: work_tree.map(Workspace::new),
            git_dir,
            context,
            database,
            refs,
        })
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn is_bare(&self) -> bool {
        self.workspace.is_none()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn workspace(&self) -> Result<&Workspace> {
        self.workspace
            .as_ref()
            .ok_or_else(|| Error::invalid("work tree", self.git_dir.display().to_string()))
    }

    /// The index, loaded from disk
    pub fn index(&self) -> Result<Index<'_>> {
        let mut index = Index::new(self.git_dir.join(INDEX_FILE), &self.database, self.workspace.as_ref());
        index.read()?;
        Ok(index)
    }

    pub fn rev_walk(&self) -> RevWalk<'_> {
        RevWalk::new(&self.database, &self.refs)
    }

    /// Any object, by full or abbreviated id
    pub fn lookup_object(&self, id: &str) -> Result<(ObjectId, ObjectBox)> {
        let oid = self.database.resolve_prefix(id)?;
        Ok((oid, self.database.parse_object(&oid)?))
    }

    pub fn lookup_commit(&self, id: &str) -> Result<Commit> {
        self.database.parse_commit(&self.database.resolve_prefix(id)?)
    }

    pub fn lookup_tree(&self, id: &str) -> Result<Tree> {
        self.database.parse_tree(&self.database.resolve_prefix(id)?)
    }

    pub fn lookup_blob(&self, id: &str) -> Result<Blob> {
        self.database.parse_blob(&self.database.resolve_prefix(id)?)
    }

    pub fn lookup_tag(&self, id: &str) -> Result<Tag> {
        self.database.parse_tag(&self.database.resolve_prefix(id)?)
    }

    /// Object named by a revision expression such as `main~2`, `v1.0^` or `ce0136`
    pub fn revparse_single(&self, spec: &str) -> Result<ObjectId> {
        Revision::try_parse(spec)?.resolve(&self.database, &self.refs)
    }

    /// Follow tags, and a commit to its tree, until an object of `target` is reached
    pub fn peel(&self, oid: &ObjectId, target: ObjectType) -> Result<ObjectId> {
        let mut current = *oid;
        loop {
            let object_type = self.database.read_header(&current)?.object_type;
            if object_type == target {
                return Ok(current);
            }

            current = match object_type {
                ObjectType::Tag => *self.database.parse_tag(&current)?.target(),
                ObjectType::Commit if target == ObjectType::Tree => *self.database.parse_commit(&current)?.tree(),
                actual => {
                    return Err(Error::TypeMismatch {
                        oid: current,
                        expected: target,
                        actual,
                    });
                }
            };
        }
    }

    pub fn create_blob(&self, content: &[u8]) -> Result<ObjectId> {
        self.database.write(ObjectType::Blob, content)
    }

    /// Store the content of a work tree path
    pub fn create_blob_from_workdir(&self, path: &str) -> Result<ObjectId> {
        let content = self.workspace()?.read_file(path)?;
        self.create_blob(&content)
    }

    /// Store any file, streaming it into the object store
    pub fn create_blob_from_file(&self, path: &Path) -> Result<ObjectId> {
        let size = fs::metadata(path).at(path)?.len() as usize;
        let mut file = fs::File::open(path).at(path)?;

        let mut stream = self.database.open_write_stream(size, ObjectType::Blob)?;
        if let Err(error) = std::io::copy(&mut file, &mut stream) {
            stream.abort();
            return Err(Error::Io {
                path: path.to_path_buf(),
                source: error,
            });
        }

        stream.finalize()
    }

    /// Write a commit and, when `update_ref` is given, move that reference to it
    ///
    /// The reference is followed through symbolic links and must currently point at
    /// the first parent (or not exist yet).
    #[allow(clippy::too_many_arguments)]
    pub fn create_commit(
        &self,
        update_ref: Option<&str>,
        author: &Signature,
        committer: &Signature,
        encoding: Option<&str>,
        message: &str,
        tree: &ObjectId,
        parents: &[ObjectId],
    ) -> Result<ObjectId> {
        self.expect_type(tree, ObjectType::Tree)?;
        for parent in parents {
            self.expect_type(parent, ObjectType::Commit)?;
        }

        if let Some(name) = update_ref {
            let current = match self.refs.name_to_oid(name) {
                Ok(oid) => Some(oid),
                Err(error) if error.is_not_found() => None,
                Err(error) => return Err(error),
            };
            if current.is_some() && current.as_ref() != parents.first() {
                return Err(Error::invalid(
                    "commit parent",
                    format!("{name} does not point at the first parent"),
                ));
            }
        }

        let commit = Commit::new(
            *tree,
            parents.to_vec(),
            author.clone(),
            committer.clone(),
            message.to_string(),
        )
        .with_encoding(encoding.map(str::to_string));
        let oid = self.database.store(&commit)?;

        if let Some(name) = update_ref {
            let kind = match parents.len() {
                0 => "commit (initial)",
                1 => "commit",
                _ => "commit (merge)",
            };
            self.refs
                .update_through(name, oid, &format!("{kind}: {}", commit.summary()))?;
        }
        tracing::debug!(%oid, update_ref, "commit created");

        Ok(oid)
    }

    fn expect_type(&self, oid: &ObjectId, expected: ObjectType) -> Result<()> {
        let actual = self.database.read_header(oid)?.object_type;
        if actual != expected {
            return Err(Error::TypeMismatch {
                oid: *oid,
                expected,
                actual,
            });
        }

        Ok(())
    }

    /// Write an annotated tag object and point `refs/tags/<name>` at it
    pub fn create_tag(
        &self,
        name: &str,
        target: &ObjectId,
        tagger: &Signature,
        message: &str,
        force: bool,
    ) -> Result<ObjectId> {
        let tag_name = TagName::try_parse(name)?;
        let ref_name = tag_name.to_ref_name();
        if !force && self.refs.exists(&ref_name) {
            return Err(Error::AlreadyExists(ref_name));
        }

        let target_type = self.database.read_header(target)?.object_type;
        let mut message = message.to_string();
        if !message.is_empty() && !message.ends_with('\n') {
            message.push('\n');
        }
        let tag = Tag::new(*target, target_type, tag_name.to_string(), Some(tagger.clone()), message);
        let oid = self.database.store(&tag)?;

        self.refs.create_direct(&ref_name, oid, force, "")?;
        tracing::debug!(%oid, name, "annotated tag created");

        Ok(oid)
    }

    /// Point `refs/tags/<name>` straight at `target`
    pub fn create_lightweight_tag(&self, name: &str, target: &ObjectId, force: bool) -> Result<Reference> {
        let ref_name = TagName::try_parse(name)?.to_ref_name();
        if !self.database.exists(target) {
            return Err(Error::ObjectNotFound(*target));
        }

        self.refs.create_direct(&ref_name, *target, force, "")
    }

    pub fn delete_tag(&self, name: &str) -> Result<Reference> {
        self.refs.delete(&TagName::try_parse(name)?.to_ref_name())
    }

    pub fn tag_names(&self) -> Result<Vec<String>> {
        self.short_names(TAGS_PREFIX)
    }

    /// Tag names matching a shell glob such as `v1.*`
    pub fn tag_names_matching(&self, pattern: &str) -> Result<Vec<String>> {
        let pattern =
            glob::Pattern::new(pattern).map_err(|error| Error::invalid("tag pattern", error.to_string()))?;

        Ok(self
            .tag_names()?
            .into_iter()
            .filter(|name| pattern.matches(name))
            .collect())
    }

    fn short_names(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .refs
            .list(RefListFilter::ALL)?
            .into_iter()
            .filter_map(|name| name.strip_prefix(prefix).map(str::to_string))
            .collect())
    }

    /// Branch name `HEAD` points at, `None` when `HEAD` is detached
    pub fn current_branch(&self) -> Result<Option<BranchName>> {
        Ok(self
            .refs
            .head_target()?
            .and_then(|target| BranchName::try_parse_ref_name(&target).ok()))
    }

    /// Start a branch at the commit `target` peels to
    pub fn create_branch(&self, name: &str, target: &ObjectId, force: bool) -> Result<Reference> {
        let branch = BranchName::try_parse(name)?;
        if force && self.current_branch()?.as_ref() == Some(&branch) {
            return Err(Error::invalid("branch", format!("{branch} is checked out")));
        }

        let commit = self.peel(target, ObjectType::Commit)?;
        self.refs.create_direct(
            &branch.to_ref_name(),
            commit,
            force,
            &format!("branch: Created from {commit}"),
        )
    }

    pub fn delete_branch(&self, name: &str) -> Result<Reference> {
        let branch = BranchName::try_parse(name)?;
        if self.current_branch()?.as_ref() == Some(&branch) {
            return Err(Error::invalid("branch", format!("{branch} is checked out")));
        }

        self.refs.delete(&branch.to_ref_name())
    }

    pub fn branch_names(&self) -> Result<Vec<String>> {
        self.short_names(HEADS_PREFIX)
    }

    pub fn move_branch(&self, old_name: &str, new_name: &str, force: bool) -> Result<Reference> {
        let old_ref = BranchName::try_parse(old_name)?.to_ref_name();
        let new_ref = BranchName::try_parse(new_name)?.to_ref_name();

        self.refs.rename(
            &old_ref,
            &new_ref,
            force,
            &format!("Branch: renamed {old_ref} to {new_ref}"),
        )
    }

    /// `HEAD` as stored, without following it
    pub fn head(&self) -> Result<Reference> {
        self.refs.lookup(HEAD)
    }

    /// Commit `HEAD` resolves to, `None` while its branch is unborn
    pub fn head_oid(&self) -> Result<Option<ObjectId>> {
        match self.refs.name_to_oid(HEAD) {
            Ok(oid) => Ok(Some(oid)),
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(error),
        }
    }

    pub fn tree_entry_by_path(&self, tree: &ObjectId, path: &str) -> Result<TreeEntry> {
        self.database.parse_tree(tree)?.entry_by_path(&self.database, path)
    }

    pub fn tree_walk<F>(&self, tree: &ObjectId, mode: TreeWalkMode, visitor: F) -> Result<()>
    where
        F: FnMut(&BStr, &TreeEntry) -> WalkControl,
    {
        self.database.parse_tree(tree)?.walk(&self.database, mode, visitor)
    }

    /// Write `object` and return its id
    pub fn store(&self, object: &impl Object) -> Result<ObjectId> {
        self.database.store(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::entry_mode::EntryMode;
    use crate::artifacts::objects::tree::TreeBuilder;
    use crate::errors::ErrorCode;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

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

    fn commit_file(repository: &Repository, content: &str, seconds: i64) -> ObjectId {
        let blob = repository.create_blob(content.as_bytes()).unwrap();
        let mut builder = TreeBuilder::new();
        builder.insert("file.txt", blob, EntryMode::REGULAR).unwrap();
        let tree = builder.write(repository.database()).unwrap();
        let parents = repository.head_oid().unwrap().into_iter().collect::<Vec<_>>();

        repository
            .create_commit(
                Some(HEAD),
                &signature(seconds),
                &signature(seconds),
                None,
                &format!("{content}\n"),
                &tree,
                &parents,
            )
            .unwrap()
    }

    #[rstest]
    fn init_lays_out_an_unborn_head(repository: (TempDir, Repository)) {
        let (dir, repository) = repository;

        assert!(dir.path().join(".git/objects/pack").is_dir());
        assert!(dir.path().join(".git/refs/heads").is_dir());
        assert_eq!(repository.head().unwrap(), Reference::symbolic(HEAD, "refs/heads/master"));
        assert_eq!(repository.head_oid().unwrap(), None);
        assert!(!repository.is_bare());

        let reopened = Repository::open(dir.path(), Arc::new(Context::default())).unwrap();
        assert_eq!(reopened.git_dir(), repository.git_dir());
    }

    #[test]
    fn bare_repositories_have_no_work_tree() {
        let dir = TempDir::new().unwrap();
        let repository = Repository::init(dir.path(), true, Arc::new(Context::default())).unwrap();

        assert!(repository.is_bare());
        assert!(dir.path().join("HEAD").is_file());
        assert_eq!(repository.workspace().unwrap_err().code(), ErrorCode::InvalidSpec);
        assert!(Repository::open(dir.path(), Arc::new(Context::default())).unwrap().is_bare());
    }

    #[test]
    fn opening_a_plain_directory_fails() {
        let dir = TempDir::new().unwrap();

        assert!(Repository::open(dir.path(), Arc::new(Context::default())).unwrap_err().is_not_found());
    }

    #[rstest]
    fn commits_advance_the_current_branch_and_log_it(repository: (TempDir, Repository)) {
        let (_dir, repository) = repository;

        let first = commit_file(&repository, "one", 100);
        let second = commit_file(&repository, "two", 200);

        assert_eq!(repository.refs().name_to_oid("refs/heads/master").unwrap(), second);
        assert_eq!(repository.lookup_commit(&second.to_hex()[..7]).unwrap().parents(), &[first]);

        let reflog = repository.refs().reflog("refs/heads/master").unwrap();
        assert_eq!(reflog.len(), 2);
        assert_eq!(reflog.entry(0).unwrap().message, "commit: two");
        assert_eq!(reflog.entry(1).unwrap().message, "commit (initial): one");
        assert_eq!(repository.refs().reflog(HEAD).unwrap().len(), 2);
    }

    #[rstest]
    fn commits_refuse_a_stale_first_parent(repository: (TempDir, Repository)) {
        let (_dir, repository) = repository;
        let first = commit_file(&repository, "one", 100);
        commit_file(&repository, "two", 200);
        let tree = *repository.lookup_commit(&first.to_hex()).unwrap().tree();

        let error = repository
            .create_commit(Some(HEAD), &signature(300), &signature(300), None, "stale\n", &tree, &[first])
            .unwrap_err();

        assert_eq!(error.code(), ErrorCode::InvalidSpec);
    }

    #[rstest]
    fn commits_check_their_tree_type(repository: (TempDir, Repository)) {
        let (_dir, repository) = repository;
        let blob = repository.create_blob(b"not a tree").unwrap();

        let error = repository
            .create_commit(None, &signature(1), &signature(1), None, "x\n", &blob, &[])
            .unwrap_err();

        assert_eq!(error.code(), ErrorCode::TypeMismatch);
    }

    #[rstest]
    fn tags_are_created_listed_and_peeled(repository: (TempDir, Repository)) {
        let (_dir, repository) = repository;
        let commit = commit_file(&repository, "one", 100);

        let tag = repository.create_tag("v1.0", &commit, &signature(150), "release", false).unwrap();
        repository.create_lightweight_tag("v1.1", &commit, false).unwrap();
        repository.create_lightweight_tag("nightly", &commit, false).unwrap();

        assert_eq!(repository.tag_names().unwrap(), vec!["nightly", "v1.0", "v1.1"]);
        assert_eq!(repository.tag_names_matching("v1.*").unwrap(), vec!["v1.0", "v1.1"]);
        assert_eq!(repository.lookup_tag(&tag.to_hex()).unwrap().message(), "release\n");
        assert_eq!(repository.peel(&tag, ObjectType::Commit).unwrap(), commit);
        assert_eq!(
            repository.peel(&tag, ObjectType::Tree).unwrap(),
            *repository.lookup_commit(&commit.to_hex()).unwrap().tree()
        );
        assert_eq!(
            repository.create_tag("v1.0", &commit, &signature(150), "again", false).unwrap_err().code(),
            ErrorCode::AlreadyExists
        );

        repository.delete_tag("v1.1").unwrap();
        assert_eq!(repository.tag_names().unwrap(), vec!["nightly", "v1.0"]);
    }

    #[rstest]
    fn peeling_a_blob_to_a_commit_fails(repository: (TempDir, Repository)) {
        let (_dir, repository) = repository;
        let blob = repository.create_blob(b"data").unwrap();

        assert_eq!(repository.peel(&blob, ObjectType::Commit).unwrap_err().code(), ErrorCode::TypeMismatch);
    }

    #[rstest]
    fn branches_are_created_renamed_and_protected(repository: (TempDir, Repository)) {
        let (_dir, repository) = repository;
        let commit = commit_file(&repository, "one", 100);

        repository.create_branch("topic", &commit, false).unwrap();
        assert_eq!(repository.branch_names().unwrap(), vec!["master", "topic"]);
        assert_eq!(
            repository.refs().reflog("refs/heads/topic").unwrap().entry(0).unwrap().message,
            format!("branch: Created from {commit}")
        );

        repository.move_branch("topic", "feature", false).unwrap();
        assert_eq!(repository.branch_names().unwrap(), vec!["feature", "master"]);

        assert_eq!(repository.delete_branch("master").unwrap_err().code(), ErrorCode::InvalidSpec);
        repository.delete_branch("feature").unwrap();
        assert_eq!(repository.branch_names().unwrap(), vec!["master"]);
    }

    #[rstest]
    fn renaming_the_current_branch_moves_head(repository: (TempDir, Repository)) {
        let (_dir, repository) = repository;
        let commit = commit_file(&repository, "one", 100);

        repository.move_branch("master", "main", false).unwrap();

        assert_eq!(repository.head().unwrap(), Reference::symbolic(HEAD, "refs/heads/main"));
        assert_eq!(repository.head_oid().unwrap(), Some(commit));
    }

    #[rstest]
    fn tree_paths_are_looked_up_and_walked(repository: (TempDir, Repository)) {
        let (_dir, repository) = repository;
        let blob = repository.create_blob(b"nested\n").unwrap();
        let mut inner = TreeBuilder::new();
        inner.insert("b.txt", blob, EntryMode::REGULAR).unwrap();
        let inner = inner.write(repository.database()).unwrap();
        let mut outer = TreeBuilder::new();
        outer.insert("a", inner, EntryMode::Directory).unwrap();
        let outer = outer.write(repository.database()).unwrap();

        assert_eq!(repository.tree_entry_by_path(&outer, "a/b.txt").unwrap().oid(), blob);

        let mut seen = Vec::new();
        repository
            .tree_walk(&outer, TreeWalkMode::Pre, |root, entry| {
                seen.push(format!("{root}{}", entry.name()));
                WalkControl::Continue
            })
            .unwrap();
        assert_eq!(seen, vec!["a", "a/b.txt"]);
    }

    #[rstest]
    fn files_are_streamed_into_blobs(repository: (TempDir, Repository)) {
        let (dir, repository) = repository;
        let path = dir.path().join("hello.txt");
        fs::write(&path, "hello\n").unwrap();

        let oid = repository.create_blob_from_file(&path).unwrap();

        assert_eq!(oid.to_hex(), "ce013625030ba8dba906f756967f9e9ca394464a");
        assert_eq!(repository.create_blob_from_workdir("hello.txt").unwrap(), oid);
        assert_eq!(repository.lookup_blob("ce0136").unwrap().content().as_ref(), b"hello\n");
    }
}
