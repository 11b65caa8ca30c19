use crate::areas::repository::Repository;
use crate::context::Context;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

impl Repository {
    /// Create (or reinitialize) a repository at `path` and report where
    pub fn initialize(
        writer: &mut impl Write,
        path: &Path,
        bare: bool,
        context: Arc<Context>,
    ) -> anyhow::Result<Repository> {
        std::fs::create_dir_all(path)?;
        let path = path.canonicalize()?;
        let reinitialized = Repository::open(&path, context.clone()).is_ok();

        let repository = Repository::init(&path, bare, context)?;
        let verb = if reinitialized { "Reinitialized existing" } else { "Initialized empty" };
        writeln!(
            writer,
            "{verb} Git repository in {}",
            repository.git_dir().display()
        )?;

        Ok(repository)
    }
}
