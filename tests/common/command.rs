use crate::common::file::{FileSpec, write_file};
use assert_cmd::Command;
use assert_fs::TempDir;
use rstest::fixture;
use std::path::Path;

pub const AUTHOR_NAME: &str = "fake_user";
pub const AUTHOR_EMAIL: &str = "fake_email@email.com";

/// First commit time used by the fixtures; each later commit is a minute newer
pub const BASE_TIME: i64 = 1_700_000_000;

#[fixture]
pub fn repository_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

#[fixture]
pub fn init_repository_dir(repository_dir: TempDir) -> TempDir {
    run_gitcore_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    repository_dir
}

/// Three commits on master touching `1.txt`, `a/2.txt` and `a/b/3.txt`
#[fixture]
pub fn repository_with_history(init_repository_dir: TempDir) -> TempDir {
    let files = [("1.txt", "one"), ("a/2.txt", "two"), ("a/b/3.txt", "three")];

    for (position, (path, content)) in files.iter().enumerate() {
        write_file(FileSpec::new(
            init_repository_dir.path().join(path),
            content.to_string(),
        ));
        run_gitcore_command(init_repository_dir.path(), &["add", "."])
            .assert()
            .success();
        gitcore_commit_at(
            init_repository_dir.path(),
            &format!("Commit {}", position + 1),
            BASE_TIME + 60 * position as i64,
        )
        .assert()
        .success();
    }

    init_repository_dir
}

pub fn run_gitcore_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("gitcore").expect("Failed to find gitcore binary");
    cmd.current_dir(dir);
    cmd.env_remove("GIT_AUTHOR_NAME")
        .env_remove("GIT_AUTHOR_EMAIL")
        .env_remove("GIT_AUTHOR_DATE")
        .env_remove("GIT_COMMITTER_NAME")
        .env_remove("GIT_COMMITTER_EMAIL")
        .env_remove("GIT_COMMITTER_DATE");
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}

/// Run `args` with a fixed author identity and date
pub fn run_as_author(dir: &Path, args: &[&str], seconds: i64) -> Command {
    let mut cmd = run_gitcore_command(dir, args);
    cmd.envs(vec![
        ("GIT_AUTHOR_NAME", AUTHOR_NAME.to_string()),
        ("GIT_AUTHOR_EMAIL", AUTHOR_EMAIL.to_string()),
        ("GIT_AUTHOR_DATE", format!("{seconds} +0000")),
    ]);
    cmd
}

pub fn gitcore_commit_at(dir: &Path, message: &str, seconds: i64) -> Command {
    run_as_author(dir, &["commit", "-m", message], seconds)
}

/// Id of the commit `revision` names, read through `rev-list`
pub fn commit_id(dir: &Path, revision: &str) -> String {
    let output = run_gitcore_command(dir, &["rev-list", "-n", "1", revision])
        .output()
        .expect("Failed to run rev-list");
    assert!(output.status.success(), "rev-list {revision} failed: {:?}", output);

    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Get the current HEAD commit SHA straight from the files
pub fn get_head_commit_sha(dir: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let head_content = std::fs::read_to_string(dir.join(".git").join("HEAD"))?;

    // HEAD file contains either a commit SHA or a ref like "ref: refs/heads/main"
    if let Some(ref_path) = head_content.strip_prefix("ref: ") {
        let ref_file = dir.join(".git").join(ref_path.trim());
        let commit_sha = std::fs::read_to_string(ref_file)?;
        Ok(commit_sha.trim().to_string())
    } else {
        Ok(head_content.trim().to_string())
    }
}
