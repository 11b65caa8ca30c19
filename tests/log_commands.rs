use assert_fs::TempDir;
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use std::path::Path;

mod common;
use common::command::{
    BASE_TIME, commit_id, init_repository_dir, repository_with_history, run_as_author,
    run_gitcore_command,
};

/// Write a commit on top of `parents` without touching any reference
fn commit_tree_at(dir: &Path, tree: &str, parents: &[&str], message: &str, seconds: i64) -> String {
    let mut args = vec!["commit-tree", tree, "-m", message];
    for parent in parents {
        args.push("-p");
        args.push(parent);
    }

    let output = run_as_author(dir, &args, seconds)
        .output()
        .expect("Failed to run commit-tree");
    assert!(output.status.success(), "commit-tree failed: {output:?}");

    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn rev_list(dir: &Path, args: &[&str]) -> Vec<String> {
    let mut full_args = vec!["rev-list"];
    full_args.extend_from_slice(args);

    let output = run_gitcore_command(dir, &full_args)
        .output()
        .expect("Failed to run rev-list");
    assert!(output.status.success(), "rev-list failed: {output:?}");

    common::stdout_lines(&output)
}

/// Ids of master's three commits plus a `side` branch forked from the first one
///
/// ```text
/// c1 (0) -- c2 (60) -- c3 (120)      master
///   \
///    s1 (90) -- s2 (150)             side
/// ```
struct Forked {
    dir: TempDir,
    c1: String,
    c2: String,
    c3: String,
    s1: String,
    s2: String,
}

#[fixture]
fn forked(repository_with_history: TempDir) -> Forked {
    let dir = repository_with_history.path();
    let c1 = commit_id(dir, "HEAD~2");
    let c2 = commit_id(dir, "HEAD~1");
    let c3 = commit_id(dir, "HEAD");

    let s1 = commit_tree_at(dir, &c1, &[&c1], "Side 1", BASE_TIME + 90);
    let s2 = commit_tree_at(dir, &s1, &[&s1], "Side 2", BASE_TIME + 150);
    run_gitcore_command(dir, &["update-ref", "refs/heads/side", &s2])
        .assert()
        .success();

    Forked {
        dir: repository_with_history,
        c1,
        c2,
        c3,
        s1,
        s2,
    }
}

#[rstest]
fn rev_list_defaults_to_head_newest_first(repository_with_history: TempDir) {
    let dir = repository_with_history.path();

    let ids = rev_list(dir, &[]);

    assert_eq!(ids.len(), 3);
    assert_eq!(ids[0], commit_id(dir, "HEAD"));
    assert_eq!(ids[2], commit_id(dir, "HEAD~2"));
}

#[rstest]
fn rev_list_on_an_unborn_head_prints_nothing(init_repository_dir: TempDir) {
    run_gitcore_command(init_repository_dir.path(), &["rev-list"])
        .assert()
        .success()
        .stdout("");
}

#[rstest]
fn rev_list_interleaves_branches_by_commit_time(forked: Forked) {
    let ids = rev_list(forked.dir.path(), &["master", "side"]);

    assert_eq!(
        ids,
        vec![
            forked.s2.as_str(),
            forked.c3.as_str(),
            forked.s1.as_str(),
            forked.c2.as_str(),
            forked.c1.as_str()
        ]
    );
}

#[rstest]
fn rev_list_all_starts_from_every_branch(forked: Forked) {
    let ids = rev_list(forked.dir.path(), &["--all"]);

    assert_eq!(ids.len(), 5);
    assert_eq!(ids[0], forked.s2);
}

#[rstest]
#[case::range(&["master..side"])]
#[case::hidden(&["side", "^master"])]
fn rev_list_excludes_hidden_history(forked: Forked, #[case] args: &[&str]) {
    let ids = rev_list(forked.dir.path(), args);

    assert_eq!(ids, vec![forked.s2.as_str(), forked.s1.as_str()]);
}

#[rstest]
fn rev_list_max_count_and_reverse(forked: Forked) {
    let dir = forked.dir.path();

    assert_eq!(
        rev_list(dir, &["-n", "2", "side"]),
        vec![forked.s2.as_str(), forked.s1.as_str()]
    );
    assert_eq!(
        rev_list(dir, &["--reverse", "master"]),
        vec![forked.c1.as_str(), forked.c2.as_str(), forked.c3.as_str()]
    );
}

#[rstest]
fn rev_list_lists_a_merge_history_once(forked: Forked) {
    let dir = forked.dir.path();
    let merge = commit_tree_at(
        dir,
        &forked.c3,
        &[&forked.c3, &forked.s2],
        "Merge side",
        BASE_TIME + 200,
    );

    for order in ["--date-order", "--topo-order"] {
        let ids = rev_list(dir, &[order, &merge]);

        assert_eq!(ids.len(), 6, "{order}: {ids:?}");
        assert_eq!(ids[0], merge, "{order}");
        assert_eq!(ids[5], forked.c1, "{order}");

        let position = |id: &str| ids.iter().position(|other| other == id).unwrap();
        assert!(position(&forked.s2) < position(&forked.s1), "{order}");
        assert!(position(&forked.c3) < position(&forked.c2), "{order}");
    }
}

#[rstest]
fn topo_order_ignores_misleading_commit_times(repository_with_history: TempDir) {
    let dir = repository_with_history.path();
    let head = commit_id(dir, "HEAD");
    // child dated before its parent
    let skewed = commit_tree_at(dir, &head, &[&head], "Skewed", BASE_TIME - 1_000);

    let ids = rev_list(dir, &["--topo-order", &skewed]);

    assert_eq!(ids[0], skewed);
    assert_eq!(ids[1], head);
}

#[rstest]
fn log_medium_format(repository_with_history: TempDir) -> Result<(), Box<dyn std::error::Error>> {
    let dir = repository_with_history.path();
    let head = commit_id(dir, "HEAD");

    let output = run_gitcore_command(dir, &["log", "-n", "2"]).output()?;
    let lines = common::stdout_lines(&output);

    assert_eq!(lines[0], format!("commit {head} (HEAD -> master)"));
    assert_eq!(lines[1], "Author: fake_user <fake_email@email.com>");
    assert!(lines[2].starts_with("Date:   "), "{lines:?}");
    assert_eq!(lines[3], "");
    assert_eq!(lines[4], "    Commit 3");
    assert_eq!(lines[5], "");
    assert_eq!(lines[6], format!("commit {}", commit_id(dir, "HEAD~1")));
    assert_eq!(lines.len(), 11);

    Ok(())
}

#[rstest]
fn log_oneline_with_tag_decorations(
    repository_with_history: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = repository_with_history.path();
    run_gitcore_command(dir, &["tag", "create", "v0.1", "HEAD~2"])
        .assert()
        .success();
    run_as_author(dir, &["tag", "create", "v0.2", "HEAD~1", "-m", "annotated"], BASE_TIME)
        .assert()
        .success();

    let output = run_gitcore_command(dir, &["log", "--oneline"]).output()?;
    let lines = common::stdout_lines(&output);

    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with(&commit_id(dir, "HEAD")[..7]), "{lines:?}");
    assert!(lines[0].ends_with(" (HEAD -> master) Commit 3"), "{lines:?}");
    assert!(lines[1].ends_with(" (tag: v0.2) Commit 2"), "{lines:?}");
    assert!(lines[2].ends_with(" (tag: v0.1) Commit 1"), "{lines:?}");

    Ok(())
}

#[rstest]
#[case("full", " (HEAD -> refs/heads/master) Commit 3")]
#[case("none", " Commit 3")]
fn log_decoration_styles(
    repository_with_history: TempDir,
    #[case] style: &str,
    #[case] expected_suffix: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = repository_with_history.path();
    let head = commit_id(dir, "HEAD");

    let output = run_gitcore_command(
        dir,
        &["log", "--format", "one-line", "--decorate", style, "-n", "1"],
    )
    .output()?;

    assert_eq!(
        common::stdout_lines(&output),
        vec![format!("{head}{expected_suffix}")]
    );

    Ok(())
}

#[rstest]
fn log_shows_merge_parents(forked: Forked) -> Result<(), Box<dyn std::error::Error>> {
    let dir = forked.dir.path();
    let merge = commit_tree_at(
        dir,
        &forked.c3,
        &[&forked.c3, &forked.s2],
        "Merge side",
        BASE_TIME + 200,
    );

    let output = run_gitcore_command(dir, &["log", "--decorate", "none", "-n", "1", &merge]).output()?;
    let lines = common::stdout_lines(&output);

    assert_eq!(lines[0], format!("commit {merge}"));
    assert_eq!(lines[1], format!("Merge: {} {}", &forked.c3[..7], &forked.s2[..7]));
    assert_eq!(lines.last().map(String::as_str), Some("    Merge side"));

    Ok(())
}
