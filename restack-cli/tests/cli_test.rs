//! Command line integration tests

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn restack(repo: &Path, editor: &str, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_restack"))
        .arg("-C")
        .arg(repo)
        .args(args)
        .env("RESTACK_AUTHOR_NAME", "Ada")
        .env("RESTACK_AUTHOR_EMAIL", "ada@example.com")
        .env("RESTACK_EDITOR", editor)
        .env_remove("RESTACK_BRANCH")
        .env_remove("RESTACK_VERBOSE")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Repository with three commits and an editor script that renames
fn setup() -> (TempDir, String) {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("rename.sh");
    fs::write(&script, "printf 'Renamed\\n' > \"$1\"\n").unwrap();
    let editor = format!("sh {}", script.display());

    let work = dir.path().join("work");
    fs::create_dir_all(&work).unwrap();
    assert!(restack(&work, &editor, &["init"]).status.success());
    for (n, text) in ["one", "two", "three"].iter().enumerate() {
        fs::write(work.join(format!("file{}.txt", n)), text).unwrap();
        let out = restack(&work, &editor, &["commit", "-m", &format!("Commit {}", n)]);
        assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    }
    (dir, editor)
}

#[test]
fn test_reword_via_cli() {
    let (dir, editor) = setup();
    let work = dir.path().join("work");

    let out = restack(&work, &editor, &["reword", "HEAD~1"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let log = stdout(&restack(&work, &editor, &["log"]));
    let subjects: Vec<&str> = log.lines().map(|l| l.rsplit(" | ").next().unwrap()).collect();
    assert_eq!(subjects, vec!["Commit 2", "Renamed", "Commit 0"]);

    let reflog = stdout(&restack(&work, &editor, &["reflog"]));
    assert!(reflog.contains("Reflog of main (4 entries):"));
    assert!(reflog.contains("reword: switch to rewritten"));
    assert!(work.join(".restack").join("ORIG_HEAD").exists());
}

#[test]
fn test_split_all_via_cli() {
    let dir = TempDir::new().unwrap();
    let work = dir.path().join("work");
    fs::create_dir_all(&work).unwrap();
    assert!(restack(&work, "true", &["init", "--branch", "trunk"]).status.success());
    fs::write(work.join("a.txt"), "a").unwrap();
    fs::write(work.join("b.txt"), "b").unwrap();
    assert!(restack(&work, "true", &["commit", "-m", "Add a and b"]).status.success());

    let out = restack(&work, "true", &["split", "HEAD", "--all", "--", "a.txt"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let log = stdout(&restack(&work, "true", &["log", "-n", "5"]));
    assert_eq!(log.lines().count(), 2);
    assert!(log.lines().all(|l| l.ends_with("| Add a and b")));
}

#[test]
fn test_exit_codes() {
    let (dir, editor) = setup();
    let work = dir.path().join("work");

    let lookup = restack(&work, &editor, &["reword", "no-such-thing"]);
    assert_eq!(lookup.status.code(), Some(1));

    let aborted = restack(&work, "false", &["reword", "HEAD"]);
    assert_eq!(aborted.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&aborted.stderr).contains("aborting commit"));

    let trivial = restack(&work, &editor, &["split", "HEAD", "--all"]);
    assert_eq!(trivial.status.code(), Some(1));

    let missing = restack(dir.path(), &editor, &["log"]);
    assert_eq!(missing.status.code(), Some(1));
}
