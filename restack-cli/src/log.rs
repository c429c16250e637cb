//! History and reflog listings

use anyhow::Result;
use restack_core::{Commit, ObjectId, RefLogEntry, Signature};
use std::io::Write;

fn format_date(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn short_hex(hex: &str) -> &str {
    &hex[..hex.len().min(12)]
}

/// One-line summary of a commit.
pub fn format_commit(id: &ObjectId, commit: &Commit) -> String {
    format!(
        "{} {} | {} | {}",
        id.short(),
        format_date(commit.author.timestamp),
        format_person(&commit.author),
        commit.subject()
    )
}

fn format_person(sig: &Signature) -> String {
    format!("{} <{}>", sig.name, sig.email)
}

/// Print commits newest first.
pub fn print_log(commits: &[(ObjectId, Commit)], writer: &mut dyn Write) -> Result<()> {
    if commits.is_empty() {
        writeln!(writer, "No commits.")?;
        return Ok(());
    }
    for (id, commit) in commits {
        writeln!(writer, "{}", format_commit(id, commit))?;
    }
    Ok(())
}

/// Format a reflog entry for display.
pub fn format_reflog_entry(entry: &RefLogEntry) -> String {
    let old = entry.old.as_deref().map(short_hex).unwrap_or("(none)");
    format!(
        "[{}] {} -> {} | {}",
        format_date(entry.timestamp),
        old,
        short_hex(&entry.new),
        entry.label
    )
}

/// Print the reflog of `branch`, newest first.
pub fn print_reflog(branch: &str, entries: &[RefLogEntry], writer: &mut dyn Write) -> Result<()> {
    if entries.is_empty() {
        writeln!(writer, "No reflog entries for {}.", branch)?;
        return Ok(());
    }
    writeln!(writer, "Reflog of {} ({} entries):", branch, entries.len())?;
    writeln!(writer, "{}", "-".repeat(80))?;
    for (n, entry) in entries.iter().rev().enumerate() {
        writeln!(writer, "  {}@{{{}}} {}", branch, n, format_reflog_entry(entry))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use restack_core::Tree;

    fn entry(old: Option<&str>, new: &str, label: &str) -> RefLogEntry {
        RefLogEntry {
            old: old.map(String::from),
            new: new.to_string(),
            label: label.to_string(),
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn test_format_reflog_entry() {
        let line = format_reflog_entry(&entry(
            Some("aaaaaaaaaaaaaaaaaaaa"),
            "bbbbbbbbbbbbbbbbbbbb",
            "reword: switch to rewritten bbbb",
        ));
        assert_eq!(
            line,
            "[2023-11-14 22:13:20 UTC] aaaaaaaaaaaa -> bbbbbbbbbbbb | reword: switch to rewritten bbbb"
        );
        assert!(format_reflog_entry(&entry(None, "cc", "commit")).contains("(none) -> cc"));
    }

    #[test]
    fn test_print_reflog_newest_first() {
        let entries = vec![entry(None, "aa", "commit (initial): one"), entry(Some("aa"), "bb", "split")];
        let mut out = Vec::new();
        print_reflog("main", &entries, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Reflog of main (2 entries):");
        assert!(lines[2].starts_with("  main@{0}"));
        assert!(lines[2].ends_with("| split"));
        assert!(lines[3].ends_with("| commit (initial): one"));
    }

    #[test]
    fn test_print_empty() {
        let mut out = Vec::new();
        print_reflog("main", &[], &mut out).unwrap();
        print_log(&[], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No reflog entries for main.\nNo commits.\n");
    }

    #[test]
    fn test_format_commit() {
        let commit = Commit::new(
            Tree::empty_id(),
            vec![],
            Signature::new("Ada", "ada@example.com", 0, 0),
            "Subject line\n\nBody\n".into(),
        );
        let id = ObjectId::new([0xab; 32]);
        assert_eq!(
            format_commit(&id, &commit),
            "abababababab 1970-01-01 00:00:00 UTC | Ada <ada@example.com> | Subject line"
        );
    }
}
