//! Turning user-supplied revision names into commit ids
//!
//! Accepted forms: `HEAD`, a branch name, a full or abbreviated (at least
//! four hex digits) commit id, each optionally followed by `~N` or `^`
//! suffixes that walk first parents.

use crate::error::{HistoryError, Result};
use crate::object::{Object, ObjectId};
use crate::parse;
use crate::refs::{validate_ref_name, RefStore};
use crate::storage::{ObjectStore, ObjectStoreExt, StorageError};

pub const MIN_ABBREV: usize = 4;

/// Split `spec` into its base name and the number of first-parent steps.
fn split_ancestry(spec: &str) -> Result<(&str, u64)> {
    let mut base = spec;
    let mut steps = 0u64;
    loop {
        if let Some(rest) = base.strip_suffix('^') {
            base = rest;
            steps += 1;
            continue;
        }
        match base.rfind('~') {
            Some(pos) => {
                let count = &base[pos + 1..];
                let n = if count.is_empty() {
                    1
                } else {
                    match parse::parse_unsigned_from_buf(count, u32::MAX as u64) {
                        Ok((n, "")) => n,
                        _ => {
                            return Err(HistoryError::Lookup(format!(
                                "invalid ancestry suffix in '{}'",
                                spec
                            )));
                        }
                    }
                };
                base = &base[..pos];
                steps += n;
            }
            None => return Ok((base, steps)),
        }
    }
}

async fn resolve_base(
    store: &dyn ObjectStore,
    refs: &dyn RefStore,
    name: &str,
    head_branch: &str,
) -> Result<ObjectId> {
    let not_found = || HistoryError::Lookup(format!("commit cannot be found: {}", name));

    if name == "HEAD" || name == "@" {
        return refs
            .current(head_branch)
            .await?
            .ok_or_else(|| HistoryError::Lookup(format!("could not resolve HEAD ({}) to a commit", head_branch)));
    }

    if name.len() == 64 {
        if let Ok(id) = ObjectId::from_hex(name) {
            return if store.exists(id).await? { Ok(id) } else { Err(not_found()) };
        }
    }

    if validate_ref_name(name).is_ok() {
        if let Some(id) = refs.current(name).await? {
            return Ok(id);
        }
    }

    let is_hex = name.len() >= MIN_ABBREV && name.chars().all(|c| c.is_ascii_hexdigit());
    if !is_hex {
        return Err(not_found());
    }
    let prefix = name.to_ascii_lowercase();
    let mut matches = Vec::new();
    for id in store.list().await? {
        if id.to_hex().starts_with(&prefix) && matches!(store.load(id).await?, Object::Commit(_)) {
            matches.push(id);
        }
    }
    match matches.as_slice() {
        [] => Err(not_found()),
        [id] => Ok(*id),
        _ => Err(HistoryError::Lookup(format!(
            "short commit id {} is ambiguous ({} candidates)",
            name,
            matches.len()
        ))),
    }
}

/// Resolve `spec` to a commit id. `HEAD` means the tip of `head_branch`.
pub async fn resolve(
    store: &dyn ObjectStore,
    refs: &dyn RefStore,
    spec: &str,
    head_branch: &str,
) -> Result<ObjectId> {
    let (base, steps) = split_ancestry(spec.trim())?;
    if base.is_empty() {
        return Err(HistoryError::Lookup(format!("invalid revision: '{}'", spec)));
    }

    let mut id = resolve_base(store, refs, base, head_branch).await?;
    let mut commit = match store.load_commit(id).await {
        Ok(commit) => commit,
        Err(StorageError::KindMismatch { .. }) => {
            return Err(HistoryError::Lookup(format!("{} is not a commit", base)));
        }
        Err(e) => return Err(e.into()),
    };

    for _ in 0..steps {
        id = commit
            .parents
            .first()
            .copied()
            .ok_or_else(|| HistoryError::Lookup(format!("revision {} reaches past the root commit", spec)))?;
        commit = store.load_commit(id).await?;
    }
    Ok(id)
}
