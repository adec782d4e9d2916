//! Git virtual projector (spec §4.3): turns a classified git path plus an
//! opened [`GitView`] into directory listings, stats, file contents, and
//! symlink targets for the synthetic `_branch_`/`_tag_`/`_commit_` trees.

use std::collections::HashSet;

use anyhow::Result;
use git2::Oid;

use crate::path::{CommitPath, RefKind};
use crate::types::{Entry, Kind, Stat};

use super::GitView;

/// One reference-tree descriptor: an intermediate directory (`target: None`)
/// or a leaf symlink pointing at a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    pub name: String,
    pub target: Option<String>,
}

impl RefEntry {
    pub fn to_entry(&self) -> Entry {
        match &self.target {
            Some(_) => Entry::symlink(self.name.clone()),
            None => Entry::dir(self.name.clone()),
        }
    }
}

fn symlink_target(depth: usize, hash: &Oid) -> String {
    format!("{}_commit_/{}", "../".repeat(depth), hash)
}

/// The reference-projection algorithm (spec §4.3.1). Pure: takes the full
/// set of (short name, target commit) pairs for one reference kind and the
/// caller's current prefix, and returns the descriptors visible there.
pub fn project_refs(refs: &[(String, Oid)], prefix: &str) -> Vec<RefEntry> {
    let prefix_segs: Vec<&str> = if prefix.is_empty() { Vec::new() } else { prefix.split('/').collect() };
    let level = prefix_segs.len();
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for (name, oid) in refs {
        let segs: Vec<&str> = name.split('/').collect();

        if name == prefix {
            let depth = segs.len();
            let leaf = segs.last().copied().unwrap_or_default().to_string();
            return vec![RefEntry { name: leaf, target: Some(symlink_target(depth, oid)) }];
        }

        if segs.len() < level || segs[..level] != prefix_segs[..] {
            continue;
        }

        let remaining = &segs[level..];
        let Some(&head) = remaining.first() else { continue };

        if remaining.len() == 1 {
            if seen.insert(head.to_string()) {
                out.push(RefEntry {
                    name: head.to_string(),
                    target: Some(symlink_target(segs.len(), oid)),
                });
            }
        } else if seen.insert(head.to_string()) {
            out.push(RefEntry { name: head.to_string(), target: None });
        }
    }

    out
}

/// Stat a single reference: split it into `(dir, base)`, project at `dir`,
/// and filter to the matching leaf name (spec §4.3.1, "Stat vs. list").
pub fn stat_one_ref(refs: &[(String, Oid)], ref_path: &str) -> Option<RefEntry> {
    let (dir, base) = crate::path::dir_and_base(ref_path);
    project_refs(refs, &dir).into_iter().find(|e| e.name == base)
}

/// The fixed synthetic descriptor for a kind root (`_branch_`, `_tag_`,
/// `_commit_`) itself (spec §4.3.3).
pub fn kind_root_entry() -> Stat {
    Stat { kind: Kind::Directory, size: 0 }
}

pub fn list_refs(view: &GitView, kind: RefKind, prefix: &str) -> Result<Vec<Entry>> {
    let refs = view.refs(kind)?;
    Ok(project_refs(&refs, prefix).iter().map(RefEntry::to_entry).collect())
}

pub fn stat_ref(view: &GitView, kind: RefKind, ref_path: &str) -> Result<Option<Stat>> {
    let refs = view.refs(kind)?;
    Ok(stat_one_ref(&refs, ref_path).map(|e| match e.target {
        Some(_) => Stat { kind: Kind::Symlink, size: 0 },
        None => Stat { kind: Kind::Directory, size: 0 },
    }))
}

pub fn readlink_ref(view: &GitView, kind: RefKind, ref_path: &str) -> Result<Option<String>> {
    let refs = view.refs(kind)?;
    Ok(stat_one_ref(&refs, ref_path).and_then(|e| e.target))
}

/// `_commit_` directory listing: one entry per commit object in the
/// repository, named by its full hex hash (spec §4.3.2).
pub fn list_commits(view: &GitView) -> Result<Vec<Entry>> {
    Ok(view.commits()?.into_iter().map(|oid| Entry::dir(oid.to_string())).collect())
}

fn parse_hash(hash: &str) -> Result<Oid> {
    Ok(Oid::from_str(hash)?)
}

pub fn stat_commit_root(view: &GitView, hash: &str) -> Result<Option<Stat>> {
    let Ok(oid) = parse_hash(hash) else { return Ok(None) };
    if !view.commit_exists(oid) {
        return Ok(None);
    }
    Ok(Some(Stat { kind: Kind::Directory, size: 0 }))
}

pub fn commit_message(view: &GitView, hash: &str) -> Result<Vec<u8>> {
    let oid = parse_hash(hash)?;
    view.commit_text(oid)
}

pub fn list_commit_parents(view: &GitView, hash: &str) -> Result<Vec<Entry>> {
    let oid = parse_hash(hash)?;
    let parents = view.commit_parents(oid)?;
    Ok((0..parents.len()).map(|i| Entry::file(i.to_string(), 0)).collect())
}

pub fn stat_commit_parent(view: &GitView, hash: &str, index: u64) -> Result<Option<Stat>> {
    let oid = parse_hash(hash)?;
    let parents = view.commit_parents(oid)?;
    if index < parents.len() as u64 {
        Ok(Some(Stat { kind: Kind::File, size: 0 }))
    } else {
        Ok(None)
    }
}

pub fn list_commit_tree(view: &GitView, hash: &str, path: &str) -> Result<Option<Vec<Entry>>> {
    let oid = parse_hash(hash)?;
    let Some(listing) = view.list_tree(oid, path)? else { return Ok(None) };
    Ok(Some(
        listing
            .into_iter()
            .map(|(name, is_dir, size)| if is_dir { Entry::dir(name) } else { Entry::file(name, size) })
            .collect(),
    ))
}

pub fn stat_commit_tree_path(view: &GitView, hash: &str, path: &str) -> Result<Option<Stat>> {
    let oid = parse_hash(hash)?;
    let Some((is_dir, size)) = view.stat_tree_path(oid, path)? else { return Ok(None) };
    Ok(Some(Stat { kind: if is_dir { Kind::Directory } else { Kind::File }, size }))
}

/// Stat any of the fixed names at a commit's root (`message`, `parent`,
/// `tree`), per spec §4.3.2: synthetic descriptors with size zero except
/// `message`.
pub fn stat_commit_subtree(view: &GitView, hash: &str, subtree: &CommitPath) -> Result<Option<Stat>> {
    match subtree {
        CommitPath::Root => stat_commit_root(view, hash),
        CommitPath::Message => {
            let text = commit_message(view, hash)?;
            Ok(Some(Stat { kind: Kind::File, size: text.len() as u64 }))
        }
        CommitPath::ParentDir => Ok(Some(Stat { kind: Kind::Directory, size: 0 })),
        CommitPath::Parent(n) => stat_commit_parent(view, hash, *n),
        CommitPath::Tree(path) => stat_commit_tree_path(view, hash, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(hex1: u8) -> Oid {
        let mut bytes = [0u8; 20];
        bytes[19] = hex1;
        Oid::from_bytes(&bytes).unwrap()
    }

    fn refs() -> Vec<(String, Oid)> {
        vec![
            ("master".to_string(), oid(0)),
            ("fix/bug1".to_string(), oid(1)),
            ("fix/bug2".to_string(), oid(2)),
            ("fix/deep/branch".to_string(), oid(3)),
        ]
    }

    #[test]
    fn root_listing_mixes_leaves_and_intermediate_dirs() {
        let got = project_refs(&refs(), "");
        assert_eq!(
            got,
            vec![
                RefEntry { name: "master".to_string(), target: Some(format!("../_commit_/{}", oid(0))) },
                RefEntry { name: "fix".to_string(), target: None },
            ]
        );
    }

    #[test]
    fn nested_prefix_listing() {
        let got = project_refs(&refs(), "fix");
        assert_eq!(
            got,
            vec![
                RefEntry { name: "bug1".to_string(), target: Some(format!("../../_commit_/{}", oid(1))) },
                RefEntry { name: "bug2".to_string(), target: Some(format!("../../_commit_/{}", oid(2))) },
                RefEntry { name: "deep".to_string(), target: None },
            ]
        );
    }

    #[test]
    fn deeply_nested_prefix_listing() {
        let got = project_refs(&refs(), "fix/deep");
        assert_eq!(
            got,
            vec![RefEntry {
                name: "branch".to_string(),
                target: Some(format!("../../../_commit_/{}", oid(3)))
            }]
        );
    }

    #[test]
    fn tag_style_refs_with_suffixed_leaves() {
        let tags = vec![
            ("v0.0.1".to_string(), oid(10)),
            ("v0.0.2".to_string(), oid(11)),
            ("beta/v0.0.1.beta".to_string(), oid(12)),
            ("beta/v0.0.2.beta".to_string(), oid(13)),
        ];

        let got = project_refs(&tags, "beta");
        assert_eq!(
            got,
            vec![
                RefEntry {
                    name: "v0.0.1.beta".to_string(),
                    target: Some(format!("../../_commit_/{}", oid(12)))
                },
                RefEntry {
                    name: "v0.0.2.beta".to_string(),
                    target: Some(format!("../../_commit_/{}", oid(13)))
                },
            ]
        );
    }

    #[test]
    fn stat_one_ref_finds_the_leaf_by_splitting_dir_and_base() {
        let got = stat_one_ref(&refs(), "fix/bug2").unwrap();
        assert_eq!(got.name, "bug2");
        assert_eq!(got.target, Some(format!("../../_commit_/{}", oid(2))));
    }

    #[test]
    fn no_two_descriptors_share_a_name_at_any_prefix() {
        for prefix in ["", "fix", "fix/deep"] {
            let entries = project_refs(&refs(), prefix);
            let mut names: Vec<_> = entries.iter().map(|e| e.name.clone()).collect();
            let before = names.len();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), before, "duplicate name at prefix {prefix:?}");
        }
    }
}
