//! Pure path classification (spec §4.1).
//!
//! Every function here is total and side-effect-free: no I/O, no archive or
//! git lookups. Each function gets one job — split off the `.siva` segment,
//! recognize the `_branch_`/`_tag_`/`_commit_` tokens, or distinguish the
//! four roles under a commit — and composes with the others rather than
//! trying to do all three in one pass.

/// One of the three synthetic top-level directories spliced into an
/// archive's root listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Branch,
    Tag,
    Commit,
}

impl RefKind {
    /// The underscore-bracketed directory name for this kind, e.g. `_branch_`.
    pub fn dir_name(self) -> &'static str {
        match self {
            RefKind::Branch => "_branch_",
            RefKind::Tag => "_tag_",
            RefKind::Commit => "_commit_",
        }
    }
}

/// Result of splitting a path on its first `.siva` segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSplit {
    pub is_archive: bool,
    pub host_path: String,
    pub inner_path: String,
}

/// Split `segments` into a Vec, tolerating (and stripping) a leading `/`.
/// The empty string yields an empty Vec, never `[""]`.
fn segments(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

/// Walk `path`'s segments in order; the first one ending in the literal
/// suffix `.siva` (longer than the suffix itself) is the archive boundary.
pub fn split_archive(path: &str) -> ArchiveSplit {
    let segs = segments(path);

    for (i, seg) in segs.iter().enumerate() {
        if seg.len() > 5 && seg.ends_with(".siva") {
            return ArchiveSplit {
                is_archive: true,
                host_path: segs[..=i].join("/"),
                inner_path: segs[i + 1..].join("/"),
            };
        }
    }

    ArchiveSplit {
        is_archive: false,
        host_path: segs.join("/"),
        inner_path: String::new(),
    }
}

/// A git-virtual path inside an archive: `_branch_|_tag_|_commit_/<ref>/<inner>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitPath {
    pub kind: RefKind,
    pub ref_or_hash: String,
    pub inner: String,
}

/// Classify the archive-internal remainder as a git-virtual path. Succeeds
/// only when the first segment is exactly one of the three reserved tokens.
pub fn classify_git(inner_path: &str) -> Option<GitPath> {
    let segs = segments(inner_path);
    let first = *segs.first()?;

    let kind = match first {
        "_branch_" => RefKind::Branch,
        "_tag_" => RefKind::Tag,
        "_commit_" => RefKind::Commit,
        _ => return None,
    };

    let ref_or_hash = segs.get(1).map(|s| s.to_string()).unwrap_or_default();
    let inner = segs[2.min(segs.len())..].join("/");

    Some(GitPath { kind, ref_or_hash, inner })
}

/// The four roles a path under `_commit_/<hash>/` can play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitPath {
    Root,
    Message,
    ParentDir,
    Parent(u64),
    Tree(String),
}

/// Classify the inner path of a commit-kind [`GitPath`].
pub fn classify_commit(inner: &str) -> Option<CommitPath> {
    let segs = segments(inner);

    match segs.as_slice() {
        [] => Some(CommitPath::Root),
        ["message"] => Some(CommitPath::Message),
        ["parent"] => Some(CommitPath::ParentDir),
        ["parent", n] => n.parse().ok().map(CommitPath::Parent),
        ["parent", ..] => None,
        ["tree"] => Some(CommitPath::Tree(String::new())),
        ["tree", rest @ ..] => Some(CommitPath::Tree(rest.join("/"))),
        _ => None,
    }
}

/// Split a `/`-separated path into its parent (`dir`) and its final
/// component (`base`), the way `dirname`/`basename` would. Used by the
/// reference projector to turn a single ref path into a (prefix, leaf) pair
/// for stat/readlink.
pub fn dir_and_base(path: &str) -> (String, String) {
    match path.rsplit_once('/') {
        Some((dir, base)) => (dir.to_string(), base.to_string()),
        None => (String::new(), path.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_archive_finds_the_siva_segment() {
        let got = split_archive("a/b/c.siva/d/e");
        assert_eq!(
            got,
            ArchiveSplit {
                is_archive: true,
                host_path: "a/b/c.siva".to_string(),
                inner_path: "d/e".to_string(),
            }
        );
    }

    #[test]
    fn split_archive_with_no_siva_segment() {
        let got = split_archive("x/y/z");
        assert_eq!(
            got,
            ArchiveSplit {
                is_archive: false,
                host_path: "x/y/z".to_string(),
                inner_path: String::new(),
            }
        );
    }

    #[test]
    fn split_archive_requires_content_before_the_suffix() {
        // ".siva" alone is exactly the suffix, not longer than it.
        let got = split_archive("a/.siva/b");
        assert!(!got.is_archive);
    }

    #[test]
    fn split_archive_tolerates_leading_slash() {
        let got = split_archive("/a/b.siva/c");
        assert_eq!(got.host_path, "a/b.siva");
        assert_eq!(got.inner_path, "c");
    }

    #[test]
    fn classify_git_commit_path() {
        let got = classify_git("/_commit_/76683487299ab8").unwrap();
        assert_eq!(got.kind, RefKind::Commit);
        assert_eq!(got.ref_or_hash, "76683487299ab8");
        assert_eq!(got.inner, "");
    }

    #[test]
    fn classify_git_tag_path_with_inner() {
        let got = classify_git("/_tag_/v0.6.5/some/path").unwrap();
        assert_eq!(got.kind, RefKind::Tag);
        assert_eq!(got.ref_or_hash, "v0.6.5");
        assert_eq!(got.inner, "some/path");
    }

    #[test]
    fn classify_git_rejects_near_miss_token() {
        assert_eq!(classify_git("/_branch/master/other/path"), None);
    }

    #[test]
    fn classify_commit_scenarios() {
        assert_eq!(classify_commit("parent/0"), Some(CommitPath::Parent(0)));
        assert_eq!(classify_commit("parent/100/12"), None);
        assert_eq!(classify_commit("parent/test"), None);
        assert_eq!(classify_commit(""), Some(CommitPath::Root));
        assert_eq!(classify_commit("tree/src/a"), Some(CommitPath::Tree("src/a".to_string())));
        assert_eq!(classify_commit("message"), Some(CommitPath::Message));
        assert_eq!(classify_commit("/message"), Some(CommitPath::Message));
        assert_eq!(classify_commit("tree"), Some(CommitPath::Tree(String::new())));
        assert_eq!(classify_commit("08739d56c85059420/a42cbb342ccf4e68"), None);
    }

    #[test]
    fn dir_and_base_splits_nested_refs() {
        assert_eq!(dir_and_base("fix/bug/1"), ("fix/bug".to_string(), "1".to_string()));
        assert_eq!(dir_and_base("master"), (String::new(), "master".to_string()));
    }
}
