//! Archive mount adapter (spec §4.2).
//!
//! Opens a `.siva` archive lazily, answers stat/enumerate/open against its
//! contents, splices the three synthetic `_branch_`/`_tag_`/`_commit_`
//! entries into its root listing, and applies the directory-stat fallback
//! the real go-siva decoder needs (§4.2, §9).

pub mod decoder;

use std::path::Path;

use anyhow::Result;

use crate::git::GitView;
use crate::path::RefKind;
use crate::types::{Entry, Kind, Stat};
use decoder::{ArchiveDecoder, ByteStream, EntryKind, SivaArchive};

const KIND_ROOTS: [RefKind; 3] = [RefKind::Branch, RefKind::Tag, RefKind::Commit];

/// An opened archive: the decoded byte source plus whatever scratch
/// workspace the decoder provisioned for it (spec §3, "Archive handle").
pub struct ArchiveHandle {
    decoder: SivaArchive,
}

impl ArchiveHandle {
    pub fn open(host_path: &Path) -> Result<Self> {
        Ok(Self { decoder: SivaArchive::open(host_path)? })
    }

    /// Stat a path inside the archive, applying the directory-stat fallback:
    /// a failed stat is retried as an enumeration, and a non-empty
    /// enumeration is reported as a directory (spec §4.2, §9).
    pub fn stat(&self, inner: &str) -> Result<Option<Stat>> {
        if let Some(entry_stat) = self.decoder.stat(inner)? {
            return Ok(Some(Stat {
                kind: match entry_stat.kind {
                    EntryKind::File => Kind::File,
                    EntryKind::Directory => Kind::Directory,
                },
                size: entry_stat.size,
            }));
        }

        match self.enumerate(inner)? {
            Some(entries) if !entries.is_empty() => Ok(Some(Stat { kind: Kind::Directory, size: 0 })),
            _ => Ok(None),
        }
    }

    /// Enumerate a directory inside the archive, splicing the three
    /// kind-root entries into the archive root listing (spec §4.2).
    pub fn enumerate(&self, inner: &str) -> Result<Option<Vec<Entry>>> {
        let Some(decoded) = self.decoder.enumerate(inner)? else { return Ok(None) };

        let mut entries: Vec<Entry> = decoded
            .into_iter()
            .map(|d| Entry {
                name: d.name,
                kind: match d.kind {
                    EntryKind::File => Kind::File,
                    EntryKind::Directory => Kind::Directory,
                },
                size: d.size,
            })
            .collect();

        if inner.trim_start_matches('/').is_empty() {
            for kind in KIND_ROOTS {
                entries.push(Entry::dir(kind.dir_name()));
            }
        }

        Ok(Some(entries))
    }

    pub fn open(&self, inner: &str) -> Result<ByteStream> {
        self.decoder.open(inner)
    }

    /// Open the git view layered over this archive, if it contains one.
    /// Borrowed fresh per operation (spec §3: "Git view ... lifetime
    /// subordinate to the archive handle"; §5: each operation releases the
    /// resources it opened before returning).
    pub fn git(&self) -> Result<Option<GitView>> {
        match self.decoder.git_root() {
            Some(root) => Ok(Some(GitView::open(root)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_archive(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, decoder::encode_records(entries)).unwrap();
        path
    }

    #[test]
    fn root_listing_splices_kind_roots() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_archive(dir.path(), "repo.siva", &[("README.md", b"hi")]);
        let handle = ArchiveHandle::open(&path).unwrap();

        let listing = handle.enumerate("").unwrap().unwrap();
        let names: std::collections::HashSet<_> = listing.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains("README.md"));
        assert!(names.contains("_branch_"));
        assert!(names.contains("_tag_"));
        assert!(names.contains("_commit_"));
    }

    #[test]
    fn directory_fallback_treats_non_empty_enumeration_as_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_archive(dir.path(), "repo.siva", &[("a/b.txt", b"hi")]);
        let handle = ArchiveHandle::open(&path).unwrap();

        // "a" has no direct record, so decoder.stat("a") fails; the fallback
        // enumerates it and finds "b.txt" inside.
        let stat = handle.stat("a").unwrap().unwrap();
        assert_eq!(stat.kind, Kind::Directory);
    }

    #[test]
    fn directory_fallback_reports_not_found_for_empty_enumeration() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_archive(dir.path(), "repo.siva", &[("a/b.txt", b"hi")]);
        let handle = ArchiveHandle::open(&path).unwrap();
        assert_eq!(handle.stat("nonexistent").unwrap(), None);
    }

    #[test]
    fn archive_without_git_has_no_git_view() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_archive(dir.path(), "repo.siva", &[("README.md", b"hi")]);
        let handle = ArchiveHandle::open(&path).unwrap();
        assert!(handle.git().unwrap().is_none());
    }
}
