//! Root dispatcher (spec §4.4): the four externally visible filesystem
//! operations, routed through the path classifier to the host filesystem,
//! the archive adapter, or the git projector.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::archive::ArchiveHandle;
use crate::error::RouteError;
use crate::git::projector;
use crate::path::{self, CommitPath, GitPath, RefKind};
use crate::types::{Entry, Kind, Stat};

type Result<T> = std::result::Result<T, RouteError>;

/// The root dispatcher. Owns the host root and a cache of opened archive
/// handles keyed by their host-relative path (spec §5, §9: "Per-request
/// archive open ... implementations are free to introduce a bounded cache").
pub struct Router {
    host_root: PathBuf,
    archives: Mutex<HashMap<String, Arc<ArchiveHandle>>>,
}

impl Router {
    pub fn new(host_root: PathBuf) -> Self {
        Self { host_root, archives: Mutex::new(HashMap::new()) }
    }

    fn host_join(&self, rel: &str) -> PathBuf {
        if rel.is_empty() {
            self.host_root.clone()
        } else {
            self.host_root.join(rel)
        }
    }

    fn archive_handle(&self, fs_path: &str) -> Result<Arc<ArchiveHandle>> {
        if let Some(existing) = self.archives.lock().unwrap().get(fs_path) {
            return Ok(existing.clone());
        }

        let handle = Arc::new(
            ArchiveHandle::open(&self.host_join(fs_path)).map_err(|_| RouteError::NotFound)?,
        );
        self.archives.lock().unwrap().insert(fs_path.to_string(), handle.clone());
        Ok(handle)
    }

    pub fn stat(&self, path: &str) -> Result<Stat> {
        let split = path::split_archive(path);

        if !split.is_archive {
            return stat_host(&self.host_join(&split.host_path));
        }

        if let Some(git_path) = path::classify_git(&split.inner_path) {
            if git_path.ref_or_hash.is_empty() {
                return Ok(projector::kind_root_entry());
            }
            return self.stat_git(&split.host_path, &git_path);
        }

        let handle = self.archive_handle(&split.host_path)?;
        handle.stat(&split.inner_path)?.ok_or(RouteError::NotFound)
    }

    pub fn readdir(&self, path: &str) -> Result<Vec<Entry>> {
        let split = path::split_archive(path);

        if !split.is_archive {
            return readdir_host(&self.host_join(&split.host_path));
        }

        if let Some(git_path) = path::classify_git(&split.inner_path) {
            let handle = self.archive_handle(&split.host_path)?;
            return self.readdir_git(&handle, &git_path);
        }

        let handle = self.archive_handle(&split.host_path)?;
        handle.enumerate(&split.inner_path)?.ok_or(RouteError::NotFound)
    }

    pub fn read(&self, path: &str, offset: u64, size: u32) -> Result<Vec<u8>> {
        let split = path::split_archive(path);

        if !split.is_archive {
            return read_host(&self.host_join(&split.host_path), offset, size);
        }

        if let Some(git_path) = path::classify_git(&split.inner_path) {
            if git_path.kind != RefKind::Commit {
                return Err(RouteError::NotSupported);
            }
            let commit_path = path::classify_commit(&git_path.inner).ok_or(RouteError::NotFound)?;
            if commit_path != CommitPath::Message {
                return Err(RouteError::NotSupported);
            }

            let handle = self.archive_handle(&split.host_path)?;
            let view = handle.git()?.ok_or(RouteError::NotFound)?;
            let text = projector::commit_message(&view, &git_path.ref_or_hash)?;
            let start = (offset as usize).min(text.len());
            let end = start.saturating_add(size as usize).min(text.len());
            return Ok(text[start..end].to_vec());
        }

        let handle = self.archive_handle(&split.host_path)?;
        let stream = handle.open(&split.inner_path)?;
        Ok(stream.read_at(offset, size).to_vec())
    }

    pub fn readlink(&self, path: &str) -> Result<String> {
        let split = path::split_archive(path);
        if !split.is_archive {
            return Err(RouteError::NotFound);
        }

        let git_path = path::classify_git(&split.inner_path).ok_or(RouteError::NotFound)?;
        if !matches!(git_path.kind, RefKind::Branch | RefKind::Tag) {
            return Err(RouteError::NotFound);
        }

        let handle = self.archive_handle(&split.host_path)?;
        let view = handle.git()?.ok_or(RouteError::NotFound)?;
        let ref_path = join_ref(&git_path);
        projector::readlink_ref(&view, git_path.kind, &ref_path)?.ok_or(RouteError::NotFound)
    }

    fn stat_git(&self, fs_path: &str, git_path: &GitPath) -> Result<Stat> {
        let handle = self.archive_handle(fs_path)?;
        let view = handle.git()?.ok_or(RouteError::NotFound)?;

        match git_path.kind {
            RefKind::Commit => {
                let subtree =
                    path::classify_commit(&git_path.inner).ok_or(RouteError::NotFound)?;
                projector::stat_commit_subtree(&view, &git_path.ref_or_hash, &subtree)?
                    .ok_or(RouteError::NotFound)
            }
            RefKind::Branch | RefKind::Tag => {
                let ref_path = join_ref(git_path);
                projector::stat_ref(&view, git_path.kind, &ref_path)?.ok_or(RouteError::NotFound)
            }
        }
    }

    fn readdir_git(&self, handle: &ArchiveHandle, git_path: &GitPath) -> Result<Vec<Entry>> {
        let view = handle.git()?.ok_or(RouteError::NotFound)?;

        match git_path.kind {
            RefKind::Commit if git_path.ref_or_hash.is_empty() => Ok(projector::list_commits(&view)?),
            RefKind::Commit => {
                let subtree = path::classify_commit(&git_path.inner).ok_or(RouteError::NotFound)?;
                match subtree {
                    CommitPath::Root => Ok(vec![
                        Entry::file("message", 0),
                        Entry::dir("parent"),
                        Entry::dir("tree"),
                    ]),
                    CommitPath::ParentDir => {
                        Ok(projector::list_commit_parents(&view, &git_path.ref_or_hash)?)
                    }
                    CommitPath::Tree(path) => {
                        projector::list_commit_tree(&view, &git_path.ref_or_hash, &path)?
                            .ok_or(RouteError::NotFound)
                    }
                    CommitPath::Message | CommitPath::Parent(_) => Err(RouteError::NotSupported),
                }
            }
            RefKind::Branch | RefKind::Tag => {
                Ok(projector::list_refs(&view, git_path.kind, &git_path.ref_or_hash)?)
            }
        }
    }
}

/// Rejoin a classified git path's `ref` and `inner` into the single
/// `/`-separated reference path the projector expects.
fn join_ref(git_path: &GitPath) -> String {
    if git_path.inner.is_empty() {
        git_path.ref_or_hash.clone()
    } else {
        format!("{}/{}", git_path.ref_or_hash, git_path.inner)
    }
}

fn stat_host(host_path: &Path) -> Result<Stat> {
    let meta = fs::symlink_metadata(host_path).map_err(|_| RouteError::NotFound)?;
    let kind = host_kind(host_path, &meta);
    let size = if kind == Kind::Directory { 0 } else { meta.len() };
    Ok(Stat { kind, size })
}

fn readdir_host(host_path: &Path) -> Result<Vec<Entry>> {
    let read_dir = fs::read_dir(host_path).map_err(|_| RouteError::NotFound)?;
    let mut out = Vec::new();

    for entry in read_dir {
        let entry = entry.map_err(|_| RouteError::Invalid)?;
        let meta = entry.metadata().map_err(|_| RouteError::Invalid)?;
        let name = entry.file_name().to_string_lossy().to_string();
        let kind = host_kind(&entry.path(), &meta);
        let size = if kind == Kind::Directory { 0 } else { meta.len() };
        out.push(Entry { name, kind, size });
    }

    Ok(out)
}

fn read_host(host_path: &Path, offset: u64, size: u32) -> Result<Vec<u8>> {
    use std::io::{Read, Seek, SeekFrom};

    let mut file = fs::File::open(host_path).map_err(|_| RouteError::NotFound)?;
    file.seek(SeekFrom::Start(offset)).map_err(|_| RouteError::Invalid)?;

    let mut buf = vec![0u8; size as usize];
    let read = file.read(&mut buf).map_err(|_| RouteError::Invalid)?;
    buf.truncate(read);
    Ok(buf)
}

/// `<any>.siva` host entries always present as directories (spec §3 and §6),
/// even though the underlying host object is a regular file.
fn host_kind(path: &Path, meta: &fs::Metadata) -> Kind {
    let looks_like_siva = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.len() > 5 && n.ends_with(".siva"));

    if looks_like_siva {
        Kind::Directory
    } else if meta.is_dir() {
        Kind::Directory
    } else if meta.file_type().is_symlink() {
        Kind::Symlink
    } else {
        Kind::File
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn host_paths_pass_through_untouched() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("plain.txt"), b"hello").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let router = Router::new(dir.path().to_path_buf());

        let file_stat = router.stat("plain.txt").unwrap();
        assert_eq!(file_stat.kind, Kind::File);
        assert_eq!(file_stat.size, 5);

        let dir_stat = router.stat("sub").unwrap();
        assert_eq!(dir_stat.kind, Kind::Directory);

        let listing = router.readdir("").unwrap();
        let names: std::collections::HashSet<_> = listing.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains("plain.txt"));
        assert!(names.contains("sub"));

        let bytes = router.read("plain.txt", 1, 3).unwrap();
        assert_eq!(bytes, b"ell");
    }

    #[test]
    fn a_siva_file_on_disk_stats_as_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("repo.siva");
        fs::write(&archive_path, crate::archive::decoder::encode_records(&[("a.txt", b"hi")])).unwrap();

        let router = Router::new(dir.path().to_path_buf());
        let stat = router.stat("repo.siva").unwrap();
        assert_eq!(stat.kind, Kind::Directory);
    }

    #[test]
    fn unknown_host_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let router = Router::new(dir.path().to_path_buf());
        assert_eq!(router.stat("nope").unwrap_err(), RouteError::NotFound);
    }
}
