//! The archive decoder (spec §6, "Archive decoder — consumed").
//!
//! `spec.md` treats the `.siva` container format as out of scope (§1) and
//! specifies only the interface the core needs: `stat`, `enumerate`, `open`,
//! built from a host-level read-only byte source plus an isolated scratch
//! workspace (§3, §4.2). The real go-siva container is a sequence of
//! concatenated packfile-style blocks with a trailing index; reproducing it
//! bit-for-bit is explicitly not this crate's job. What follows is a small,
//! internally consistent sequential container that satisfies the same
//! interface: a flat list of `(path, bytes)` records terminated by EOF, with
//! no directory records of its own — directories are inferred from path
//! prefixes, which is also why a real decoder can fail to stat one (§4.2,
//! §9 "Directory stat fallback").
//!
//! On open, any entry that looks like part of a bare git repository
//! (`HEAD`, `packed-refs`, `objects/**`, `refs/**`) is also materialized
//! into the scratch workspace, because the git layer (`git2`) needs a real
//! path on disk to open a repository from.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tempfile::TempDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryStat {
    pub kind: EntryKind,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
}

/// A readable, seekable view over one decoded file's bytes.
pub struct ByteStream {
    data: Vec<u8>,
}

impl ByteStream {
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Positional read: the substring `[offset, offset+len)`, clipped to the
    /// stream's length (spec §6).
    pub fn read_at(&self, offset: u64, len: u32) -> &[u8] {
        let start = (offset as usize).min(self.data.len());
        let end = start.saturating_add(len as usize).min(self.data.len());
        &self.data[start..end]
    }
}

/// Operations the core consumes from an archive decoder (spec §6).
pub trait ArchiveDecoder {
    fn stat(&self, path: &str) -> Result<Option<EntryStat>>;
    fn enumerate(&self, path: &str) -> Result<Option<Vec<DecodedEntry>>>;
    fn open(&self, path: &str) -> Result<ByteStream>;
    /// Root of the materialized bare git repository, if this archive
    /// contains one. `None` when the archive has no git-shaped entries.
    fn git_root(&self) -> Option<&Path>;
}

struct Record {
    path: String,
    data: Vec<u8>,
}

/// A lazily-opened `.siva` archive: a flat record list plus the scratch
/// workspace any git-shaped entries were materialized into.
pub struct SivaArchive {
    records: Vec<Record>,
    _scratch: TempDir,
    git_root: Option<PathBuf>,
}

impl SivaArchive {
    pub fn open(host_path: &Path) -> Result<Self> {
        let bytes = fs::read(host_path)
            .with_context(|| format!("reading siva archive {}", host_path.display()))?;
        let records = parse_records(&bytes)
            .with_context(|| format!("decoding siva archive {}", host_path.display()))?;

        let scratch = tempfile::tempdir().context("provisioning archive scratch workspace")?;
        let mut has_git = false;

        for record in &records {
            if is_git_repo_path(&record.path) {
                has_git = true;
                let dest = scratch.path().join(&record.path);
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&dest, &record.data)?;
            }
        }

        let git_root = has_git.then(|| scratch.path().to_path_buf());

        Ok(Self { records, _scratch: scratch, git_root })
    }

    fn normalize(path: &str) -> &str {
        path.trim_start_matches('/').trim_end_matches('/')
    }
}

impl ArchiveDecoder for SivaArchive {
    fn stat(&self, path: &str) -> Result<Option<EntryStat>> {
        let path = Self::normalize(path);
        Ok(self.records.iter().find(|r| r.path == path).map(|r| EntryStat {
            kind: EntryKind::File,
            size: r.data.len() as u64,
        }))
    }

    fn enumerate(&self, path: &str) -> Result<Option<Vec<DecodedEntry>>> {
        let prefix = Self::normalize(path);
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();

        for record in &self.records {
            let rest = if prefix.is_empty() {
                Some(record.path.as_str())
            } else {
                record
                    .path
                    .strip_prefix(prefix)
                    .and_then(|r| r.strip_prefix('/'))
            };

            let Some(rest) = rest else { continue };
            if rest.is_empty() {
                continue;
            }

            let (name, is_dir) = match rest.split_once('/') {
                Some((head, _)) => (head, true),
                None => (rest, false),
            };

            if !seen.insert(name.to_string()) {
                continue;
            }

            let (kind, size) = if is_dir {
                (EntryKind::Directory, 0)
            } else {
                (EntryKind::File, record.data.len() as u64)
            };

            out.push(DecodedEntry { name: name.to_string(), kind, size });
        }

        if out.is_empty() && !prefix.is_empty() {
            // Distinguish "directory with nothing in it" (unreachable, since
            // we never record empty directories) from "no such path".
            return Ok(None);
        }

        Ok(Some(out))
    }

    fn open(&self, path: &str) -> Result<ByteStream> {
        let path = Self::normalize(path);
        let record = self
            .records
            .iter()
            .find(|r| r.path == path)
            .with_context(|| format!("no such entry in archive: {path}"))?;
        Ok(ByteStream { data: record.data.clone() })
    }

    fn git_root(&self) -> Option<&Path> {
        self.git_root.as_deref()
    }
}

fn is_git_repo_path(path: &str) -> bool {
    path == "HEAD" || path == "packed-refs" || path.starts_with("objects/") || path.starts_with("refs/")
}

/// Parse the sequential `[u32 path_len][path][u8 kind][u64 data_len][data]`
/// records that make up this crate's minimal archive container.
fn parse_records(bytes: &[u8]) -> Result<Vec<Record>> {
    let mut cursor = io::Cursor::new(bytes);
    let mut records = Vec::new();

    while (cursor.position() as usize) < bytes.len() {
        let path_len = read_u32(&mut cursor)?;
        let mut path_buf = vec![0u8; path_len as usize];
        cursor.read_exact(&mut path_buf).context("truncated record path")?;
        let path = String::from_utf8(path_buf).context("non-utf8 record path")?;

        let mut kind_buf = [0u8; 1];
        cursor.read_exact(&mut kind_buf).context("truncated record kind")?;
        if kind_buf[0] != 0 {
            bail!("unsupported record kind byte: {}", kind_buf[0]);
        }

        let data_len = read_u64(&mut cursor)?;
        let mut data = vec![0u8; data_len as usize];
        cursor.read_exact(&mut data).context("truncated record data")?;

        records.push(Record { path, data });
    }

    Ok(records)
}

fn read_u32(cursor: &mut io::Cursor<&[u8]>) -> Result<u32> {
    let mut buf = [0u8; 4];
    cursor.read_exact(&mut buf).context("truncated u32 length")?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(cursor: &mut io::Cursor<&[u8]>) -> Result<u64> {
    let mut buf = [0u8; 8];
    cursor.read_exact(&mut buf).context("truncated u64 length")?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
pub(crate) fn encode_records(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (path, data) in entries {
        out.extend_from_slice(&(path.len() as u32).to_le_bytes());
        out.extend_from_slice(path.as_bytes());
        out.push(0u8);
        out.extend_from_slice(&(data.len() as u64).to_le_bytes());
        out.extend_from_slice(data);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_archive(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(&encode_records(entries)).unwrap();
        path
    }

    #[test]
    fn stat_and_enumerate_flat_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_archive(
            dir.path(),
            "repo.siva",
            &[("a/b.txt", b"hello"), ("a/c.txt", b"world!!")],
        );

        let archive = SivaArchive::open(&path).unwrap();

        let stat = archive.stat("a/b.txt").unwrap().unwrap();
        assert_eq!(stat.kind, EntryKind::File);
        assert_eq!(stat.size, 5);

        // "a" itself has no record and cannot be stat'd directly.
        assert_eq!(archive.stat("a").unwrap(), None);

        let listing = archive.enumerate("").unwrap().unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "a");
        assert_eq!(listing[0].kind, EntryKind::Directory);

        let inner = archive.enumerate("a").unwrap().unwrap();
        let mut names: Vec<_> = inner.iter().map(|e| e.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["b.txt".to_string(), "c.txt".to_string()]);
    }

    #[test]
    fn enumerate_of_missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_archive(dir.path(), "repo.siva", &[("a/b.txt", b"hi")]);
        let archive = SivaArchive::open(&path).unwrap();
        assert_eq!(archive.enumerate("nope").unwrap(), None);
    }

    #[test]
    fn open_reads_full_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_archive(dir.path(), "repo.siva", &[("msg.txt", b"payload")]);
        let archive = SivaArchive::open(&path).unwrap();
        let stream = archive.open("msg.txt").unwrap();
        assert_eq!(stream.read_at(0, 7), b"payload");
        assert_eq!(stream.read_at(3, 100), b"load");
    }

    #[test]
    fn git_shaped_entries_are_materialized_into_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_archive(
            dir.path(),
            "repo.siva",
            &[("HEAD", b"ref: refs/heads/master\n"), ("objects/pack/pack-x.pack", b"PACK")],
        );
        let archive = SivaArchive::open(&path).unwrap();
        let root = archive.git_root().expect("archive has git-shaped entries");
        assert!(root.join("HEAD").exists());
        assert!(root.join("objects/pack/pack-x.pack").exists());
    }

    #[test]
    fn archive_without_git_entries_has_no_git_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_archive(dir.path(), "repo.siva", &[("README.md", b"hi")]);
        let archive = SivaArchive::open(&path).unwrap();
        assert!(archive.git_root().is_none());
    }
}
