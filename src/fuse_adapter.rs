//! Kernel protocol adaptor: the only module aware of `fuser`, inode numbers,
//! or `libc`'s attribute/errno vocabulary. Everything below this is path-
//! based, per spec.md §6 (archive decoder and git layer are "consumed", the
//! router's four operations are path-in, result-out).
//!
//! `fuser::Filesystem` is inode-addressed; `Router` is path-addressed. This
//! module bridges the two with an inode table that assigns a stable ino to
//! every path the kernel has looked up so far, the same translation the
//! original Go implementation's `pathfs.FileSystem` avoided needing (it
//! spoke paths directly to FUSE) but `fuser` requires.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEntry, ReplyOpen,
    Request,
};

use crate::router::Router;
use crate::types::Kind;

const TTL: Duration = Duration::from_secs(1);
const ROOT_INO: u64 = 1;

/// Bidirectional ino <-> path table. Paths are `/`-separated, without a
/// leading slash; the root is the empty string.
struct InodeTable {
    paths: Vec<String>,
    index: HashMap<String, u64>,
}

impl InodeTable {
    fn new() -> Self {
        Self { paths: vec![String::new()], index: HashMap::from([(String::new(), ROOT_INO)]) }
    }

    fn path_of(&self, ino: u64) -> Option<&str> {
        self.paths.get((ino - 1) as usize).map(String::as_str)
    }

    /// Assign (or reuse) the ino for `path`.
    fn ino_for(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.index.get(path) {
            return ino;
        }
        self.paths.push(path.to_string());
        let ino = self.paths.len() as u64;
        self.index.insert(path.to_string(), ino);
        ino
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// The `fuser::Filesystem` implementation. Holds the path-based [`Router`]
/// and the inode table that translates the kernel's ino-addressed requests
/// into the router's path-addressed operations.
pub struct SivaFs {
    router: Router,
    inodes: Mutex<InodeTable>,
}

impl SivaFs {
    pub fn new(router: Router) -> Self {
        Self { router, inodes: Mutex::new(InodeTable::new()) }
    }

    fn attr_for(&self, ino: u64, kind: Kind, size: u64) -> FileAttr {
        let (file_type, perm) = match kind {
            Kind::Directory => (FileType::Directory, 0o500),
            Kind::File => (FileType::RegularFile, 0o400),
            Kind::Symlink => (FileType::Symlink, 0o500),
        };

        let now = SystemTime::now();
        let epoch = UNIX_EPOCH;

        FileAttr {
            ino,
            size,
            blocks: size.div_ceil(512),
            atime: now,
            mtime: epoch,
            ctime: epoch,
            crtime: epoch,
            kind: file_type,
            perm,
            nlink: if file_type == FileType::Directory { 2 } else { 1 },
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            rdev: 0,
            blksize: 512,
            flags: 0,
        }
    }
}

impl Filesystem for SivaFs {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };

        let parent_path = {
            let inodes = self.inodes.lock().unwrap();
            match inodes.path_of(parent) {
                Some(p) => p.to_string(),
                None => {
                    reply.error(libc::ENOENT);
                    return;
                }
            }
        };

        let child_path = join(&parent_path, name);

        match self.router.stat(&child_path) {
            Ok(stat) => {
                let ino = self.inodes.lock().unwrap().ino_for(&child_path);
                reply.entry(&TTL, &self.attr_for(ino, stat.kind, stat.size), 0);
            }
            Err(err) => reply.error(err.errno()),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let path = {
            let inodes = self.inodes.lock().unwrap();
            match inodes.path_of(ino) {
                Some(p) => p.to_string(),
                None => {
                    reply.error(libc::ENOENT);
                    return;
                }
            }
        };

        match self.router.stat(&path) {
            Ok(stat) => reply.attr(&TTL, &self.attr_for(ino, stat.kind, stat.size)),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn readdir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let path = {
            let inodes = self.inodes.lock().unwrap();
            match inodes.path_of(ino) {
                Some(p) => p.to_string(),
                None => {
                    reply.error(libc::ENOENT);
                    return;
                }
            }
        };

        let entries = match self.router.readdir(&path) {
            Ok(entries) => entries,
            Err(err) => {
                reply.error(err.errno());
                return;
            }
        };

        let mut listing = vec![
            (ino, FileType::Directory, ".".to_string()),
            (ino, FileType::Directory, "..".to_string()),
        ];

        {
            let mut inodes = self.inodes.lock().unwrap();
            for entry in &entries {
                let child_path = join(&path, &entry.name);
                let child_ino = inodes.ino_for(&child_path);
                let file_type = match entry.kind {
                    Kind::Directory => FileType::Directory,
                    Kind::File => FileType::RegularFile,
                    Kind::Symlink => FileType::Symlink,
                };
                listing.push((child_ino, file_type, entry.name.clone()));
            }
        }

        for (i, (child_ino, file_type, name)) in listing.into_iter().enumerate().skip(offset as usize) {
            if reply.add(child_ino, (i + 1) as i64, file_type, name) {
                break;
            }
        }

        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let path = {
            let inodes = self.inodes.lock().unwrap();
            match inodes.path_of(ino) {
                Some(p) => p.to_string(),
                None => {
                    reply.error(libc::ENOENT);
                    return;
                }
            }
        };

        match self.router.stat(&path) {
            Ok(stat) if stat.kind == Kind::File => reply.opened(0, 0),
            Ok(_) => reply.error(libc::ENOSYS),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let path = {
            let inodes = self.inodes.lock().unwrap();
            match inodes.path_of(ino) {
                Some(p) => p.to_string(),
                None => {
                    reply.error(libc::ENOENT);
                    return;
                }
            }
        };

        match self.router.read(&path, offset.max(0) as u64, size) {
            Ok(data) => reply.data(&data),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        let path = {
            let inodes = self.inodes.lock().unwrap();
            match inodes.path_of(ino) {
                Some(p) => p.to_string(),
                None => {
                    reply.error(libc::ENOENT);
                    return;
                }
            }
        };

        match self.router.readlink(&path) {
            Ok(target) => reply.data(target.as_bytes()),
            Err(err) => reply.error(err.errno()),
        }
    }
}
