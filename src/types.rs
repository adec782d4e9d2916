//! Shared result shapes produced by the archive adapter and the git
//! projector, and consumed by the root dispatcher (spec §3, "Directory
//! entry").

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Directory,
    File,
    Symlink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub kind: Kind,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub kind: Kind,
    pub size: u64,
}

impl Entry {
    pub fn dir(name: impl Into<String>) -> Self {
        Entry { name: name.into(), kind: Kind::Directory, size: 0 }
    }

    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Entry { name: name.into(), kind: Kind::File, size }
    }

    pub fn symlink(name: impl Into<String>) -> Self {
        Entry { name: name.into(), kind: Kind::Symlink, size: 0 }
    }
}
