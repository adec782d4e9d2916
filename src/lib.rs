//! `sivafs`: a read-only FUSE filesystem exposing `.siva` archive files as
//! directories, with the git history inside each one projected as a
//! synthetic tree of branches, tags, and commits.
//!
//! The crate is layered so the FUSE boundary is as thin as possible:
//! [`path`] classifies a path string with no I/O at all, [`archive`] and
//! [`git`] answer questions about one archive's contents, [`router`]
//! composes the two into the four operations a filesystem needs, and
//! [`fuse_adapter`] is the only module that knows about inodes, `fuser`, or
//! the kernel protocol.

pub mod archive;
pub mod error;
pub mod fuse_adapter;
pub mod git;
pub mod path;
pub mod router;
pub mod types;
