//! The three externally visible error conditions (spec §7).
//!
//! Everything below the router speaks `anyhow::Result`, the teacher's
//! convention throughout `filesystem.rs` and `git.rs`. This enum exists only
//! at the router/adaptor boundary, where the kernel protocol needs a closed
//! taxonomy rather than an open-ended error chain.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteError {
    /// No such path.
    NotFound,
    /// I/O error during a read, or a malformed offset.
    Invalid,
    /// Operation not meaningful on this path (e.g. opening a virtual directory).
    NotSupported,
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::NotFound => write!(f, "not found"),
            RouteError::Invalid => write!(f, "invalid"),
            RouteError::NotSupported => write!(f, "not supported"),
        }
    }
}

impl std::error::Error for RouteError {}

/// Any failure from the archive or git layers collapses to `NotFound` at the
/// router boundary (spec §7), since those layers' errors are opaque to us.
/// Callers that are mid-read and hit this should prefer `RouteError::Invalid`
/// directly rather than going through this conversion.
impl From<anyhow::Error> for RouteError {
    fn from(err: anyhow::Error) -> Self {
        log::debug!("collapsing backing-layer error to not-found: {err:#}");
        RouteError::NotFound
    }
}

impl RouteError {
    /// The errno this condition is reported to the kernel as.
    pub fn errno(self) -> libc::c_int {
        match self {
            RouteError::NotFound => libc::ENOENT,
            RouteError::Invalid => libc::EIO,
            RouteError::NotSupported => libc::ENOSYS,
        }
    }
}
