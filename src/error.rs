// SPDX-License-Identifier: MPL-2.0

//! Errors of the ext2 tools.
//!
//! Every variant is terminal to the operation that raised it. The backing
//! store is an in-memory buffer, so failures are deterministic validation or
//! exhaustion failures and nothing is ever retried.
//!
//! Each variant maps to exactly one errno through [`Ext2Error::errno`], which
//! the command-line shell uses as its exit code.

use thiserror::Error;

/// The error type for all image operations.
#[derive(Debug, Error)]
pub enum Ext2Error {
    /// The path is not absolute or has no final component.
    #[error("invalid path '{0}': expected an absolute path")]
    InvalidPath(String),

    /// A path component or directory entry does not exist.
    #[error("no such file or directory: {0}")]
    NotFound(String),

    /// The destination name is already taken.
    #[error("file exists: {0}")]
    AlreadyExists(String),

    /// The operation does not accept a directory.
    #[error("is a directory: {0}")]
    IsDirectory(String),

    /// The operation needs a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A name exceeds the 255 bytes a directory entry can hold.
    #[error("file name too long: {0}")]
    NameTooLong(String),

    /// The content does not fit into direct plus single-indirect blocks.
    #[error("file too large: {len} bytes exceeds {max} bytes")]
    FileTooLarge { len: usize, max: usize },

    /// The block bitmap or the inode bitmap is exhausted.
    #[error("no space left on image: {0}")]
    NoSpace(&'static str),

    /// The deleted entry cannot be recovered.
    #[error("cannot restore '{name}': {reason}")]
    CannotRestore { name: String, reason: &'static str },

    /// The image file does not exist or cannot be opened.
    #[error("disk image '{0}' not found")]
    ImageNotFound(String),

    /// The image file was opened but could not be loaded as an image.
    #[error("failed to map disk image: {0}")]
    MapFailed(String),

    /// The requested image geometry cannot be formatted.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The image metadata is structurally invalid.
    #[error("corrupted image: {0}")]
    Corrupted(String),

    /// Writing the image back failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Ext2Error {
    /// Returns the POSIX errno for this error.
    pub fn errno(&self) -> i32 {
        match self {
            Self::InvalidPath(_) => 22,         // EINVAL
            Self::NotFound(_) => 2,             // ENOENT
            Self::AlreadyExists(_) => 17,       // EEXIST
            Self::IsDirectory(_) => 21,         // EISDIR
            Self::NotADirectory(_) => 20,       // ENOTDIR
            Self::NameTooLong(_) => 36,         // ENAMETOOLONG
            Self::FileTooLarge { .. } => 27,    // EFBIG
            Self::NoSpace(_) => 28,             // ENOSPC
            Self::CannotRestore { .. } => 1,    // EPERM
            Self::ImageNotFound(_) => 2,        // ENOENT
            Self::MapFailed(_) => 5,            // EIO
            Self::InvalidGeometry(_) => 22,     // EINVAL
            Self::Corrupted(_) => 117,          // EUCLEAN
            Self::Io(_) => 5,                   // EIO
        }
    }
}

pub type Result<T> = core::result::Result<T, Ext2Error>;
