// SPDX-License-Identifier: MPL-2.0

//! A minimal Rust Ext2 toolkit.
//!
//! The Second Extended File System(Ext2) is a major rewrite of the Ext filesystem.
//! It is the predominant filesystem in use by Linux from the early 1990s to the early 2000s.
//!
//! This crate works on a raw single-group image held in memory, with no
//! mount layer and no cache: each operation reads and mutates the image bytes
//! directly. Removed files are tombstoned rather than erased, so they can be
//! restored while their blocks are not reused, and a checker repairs the
//! inconsistencies between the bitmaps, the counters and the directories.
//!
//! # Example
//!
//! ```no_run
//! use ext2_tools::{Ext2, FormatOptions};
//!
//! // Formats a 128 KiB image and saves it.
//! let mut ext2 = Ext2::format(FormatOptions::default())?;
//! ext2.mkdir("/docs")?;
//! ext2.copy_in("/docs/hello.txt", "hello.txt", b"Hello, World")?;
//! ext2.sync_to("disk.img")?;
//!
//! // Removes the file and brings it back.
//! let mut ext2 = Ext2::open("disk.img")?;
//! ext2.unlink("/docs/hello.txt")?;
//! ext2.restore("/docs/hello.txt")?;
//! assert!(ext2.check()?.is_clean());
//! ext2.sync()?;
//! # Ok::<(), ext2_tools::Ext2Error>(())
//! ```

#[macro_use]
extern crate log;

pub use self::{
    bitmap::Bitmap,
    block_group::GroupDescriptor,
    checker::{CheckReport, Fix},
    dir::{DirEntry, DirEntryFileType},
    dump::{DirBlockSummary, ImageSummary, InodeSummary},
    error::{Ext2Error, Result},
    format::FormatOptions,
    fs::Ext2,
    inode::{FilePerm, FileType, Inode, LOST_AND_FOUND_INO, ROOT_INO},
    super_block::{SuperBlock, MAGIC_NUM},
    utils::{SystemClock, TimeProvider, UnixTime},
};

mod bio;
mod bitmap;
mod block_group;
mod block_ptr;
mod checker;
mod content;
mod dir;
mod dump;
mod error;
mod format;
mod fs;
mod inode;
mod link;
mod mkdir;
mod path;
mod prelude;
mod restore;
mod super_block;
mod unlink;
mod utils;

#[cfg(test)]
mod test;
