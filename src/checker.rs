// SPDX-License-Identifier: MPL-2.0

//! The consistency checker.
//!
//! It reconciles the free counters with the bitmaps, then walks every
//! directory and repairs what its entries contradict: the type tag, the
//! allocation bit and the deletion time of the referenced inode, and the
//! allocation bits of that inode's blocks.

use core::fmt;

use crate::{
    bitmap::FIRST_FREE_INODE_IDX,
    dir::{DirEntryFileType, DirEntryWriter},
    fs::Ext2,
    inode::{Inode, ROOT_INO},
    prelude::*,
    utils::UnixTime,
};

/// One repair made by the checker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fix {
    /// The free blocks counters disagreed with the block bitmap by the given amounts.
    FreeBlocksCounter {
        superblock: Option<u32>,
        group: Option<u32>,
    },
    /// The free inodes counters disagreed with the inode bitmap by the given amounts.
    FreeInodesCounter {
        superblock: Option<u32>,
        group: Option<u32>,
    },
    /// An entry's type tag disagreed with its inode.
    EntryType { ino: u32 },
    /// A referenced inode was not marked in the inode bitmap.
    InodeNotInUse { ino: u32 },
    /// A referenced inode carried a deletion time.
    DeletionTime { ino: u32 },
    /// Blocks of a referenced inode were not marked in the block bitmap.
    UnmarkedBlocks { ino: u32, count: u32 },
}

impl Fix {
    /// Returns how many inconsistencies the fix accounts for.
    pub fn count(&self) -> u32 {
        match self {
            Self::FreeBlocksCounter { superblock, group }
            | Self::FreeInodesCounter { superblock, group } => {
                superblock.unwrap_or(0) + group.unwrap_or(0)
            }
            _ => 1,
        }
    }
}

impl fmt::Display for Fix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FreeBlocksCounter { superblock, group } => {
                write_counter_fix(f, "block", *superblock, *group)
            }
            Self::FreeInodesCounter { superblock, group } => {
                write_counter_fix(f, "inode", *superblock, *group)
            }
            Self::EntryType { ino } => {
                write!(f, "Fixed: Entry type vs inode mismatch: inode {}", ino)
            }
            Self::InodeNotInUse { ino } => {
                write!(f, "Fixed: inode {} not marked as in-use", ino)
            }
            Self::DeletionTime { ino } => {
                write!(f, "Fixed: valid inode marked for deletion: {}", ino)
            }
            Self::UnmarkedBlocks { ino, count } => write!(
                f,
                "Fixed: {} in-use data blocks not marked in data bitmap for inode: {}",
                count, ino
            ),
        }
    }
}

fn write_counter_fix(
    f: &mut fmt::Formatter<'_>,
    what: &str,
    superblock: Option<u32>,
    group: Option<u32>,
) -> fmt::Result {
    let mut first = true;
    for (owner, diff) in [("superblock", superblock), ("block group", group)] {
        let Some(diff) = diff else { continue };
        if !first {
            writeln!(f)?;
        }
        first = false;
        write!(
            f,
            "Fixed: {}'s free {} counter was off by {} compared to the bitmap",
            owner, what, diff
        )?;
    }
    Ok(())
}

/// The repairs made by one run of the checker.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckReport {
    fixes: Vec<Fix>,
}

impl CheckReport {
    pub fn fixes(&self) -> &[Fix] {
        &self.fixes
    }

    /// Returns the number of inconsistencies repaired.
    pub fn total(&self) -> u32 {
        self.fixes.iter().map(Fix::count).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.fixes.is_empty()
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fix in &self.fixes {
            writeln!(f, "{}", fix)?;
        }
        if self.is_clean() {
            write!(f, "No file system inconsistencies detected!")
        } else {
            write!(f, "{} file system inconsistencies repaired!", self.total())
        }
    }
}

impl Ext2 {
    /// Detects and repairs inconsistencies, in a single pass over each structure.
    pub fn check(&mut self) -> Result<CheckReport> {
        let ret = self.do_check();
        self.finish(ret)
    }

    fn do_check(&mut self) -> Result<CheckReport> {
        let mut report = CheckReport::default();
        if let Some(fix) = self.check_free_blocks()? {
            report.fixes.push(fix);
        }
        if let Some(fix) = self.check_free_inodes()? {
            report.fixes.push(fix);
        }
        for dir_ino in self.checked_dirs()? {
            let dir = self.read_inode(dir_ino)?;
            self.check_dir(&dir, &mut report)?;
        }
        for fix in &report.fixes {
            info!("{}", fix);
        }
        Ok(report)
    }

    fn check_free_blocks(&mut self) -> Result<Option<Fix>> {
        let free = self.block_bitmap()?.count_free() as u32;
        let superblock = diff(self.super_block.free_blocks_count(), free);
        let group = diff(self.group.free_blocks_count() as u32, free);
        if superblock.is_some() {
            self.super_block.set_free_blocks_count(free);
        }
        if group.is_some() {
            self.group.set_free_blocks_count(free as u16);
        }
        Ok((superblock.is_some() || group.is_some())
            .then_some(Fix::FreeBlocksCounter { superblock, group }))
    }

    fn check_free_inodes(&mut self) -> Result<Option<Fix>> {
        let free = self.inode_bitmap()?.count_free() as u32;
        let superblock = diff(self.super_block.free_inodes_count(), free);
        let group = diff(self.group.free_inodes_count() as u32, free);
        if superblock.is_some() {
            self.super_block.set_free_inodes_count(free);
        }
        if group.is_some() {
            self.group.set_free_inodes_count(free as u16);
        }
        Ok((superblock.is_some() || group.is_some())
            .then_some(Fix::FreeInodesCounter { superblock, group }))
    }

    /// Returns the root plus every allocated directory past the reserved inodes.
    fn checked_dirs(&self) -> Result<Vec<u32>> {
        let mut dirs = vec![ROOT_INO];
        let bitmap = self.inode_bitmap()?;
        for idx in FIRST_FREE_INODE_IDX..bitmap.len() {
            if !bitmap.is_allocated(idx) {
                continue;
            }
            let ino = idx as u32 + 1;
            if self.read_inode(ino)?.is_dir() {
                dirs.push(ino);
            }
        }
        Ok(dirs)
    }

    fn check_dir(&mut self, dir: &Inode, report: &mut CheckReport) -> Result<()> {
        if !dir.is_dir() {
            warn!("inode {} is checked as a directory but is not one", dir.ino());
            return Ok(());
        }
        let entries = match self.dir_entries(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("entries of dir {} are unreadable: {}", dir.ino(), err);
                return Ok(());
            }
        };
        for (bid, offset, entry) in entries {
            let ino = entry.ino();
            if ino > self.super_block.total_inodes() {
                warn!("entry '{}' of dir {} points at inode {}", entry.name(), dir.ino(), ino);
                continue;
            }
            let mut inode = self.read_inode(ino)?;

            let actual_type = DirEntryFileType::of_inode(&inode);
            if entry.raw_type() != actual_type as u8 {
                DirEntryWriter::new(self.disk.block_mut(bid)?).set_type_at(offset, actual_type)?;
                report.fixes.push(Fix::EntryType { ino });
            }

            if self.mark_inode(ino)? {
                report.fixes.push(Fix::InodeNotInUse { ino });
            }

            if !inode.dtime().is_zero() {
                inode.set_dtime(UnixTime::ZERO);
                self.write_inode(&inode)?;
                report.fixes.push(Fix::DeletionTime { ino });
            }

            let blocks = match self.inode_blocks(&inode) {
                Ok(blocks) => blocks,
                Err(err) => {
                    warn!("blocks of inode {} are unreadable: {}", ino, err);
                    continue;
                }
            };
            let mut count = 0;
            for bid in blocks {
                match self.mark_block(bid) {
                    Ok(true) => count += 1,
                    Ok(false) => {}
                    Err(err) => warn!("inode {} references a bad block: {}", ino, err),
                }
            }
            if count > 0 {
                report.fixes.push(Fix::UnmarkedBlocks { ino, count });
            }
        }
        Ok(())
    }
}

fn diff(recorded: u32, actual: u32) -> Option<u32> {
    (recorded != actual).then(|| recorded.abs_diff(actual))
}
