// SPDX-License-Identifier: MPL-2.0

//! A human-readable summary of an image.

use core::fmt;

use crate::{
    bitmap::FIRST_FREE_INODE_IDX,
    block_group::GroupDescriptor,
    dir::{block_entries, DirEntry},
    fs::Ext2,
    inode::{Inode, ROOT_INO},
    prelude::*,
};

/// A snapshot of the metadata of an image.
#[derive(Clone, Debug)]
pub struct ImageSummary {
    pub inodes_count: u32,
    pub blocks_count: u32,
    pub free_blocks_count: u32,
    pub free_inodes_count: u32,
    pub group: GroupDescriptor,
    pub block_bitmap: String,
    pub inode_bitmap: String,
    pub inodes: Vec<InodeSummary>,
    pub dir_blocks: Vec<DirBlockSummary>,
}

/// One listed inode.
#[derive(Clone, Debug)]
pub struct InodeSummary {
    pub ino: u32,
    pub type_char: char,
    pub size: usize,
    pub links: u16,
    pub sectors: u32,
    pub blocks: Vec<Bid>,
}

/// One block of a listed directory with every record it holds, unused ones
/// included.
#[derive(Clone, Debug)]
pub struct DirBlockSummary {
    pub dir_ino: u32,
    pub bid: Bid,
    pub entries: Vec<DirEntry>,
}

impl Ext2 {
    /// Summarizes the counters, the bitmaps, the root and every allocated
    /// inode past the reserved ones, and the blocks of the directories among
    /// them.
    pub fn dump(&self) -> Result<ImageSummary> {
        let inode_bitmap = self.inode_bitmap()?;
        let mut listed = vec![self.read_inode(ROOT_INO)?];
        for idx in FIRST_FREE_INODE_IDX..inode_bitmap.len() {
            if inode_bitmap.is_allocated(idx) {
                listed.push(self.read_inode(idx as u32 + 1)?);
            }
        }

        let mut inodes = Vec::with_capacity(listed.len());
        let mut dir_blocks = Vec::new();
        for inode in &listed {
            inodes.push(summarize(inode));
            if !inode.is_dir() {
                continue;
            }
            for (_, bid) in inode.block_ptrs().directs() {
                let entries = block_entries(self.disk.block(bid)?)?
                    .into_iter()
                    .map(|(_, entry)| entry)
                    .collect();
                dir_blocks.push(DirBlockSummary {
                    dir_ino: inode.ino(),
                    bid,
                    entries,
                });
            }
        }

        Ok(ImageSummary {
            inodes_count: self.super_block.total_inodes(),
            blocks_count: self.super_block.total_blocks(),
            free_blocks_count: self.super_block.free_blocks_count(),
            free_inodes_count: self.super_block.free_inodes_count(),
            group: *self.group,
            block_bitmap: self.block_bitmap()?.to_bit_string(),
            inode_bitmap: inode_bitmap.to_bit_string(),
            inodes,
            dir_blocks,
        })
    }
}

fn summarize(inode: &Inode) -> InodeSummary {
    let mut blocks: Vec<Bid> = inode.block_ptrs().directs().map(|(_, bid)| bid).collect();
    if inode.block_ptrs().indirect() != 0 {
        blocks.push(inode.block_ptrs().indirect());
    }
    InodeSummary {
        ino: inode.ino(),
        type_char: inode.file_type().map_or('?', |type_| type_.as_char()),
        size: inode.file_size(),
        links: inode.hard_links(),
        sectors: inode.blocks_count(),
        blocks,
    }
}

impl fmt::Display for ImageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Inodes: {}", self.inodes_count)?;
        writeln!(f, "Blocks: {}", self.blocks_count)?;
        writeln!(f, "Block group:")?;
        writeln!(f, "    block bitmap: {}", self.group.block_bitmap_bid)?;
        writeln!(f, "    inode bitmap: {}", self.group.inode_bitmap_bid)?;
        writeln!(f, "    inode table: {}", self.group.inode_table_bid)?;
        writeln!(f, "    free blocks: {}", self.free_blocks_count)?;
        writeln!(f, "    free inodes: {}", self.free_inodes_count)?;
        writeln!(f, "    used_dirs: {}", self.group.dirs_count())?;
        writeln!(f, "Block bitmap: {}", self.block_bitmap)?;
        writeln!(f, "Inode bitmap: {}", self.inode_bitmap)?;

        writeln!(f, "\nInodes:")?;
        for inode in &self.inodes {
            writeln!(
                f,
                "[{}] type: {} size: {} links: {} blocks: {}",
                inode.ino, inode.type_char, inode.size, inode.links, inode.sectors
            )?;
            write!(f, "[{}] Blocks:", inode.ino)?;
            for bid in &inode.blocks {
                write!(f, " {}", bid)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\nDirectory Blocks:")?;
        for block in &self.dir_blocks {
            writeln!(f, "   DIR BLOCK NUM: {} (for inode {})", block.bid, block.dir_ino)?;
            for entry in &block.entries {
                writeln!(
                    f,
                    "Inode: {} rec_len: {} name_len: {} type= {} name={}",
                    entry.ino(),
                    entry.record_len(),
                    entry.name_bytes().len(),
                    entry.type_().as_char(),
                    entry.name()
                )?;
            }
        }
        Ok(())
    }
}
