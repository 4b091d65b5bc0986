// SPDX-License-Identifier: MPL-2.0

use crate::prelude::*;

/// The group descriptor table starts on the first block following the superblock.
pub const GROUP_DESCRIPTOR_BID: Bid = 2;

/// The in-memory rust block group descriptor.
///
/// The block group descriptor contains information regarding where important data
/// structures for that group are located. With a single group its counters
/// mirror the superblock's.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupDescriptor {
    /// Blocks usage bitmap block
    pub block_bitmap_bid: Bid,
    /// Inodes usage bitmap block
    pub inode_bitmap_bid: Bid,
    /// Starting block of inode table
    pub inode_table_bid: Bid,
    /// Number of free blocks in group
    free_blocks_count: u16,
    /// Number of free inodes in group
    free_inodes_count: u16,
    /// Number of directories in group
    dirs_count: u16,
}

impl GroupDescriptor {
    pub fn new(block_bitmap_bid: Bid, inode_bitmap_bid: Bid, inode_table_bid: Bid) -> Self {
        Self {
            block_bitmap_bid,
            inode_bitmap_bid,
            inode_table_bid,
            free_blocks_count: 0,
            free_inodes_count: 0,
            dirs_count: 0,
        }
    }

    pub fn free_blocks_count(&self) -> u16 {
        self.free_blocks_count
    }

    pub fn free_inodes_count(&self) -> u16 {
        self.free_inodes_count
    }

    pub fn dirs_count(&self) -> u16 {
        self.dirs_count
    }

    pub fn set_free_blocks_count(&mut self, count: u16) {
        self.free_blocks_count = count;
    }

    pub fn set_free_inodes_count(&mut self, count: u16) {
        self.free_inodes_count = count;
    }

    pub fn adjust_free_blocks(&mut self, delta: i32) {
        self.free_blocks_count = saturating_adjust(self.free_blocks_count, delta);
    }

    pub fn adjust_free_inodes(&mut self, delta: i32) {
        self.free_inodes_count = saturating_adjust(self.free_inodes_count, delta);
    }

    pub fn inc_dirs(&mut self) {
        self.dirs_count = self.dirs_count.saturating_add(1);
    }

    pub fn dec_dirs(&mut self) {
        debug_assert!(self.dirs_count > 0);
        self.dirs_count = self.dirs_count.saturating_sub(1);
    }
}

fn saturating_adjust(count: u16, delta: i32) -> u16 {
    (count as i32 + delta).clamp(0, u16::MAX as i32) as u16
}

impl From<RawGroupDescriptor> for GroupDescriptor {
    fn from(desc: RawGroupDescriptor) -> Self {
        Self {
            block_bitmap_bid: desc.block_bitmap,
            inode_bitmap_bid: desc.inode_bitmap,
            inode_table_bid: desc.inode_table,
            free_blocks_count: desc.free_blocks_count,
            free_inodes_count: desc.free_inodes_count,
            dirs_count: desc.dirs_count,
        }
    }
}

const_assert!(size_of::<RawGroupDescriptor>() == 32);

/// The raw block group descriptor.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod)]
pub struct RawGroupDescriptor {
    pub block_bitmap: u32,
    pub inode_bitmap: u32,
    pub inode_table: u32,
    pub free_blocks_count: u16,
    pub free_inodes_count: u16,
    pub dirs_count: u16,
    pad: u16,
    reserved: [u32; 3],
}

impl From<&GroupDescriptor> for RawGroupDescriptor {
    fn from(desc: &GroupDescriptor) -> Self {
        Self {
            block_bitmap: desc.block_bitmap_bid,
            inode_bitmap: desc.inode_bitmap_bid,
            inode_table: desc.inode_table_bid,
            free_blocks_count: desc.free_blocks_count,
            free_inodes_count: desc.free_inodes_count,
            dirs_count: desc.dirs_count,
            pad: 0u16,
            reserved: [0u32; 3],
        }
    }
}
