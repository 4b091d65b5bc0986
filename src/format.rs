// SPDX-License-Identifier: MPL-2.0

//! Formatting of fresh single-group images.

use crate::{
    bitmap::{BitmapMut, FIRST_FREE_BLOCK_IDX, FIRST_FREE_INODE_IDX},
    block_group::{GroupDescriptor, GROUP_DESCRIPTOR_BID},
    dir::{DirEntryFileType, DirEntryWriter},
    fs::{AllocPlan, Ext2},
    inode::{FileType, Inode, RawInode, LOST_AND_FOUND_INO, ROOT_INO, SECTORS_PER_BLOCK},
    prelude::*,
    super_block::{RawSuperBlock, SuperBlock, MAGIC_NUM, MIN_IMAGE_SIZE},
    utils::UnixTime,
};

/// The block holding the block bitmap.
const BLOCK_BITMAP_BID: Bid = GROUP_DESCRIPTOR_BID + 1;
/// The block holding the inode bitmap.
const INODE_BITMAP_BID: Bid = BLOCK_BITMAP_BID + 1;
/// The first block of the inode table.
const INODE_TABLE_BID: Bid = INODE_BITMAP_BID + 1;

/// The largest count a one-block bitmap can describe.
const MAX_BITMAP_LEN: u32 = (BLOCK_SIZE * 8) as u32;

const INODE_SIZE: usize = size_of::<RawInode>();

/// The geometry of a new image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatOptions {
    /// Total number of 1024-byte blocks.
    pub blocks_count: u32,
    /// Total number of inodes.
    pub inodes_count: u32,
}

impl Default for FormatOptions {
    /// The 128 KiB, 32-inode image.
    fn default() -> Self {
        Self {
            blocks_count: (MIN_IMAGE_SIZE / BLOCK_SIZE) as u32,
            inodes_count: 32,
        }
    }
}

impl FormatOptions {
    fn inode_table_blocks(&self) -> u32 {
        (self.inodes_count as usize * INODE_SIZE).div_ceil(BLOCK_SIZE) as u32
    }

    /// Returns the number of block bitmap indices reserved for metadata.
    fn reserved_block_idx(&self) -> usize {
        // Block `bid` is described by index `bid - 1`.
        let metadata_end = (INODE_TABLE_BID + self.inode_table_blocks()) as usize - 1;
        metadata_end.max(FIRST_FREE_BLOCK_IDX)
    }

    fn validate(&self) -> Result<()> {
        let min_blocks = (MIN_IMAGE_SIZE / BLOCK_SIZE) as u32;
        if self.blocks_count < min_blocks || self.blocks_count > MAX_BITMAP_LEN {
            return Err(Ext2Error::InvalidGeometry(format!(
                "{} blocks, expected {}..={}",
                self.blocks_count, min_blocks, MAX_BITMAP_LEN
            )));
        }
        let min_inodes = FIRST_FREE_INODE_IDX as u32 + 1;
        if self.inodes_count < min_inodes || self.inodes_count > MAX_BITMAP_LEN {
            return Err(Ext2Error::InvalidGeometry(format!(
                "{} inodes, expected {}..={}",
                self.inodes_count, min_inodes, MAX_BITMAP_LEN
            )));
        }
        // The root and lost+found need one block each.
        let needed = self.reserved_block_idx() as u32 + 1 + 2;
        if needed > self.blocks_count {
            return Err(Ext2Error::InvalidGeometry(format!(
                "{} inodes leave no room for data in {} blocks",
                self.inodes_count, self.blocks_count
            )));
        }
        Ok(())
    }
}

impl Ext2 {
    /// Builds a fresh image in memory.
    ///
    /// The image holds the root directory and an empty `lost+found`; the
    /// reserved inodes 1 to 11 and the metadata blocks are marked in use.
    pub fn format(options: FormatOptions) -> Result<Self> {
        options.validate()?;
        let buf = vec![0u8; options.blocks_count as usize * BLOCK_SIZE];
        let raw_super_block = RawSuperBlock {
            inodes_count: options.inodes_count,
            blocks_count: options.blocks_count,
            first_data_block: 1,
            log_block_size: 0,
            log_frag_size: 0,
            blocks_per_group: MAX_BITMAP_LEN,
            frags_per_group: MAX_BITMAP_LEN,
            inodes_per_group: options.inodes_count,
            max_mount_count: u16::MAX,
            magic: MAGIC_NUM,
            // Cleanly unmounted, continue on errors.
            state: 1,
            errors_behaviour: 1,
            rev_level: 1,
            first_ino: LOST_AND_FOUND_INO,
            inode_size: INODE_SIZE as u16,
            ..Default::default()
        };
        let super_block = SuperBlock::try_from(raw_super_block)?;
        let group = GroupDescriptor::new(BLOCK_BITMAP_BID, INODE_BITMAP_BID, INODE_TABLE_BID);
        let mut ext2 = Ext2::assemble(Disk::new(buf), super_block, group);
        ext2.format_metadata(&options)?;
        info!("formatted {:?}: {:?}", options, ext2);
        Ok(ext2)
    }

    fn format_metadata(&mut self, options: &FormatOptions) -> Result<()> {
        let block_bitmap_len = self.super_block.block_bitmap_len();
        let mut block_bitmap =
            BitmapMut::new(self.disk.block_mut(BLOCK_BITMAP_BID)?, block_bitmap_len);
        for idx in 0..options.reserved_block_idx() {
            block_bitmap.set(idx)?;
        }
        let free_blocks = block_bitmap.view().count_free() as u32;

        let inode_bitmap_len = self.super_block.inode_bitmap_len();
        let mut inode_bitmap =
            BitmapMut::new(self.disk.block_mut(INODE_BITMAP_BID)?, inode_bitmap_len);
        for idx in 0..FIRST_FREE_INODE_IDX {
            inode_bitmap.set(idx)?;
        }
        let free_inodes = inode_bitmap.view().count_free() as u32;

        self.super_block.set_free_blocks_count(free_blocks);
        self.super_block.set_free_inodes_count(free_inodes);
        self.group.set_free_blocks_count(free_blocks as u16);
        self.group.set_free_inodes_count(free_inodes as u16);

        let time = self.now();
        let mut plan = AllocPlan::default();
        let root_bid = self.alloc_block(&mut plan)?;
        let mut root = self.new_dir_inode(ROOT_INO, ROOT_INO, root_bid, time)?;
        let lost_bid = self.alloc_block(&mut plan)?;
        let lost = self.new_dir_inode(LOST_AND_FOUND_INO, ROOT_INO, lost_bid, time)?;
        self.write_inode(&lost)?;
        // ".." of lost+found.
        root.inc_hard_links();
        self.write_inode(&root)?;
        self.insert_entry(
            ROOT_INO,
            "lost+found",
            LOST_AND_FOUND_INO,
            DirEntryFileType::Dir,
            &mut plan,
        )?;
        self.group.inc_dirs();
        self.group.inc_dirs();
        self.sync_metadata()
    }

    /// Initializes a directory whose inode is already marked in use.
    fn new_dir_inode(&mut self, ino: u32, parent: u32, bid: Bid, time: UnixTime) -> Result<Inode> {
        DirEntryWriter::new(self.disk.block_mut(bid)?).init_dir_block(ino, parent)?;
        let mut inode = Inode::new(ino, FileType::Dir, FileType::Dir.default_perm(), time);
        inode.block_ptrs_mut().set_direct(0, bid);
        inode.set_file_size(BLOCK_SIZE);
        inode.set_blocks_count(SECTORS_PER_BLOCK);
        inode.set_hard_links(2);
        Ok(inode)
    }
}
