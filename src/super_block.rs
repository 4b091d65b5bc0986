// SPDX-License-Identifier: MPL-2.0

use crate::{prelude::*, utils::UnixTime};

/// The magic number of Ext2.
pub const MAGIC_NUM: u16 = 0xef53;

/// The main superblock is located at byte 1024 from the beginning of the device.
pub const SUPER_BLOCK_OFFSET: usize = 1024;

/// The size of the superblock region; only its leading fields are interpreted.
pub const SUPER_BLOCK_SIZE: usize = 1024;

/// The smallest image the tools accept.
pub const MIN_IMAGE_SIZE: usize = 128 * 1024;

/// The in-memory superblock.
///
/// It keeps the raw structure so that the fields the tools never touch are
/// written back unchanged.
#[derive(Clone, Copy, Debug)]
pub struct SuperBlock {
    raw: RawSuperBlock,
}

impl TryFrom<RawSuperBlock> for SuperBlock {
    type Error = Ext2Error;

    fn try_from(sb: RawSuperBlock) -> Result<Self> {
        if sb.magic != MAGIC_NUM {
            return Err(Ext2Error::Corrupted(format!(
                "bad superblock magic {:#x}",
                sb.magic
            )));
        }
        if sb.log_block_size != 0 {
            return Err(Ext2Error::Corrupted(format!(
                "unsupported block size {}",
                BLOCK_SIZE << sb.log_block_size.min(16)
            )));
        }
        if sb.blocks_count <= sb.first_data_block || sb.inodes_count == 0 {
            return Err(Ext2Error::Corrupted("empty geometry".to_string()));
        }
        // Exactly one block group is supported: every block and every inode
        // must be covered by the first group's bitmaps.
        if sb.blocks_count - sb.first_data_block > sb.blocks_per_group
            || sb.inodes_count > sb.inodes_per_group
        {
            return Err(Ext2Error::Corrupted(
                "the image spans more than one block group".to_string(),
            ));
        }
        if (sb.blocks_count as usize) > BLOCK_SIZE * 8 || (sb.inodes_count as usize) > BLOCK_SIZE * 8
        {
            return Err(Ext2Error::Corrupted(
                "bitmaps larger than one block".to_string(),
            ));
        }
        let sb = Self { raw: sb };
        if sb.inode_size() < size_of::<crate::inode::RawInode>() {
            return Err(Ext2Error::Corrupted(format!(
                "inode size {} is too small",
                sb.inode_size()
            )));
        }
        Ok(sb)
    }
}

impl SuperBlock {
    /// Returns the raw structure to write back.
    pub fn as_raw(&self) -> &RawSuperBlock {
        &self.raw
    }

    /// Returns the total inodes count.
    pub fn total_inodes(&self) -> u32 {
        self.raw.inodes_count
    }

    /// Returns the total blocks count.
    pub fn total_blocks(&self) -> u32 {
        self.raw.blocks_count
    }

    /// Returns the number of free blocks.
    pub fn free_blocks_count(&self) -> u32 {
        self.raw.free_blocks_count
    }

    /// Returns the number of free inodes.
    pub fn free_inodes_count(&self) -> u32 {
        self.raw.free_inodes_count
    }

    /// Returns the block number that the first bit of the block bitmap describes.
    pub fn first_data_block(&self) -> Bid {
        self.raw.first_data_block
    }

    /// Returns the size of block.
    pub fn block_size(&self) -> usize {
        BLOCK_SIZE << self.raw.log_block_size
    }

    /// Returns the size of inode.
    ///
    /// Revision 0 images use the fixed 128-byte inode.
    pub fn inode_size(&self) -> usize {
        if self.raw.rev_level == 0 {
            return 128;
        }
        self.raw.inode_size as usize
    }

    /// Returns the number of block bitmap bits in use.
    pub fn block_bitmap_len(&self) -> usize {
        (self.raw.blocks_count - self.raw.first_data_block) as usize
    }

    /// Returns the number of inode bitmap bits in use.
    pub fn inode_bitmap_len(&self) -> usize {
        self.raw.inodes_count as usize
    }

    /// Overwrites the free blocks counter.
    pub fn set_free_blocks_count(&mut self, count: u32) {
        self.raw.free_blocks_count = count;
    }

    /// Overwrites the free inodes counter.
    pub fn set_free_inodes_count(&mut self, count: u32) {
        self.raw.free_inodes_count = count;
    }

    /// Adds a signed delta to the free blocks counter.
    pub fn adjust_free_blocks(&mut self, delta: i32) {
        self.raw.free_blocks_count = self.raw.free_blocks_count.saturating_add_signed(delta);
    }

    /// Adds a signed delta to the free inodes counter.
    pub fn adjust_free_inodes(&mut self, delta: i32) {
        self.raw.free_inodes_count = self.raw.free_inodes_count.saturating_add_signed(delta);
    }

    /// Records the write time.
    pub fn set_wtime(&mut self, time: UnixTime) {
        self.raw.wtime = time;
    }
}

const_assert!(size_of::<RawSuperBlock>() == 104);

/// The leading part of the raw superblock on device.
///
/// The remaining bytes up to [`SUPER_BLOCK_SIZE`] hold revision-1 extensions
/// (UUID, volume name, preallocation hints...) that are left untouched.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod)]
pub struct RawSuperBlock {
    pub inodes_count: u32,
    pub blocks_count: u32,
    pub reserved_blocks_count: u32,
    pub free_blocks_count: u32,
    pub free_inodes_count: u32,
    pub first_data_block: u32,
    /// The number to left-shift 1024 to obtain the block size.
    pub log_block_size: u32,
    /// The number to left-shift 1024 to obtain the fragment size.
    pub log_frag_size: u32,
    pub blocks_per_group: u32,
    pub frags_per_group: u32,
    pub inodes_per_group: u32,
    /// Mount time.
    pub mtime: UnixTime,
    /// Write time.
    pub wtime: UnixTime,
    pub mount_count: u16,
    pub max_mount_count: u16,
    pub magic: u16,
    pub state: u16,
    pub errors_behaviour: u16,
    pub minor_rev_level: u16,
    pub last_check_time: UnixTime,
    pub check_interval: u32,
    pub creator_os: u32,
    pub rev_level: u32,
    pub def_resuid: u16,
    pub def_resgid: u16,
    /// The first non-reserved inode number.
    pub first_ino: u32,
    pub inode_size: u16,
    pub block_group_idx: u16,
    pub feature_compat: u32,
    pub feature_incompat: u32,
    pub feature_ro_compat: u32,
}
