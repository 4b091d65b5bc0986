// SPDX-License-Identifier: MPL-2.0

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    bitmap::{Bitmap, BitmapMut, FIRST_FREE_BLOCK_IDX, FIRST_FREE_INODE_IDX},
    block_group::{GroupDescriptor, RawGroupDescriptor, GROUP_DESCRIPTOR_BID},
    prelude::*,
    super_block::{RawSuperBlock, SuperBlock, MIN_IMAGE_SIZE, SUPER_BLOCK_OFFSET},
    utils::{Dirty, SystemClock, TimeProvider, UnixTime},
};

/// An ext2 image loaded in memory.
///
/// Every operation works directly on the image bytes. The superblock and the
/// group descriptor are decoded once; their counters are written back into
/// the bytes at the end of each operation, and [`Ext2::sync`] writes the
/// bytes back to the image file.
pub struct Ext2 {
    pub(crate) disk: Disk,
    pub(crate) super_block: Dirty<SuperBlock>,
    pub(crate) group: Dirty<GroupDescriptor>,
    time_provider: Arc<dyn TimeProvider>,
    path: Option<PathBuf>,
}

impl Ext2 {
    /// Opens and loads an Ext2 from the image file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let buf = std::fs::read(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => Ext2Error::ImageNotFound(path.display().to_string()),
            _ => Ext2Error::MapFailed(format!("{}: {}", path.display(), err)),
        })?;
        let mut ext2 = Self::from_bytes(buf)?;
        ext2.path = Some(path.to_path_buf());
        info!("opened {}: {:?}", path.display(), ext2);
        Ok(ext2)
    }

    /// Loads an Ext2 from image bytes.
    pub fn from_bytes(buf: Vec<u8>) -> Result<Self> {
        if buf.len() < MIN_IMAGE_SIZE {
            return Err(Ext2Error::MapFailed(format!(
                "image of {} bytes is smaller than {} bytes",
                buf.len(),
                MIN_IMAGE_SIZE
            )));
        }
        let disk = Disk::new(buf);
        let super_block = SuperBlock::try_from(disk.read_val::<RawSuperBlock>(SUPER_BLOCK_OFFSET)?)?;
        let group = GroupDescriptor::from(
            disk.read_val::<RawGroupDescriptor>(GROUP_DESCRIPTOR_BID as usize * BLOCK_SIZE)?,
        );
        Self::check_layout(&disk, &super_block, &group)?;
        Ok(Self {
            disk,
            super_block: Dirty::new(super_block),
            group: Dirty::new(group),
            time_provider: Arc::new(SystemClock),
            path: None,
        })
    }

    /// Builds the context over image bytes whose metadata was just written.
    pub(crate) fn assemble(disk: Disk, super_block: SuperBlock, group: GroupDescriptor) -> Self {
        Self {
            disk,
            super_block: Dirty::new(super_block),
            group: Dirty::new(group),
            time_provider: Arc::new(SystemClock),
            path: None,
        }
    }

    fn check_layout(disk: &Disk, super_block: &SuperBlock, group: &GroupDescriptor) -> Result<()> {
        let total_blocks = disk.total_blocks() as u64;
        if super_block.total_blocks() as u64 > total_blocks {
            return Err(Ext2Error::Corrupted(format!(
                "superblock claims {} blocks, the image holds {}",
                super_block.total_blocks(),
                total_blocks
            )));
        }
        let table_blocks =
            (super_block.total_inodes() as usize * super_block.inode_size()).div_ceil(BLOCK_SIZE);
        let table_end = group.inode_table_bid as u64 + table_blocks as u64;
        if group.block_bitmap_bid as u64 >= total_blocks
            || group.inode_bitmap_bid as u64 >= total_blocks
            || table_end > total_blocks
        {
            return Err(Ext2Error::Corrupted(
                "group descriptor points beyond the image".to_string(),
            ));
        }
        Ok(())
    }

    /// Replaces the clock used for creation and deletion times.
    pub fn set_time_provider(&mut self, time_provider: Arc<dyn TimeProvider>) {
        self.time_provider = time_provider;
    }

    pub(crate) fn now(&self) -> UnixTime {
        self.time_provider.now()
    }

    /// Returns the super block.
    pub fn super_block(&self) -> &SuperBlock {
        &self.super_block
    }

    /// Returns the group descriptor.
    pub fn group_descriptor(&self) -> &GroupDescriptor {
        &self.group
    }

    /// Returns the path of the image file, if it was opened from one.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Views the image bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.disk.as_bytes()
    }

    /// Consumes the context and returns the image bytes.
    pub fn into_bytes(mut self) -> Vec<u8> {
        if let Err(err) = self.sync_metadata() {
            warn!("failed to write back metadata: {}", err);
        }
        self.disk.into_bytes()
    }

    /// Writes the whole image back to the file it was opened from.
    ///
    /// An image that was not opened from a file is left in memory.
    pub fn sync(&mut self) -> Result<()> {
        match self.path.clone() {
            Some(path) => self.sync_to(path),
            None => self.sync_metadata(),
        }
    }

    /// Writes the whole image to `path`, which becomes the image file.
    pub fn sync_to(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.sync_metadata()?;
        std::fs::write(path.as_ref(), self.disk.as_bytes())?;
        debug!("wrote {} bytes to {}", self.disk.total_bytes(), path.as_ref().display());
        self.path = Some(path.as_ref().to_path_buf());
        Ok(())
    }

    /// Writes back the superblock and the group descriptor into the image bytes.
    pub fn sync_metadata(&mut self) -> Result<()> {
        if self.super_block.is_dirty() {
            let time = self.now();
            let super_block = &mut *self.super_block;
            super_block.set_wtime(time);
            let raw = *super_block.as_raw();
            self.disk.write_val(SUPER_BLOCK_OFFSET, &raw)?;
            self.super_block.clear_dirty();
        }
        if self.group.is_dirty() {
            let raw = RawGroupDescriptor::from(&*self.group);
            self.disk
                .write_val(GROUP_DESCRIPTOR_BID as usize * BLOCK_SIZE, &raw)?;
            self.group.clear_dirty();
        }
        Ok(())
    }

    /// Writes back the metadata whether or not `ret` is an error.
    pub(crate) fn finish<T>(&mut self, ret: Result<T>) -> Result<T> {
        let synced = self.sync_metadata();
        let val = ret?;
        synced?;
        Ok(val)
    }

    /// Runs `op` with a fresh allocation plan.
    ///
    /// If `op` fails, every block and inode it allocated is released before
    /// the error is returned.
    pub(crate) fn with_plan<T>(
        &mut self,
        op: impl FnOnce(&mut Self, &mut AllocPlan) -> Result<T>,
    ) -> Result<T> {
        let mut plan = AllocPlan::default();
        let ret = op(self, &mut plan);
        if ret.is_err() && !plan.is_empty() {
            debug!("rolling back {:?}", plan);
            if let Err(err) = self.rollback(plan) {
                warn!("rollback failed: {}", err);
            }
        }
        self.finish(ret)
    }

    fn rollback(&mut self, plan: AllocPlan) -> Result<()> {
        for bid in plan.blocks.into_iter().rev() {
            self.free_block(bid)?;
        }
        for (ino, is_dir) in plan.inodes.into_iter().rev() {
            self.free_inode(ino, is_dir)?;
        }
        Ok(())
    }

    /// Returns the block bitmap.
    pub fn block_bitmap(&self) -> Result<Bitmap<'_>> {
        Ok(Bitmap::new(
            self.disk.block(self.group.block_bitmap_bid)?,
            self.super_block.block_bitmap_len(),
        ))
    }

    /// Returns the inode bitmap.
    pub fn inode_bitmap(&self) -> Result<Bitmap<'_>> {
        Ok(Bitmap::new(
            self.disk.block(self.group.inode_bitmap_bid)?,
            self.super_block.inode_bitmap_len(),
        ))
    }

    fn block_bitmap_mut(&mut self) -> Result<BitmapMut<'_>> {
        let len = self.super_block.block_bitmap_len();
        Ok(BitmapMut::new(self.disk.block_mut(self.group.block_bitmap_bid)?, len))
    }

    fn inode_bitmap_mut(&mut self) -> Result<BitmapMut<'_>> {
        let len = self.super_block.inode_bitmap_len();
        Ok(BitmapMut::new(self.disk.block_mut(self.group.inode_bitmap_bid)?, len))
    }

    /// Returns the block bitmap index describing `bid`.
    fn block_idx(&self, bid: Bid) -> Result<usize> {
        let first = self.super_block.first_data_block();
        if bid < first || bid >= self.super_block.total_blocks() {
            return Err(Ext2Error::Corrupted(format!("block {} is out of range", bid)));
        }
        Ok((bid - first) as usize)
    }

    /// Returns the inode bitmap index describing `ino`.
    fn inode_idx(&self, ino: u32) -> Result<usize> {
        if ino == 0 || ino > self.super_block.total_inodes() {
            return Err(Ext2Error::Corrupted(format!("inode {} is out of range", ino)));
        }
        Ok(ino as usize - 1)
    }

    pub fn is_block_allocated(&self, bid: Bid) -> Result<bool> {
        let idx = self.block_idx(bid)?;
        Ok(self.block_bitmap()?.is_allocated(idx))
    }

    pub fn is_inode_allocated(&self, ino: u32) -> Result<bool> {
        let idx = self.inode_idx(ino)?;
        Ok(self.inode_bitmap()?.is_allocated(idx))
    }

    /// Adds `delta` to the free blocks counters of the superblock and the group.
    pub(crate) fn adjust_free_blocks(&mut self, delta: i32) {
        self.super_block.adjust_free_blocks(delta);
        self.group.adjust_free_blocks(delta);
    }

    /// Adds `delta` to the free inodes counters of the superblock and the group.
    pub(crate) fn adjust_free_inodes(&mut self, delta: i32) {
        self.super_block.adjust_free_inodes(delta);
        self.group.adjust_free_inodes(delta);
    }

    /// Allocates the lowest free inode past the reserved ones.
    pub(crate) fn alloc_inode(&mut self, is_dir: bool, plan: &mut AllocPlan) -> Result<u32> {
        let idx = self
            .inode_bitmap_mut()?
            .alloc(FIRST_FREE_INODE_IDX)
            .ok_or(Ext2Error::NoSpace("no free inode"))?;
        self.adjust_free_inodes(-1);
        if is_dir {
            self.group.inc_dirs();
        }
        let ino = idx as u32 + 1;
        plan.inodes.push((ino, is_dir));
        debug!("allocated inode {}", ino);
        Ok(ino)
    }

    /// Frees an inode.
    pub(crate) fn free_inode(&mut self, ino: u32, is_dir: bool) -> Result<()> {
        let idx = self.inode_idx(ino)?;
        self.inode_bitmap_mut()?.clear(idx)?;
        self.adjust_free_inodes(1);
        if is_dir {
            self.group.dec_dirs();
        }
        debug!("freed inode {}", ino);
        Ok(())
    }

    /// Allocates the lowest free block past the metadata region.
    ///
    /// The content of the block is left as is.
    pub(crate) fn alloc_block(&mut self, plan: &mut AllocPlan) -> Result<Bid> {
        let idx = self
            .block_bitmap_mut()?
            .alloc(FIRST_FREE_BLOCK_IDX)
            .ok_or(Ext2Error::NoSpace("no free block"))?;
        self.adjust_free_blocks(-1);
        let bid = idx as Bid + self.super_block.first_data_block();
        plan.blocks.push(bid);
        debug!("allocated block {}", bid);
        Ok(bid)
    }

    /// Frees a block.
    pub(crate) fn free_block(&mut self, bid: Bid) -> Result<()> {
        let idx = self.block_idx(bid)?;
        self.block_bitmap_mut()?.clear(idx)?;
        self.adjust_free_blocks(1);
        debug!("freed block {}", bid);
        Ok(())
    }

    /// Marks `bid` allocated. Returns false if it already was.
    pub(crate) fn mark_block(&mut self, bid: Bid) -> Result<bool> {
        let idx = self.block_idx(bid)?;
        let mut bitmap = self.block_bitmap_mut()?;
        if bitmap.view().is_allocated(idx) {
            return Ok(false);
        }
        bitmap.set(idx)?;
        self.adjust_free_blocks(-1);
        Ok(true)
    }

    /// Marks `ino` allocated. Returns false if it already was.
    pub(crate) fn mark_inode(&mut self, ino: u32) -> Result<bool> {
        let idx = self.inode_idx(ino)?;
        let mut bitmap = self.inode_bitmap_mut()?;
        if bitmap.view().is_allocated(idx) {
            return Ok(false);
        }
        bitmap.set(idx)?;
        self.adjust_free_inodes(-1);
        Ok(true)
    }
}

impl Debug for Ext2 {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Ext2")
            .field("super_block", &self.super_block)
            .field("group", &self.group)
            .field("disk", &self.disk)
            .finish()
    }
}

/// The blocks and inodes allocated by one operation so far.
#[derive(Debug, Default)]
pub(crate) struct AllocPlan {
    blocks: Vec<Bid>,
    inodes: Vec<(u32, bool)>,
}

impl AllocPlan {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.inodes.is_empty()
    }
}
