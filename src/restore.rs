// SPDX-License-Identifier: MPL-2.0

use std::collections::BTreeSet;

use crate::{
    dir::{read_entry_at, DirEntry, DirEntryReader, DirEntryWriter},
    fs::Ext2,
    inode::Inode,
    prelude::*,
    utils::UnixTime,
};

/// A removed entry found in the slack of a live one.
#[derive(Debug)]
struct SlackHit {
    bid: Bid,
    /// The live entry whose record covers the removed one.
    owner_offset: usize,
    owner: DirEntry,
    hit_offset: usize,
    hit: DirEntry,
}

impl SlackHit {
    fn span_end(&self) -> usize {
        self.owner_offset + self.owner.record_len()
    }
}

impl Ext2 {
    /// Brings back the removed file `path`.
    ///
    /// The removed entry must still be intact in the slack of its directory,
    /// its inode must be a tombstone, and none of its blocks may have been
    /// reused. Otherwise nothing is changed. Returns the restored inode number.
    pub fn restore(&mut self, path: &str) -> Result<u32> {
        let ret = self.do_restore(path);
        self.finish(ret)
    }

    fn do_restore(&mut self, path: &str) -> Result<u32> {
        let (parent, name) = self.resolve_entry(path)?;
        self.ensure_absent(parent, &name, path)?;
        let cannot = |reason| Ext2Error::CannotRestore {
            name: path.to_string(),
            reason,
        };

        let dir = self.read_inode(parent)?;
        let mut hit = self
            .find_in_slack(&dir, &name)?
            .ok_or_else(|| cannot("no removed entry with this name"))?;
        let ino = hit.hit.ino();
        if ino > self.super_block.total_inodes() {
            return Err(cannot("the entry points past the inode table"));
        }
        if self.is_inode_allocated(ino)? {
            return Err(cannot("the inode was reused"));
        }
        let mut inode = self.read_inode(ino)?;
        if inode.dtime().is_zero() {
            return Err(cannot("the inode was overwritten"));
        }
        if inode.is_dir() {
            return Err(cannot("directories are not restored"));
        }
        let blocks = self.restorable_blocks(&inode).map_err(cannot)?;

        for bid in &blocks {
            self.mark_block(*bid)?;
        }
        self.mark_inode(ino)?;
        inode.set_dtime(UnixTime::ZERO);
        inode.set_hard_links(1);
        self.write_inode(&inode)?;

        let span_end = hit.span_end();
        hit.owner.set_record_len(hit.hit_offset - hit.owner_offset);
        hit.hit.set_record_len(span_end - hit.hit_offset);
        let mut writer = DirEntryWriter::new(self.disk.block_mut(hit.bid)?);
        writer.write_entry(hit.owner_offset, &hit.owner)?;
        writer.write_entry(hit.hit_offset, &hit.hit)?;
        info!(
            "restored '{}' in dir {} (inode {}, {} blocks)",
            name,
            parent,
            ino,
            blocks.len()
        );
        Ok(ino)
    }

    /// Returns the blocks of the tombstone `inode`, if all of them are free.
    fn restorable_blocks(&self, inode: &Inode) -> core::result::Result<Vec<Bid>, &'static str> {
        let mut blocks = self
            .inode_blocks(inode)
            .map_err(|_| "the block pointers are unreadable")?;
        for bid in &blocks {
            match self.is_block_allocated(*bid) {
                Ok(false) => {}
                Ok(true) => return Err("its blocks were reused"),
                Err(_) => return Err("the block pointers are out of range"),
            }
        }
        let count = blocks.len();
        blocks.sort_unstable();
        blocks.dedup();
        if blocks.len() != count {
            return Err("the block pointers are inconsistent");
        }
        Ok(blocks)
    }

    /// Looks for a removed entry named `name` in the slack of the live
    /// entries of `dir`.
    ///
    /// A removed entry is followed either at the end of its record, or right
    /// after its own bytes when the entry behind it was removed first, so
    /// every removed entry of a run is reached whatever the removal order.
    fn find_in_slack(&self, dir: &Inode, name: &str) -> Result<Option<SlackHit>> {
        for (_, bid) in dir.block_ptrs().directs() {
            let buf = self.disk.block(bid)?;
            for item in DirEntryReader::new(buf) {
                let (owner_offset, owner) = item?;
                let span = &buf[..owner_offset + owner.record_len()];
                let mut pending = vec![owner_offset + owner.actual_len()];
                let mut visited = BTreeSet::new();
                while let Some(offset) = pending.pop() {
                    if offset + DirEntry::header_len() > span.len() || !visited.insert(offset) {
                        continue;
                    }
                    let Ok(stale) = read_entry_at(span, offset) else {
                        continue;
                    };
                    if stale.name_bytes().is_empty() {
                        continue;
                    }
                    if stale.matches(name) {
                        trace!("dir {}: '{}' found at {} of block {}", dir.ino(), name, offset, bid);
                        return Ok(Some(SlackHit {
                            bid,
                            owner_offset,
                            owner,
                            hit_offset: offset,
                            hit: stale,
                        }));
                    }
                    let actual = stale.actual_len();
                    pending.push(offset + actual);
                    let step = stale.record_len();
                    if step > actual && step % 4 == 0 {
                        pending.push(offset + step);
                    }
                }
            }
        }
        Ok(None)
    }
}
