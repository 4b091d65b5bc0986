// SPDX-License-Identifier: MPL-2.0

use crate::{fs::Ext2, inode::Inode, prelude::*};

impl Ext2 {
    /// Removes the entry `path`, which must not name a directory.
    ///
    /// When the last link goes, the inode is tombstoned: its deletion time
    /// is set and its bit and blocks are released, while the rest of its
    /// bytes and the block contents are kept for [`Ext2::restore`].
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let ret = self.do_unlink(path);
        self.finish(ret)
    }

    fn do_unlink(&mut self, path: &str) -> Result<()> {
        let (parent, name) = self.resolve_entry(path)?;
        let ino = self
            .lookup_entry(parent, &name, false)
            .map_err(|err| match err {
                Ext2Error::NotFound(_) => Ext2Error::NotFound(path.to_string()),
                err => err,
            })?;
        let mut inode = self.read_inode(ino)?;
        if inode.is_dir() {
            return Err(Ext2Error::IsDirectory(path.to_string()));
        }

        self.remove_entry(parent, &name)?;
        inode.dec_hard_links();
        if inode.hard_links() == 0 {
            self.tombstone(&mut inode)?;
        }
        self.write_inode(&inode)?;
        info!(
            "unlinked '{}' from dir {} (inode {}, {} links left)",
            name,
            parent,
            ino,
            inode.hard_links()
        );
        Ok(())
    }

    fn tombstone(&mut self, inode: &mut Inode) -> Result<()> {
        let blocks = self.inode_blocks(inode)?;
        inode.set_dtime(self.now());
        self.free_inode(inode.ino(), false)?;
        for bid in &blocks {
            self.free_block(*bid)?;
        }
        debug!("inode {} tombstoned, blocks {:?} freed", inode.ino(), blocks);
        Ok(())
    }
}
