// SPDX-License-Identifier: MPL-2.0

use crate::{
    dir::{DirEntryFileType, DirEntryWriter},
    fs::Ext2,
    inode::{FileType, Inode, SECTORS_PER_BLOCK},
    prelude::*,
};

impl Ext2 {
    /// Creates the directory `path`. Returns its inode number.
    pub fn mkdir(&mut self, path: &str) -> Result<u32> {
        self.with_plan(|fs, plan| {
            let (parent, name) = fs.resolve_parent(path)?;
            fs.ensure_absent(parent, &name, path)?;

            let ino = fs.alloc_inode(true, plan)?;
            let bid = fs.alloc_block(plan)?;
            DirEntryWriter::new(fs.disk.block_mut(bid)?).init_dir_block(ino, parent)?;
            let mut inode = Inode::new(ino, FileType::Dir, FileType::Dir.default_perm(), fs.now());
            inode.block_ptrs_mut().set_direct(0, bid);
            inode.set_file_size(BLOCK_SIZE);
            inode.set_blocks_count(SECTORS_PER_BLOCK);
            // One link from the parent's entry, one from ".".
            inode.set_hard_links(2);
            fs.write_inode(&inode)?;

            fs.insert_entry(parent, &name, ino, DirEntryFileType::Dir, plan)?;
            let mut parent_inode = fs.read_inode(parent)?;
            parent_inode.inc_hard_links();
            fs.write_inode(&parent_inode)?;
            info!("created dir '{}' in dir {} (inode {})", name, parent, ino);
            Ok(ino)
        })
    }
}
