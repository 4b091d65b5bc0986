// SPDX-License-Identifier: MPL-2.0

use crate::{
    dir::DirEntryFileType,
    fs::Ext2,
    inode::{FileType, Inode},
    prelude::*,
};

impl Ext2 {
    /// Creates the hard link `dst` to the file at `src`.
    ///
    /// The new entry is tagged as a regular file; no inode or block is allocated
    /// unless the destination directory needs a new block.
    pub fn hard_link(&mut self, src: &str, dst: &str) -> Result<()> {
        self.with_plan(|fs, plan| {
            let (src_parent, src_name) = fs.resolve_parent(src)?;
            let ino = fs
                .lookup_entry(src_parent, &src_name, false)
                .map_err(|err| match err {
                    Ext2Error::NotFound(_) => Ext2Error::NotFound(src.to_string()),
                    err => err,
                })?;
            if fs.read_inode(ino)?.is_dir() {
                return Err(Ext2Error::IsDirectory(src.to_string()));
            }
            let (dst_parent, dst_name) = fs.resolve_parent(dst)?;
            fs.ensure_absent(dst_parent, &dst_name, dst)?;

            fs.insert_entry(dst_parent, &dst_name, ino, DirEntryFileType::File, plan)?;
            let mut inode = fs.read_inode(ino)?;
            inode.inc_hard_links();
            fs.write_inode(&inode)?;
            info!(
                "linked '{}' in dir {} to inode {} ({} links)",
                dst_name,
                dst_parent,
                ino,
                inode.hard_links()
            );
            Ok(())
        })
    }

    /// Creates the symbolic link `dst` whose content is the text `target`.
    ///
    /// `target` is stored as given and never resolved. Returns the inode
    /// number of the link.
    pub fn symlink(&mut self, target: &str, dst: &str) -> Result<u32> {
        if target.is_empty() {
            return Err(Ext2Error::InvalidPath(target.to_string()));
        }
        if target.len() > BLOCK_SIZE {
            return Err(Ext2Error::NameTooLong(target.to_string()));
        }
        self.with_plan(|fs, plan| {
            let (parent, name) = fs.resolve_parent(dst)?;
            fs.ensure_absent(parent, &name, dst)?;

            let ino = fs.alloc_inode(false, plan)?;
            let mut inode = Inode::new(
                ino,
                FileType::Symlink,
                FileType::Symlink.default_perm(),
                fs.now(),
            );
            fs.write_content(&mut inode, target.as_bytes(), plan)?;
            inode.set_hard_links(2);
            fs.write_inode(&inode)?;
            fs.insert_entry(parent, &name, ino, DirEntryFileType::Symlink, plan)?;
            info!(
                "symlinked '{}' in dir {} to '{}' (inode {})",
                name, parent, target, ino
            );
            Ok(ino)
        })
    }
}
