// SPDX-License-Identifier: MPL-2.0

use crate::{
    block_ptr::{BidPath, MAX_FILE_BLOCKS},
    dir::DirEntryFileType,
    fs::{AllocPlan, Ext2},
    inode::{FileType, Inode, MAX_FNAME_LEN, ROOT_INO, SECTOR_SIZE},
    prelude::*,
};

impl Ext2 {
    /// Places `data` into newly allocated blocks of the fresh inode `inode`.
    ///
    /// Blocks past the direct range go through one zero-filled indirect
    /// block. The size of `inode` is updated and its sector count is derived
    /// from that size; writing the inode back is left to the caller.
    pub(crate) fn write_content(
        &mut self,
        inode: &mut Inode,
        data: &[u8],
        plan: &mut AllocPlan,
    ) -> Result<()> {
        debug_assert!(inode.block_ptrs().directs().next().is_none());
        let max = MAX_FILE_BLOCKS as usize * BLOCK_SIZE;
        if data.len() > max {
            return Err(Ext2Error::FileTooLarge {
                len: data.len(),
                max,
            });
        }

        for (idx, chunk) in data.chunks(BLOCK_SIZE).enumerate() {
            let idx = idx as u32;
            if let BidPath::Indirect(_) = BidPath::try_from(idx)? {
                if inode.block_ptrs().indirect() == 0 {
                    let indirect = self.alloc_block(plan)?;
                    self.disk.zero_block(indirect)?;
                    inode.block_ptrs_mut().set_indirect(indirect);
                    debug!("inode {}: indirect block {}", inode.ino(), indirect);
                }
            }
            let bid = self.alloc_block(plan)?;
            let block = self.disk.block_mut(bid)?;
            block[..chunk.len()].copy_from_slice(chunk);
            block[chunk.len()..].fill(0);
            self.set_file_bid(inode, idx, bid)?;
        }

        inode.set_file_size(data.len());
        inode.set_blocks_count(data.len().div_ceil(SECTOR_SIZE) as u32);
        Ok(())
    }

    /// Creates a regular file holding `data` at `path`.
    ///
    /// If `path` names an existing directory (`/` included), the file is
    /// created inside that directory under `source_name`; a trailing `/` on
    /// anything else fails with `NotFound`. Returns the inode
    /// number of the new file.
    pub fn copy_in(&mut self, path: &str, source_name: &str, data: &[u8]) -> Result<u32> {
        self.with_plan(|fs, plan| {
            let (mut parent, mut name) = if path.starts_with('/') && path.trim_matches('/').is_empty() {
                (ROOT_INO, ".".to_string())
            } else {
                fs.resolve_parent(path)?
            };
            match fs.lookup_entry(parent, &name, true) {
                Ok(dir_ino) => {
                    parent = dir_ino;
                    name = source_name.to_string();
                }
                Err(Ext2Error::NotFound(_)) if path.ends_with('/') => {
                    return Err(Ext2Error::NotFound(path.to_string()));
                }
                Err(Ext2Error::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
            if name.is_empty() || name.contains('/') {
                return Err(Ext2Error::InvalidPath(format!("{} ({})", path, name)));
            }
            if name.len() > MAX_FNAME_LEN {
                return Err(Ext2Error::NameTooLong(name));
            }
            fs.ensure_absent(parent, &name, path)?;

            let ino = fs.alloc_inode(false, plan)?;
            let mut inode = Inode::new(ino, FileType::File, FileType::File.default_perm(), fs.now());
            fs.write_content(&mut inode, data, plan)?;
            fs.write_inode(&inode)?;
            fs.insert_entry(parent, &name, ino, DirEntryFileType::File, plan)?;
            info!(
                "copied {} bytes into '{}' of dir {} (inode {})",
                data.len(),
                name,
                parent,
                ino
            );
            Ok(ino)
        })
    }

    /// Reads the content of the file at `path`.
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let inode = self.read_inode(self.lookup(path)?)?;
        if inode.is_dir() {
            return Err(Ext2Error::IsDirectory(path.to_string()));
        }
        self.read_content(&inode)
    }

    /// Reads the target text of the symbolic link at `path`.
    pub fn read_link(&self, path: &str) -> Result<String> {
        let inode = self.read_inode(self.lookup(path)?)?;
        if inode.file_type()? != FileType::Symlink {
            return Err(Ext2Error::InvalidPath(format!(
                "{} is not a symbolic link",
                path
            )));
        }
        let content = self.read_content(&inode)?;
        Ok(String::from_utf8_lossy(&content).into_owned())
    }
}
