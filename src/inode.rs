// SPDX-License-Identifier: MPL-2.0

use crate::{
    block_ptr::{write_indirect_bid, BidPath, BlockPtrs, IndirectBlock},
    fs::Ext2,
    prelude::*,
    utils::UnixTime,
};

/// Max length of file name.
pub const MAX_FNAME_LEN: usize = 255;

/// The inode number of the root directory.
pub const ROOT_INO: u32 = 2;

/// The inode number of the `lost+found` directory created by `format`.
pub const LOST_AND_FOUND_INO: u32 = 11;

/// One inode of the inode table.
///
/// It keeps the raw structure, so that a tombstoned inode keeps every byte
/// except the fields the tools change on purpose.
#[derive(Clone, Copy, Debug)]
pub struct Inode {
    ino: u32,
    raw: RawInode,
}

impl Inode {
    /// Creates a fresh inode with a single link.
    pub(crate) fn new(ino: u32, type_: FileType, perm: FilePerm, time: UnixTime) -> Self {
        Self {
            ino,
            raw: RawInode {
                mode: type_ as u16 | perm.bits(),
                atime: time,
                ctime: time,
                mtime: time,
                hard_links: 1,
                ..Default::default()
            },
        }
    }

    pub(crate) fn from_raw(ino: u32, raw: RawInode) -> Self {
        Self { ino, raw }
    }

    pub fn ino(&self) -> u32 {
        self.ino
    }

    pub fn as_raw(&self) -> &RawInode {
        &self.raw
    }

    /// Returns the type, failing for a mode no tool produces.
    pub fn file_type(&self) -> Result<FileType> {
        FileType::from_raw_mode(self.raw.mode)
    }

    /// Returns true if the mode says directory.
    pub fn is_dir(&self) -> bool {
        matches!(self.file_type(), Ok(FileType::Dir))
    }

    pub fn file_perm(&self) -> FilePerm {
        FilePerm::from_bits_truncate(self.raw.mode)
    }

    pub fn file_size(&self) -> usize {
        self.raw.size_low as usize
    }

    pub(crate) fn set_file_size(&mut self, size: usize) {
        self.raw.size_low = size as u32;
    }

    pub fn hard_links(&self) -> u16 {
        self.raw.hard_links
    }

    pub(crate) fn set_hard_links(&mut self, links: u16) {
        self.raw.hard_links = links;
    }

    pub(crate) fn inc_hard_links(&mut self) {
        self.raw.hard_links = self.raw.hard_links.saturating_add(1);
    }

    pub(crate) fn dec_hard_links(&mut self) {
        debug_assert!(self.raw.hard_links > 0);
        self.raw.hard_links = self.raw.hard_links.saturating_sub(1);
    }

    /// Returns the number of 512-byte sectors held.
    pub fn blocks_count(&self) -> u32 {
        self.raw.blocks_count
    }

    pub(crate) fn set_blocks_count(&mut self, sectors: u32) {
        self.raw.blocks_count = sectors;
    }

    pub fn ctime(&self) -> UnixTime {
        self.raw.ctime
    }

    /// Returns the deletion time, zero for a live inode.
    pub fn dtime(&self) -> UnixTime {
        self.raw.dtime
    }

    pub(crate) fn set_dtime(&mut self, time: UnixTime) {
        self.raw.dtime = time;
    }

    pub fn block_ptrs(&self) -> &BlockPtrs {
        &self.raw.block_ptrs
    }

    pub(crate) fn block_ptrs_mut(&mut self) -> &mut BlockPtrs {
        &mut self.raw.block_ptrs
    }
}

/// The unit of the sector count of an inode.
pub const SECTOR_SIZE: usize = 512;

/// Number of 512-byte sectors in one block.
pub const SECTORS_PER_BLOCK: u32 = (BLOCK_SIZE / SECTOR_SIZE) as u32;

impl Ext2 {
    /// Returns the byte offset of the inode `ino` inside the image.
    fn inode_offset(&self, ino: u32) -> Result<usize> {
        if ino == 0 || ino > self.super_block.total_inodes() {
            return Err(Ext2Error::Corrupted(format!(
                "inode {} is out of range 1..={}",
                ino,
                self.super_block.total_inodes()
            )));
        }
        Ok(self.group.inode_table_bid as usize * BLOCK_SIZE
            + (ino as usize - 1) * self.super_block.inode_size())
    }

    /// Reads the inode `ino` from the inode table.
    pub fn read_inode(&self, ino: u32) -> Result<Inode> {
        let offset = self.inode_offset(ino)?;
        Ok(Inode::from_raw(ino, self.disk.read_val(offset)?))
    }

    /// Writes the inode back to the inode table.
    pub(crate) fn write_inode(&mut self, inode: &Inode) -> Result<()> {
        let offset = self.inode_offset(inode.ino)?;
        self.disk.write_val(offset, &inode.raw)
    }

    /// Returns every block the inode references: the data blocks followed by
    /// the indirect block itself.
    pub(crate) fn inode_blocks(&self, inode: &Inode) -> Result<Vec<Bid>> {
        let ptrs = inode.block_ptrs();
        let mut bids: Vec<Bid> = ptrs.directs().map(|(_, bid)| bid).collect();
        let indirect = ptrs.indirect();
        if indirect != 0 {
            let block = IndirectBlock::new(self.disk.block(indirect)?);
            bids.extend(block.bids());
            bids.push(indirect);
        }
        Ok(bids)
    }

    /// Returns the block holding the `idx`-th block of the file, 0 for a hole.
    pub(crate) fn file_bid(&self, inode: &Inode, idx: u32) -> Result<Bid> {
        match BidPath::try_from(idx)? {
            BidPath::Direct(slot) => Ok(inode.block_ptrs().direct(slot)),
            BidPath::Indirect(slot) => {
                let indirect = inode.block_ptrs().indirect();
                if indirect == 0 {
                    return Ok(0);
                }
                Ok(IndirectBlock::new(self.disk.block(indirect)?).read_bid(slot))
            }
        }
    }

    /// Reads the content of a non-directory inode.
    pub(crate) fn read_content(&self, inode: &Inode) -> Result<Vec<u8>> {
        let size = inode.file_size();
        let mut data = vec![0u8; size];
        for (idx, chunk) in data.chunks_mut(BLOCK_SIZE).enumerate() {
            let bid = self.file_bid(inode, idx as u32)?;
            if bid == 0 {
                continue;
            }
            chunk.copy_from_slice(&self.disk.block(bid)?[..chunk.len()]);
        }
        Ok(data)
    }

    /// Records `bid` as the `idx`-th block of the file.
    ///
    /// The indirect block must have been installed before an index past the
    /// direct range is set.
    pub(crate) fn set_file_bid(&mut self, inode: &mut Inode, idx: u32, bid: Bid) -> Result<()> {
        match BidPath::try_from(idx)? {
            BidPath::Direct(slot) => inode.block_ptrs_mut().set_direct(slot, bid),
            BidPath::Indirect(slot) => {
                let indirect = inode.block_ptrs().indirect();
                debug_assert_ne!(indirect, 0);
                write_indirect_bid(self.disk.block_mut(indirect)?, slot, bid);
            }
        }
        Ok(())
    }
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FileType {
    /// FIFO special file
    Fifo = 0o010000,
    /// Character device
    Char = 0o020000,
    /// Directory
    Dir = 0o040000,
    /// Block device
    Block = 0o060000,
    /// Regular file
    File = 0o100000,
    /// Symbolic link
    Symlink = 0o120000,
    /// Socket
    Socket = 0o140000,
}

impl TryFrom<u16> for FileType {
    type Error = Ext2Error;

    fn try_from(val: u16) -> Result<Self> {
        match val {
            val if val == Self::Fifo as u16 => Ok(Self::Fifo),
            val if val == Self::Char as u16 => Ok(Self::Char),
            val if val == Self::Dir as u16 => Ok(Self::Dir),
            val if val == Self::Block as u16 => Ok(Self::Block),
            val if val == Self::File as u16 => Ok(Self::File),
            val if val == Self::Symlink as u16 => Ok(Self::Symlink),
            val if val == Self::Socket as u16 => Ok(Self::Socket),
            _ => Err(Ext2Error::Corrupted(format!("unknown file mode {:#o}", val))),
        }
    }
}

impl FileType {
    pub fn from_raw_mode(mode: u16) -> Result<Self> {
        const TYPE_MASK: u16 = 0o170000;
        Self::try_from(mode & TYPE_MASK)
    }

    /// Returns the one-letter tag used in listings.
    pub fn as_char(&self) -> char {
        match self {
            Self::File => 'f',
            Self::Dir => 'd',
            Self::Symlink => 'l',
            _ => '?',
        }
    }

    /// Returns the permissions given to new inodes of this type.
    pub(crate) fn default_perm(&self) -> FilePerm {
        match self {
            Self::Dir => FilePerm::from_bits_truncate(0o755),
            Self::Symlink => FilePerm::from_bits_truncate(0o777),
            _ => FilePerm::from_bits_truncate(0o644),
        }
    }
}

bitflags! {
    pub struct FilePerm: u16 {
        /// set-user-ID
        const S_ISUID = 0o4000;
        /// set-group-ID
        const S_ISGID = 0o2000;
        /// sticky bit
        const S_ISVTX = 0o1000;
        /// read by owner
        const S_IRUSR = 0o0400;
        /// write by owner
        const S_IWUSR = 0o0200;
        /// execute/search by owner
        const S_IXUSR = 0o0100;
        /// read by group
        const S_IRGRP = 0o0040;
        /// write by group
        const S_IWGRP = 0o0020;
        /// execute/search by group
        const S_IXGRP = 0o0010;
        /// read by others
        const S_IROTH = 0o0004;
        /// write by others
        const S_IWOTH = 0o0002;
        /// execute/search by others
        const S_IXOTH = 0o0001;
    }
}

const_assert!(size_of::<RawInode>() == 128);

/// The raw inode on device.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, Pod)]
pub struct RawInode {
    /// File mode (type and permissions).
    pub mode: u16,
    /// Low 16 bits of User Id.
    pub uid: u16,
    /// Lower 32 bits of size in bytes.
    pub size_low: u32,
    /// Access time.
    pub atime: UnixTime,
    /// Creation time.
    pub ctime: UnixTime,
    /// Modification time.
    pub mtime: UnixTime,
    /// Deletion time.
    pub dtime: UnixTime,
    /// Low 16 bits of Group Id.
    pub gid: u16,
    pub hard_links: u16,
    /// Number of 512-byte sectors.
    pub blocks_count: u32,
    /// File flags.
    pub flags: u32,
    /// OS dependent Value 1.
    reserved1: u32,
    /// Pointers to blocks.
    pub block_ptrs: BlockPtrs,
    /// File version (for NFS).
    pub generation: u32,
    /// In revision 1, File ACL.
    pub file_acl: u32,
    /// In revision 1, Upper 32 bits of file size if it's a file,
    /// Directory ACL if it's a directory.
    pub size_high: u32,
    /// Fragment address.
    pub frag_addr: u32,
    /// OS dependent 2.
    pub os_dependent_2: Osd2,
}

/// OS dependent Value 2
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, Pod)]
pub struct Osd2 {
    /// Fragment number.
    pub frag_num: u8,
    /// Fragment size.
    pub frag_size: u8,
    pad1: u16,
    /// High 16 bits of User Id.
    pub uid_high: u16,
    /// High 16 bits of Group Id.
    pub gid_high: u16,
    reserved2: u32,
}
