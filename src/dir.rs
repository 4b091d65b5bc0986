// SPDX-License-Identifier: MPL-2.0

//! Directory entries and their layout inside directory blocks.
//!
//! Entries form a chain inside each block: the record length of one entry is
//! the distance to the next, and the record lengths of a block always sum to
//! exactly [`BLOCK_SIZE`]. A removed entry is never wiped; its record length
//! is merged into the preceding entry, so its bytes survive as slack.

use std::borrow::Cow;

use crate::{
    fs::{AllocPlan, Ext2},
    inode::{FileType, Inode, MAX_FNAME_LEN, SECTORS_PER_BLOCK},
    prelude::*,
    utils::AlignExt,
};

/// The data structure in a directory's data block. It is stored in a linked list.
///
/// Each entry contains the name of the entry, the inode number, the file type,
/// and the distance within the directory block to the next entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    /// The header part.
    header: DirEntryHeader,
    /// Name of the entry, up to 255 bytes, not null-terminated.
    name: Vec<u8>,
}

impl DirEntry {
    /// Constructs a new `DirEntry` object with the specified inode (`ino`),
    /// name (`name`), and file type (`file_type`).
    ///
    /// The record length is the minimal aligned size of the entry.
    pub fn new(ino: u32, name: &str, file_type: DirEntryFileType) -> Result<Self> {
        if name.len() > MAX_FNAME_LEN {
            return Err(Ext2Error::NameTooLong(name.to_string()));
        }
        let record_len = Self::len_for_name(name.len()) as u16;
        Ok(Self {
            header: DirEntryHeader {
                ino,
                record_len,
                name_len: name.len() as u8,
                file_type: file_type as u8,
            },
            name: name.as_bytes().to_vec(),
        })
    }

    /// Constructs a `DirEntry` with the name "." and `self_ino` as its inode.
    pub(crate) fn self_entry(self_ino: u32) -> Self {
        Self::from_parts(self_ino, b".", DirEntryFileType::Dir)
    }

    /// Constructs a `DirEntry` with the name ".." and `parent_ino` as its inode.
    pub(crate) fn parent_entry(parent_ino: u32) -> Self {
        Self::from_parts(parent_ino, b"..", DirEntryFileType::Dir)
    }

    fn from_parts(ino: u32, name: &[u8], file_type: DirEntryFileType) -> Self {
        Self {
            header: DirEntryHeader {
                ino,
                record_len: Self::len_for_name(name.len()) as u16,
                name_len: name.len() as u8,
                file_type: file_type as u8,
            },
            name: name.to_vec(),
        }
    }

    /// Returns the minimal aligned length of an entry named with `name_len` bytes.
    pub fn len_for_name(name_len: usize) -> usize {
        (Self::header_len() + name_len).align_up(4)
    }

    /// Returns the length of the header.
    pub(crate) fn header_len() -> usize {
        size_of::<DirEntryHeader>()
    }

    /// Returns the inode number, 0 for an unused entry.
    pub fn ino(&self) -> u32 {
        self.header.ino
    }

    /// Returns the name, lossily decoded.
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// Returns the raw name bytes.
    pub fn name_bytes(&self) -> &[u8] {
        &self.name
    }

    /// Returns the type tag. Unknown values read as [`DirEntryFileType::Unknown`].
    pub fn type_(&self) -> DirEntryFileType {
        DirEntryFileType::try_from(self.header.file_type).unwrap_or(DirEntryFileType::Unknown)
    }

    /// Returns the raw type tag.
    pub fn raw_type(&self) -> u8 {
        self.header.file_type
    }

    pub(crate) fn set_type(&mut self, file_type: DirEntryFileType) {
        self.header.file_type = file_type as u8;
    }

    /// Returns the distance to the next entry.
    pub fn record_len(&self) -> usize {
        self.header.record_len as _
    }

    /// Modifies the distance to the next entry.
    pub(crate) fn set_record_len(&mut self, record_len: usize) {
        debug_assert!(record_len >= self.actual_len());
        self.header.record_len = record_len as _;
    }

    /// Returns the actual length of the current entry.
    pub fn actual_len(&self) -> usize {
        Self::len_for_name(self.name.len())
    }

    /// Returns the length of the gap between the current entry and the next entry.
    pub fn gap_len(&self) -> usize {
        self.record_len().saturating_sub(self.actual_len())
    }

    /// Returns true if it is the "." or ".." entry.
    pub fn is_dot_or_dotdot(&self) -> bool {
        self.name == b"." || self.name == b".."
    }

    pub(crate) fn matches(&self, name: &str) -> bool {
        self.ino() != 0 && self.name == name.as_bytes()
    }
}

/// The header of `DirEntry`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod)]
struct DirEntryHeader {
    /// Inode number
    ino: u32,
    /// Directory entry length
    record_len: u16,
    /// Name Length
    name_len: u8,
    /// Type indicator
    file_type: u8,
}

const_assert!(size_of::<DirEntryHeader>() == 8);

/// The type indicator in the `DirEntry`.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DirEntryFileType {
    Unknown = 0,
    File = 1,
    Dir = 2,
    Char = 3,
    Block = 4,
    Fifo = 5,
    Socket = 6,
    Symlink = 7,
}

impl DirEntryFileType {
    /// Returns the tag matching the inode's mode, `Unknown` for a bad mode.
    pub fn of_inode(inode: &Inode) -> Self {
        inode.file_type().map_or(Self::Unknown, Self::from)
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
}

impl TryFrom<u8> for DirEntryFileType {
    type Error = Ext2Error;

    fn try_from(val: u8) -> Result<Self> {
        match val {
            val if val == Self::Unknown as u8 => Ok(Self::Unknown),
            val if val == Self::File as u8 => Ok(Self::File),
            val if val == Self::Dir as u8 => Ok(Self::Dir),
            val if val == Self::Char as u8 => Ok(Self::Char),
            val if val == Self::Block as u8 => Ok(Self::Block),
            val if val == Self::Fifo as u8 => Ok(Self::Fifo),
            val if val == Self::Socket as u8 => Ok(Self::Socket),
            val if val == Self::Symlink as u8 => Ok(Self::Symlink),
            _ => Err(Ext2Error::Corrupted(format!("unknown entry type {}", val))),
        }
    }
}

impl From<FileType> for DirEntryFileType {
    fn from(file_type: FileType) -> Self {
        match file_type {
            FileType::Fifo => Self::Fifo,
            FileType::Char => Self::Char,
            FileType::Dir => Self::Dir,
            FileType::Block => Self::Block,
            FileType::File => Self::File,
            FileType::Symlink => Self::Symlink,
            FileType::Socket => Self::Socket,
        }
    }
}

/// Reads the entry whose header starts at `offset` of a directory block.
///
/// Only the bounds are checked, so it can also decode stale entries found in
/// slack space.
pub(crate) fn read_entry_at(buf: &[u8], offset: usize) -> Result<DirEntry> {
    let header_end = offset + DirEntry::header_len();
    if header_end > buf.len() {
        return Err(Ext2Error::Corrupted(format!(
            "directory entry header at {} crosses the block end",
            offset
        )));
    }
    let mut header = DirEntryHeader::new_zeroed();
    header
        .as_bytes_mut()
        .copy_from_slice(&buf[offset..header_end]);
    let name_end = header_end + header.name_len as usize;
    if name_end > buf.len() {
        return Err(Ext2Error::Corrupted(format!(
            "directory entry name at {} crosses the block end",
            offset
        )));
    }
    Ok(DirEntry {
        header,
        name: buf[header_end..name_end].to_vec(),
    })
}

/// A reader walking the chain of entries of one directory block.
pub struct DirEntryReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> DirEntryReader<'a> {
    /// Constructs a reader over the directory block `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// Reads one `DirEntry` from the current offset.
    pub fn read_entry(&mut self) -> Result<DirEntry> {
        let entry = read_entry_at(self.buf, self.offset)?;
        let record_len = entry.record_len();
        if record_len < DirEntry::header_len()
            || record_len % 4 != 0
            || self.offset + record_len > self.buf.len()
            || entry.actual_len() > record_len
        {
            return Err(Ext2Error::Corrupted(format!(
                "bad record length {} at offset {}",
                record_len, self.offset
            )));
        }
        self.offset += record_len;
        Ok(entry)
    }
}

impl<'a> Iterator for DirEntryReader<'a> {
    type Item = Result<(usize, DirEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.buf.len() {
            return None;
        }
        let offset = self.offset;
        match self.read_entry() {
            Ok(entry) => Some(Ok((offset, entry))),
            Err(err) => {
                self.offset = self.buf.len();
                Some(Err(err))
            }
        }
    }
}

/// Collects the chain of entries of one directory block.
pub(crate) fn block_entries(buf: &[u8]) -> Result<Vec<(usize, DirEntry)>> {
    DirEntryReader::new(buf).collect()
}

/// The effect of removing an entry from a directory block.
#[derive(Debug)]
pub(crate) enum Removal {
    /// The entry was merged into the preceding entry's record.
    Merged(DirEntry),
    /// The entry was alone in the block; the block is no longer needed.
    WholeBlock(DirEntry),
    /// The entry heads a block shared with later entries; it was marked unused.
    Cleared(DirEntry),
}

impl Removal {
    pub fn entry(&self) -> &DirEntry {
        match self {
            Self::Merged(entry) | Self::WholeBlock(entry) | Self::Cleared(entry) => entry,
        }
    }
}

/// A writer for modifying the entries of one directory block.
pub struct DirEntryWriter<'a> {
    buf: &'a mut [u8],
}

impl<'a> DirEntryWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf }
    }

    /// Writes a `DirEntry` at `offset`, leaving the bytes past its name untouched.
    pub fn write_entry(&mut self, offset: usize, entry: &DirEntry) -> Result<()> {
        let name_offset = offset + DirEntry::header_len();
        if name_offset + entry.name.len() > self.buf.len() {
            return Err(Ext2Error::Corrupted(format!(
                "directory entry at {} does not fit in the block",
                offset
            )));
        }
        self.buf[offset..name_offset].copy_from_slice(entry.header.as_bytes());
        self.buf[name_offset..name_offset + entry.name.len()].copy_from_slice(&entry.name);
        Ok(())
    }

    /// Starts an empty block holding `entry` alone.
    pub fn init_block(&mut self, mut entry: DirEntry) -> Result<()> {
        self.buf.fill(0);
        entry.set_record_len(self.buf.len());
        self.write_entry(0, &entry)
    }

    /// Writes the "." and ".." entries of a new directory.
    pub fn init_dir_block(&mut self, self_ino: u32, parent_ino: u32) -> Result<()> {
        self.buf.fill(0);
        let dot = DirEntry::self_entry(self_ino);
        let mut dotdot = DirEntry::parent_entry(parent_ino);
        dotdot.set_record_len(self.buf.len() - dot.record_len());
        self.write_entry(0, &dot)?;
        self.write_entry(dot.record_len(), &dotdot)
    }

    /// Places `new_entry` into the slack of the last entry of the block.
    ///
    /// Returns false, leaving the block unchanged, if the slack is too small.
    pub fn append_entry(&mut self, mut new_entry: DirEntry) -> Result<bool> {
        let Some((offset, mut last)) = block_entries(self.buf)?.pop() else {
            return Ok(false);
        };
        if last.gap_len() < new_entry.actual_len() {
            return Ok(false);
        }
        let new_offset = offset + last.actual_len();
        new_entry.set_record_len(self.buf.len() - new_offset);
        last.set_record_len(last.actual_len());
        self.write_entry(offset, &last)?;
        self.write_entry(new_offset, &new_entry)?;
        Ok(true)
    }

    /// Removes the live entry named `name`, if the block holds one.
    pub(crate) fn remove_entry(&mut self, name: &str) -> Result<Option<Removal>> {
        let entries = block_entries(self.buf)?;
        let Some(pos) = entries.iter().position(|(_, entry)| entry.matches(name)) else {
            return Ok(None);
        };
        let (offset, entry) = entries[pos].clone();
        if pos == 0 {
            if entry.record_len() == self.buf.len() {
                return Ok(Some(Removal::WholeBlock(entry)));
            }
            let mut cleared = entry.clone();
            cleared.header.ino = 0;
            self.write_entry(offset, &cleared)?;
            return Ok(Some(Removal::Cleared(entry)));
        }
        let (pre_offset, mut pre_entry) = entries[pos - 1].clone();
        pre_entry.set_record_len(pre_entry.record_len() + entry.record_len());
        self.write_entry(pre_offset, &pre_entry)?;
        Ok(Some(Removal::Merged(entry)))
    }

    /// Rewrites the type tag of the entry at `offset`.
    pub(crate) fn set_type_at(&mut self, offset: usize, file_type: DirEntryFileType) -> Result<()> {
        let mut entry = read_entry_at(self.buf, offset)?;
        entry.set_type(file_type);
        self.write_entry(offset, &entry)
    }
}

impl Ext2 {
    /// Looks `name` up in the directory `dir_ino`.
    ///
    /// With `dirs_only`, entries not tagged as directories are skipped.
    pub fn lookup_entry(&self, dir_ino: u32, name: &str, dirs_only: bool) -> Result<u32> {
        if name.len() > MAX_FNAME_LEN {
            return Err(Ext2Error::NameTooLong(name.to_string()));
        }
        let dir = self.read_inode(dir_ino)?;
        for (_, bid) in dir.block_ptrs().directs() {
            for item in DirEntryReader::new(self.disk.block(bid)?) {
                let (_, entry) = item?;
                if !entry.matches(name) {
                    continue;
                }
                if dirs_only && entry.type_() != DirEntryFileType::Dir {
                    continue;
                }
                return Ok(entry.ino());
            }
        }
        Err(Ext2Error::NotFound(name.to_string()))
    }

    /// Returns the live entries of the directory `dir`, block after block.
    pub(crate) fn dir_entries(&self, dir: &Inode) -> Result<Vec<(Bid, usize, DirEntry)>> {
        let mut entries = Vec::new();
        for (_, bid) in dir.block_ptrs().directs() {
            for item in DirEntryReader::new(self.disk.block(bid)?) {
                let (offset, entry) = item?;
                if entry.ino() != 0 {
                    entries.push((bid, offset, entry));
                }
            }
        }
        Ok(entries)
    }

    /// Adds the entry `name` -> `ino` to the directory `dir_ino`.
    ///
    /// The entry goes into the slack of the last entry of the last block, or
    /// else into a newly allocated block recorded in `plan`.
    pub(crate) fn insert_entry(
        &mut self,
        dir_ino: u32,
        name: &str,
        ino: u32,
        file_type: DirEntryFileType,
        plan: &mut AllocPlan,
    ) -> Result<()> {
        let new_entry = DirEntry::new(ino, name, file_type)?;
        let mut dir = self.read_inode(dir_ino)?;
        if let Some((_, last_bid)) = dir.block_ptrs().directs().last() {
            let mut writer = DirEntryWriter::new(self.disk.block_mut(last_bid)?);
            if writer.append_entry(new_entry.clone())? {
                debug!("dir {}: entry '{}' placed in block {}", dir_ino, name, last_bid);
                return Ok(());
            }
        }

        let slot = dir
            .block_ptrs()
            .first_free_direct()
            .ok_or(Ext2Error::NoSpace("directory uses all direct blocks"))?;
        let bid = self.alloc_block(plan)?;
        DirEntryWriter::new(self.disk.block_mut(bid)?).init_block(new_entry)?;
        dir.block_ptrs_mut().set_direct(slot, bid);
        dir.set_file_size(dir.file_size() + BLOCK_SIZE);
        dir.set_blocks_count(dir.blocks_count() + SECTORS_PER_BLOCK);
        self.write_inode(&dir)?;
        debug!("dir {}: entry '{}' placed in new block {}", dir_ino, name, bid);
        Ok(())
    }

    /// Removes the entry `name` from the directory `dir_ino`.
    ///
    /// A block left without entries is released.
    pub(crate) fn remove_entry(&mut self, dir_ino: u32, name: &str) -> Result<DirEntry> {
        let mut dir = self.read_inode(dir_ino)?;
        let blocks: Vec<(usize, Bid)> = dir.block_ptrs().directs().collect();
        for (slot, bid) in blocks {
            let Some(removal) = DirEntryWriter::new(self.disk.block_mut(bid)?).remove_entry(name)?
            else {
                continue;
            };
            debug!("dir {}: entry '{}' removed from block {}: {:?}", dir_ino, name, bid, removal);
            if let Removal::WholeBlock(_) = removal {
                dir.block_ptrs_mut().set_direct(slot, 0);
                dir.set_file_size(dir.file_size().saturating_sub(BLOCK_SIZE));
                dir.set_blocks_count(dir.blocks_count().saturating_sub(SECTORS_PER_BLOCK));
                self.write_inode(&dir)?;
                self.free_block(bid)?;
            }
            return Ok(removal.entry().clone());
        }
        Err(Ext2Error::NotFound(name.to_string()))
    }
}
