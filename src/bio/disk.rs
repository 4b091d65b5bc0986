// SPDX-License-Identifier: MPL-2.0

use pod::Pod;

use crate::prelude::*;

use super::{Bid, BLOCK_SIZE, BLOCK_SIZE_LOG2};

/// The raw image bytes, addressed by block number or byte offset.
///
/// Every access is bounds-checked before any bytes are interpreted, so a
/// corrupted pointer surfaces as an error instead of a panic.
#[derive(Clone)]
pub struct Disk {
    buf: Vec<u8>,
}

impl Disk {
    /// Wraps the image bytes.
    pub fn new(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    /// Returns the total number of whole blocks in the image.
    pub fn total_blocks(&self) -> usize {
        self.buf.len() >> BLOCK_SIZE_LOG2
    }

    /// Returns the total number of bytes in the image.
    pub fn total_bytes(&self) -> usize {
        self.buf.len()
    }

    /// Views the whole image.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the disk and returns the image bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns the byte range occupied by the block `bid`.
    pub fn block_range(&self, bid: Bid) -> Result<Range<usize>> {
        let start = (bid as usize) << BLOCK_SIZE_LOG2;
        let end = start + BLOCK_SIZE;
        if end > self.buf.len() {
            return Err(Ext2Error::Corrupted(format!(
                "block {} is beyond the end of the image ({} blocks)",
                bid,
                self.total_blocks()
            )));
        }
        Ok(start..end)
    }

    /// Views one block.
    pub fn block(&self, bid: Bid) -> Result<&[u8]> {
        let range = self.block_range(bid)?;
        Ok(&self.buf[range])
    }

    /// Views one block mutably.
    pub fn block_mut(&mut self, bid: Bid) -> Result<&mut [u8]> {
        let range = self.block_range(bid)?;
        Ok(&mut self.buf[range])
    }

    /// Fills one block with zeros.
    pub fn zero_block(&mut self, bid: Bid) -> Result<()> {
        self.block_mut(bid)?.fill(0);
        Ok(())
    }

    /// Reads a specified number of bytes at a specified offset into a given buffer.
    pub fn read_bytes(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        let range = self.byte_range(offset, buf.len())?;
        buf.copy_from_slice(&self.buf[range]);
        Ok(())
    }

    /// Writes a specified number of bytes from a given buffer at a specified offset.
    pub fn write_bytes(&mut self, offset: usize, buf: &[u8]) -> Result<()> {
        let range = self.byte_range(offset, buf.len())?;
        self.buf[range].copy_from_slice(buf);
        Ok(())
    }

    /// Reads a value of a specified type at a specified offset.
    pub fn read_val<T: Pod>(&self, offset: usize) -> Result<T> {
        let mut val = T::new_zeroed();
        self.read_bytes(offset, val.as_bytes_mut())?;
        Ok(val)
    }

    /// Writes a value of a specified type at a specified offset.
    pub fn write_val<T: Pod>(&mut self, offset: usize, new_val: &T) -> Result<()> {
        self.write_bytes(offset, new_val.as_bytes())
    }

    fn byte_range(&self, offset: usize, len: usize) -> Result<Range<usize>> {
        let max_offset = offset
            .checked_add(len)
            .ok_or_else(|| Ext2Error::Corrupted(format!("offset {} overflows", offset)))?;
        if max_offset > self.buf.len() {
            return Err(Ext2Error::Corrupted(format!(
                "bytes {}..{} are beyond the end of the image",
                offset, max_offset
            )));
        }
        Ok(offset..max_offset)
    }
}

impl Debug for Disk {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Disk")
            .field("total_blocks", &self.total_blocks())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn typed_access_within_bounds() {
        let mut disk = Disk::new(vec![0u8; 4 * BLOCK_SIZE]);
        disk.write_val(BLOCK_SIZE + 4, &0xdead_beef_u32).unwrap();
        assert_eq!(disk.read_val::<u32>(BLOCK_SIZE + 4).unwrap(), 0xdead_beef);
        assert_eq!(&disk.block(1).unwrap()[4..8], &0xdead_beef_u32.to_le_bytes());
    }

    #[test]
    fn out_of_range_access_is_rejected() {
        let mut disk = Disk::new(vec![0u8; 2 * BLOCK_SIZE]);
        assert!(disk.block(2).is_err());
        assert!(disk.read_val::<u32>(2 * BLOCK_SIZE - 2).is_err());
        assert!(disk.write_bytes(usize::MAX, &[1]).is_err());
        assert!(disk.block_mut(1).is_ok());
    }
}
