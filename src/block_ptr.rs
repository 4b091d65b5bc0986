// SPDX-License-Identifier: MPL-2.0

use crate::prelude::*;

/// The pointers to blocks for an inode.
///
/// Only the direct pointers and the single indirect pointer are used by these
/// tools; the doubly and trebly indirect slots are kept zero.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Pod)]
pub struct BlockPtrs {
    inner: [u32; BLOCK_PTR_CNT],
}

impl BlockPtrs {
    /// Returns the direct block ID, 0 if unused.
    ///
    /// # Panic
    ///
    /// If the `idx` is out of bounds, this method will panic.
    pub fn direct(&self, idx: usize) -> Bid {
        assert!(DIRECT_RANGE.contains(&idx));
        self.inner[idx]
    }

    /// Sets the direct block ID.
    ///
    /// # Panic
    ///
    /// If the `idx` is out of bounds, this method will panic.
    pub fn set_direct(&mut self, idx: usize, bid: Bid) {
        assert!(DIRECT_RANGE.contains(&idx));
        self.inner[idx] = bid;
    }

    /// Returns the block ID of single indirect block pointer.
    pub fn indirect(&self) -> Bid {
        self.inner[INDIRECT]
    }

    /// Sets the block ID of single indirect block pointer.
    pub fn set_indirect(&mut self, bid: Bid) {
        self.inner[INDIRECT] = bid;
    }

    /// Returns the non-zero direct block IDs along with their slots.
    pub fn directs(&self) -> impl Iterator<Item = (usize, Bid)> + '_ {
        self.inner[DIRECT_RANGE]
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, bid)| *bid != 0)
    }

    /// Returns the first unused direct slot.
    pub fn first_free_direct(&self) -> Option<usize> {
        DIRECT_RANGE.into_iter().find(|&idx| self.inner[idx] == 0)
    }

    /// Views it as a slice of `u8` bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }
}

/// Where the `n`-th block of a file is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidPath {
    /// Slot of the direct pointer array.
    Direct(usize),
    /// Index within the single indirect block.
    Indirect(usize),
}

impl TryFrom<u32> for BidPath {
    type Error = Ext2Error;

    fn try_from(bid: u32) -> Result<Self> {
        if bid < DIRECT_CNT {
            Ok(Self::Direct(bid as usize))
        } else if bid < DIRECT_CNT + INDIRECT_CNT {
            Ok(Self::Indirect((bid - DIRECT_CNT) as usize))
        } else {
            Err(Ext2Error::FileTooLarge {
                len: (bid as usize + 1) * BLOCK_SIZE,
                max: MAX_FILE_BLOCKS as usize * BLOCK_SIZE,
            })
        }
    }
}

/// A view of an indirect block: an array of block IDs, 0 meaning unused.
pub struct IndirectBlock<'a> {
    buf: &'a [u8],
}

impl<'a> IndirectBlock<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        debug_assert_eq!(buf.len(), BLOCK_SIZE);
        Self { buf }
    }

    /// Reads a bid at a specified `idx`.
    pub fn read_bid(&self, idx: usize) -> Bid {
        let offset = idx * BID_SIZE;
        let mut bytes = [0u8; BID_SIZE];
        bytes.copy_from_slice(&self.buf[offset..offset + BID_SIZE]);
        Bid::from_le_bytes(bytes)
    }

    /// Returns the non-zero block IDs in pointer order.
    pub fn bids(&self) -> impl Iterator<Item = Bid> + '_ {
        (0..INDIRECT_CNT as usize)
            .map(|idx| self.read_bid(idx))
            .filter(|bid| *bid != 0)
    }
}

/// Writes a bid at a specified `idx` of an indirect block.
pub fn write_indirect_bid(buf: &mut [u8], idx: usize, bid: Bid) {
    let offset = idx * BID_SIZE;
    buf[offset..offset + BID_SIZE].copy_from_slice(&bid.to_le_bytes());
}

/// Direct pointers to blocks.
pub const DIRECT_RANGE: core::ops::Range<usize> = 0..12;
/// The number of direct blocks.
pub const DIRECT_CNT: u32 = DIRECT_RANGE.end as u32;

/// Indirect pointer to blocks.
pub const INDIRECT: usize = DIRECT_RANGE.end;
/// The number of blocks addressed through the indirect block.
pub const INDIRECT_CNT: u32 = (BLOCK_SIZE / BID_SIZE) as u32;

/// The number of block pointers.
pub const BLOCK_PTR_CNT: usize = 15;

/// The largest number of data blocks a file can hold.
pub const MAX_FILE_BLOCKS: u32 = DIRECT_CNT + INDIRECT_CNT;

/// The size of of the block id.
pub const BID_SIZE: usize = size_of::<u32>();
