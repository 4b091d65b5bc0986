// SPDX-License-Identifier: MPL-2.0

//! Views over the block and inode bitmaps.
//!
//! A bitmap holds one bit per index, 1 meaning allocated. Index `i` of the
//! inode bitmap describes inode `i + 1`; index `i` of the block bitmap
//! describes block `i + first_data_block`. Both bitmaps fit in one block of
//! the single block group.

use bitvec::prelude::*;

use crate::prelude::*;

/// The first inode bitmap index handed out by the allocator.
///
/// Inodes 1 to 11 are reserved by ext2 (bad blocks, root, ..., lost+found).
pub const FIRST_FREE_INODE_IDX: usize = 11;

/// The first block bitmap index handed out by the allocator.
///
/// The leading blocks of the image hold the superblock, the group descriptor,
/// both bitmaps and the start of the inode table.
pub const FIRST_FREE_BLOCK_IDX: usize = 22;

/// A read-only bitmap view limited to the indices in use.
#[derive(Clone, Copy)]
pub struct Bitmap<'a> {
    bits: &'a BitSlice<u8, Lsb0>,
}

impl<'a> Bitmap<'a> {
    /// Views the first `len` bits of `bytes`.
    pub fn new(bytes: &'a [u8], len: usize) -> Self {
        let bits = BitSlice::<u8, Lsb0>::from_slice(bytes);
        Self {
            bits: &bits[..len.min(bits.len())],
        }
    }

    /// Returns the number of indices described.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Returns whether the bit at `idx` is set.
    ///
    /// Indices outside of the bitmap are reported as unallocated.
    pub fn is_allocated(&self, idx: usize) -> bool {
        self.bits.get(idx).map_or(false, |bit| *bit)
    }

    /// Returns the lowest free index at or above `start`.
    pub fn find_free(&self, start: usize) -> Option<usize> {
        self.bits
            .get(start..)?
            .first_zero()
            .map(|offset| start + offset)
    }

    /// Returns the number of free indices.
    pub fn count_free(&self) -> usize {
        self.bits.count_zeros()
    }

    /// Returns the bitmap as a string of `0`/`1`, grouped by byte.
    pub fn to_bit_string(&self) -> String {
        let mut s = String::with_capacity(self.len() + self.len() / 8);
        for (idx, bit) in self.bits.iter().enumerate() {
            if idx > 0 && idx % 8 == 0 {
                s.push(' ');
            }
            s.push(if *bit { '1' } else { '0' });
        }
        s
    }
}

/// A mutable bitmap view limited to the indices in use.
pub struct BitmapMut<'a> {
    bits: &'a mut BitSlice<u8, Lsb0>,
}

impl<'a> BitmapMut<'a> {
    /// Views the first `len` bits of `bytes` mutably.
    pub fn new(bytes: &'a mut [u8], len: usize) -> Self {
        let bits = BitSlice::<u8, Lsb0>::from_slice_mut(bytes);
        let len = len.min(bits.len());
        Self {
            bits: &mut bits[..len],
        }
    }

    /// Reborrows as a read-only view.
    pub fn view(&self) -> Bitmap<'_> {
        Bitmap { bits: &*self.bits }
    }

    /// Marks `idx` allocated.
    pub fn set(&mut self, idx: usize) -> Result<()> {
        self.check_idx(idx)?;
        self.bits.set(idx, true);
        Ok(())
    }

    /// Marks `idx` free.
    pub fn clear(&mut self, idx: usize) -> Result<()> {
        self.check_idx(idx)?;
        self.bits.set(idx, false);
        Ok(())
    }

    /// Finds the lowest free index at or above `start` and marks it allocated.
    pub fn alloc(&mut self, start: usize) -> Option<usize> {
        let idx = self.view().find_free(start)?;
        self.bits.set(idx, true);
        Some(idx)
    }

    fn check_idx(&self, idx: usize) -> Result<()> {
        if idx >= self.bits.len() {
            return Err(Ext2Error::Corrupted(format!(
                "bitmap index {} out of range (len {})",
                idx,
                self.bits.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn lsb_first_bit_order() {
        let bytes = [0b0000_0101u8, 0x00];
        let bitmap = Bitmap::new(&bytes, 16);
        assert!(bitmap.is_allocated(0));
        assert!(!bitmap.is_allocated(1));
        assert!(bitmap.is_allocated(2));
        assert_eq!(bitmap.find_free(0), Some(1));
        assert_eq!(bitmap.find_free(2), Some(3));
        assert_eq!(bitmap.count_free(), 14);
        assert_eq!(bitmap.to_bit_string(), "10100000 00000000");
    }

    #[test]
    fn length_limits_search() {
        let bytes = [0xffu8, 0x0f];
        let bitmap = Bitmap::new(&bytes, 12);
        assert_eq!(bitmap.find_free(0), None);
        assert_eq!(bitmap.count_free(), 0);
        assert!(!bitmap.is_allocated(12));
        assert_eq!(bitmap.find_free(40), None);
    }

    #[test]
    fn set_out_of_range_fails() {
        let mut bytes = [0u8; 2];
        let mut bitmap = BitmapMut::new(&mut bytes, 10);
        assert!(bitmap.set(10).is_err());
        assert!(bitmap.clear(9).is_ok());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn alloc_then_clear_round_trips(
            seed in proptest::collection::vec(any::<u8>(), 8),
            start in 0usize..64,
        ) {
            let mut bytes = seed.clone();
            let free_before = Bitmap::new(&bytes, 64).count_free();
            let mut bitmap = BitmapMut::new(&mut bytes, 64);
            if let Some(idx) = bitmap.alloc(start) {
                prop_assert!(idx >= start);
                prop_assert!(bitmap.view().is_allocated(idx));
                prop_assert_eq!(bitmap.view().count_free(), free_before - 1);
                bitmap.clear(idx).unwrap();
                prop_assert!(!bitmap.view().is_allocated(idx));
            }
            prop_assert_eq!(bytes, seed);
        }

        #[test]
        fn find_free_is_lowest_free_index(
            seed in proptest::collection::vec(any::<u8>(), 4),
            start in 0usize..32,
        ) {
            let bitmap = Bitmap::new(&seed, 32);
            let expected = (start..32).find(|&idx| (seed[idx / 8] >> (idx % 8)) & 1 == 0);
            prop_assert_eq!(bitmap.find_free(start), expected);
        }
    }
}
