// SPDX-License-Identifier: MPL-2.0

pub use self::disk::Disk;

/// The block number on the image.
pub type Bid = u32;
pub const BLOCK_SIZE: usize = 1024;
pub const BLOCK_SIZE_LOG2: u8 = 10;

mod disk;
