// SPDX-License-Identifier: MPL-2.0

pub(crate) use bitflags::bitflags;
pub(crate) use pod::Pod;
pub(crate) use static_assertions::const_assert;

pub(crate) use crate::{
    bio::{Bid, Disk, BLOCK_SIZE, BLOCK_SIZE_LOG2},
    error::{Ext2Error, Result},
};

pub(crate) use core::{fmt::Debug, mem::size_of, ops::Range};
