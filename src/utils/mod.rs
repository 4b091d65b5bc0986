// SPDX-License-Identifier: MPL-2.0

pub use self::align_ext::AlignExt;
pub use self::dirty::Dirty;
pub use self::time::{SystemClock, TimeProvider, UnixTime};

mod align_ext;
mod dirty;
mod time;
