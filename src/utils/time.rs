// SPDX-License-Identifier: MPL-2.0

use core::time::Duration;
use pod::Pod;

/// Unix time measures time by the number of seconds that have elapsed since
/// the Unix epoch, without adjustments made due to leap seconds.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Pod)]
pub struct UnixTime {
    pub sec: u32,
}

impl UnixTime {
    pub const ZERO: Self = Self { sec: 0 };

    pub fn is_zero(&self) -> bool {
        self.sec == 0
    }
}

impl From<Duration> for UnixTime {
    fn from(duration: Duration) -> Self {
        Self {
            sec: duration.as_secs() as u32,
        }
    }
}

impl From<UnixTime> for Duration {
    fn from(time: UnixTime) -> Self {
        Duration::from_secs(time.sec as _)
    }
}

/// The source of creation and deletion timestamps.
pub trait TimeProvider {
    fn now(&self) -> UnixTime;
}

/// Reads the host wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeProvider for SystemClock {
    fn now(&self) -> UnixTime {
        let since_epoch = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        // A zero deletion time means "live", so never hand it out.
        UnixTime::from(since_epoch.max(Duration::from_secs(1)))
    }
}
