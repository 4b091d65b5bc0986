// SPDX-License-Identifier: MPL-2.0

/// Rounds integers to a power-of-two boundary.
///
/// On-disk records of ext2 are padded to 4 bytes and data is accounted in
/// 512-byte sectors and 1024-byte blocks, all powers of two.
pub trait AlignExt {
    /// Returns the smallest multiple of `power_of_two` that is greater than
    /// or equal to `self`.
    ///
    /// # Panics
    ///
    /// Panics if `power_of_two` is not a power of two or the result overflows.
    ///
    /// # Examples
    ///
    /// ```
    /// assert_eq!(13usize.align_up(4), 16);
    /// assert_eq!(12usize.align_up(4), 12);
    /// ```
    fn align_up(self, power_of_two: Self) -> Self;

    /// Returns the greatest multiple of `power_of_two` that is smaller than
    /// or equal to `self`.
    fn align_down(self, power_of_two: Self) -> Self;
}

macro_rules! impl_align_ext {
    ($( $uint_type:ty ),+ $(,)?) => {
        $(
            impl AlignExt for $uint_type {
                #[inline]
                fn align_up(self, align: Self) -> Self {
                    assert!(align.is_power_of_two());
                    match self.checked_add(align - 1) {
                        Some(val) => val & !(align - 1),
                        None => panic!("{} aligned up to {} overflows", self, align),
                    }
                }

                #[inline]
                fn align_down(self, align: Self) -> Self {
                    assert!(align.is_power_of_two());
                    self & !(align - 1)
                }
            }
        )*
    }
}

impl_align_ext!(u16, u32, usize);
