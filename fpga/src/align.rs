use core::ops::{Deref, DerefMut};

#[repr(align(64))]
#[derive(Copy, Clone, Debug)]
struct Align512;

/// Aligns entries to 64 byte (512 bit) boundaries.
///
/// The hasher reads its input one 512-bit block at a time, so DMA memory
/// handed to it is built from 64-byte aligned lines.
pub struct Aligned<T> {
    // this 0-sized, 64-byte aligned entry aligns the entire struct
    __: [Align512; 0],
    pub(crate) value: T,
}

/// One 64-byte aligned line of DMA memory.
pub type Line = Aligned<[u8; LINE]>;

/// Size of a [`Line`] in bytes.
pub const LINE: usize = 64;

impl<T: Clone> Clone for Aligned<T> {
    fn clone(&self) -> Self {
        Self {
            __: [],
            value: self.value.clone(),
        }
    }
}

impl<T: Copy> Copy for Aligned<T> {}

impl<T> Deref for Aligned<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Aligned<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

/// Align a value
pub const fn align<T>(value: T) -> Aligned<T> {
    Aligned { __: [], value }
}

impl Default for Line {
    fn default() -> Self {
        align([0u8; LINE])
    }
}

/// Number of lines needed to hold `len` bytes.
pub const fn lines_for(len: usize) -> usize {
    (len + LINE - 1) / LINE
}
