//! # fpga
//!
//! Rust traits to interact with the SHA-1 hasher FPGA.
//!
//! Register access goes through a small "device port" made of the
//! [`Flush`], [`Write`] and [`ReadWrite`] traits. Ports take `&self`: the
//! submitting thread and the interrupt handler share one port, and every
//! register write is independently observable by the device.
//!
//! Implemented for memory-mapped registers under Linux (`/dev/mem`), for the
//! hasher kernel driver (`/dev/hasher`), and for `u-dma-buf` buffers.

use thiserror::Error;

pub mod align;
pub use align::Aligned;

pub mod buffer;
pub use buffer::{Allocator, DmaBuffer, HostBuffer, HostMemory, PhysicalMemory};

pub mod driver;
pub use driver::Driver;

#[cfg(all(feature = "mmio", target_os = "linux"))]
pub mod mmio;
#[cfg(all(feature = "mmio", target_os = "linux"))]
pub use mmio::{Mmio, Udmabuf};

/// Base of the hasher's AXI-lite register window on the Zynq boards.
pub const BASE_MAP: u64 = 0x43C0_0000;

#[derive(Debug, Error)]
pub enum Error {
    #[error("FPGA drivers require running as root.")]
    SudoRequired,
    #[error("device I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot allocate {requested} bytes of DMA memory ({available} available)")]
    OutOfMemory { requested: usize, available: usize },
    #[error("access of {len} bytes at offset {offset} is out of bounds")]
    OutOfBounds { offset: usize, len: usize },
    #[error("physical address {0:#010x} is not backed by any buffer")]
    Unmapped(u32),
}

pub type Result<T> = core::result::Result<T, Error>;

/// Memory barrier between register accesses.
pub trait Flush {
    /// order all previous register accesses before any later ones
    fn flush(&self);
}

/// Index-based register writes.
pub trait Write<V>: Flush {
    /// write value to register index
    fn write(&self, index: usize, value: &V);
}

/// Index-based register read/writes.
pub trait ReadWrite<V>: Write<V> {
    /// read value at register index
    fn read(&self, index: usize) -> V;
}
