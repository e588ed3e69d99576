//! Physically addressable DMA buffers.
//!
//! The hasher is programmed with physical addresses, while the host reads and
//! writes payload through its own mapping. A [`DmaBuffer`] tracks both.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    align::{lines_for, Line, LINE},
    Error, Result,
};

/// Memory the device can reach by physical address.
pub trait DmaBuffer {
    /// physical address of the first byte, as seen by the device
    fn phys(&self) -> u32;

    /// usable size in bytes
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// copy `data.len()` bytes starting at `offset` out of the buffer
    fn read(&self, offset: usize, data: &mut [u8]) -> Result<()>;

    /// copy `data` into the buffer starting at `offset`
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()>;
}

/// Source of [`DmaBuffer`]s. Buffers are freed when dropped.
pub trait Allocator {
    type Buffer: DmaBuffer;

    fn allocate(&self, len: usize) -> Result<Self::Buffer>;
}

/// Device-side view of memory, addressed physically.
pub trait PhysicalMemory: Send + Sync {
    fn read(&self, phys: u32, data: &mut [u8]) -> Result<()>;
    fn write(&self, phys: u32, data: &[u8]) -> Result<()>;
}

pub(crate) fn check_bounds(offset: usize, len: usize, size: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(Error::OutOfBounds { offset, len }),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Lines = Arc<Mutex<Vec<Line>>>;

fn copy_out(lines: &[Line], offset: usize, data: &mut [u8]) {
    let mut done = 0;
    while done < data.len() {
        let at = offset + done;
        let line = &lines[at / LINE];
        let start = at % LINE;
        let n = (LINE - start).min(data.len() - done);
        data[done..done + n].copy_from_slice(&line[start..start + n]);
        done += n;
    }
}

fn copy_in(lines: &mut [Line], offset: usize, data: &[u8]) {
    let mut done = 0;
    while done < data.len() {
        let at = offset + done;
        let line = &mut lines[at / LINE];
        let start = at % LINE;
        let n = (LINE - start).min(data.len() - done);
        line[start..start + n].copy_from_slice(&data[done..done + n]);
        done += n;
    }
}

struct Region {
    base: u32,
    len: usize,
    lines: Lines,
}

impl Region {
    fn end(&self) -> u64 {
        self.base as u64 + (lines_for(self.len) * LINE) as u64
    }
}

struct Inner {
    base: u32,
    capacity: usize,
    regions: Mutex<Vec<Region>>,
}

/// Heap-backed DMA memory with a simulated physical address window.
///
/// Allocations are 64-byte aligned both in host memory and in the simulated
/// physical window, so the accelerator model can resolve the addresses a job
/// carries back to the bytes the harness wrote.
#[derive(Clone)]
pub struct HostMemory(Arc<Inner>);

/// Start of the simulated physical window.
pub const HOST_PHYS_BASE: u32 = 0x1000_0000;

impl HostMemory {
    pub fn new(capacity: usize) -> Self {
        Self::with_base(HOST_PHYS_BASE, capacity)
    }

    pub fn with_base(base: u32, capacity: usize) -> Self {
        assert_eq!(base as usize % LINE, 0);
        Self(Arc::new(Inner {
            base,
            capacity,
            regions: Mutex::new(Vec::new()),
        }))
    }

    /// bytes currently handed out, rounded to whole lines
    pub fn in_use(&self) -> usize {
        lock(&self.0.regions)
            .iter()
            .map(|region| lines_for(region.len) * LINE)
            .sum()
    }

    fn resolve(&self, phys: u32, len: usize) -> Result<(Lines, usize)> {
        let regions = lock(&self.0.regions);
        let region = regions
            .iter()
            .find(|region| region.base <= phys && (phys as u64) < region.end())
            .ok_or(Error::Unmapped(phys))?;
        let offset = (phys - region.base) as usize;
        check_bounds(offset, len, region.len)?;
        Ok((region.lines.clone(), offset))
    }

    fn release(&self, base: u32) {
        lock(&self.0.regions).retain(|region| region.base != base);
    }
}

impl Allocator for HostMemory {
    type Buffer = HostBuffer;

    fn allocate(&self, len: usize) -> Result<HostBuffer> {
        let size = lines_for(len) * LINE;
        let mut regions = lock(&self.0.regions);

        // place after the highest live region, the window is reused once it drains
        let window_start = self.0.base as u64;
        let start = regions
            .iter()
            .map(Region::end)
            .max()
            .unwrap_or(window_start);
        let used = (start - window_start) as usize;
        if used + size > self.0.capacity || start + size as u64 > u32::MAX as u64 {
            return Err(Error::OutOfMemory {
                requested: len,
                available: self.0.capacity.saturating_sub(used),
            });
        }

        let lines: Lines = Arc::new(Mutex::new(vec![Line::default(); lines_for(len)]));
        let base = start as u32;
        regions.push(Region {
            base,
            len,
            lines: lines.clone(),
        });
        tracing::trace!("host dma: {} bytes at {:#010x}", len, base);

        Ok(HostBuffer {
            memory: self.clone(),
            base,
            len,
            lines,
        })
    }
}

impl PhysicalMemory for HostMemory {
    fn read(&self, phys: u32, data: &mut [u8]) -> Result<()> {
        let (lines, offset) = self.resolve(phys, data.len())?;
        copy_out(&lock(&lines), offset, data);
        Ok(())
    }

    fn write(&self, phys: u32, data: &[u8]) -> Result<()> {
        let (lines, offset) = self.resolve(phys, data.len())?;
        copy_in(&mut lock(&lines), offset, data);
        Ok(())
    }
}

/// Buffer handed out by [`HostMemory`].
pub struct HostBuffer {
    memory: HostMemory,
    base: u32,
    len: usize,
    lines: Lines,
}

impl DmaBuffer for HostBuffer {
    fn phys(&self) -> u32 {
        self.base
    }

    fn len(&self) -> usize {
        self.len
    }

    fn read(&self, offset: usize, data: &mut [u8]) -> Result<()> {
        check_bounds(offset, data.len(), self.len)?;
        copy_out(&lock(&self.lines), offset, data);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        check_bounds(offset, data.len(), self.len)?;
        copy_in(&mut lock(&self.lines), offset, data);
        Ok(())
    }
}

impl Drop for HostBuffer {
    fn drop(&mut self) {
        self.memory.release(self.base);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_sees_host_writes() {
        let memory = HostMemory::new(4096);
        let mut buffer = memory.allocate(200).unwrap();
        buffer.write(60, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

        let mut seen = [0u8; 8];
        PhysicalMemory::read(&memory, buffer.phys() + 60, &mut seen).unwrap();
        assert_eq!(seen, [1, 2, 3, 4, 5, 6, 7, 8]);

        PhysicalMemory::write(&memory, buffer.phys() + 190, &[9; 10]).unwrap();
        let mut tail = [0u8; 10];
        buffer.read(190, &mut tail).unwrap();
        assert_eq!(tail, [9; 10]);
    }

    #[test]
    fn allocations_are_aligned_and_disjoint() {
        let memory = HostMemory::new(4096);
        let a = memory.allocate(100).unwrap();
        let b = memory.allocate(10).unwrap();
        assert_eq!(a.phys() % 64, 0);
        assert_eq!(b.phys() % 64, 0);
        assert_eq!(b.phys(), a.phys() + 128);
        assert_eq!(memory.in_use(), 192);
    }

    #[test]
    fn window_drains_on_drop() {
        let memory = HostMemory::new(256);
        let first = memory.allocate(256).unwrap();
        let phys = first.phys();
        assert!(matches!(
            memory.allocate(1),
            Err(Error::OutOfMemory { requested: 1, available: 0 })
        ));
        drop(first);
        assert_eq!(memory.in_use(), 0);
        assert_eq!(memory.allocate(64).unwrap().phys(), phys);
    }

    #[test]
    fn rejects_out_of_bounds_and_unmapped() {
        let memory = HostMemory::new(4096);
        let mut buffer = memory.allocate(64).unwrap();
        assert!(matches!(
            buffer.write(60, &[0; 8]),
            Err(Error::OutOfBounds { offset: 60, len: 8 })
        ));
        let mut data = [0u8; 4];
        assert!(matches!(
            PhysicalMemory::read(&memory, 0x10, &mut data),
            Err(Error::Unmapped(0x10))
        ));
    }
}
