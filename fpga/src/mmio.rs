use std::{
    ffi::CString,
    fs,
    os::unix::ffi::OsStrExt as _,
    path::{Path, PathBuf},
};

use crate::{buffer::check_bounds, Allocator, DmaBuffer, Error, Flush, ReadWrite, Result, Write};

const DEV_MEM: &str = "/dev/mem";

/// Register window size; the hasher only decodes the first few words.
pub const MAP_SIZE: usize = 0x1_0000;

fn map(path: &Path, offset: u64, size: usize) -> Result<*mut u8> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| Error::Io(std::io::Error::from(std::io::ErrorKind::InvalidInput)))?;
    unsafe {
        let fd = libc::open(c_path.as_ptr(), libc::O_RDWR | libc::O_SYNC);
        if fd < 0 {
            let error = std::io::Error::last_os_error();
            return Err(match error.kind() {
                std::io::ErrorKind::PermissionDenied => Error::SudoRequired,
                _ => Error::Io(error),
            });
        }
        let ptr = libc::mmap(
            core::ptr::null_mut(),
            size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            offset as libc::off_t,
        );
        // the mapping outlives the descriptor
        libc::close(fd);
        if ptr == libc::MAP_FAILED {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
        Ok(ptr as *mut u8)
    }
}

#[inline(always)]
fn barrier() {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        core::arch::x86_64::_mm_mfence();
    }
    #[cfg(not(target_arch = "x86_64"))]
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
}

/// Hasher registers mapped from `/dev/mem`.
pub struct Mmio {
    regs: *mut u32,
    size: usize,
}

// accesses are volatile, the mapping is shared with the interrupt handler
unsafe impl Send for Mmio {}
unsafe impl Sync for Mmio {}

impl Mmio {
    pub fn open(base: u64, size: usize) -> Result<Self> {
        let regs = map(Path::new(DEV_MEM), base, size)? as *mut u32;
        tracing::debug!("mapped {:#x} bytes of registers at {:#010x}", size, base);
        Ok(Self { regs, size })
    }

    #[inline(always)]
    fn register(&self, index: usize) -> *mut u32 {
        assert!((index << 2) < self.size);
        unsafe { self.regs.add(index) }
    }
}

impl Drop for Mmio {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.regs as *mut libc::c_void, self.size);
        }
    }
}

impl Flush for Mmio {
    fn flush(&self) {
        barrier();
    }
}

impl Write<u32> for Mmio {
    fn write(&self, index: usize, value: &u32) {
        unsafe { self.register(index).write_volatile(*value) }
    }
}

impl ReadWrite<u32> for Mmio {
    fn read(&self, index: usize) -> u32 {
        unsafe { self.register(index).read_volatile() }
    }
}

/// Physically contiguous memory exported by the `u-dma-buf` kernel module.
pub struct Udmabuf {
    device: PathBuf,
    size: usize,
    phys: u32,
}

impl Udmabuf {
    /// Open `/dev/<name>`, e.g. `udmabuf0`.
    pub fn open(name: &str) -> Result<Self> {
        let class = PathBuf::from("/sys/class/u-dma-buf").join(name);
        let size = read_sysfs(&class.join("size"), 10)?;
        let phys = read_sysfs(&class.join("phys_addr"), 16)?;
        let phys = u32::try_from(phys)
            .map_err(|_| Error::Io(std::io::Error::from(std::io::ErrorKind::InvalidData)))?;
        tracing::debug!("{}: {} bytes at {:#010x}", name, size, phys);
        Ok(Self {
            device: PathBuf::from("/dev").join(name),
            size: size as usize,
            phys,
        })
    }
}

fn read_sysfs(path: &Path, radix: u32) -> Result<u64> {
    let text = fs::read_to_string(path)?;
    let text = text.trim();
    let digits = text.strip_prefix("0x").unwrap_or(text);
    u64::from_str_radix(digits, radix)
        .map_err(|_| Error::Io(std::io::Error::from(std::io::ErrorKind::InvalidData)))
}

impl Allocator for Udmabuf {
    type Buffer = UdmabufBuffer;

    /// Every allocation maps the start of the buffer; one job is in flight at a time.
    fn allocate(&self, len: usize) -> Result<UdmabufBuffer> {
        if len > self.size {
            return Err(Error::OutOfMemory {
                requested: len,
                available: self.size,
            });
        }
        let ptr = map(&self.device, 0, len)?;
        Ok(UdmabufBuffer {
            ptr,
            len,
            phys: self.phys,
        })
    }
}

pub struct UdmabufBuffer {
    ptr: *mut u8,
    len: usize,
    phys: u32,
}

unsafe impl Send for UdmabufBuffer {}

impl DmaBuffer for UdmabufBuffer {
    fn phys(&self) -> u32 {
        self.phys
    }

    fn len(&self) -> usize {
        self.len
    }

    fn read(&self, offset: usize, data: &mut [u8]) -> Result<()> {
        check_bounds(offset, data.len(), self.len)?;
        barrier();
        unsafe {
            core::ptr::copy_nonoverlapping(self.ptr.add(offset), data.as_mut_ptr(), data.len());
        }
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        check_bounds(offset, data.len(), self.len)?;
        unsafe {
            core::ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.add(offset), data.len());
        }
        barrier();
        Ok(())
    }
}

impl Drop for UdmabufBuffer {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.len);
        }
    }
}
