//! Host-side targets a job can be offloaded to.
use core::str::FromStr;
use std::sync::Arc;

use fpga::{DmaBuffer, ReadWrite};

use crate::{
    layout::{
        encode_result, result_region_size, Block, Job, BLOCK_LEN, JOB_LEN, RESULT_LEN,
    },
    search::search,
    sync::{InterruptHandler, State, Synchronizer, Wait},
    Error, Result,
};

#[repr(usize)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
/// Word-indexed registers of the hasher core.
pub enum Register {
    BlockAddress = 0,
    Blocks = 1,
    Difficulty = 2,
    Start = 3,
    Stop = 4,
    Done = 5,
    ResultAddress = 6,
    /// global interrupt enable
    InterruptEnable = 7,
    /// interrupt status, toggle-on-write
    InterruptStatus = 8,
}

/// Number of registers the core decodes.
pub const REGISTERS: usize = 9;

/// Done bit of [`Register::InterruptStatus`].
pub const ISR_DONE: u32 = 1;

/// Something that runs a job to completion over a DMA buffer.
pub trait Offload {
    fn name(&self) -> &'static str;

    /// Run `job` over `buffer`; the result region is readable on return.
    fn execute<B: DmaBuffer>(&mut self, job: &Job, buffer: &mut B) -> Result<()>;
}

/// Check that `buffer` is the memory `job` describes.
pub fn check_buffer<B: DmaBuffer>(job: &Job, buffer: &B) -> Result<()> {
    if job.block_address != buffer.phys() {
        return Err(Error::AddressRange(job.block_address));
    }
    let needed = job.result_offset() + result_region_size(job.blocks());
    if buffer.len() < needed {
        return Err(Error::BufferTooSmall {
            needed,
            len: buffer.len(),
        });
    }
    Ok(())
}

/// The hasher core, driven register by register.
pub struct Accelerator<P> {
    sync: Synchronizer<P>,
}

impl<P: ReadWrite<u32>> Accelerator<P> {
    pub fn new(port: Arc<P>, wait: Wait) -> Self {
        let mut sync = Synchronizer::new(port, wait);
        sync.reset();
        Self { sync }
    }

    pub fn interrupt_handler(&self) -> InterruptHandler<P> {
        self.sync.interrupt_handler()
    }

    pub fn state(&self) -> State {
        self.sync.state()
    }

    pub fn synchronizer(&mut self) -> &mut Synchronizer<P> {
        &mut self.sync
    }
}

impl<P: ReadWrite<u32>> Offload for Accelerator<P> {
    fn name(&self) -> &'static str {
        "Accelerator"
    }

    fn execute<B: DmaBuffer>(&mut self, job: &Job, buffer: &mut B) -> Result<()> {
        check_buffer(job, buffer)?;
        self.sync.submit(job)
    }
}

/// The hasher core behind its kernel driver.
pub struct KernelDriver {
    driver: fpga::Driver,
}

impl KernelDriver {
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self {
            driver: fpga::Driver::open(path)?,
        })
    }
}

impl Offload for KernelDriver {
    fn name(&self) -> &'static str {
        "Accelerator"
    }

    fn execute<B: DmaBuffer>(&mut self, job: &Job, buffer: &mut B) -> Result<()> {
        check_buffer(job, buffer)?;
        let message: [u8; JOB_LEN] = job.encode()?;
        match self.driver.submit(&message)? {
            0 => Ok(()),
            status => Err(Error::Rejected(status)),
        }
    }
}

/// Software reference: the same search, block by block, on the calling thread.
#[derive(Copy, Clone, Debug, Default)]
pub struct Cpu;

impl Offload for Cpu {
    fn name(&self) -> &'static str {
        "CPU"
    }

    fn execute<B: DmaBuffer>(&mut self, job: &Job, buffer: &mut B) -> Result<()> {
        check_buffer(job, buffer)?;
        let results = job.result_offset();
        let mut block: Block = [0u8; BLOCK_LEN];
        for i in 0..job.blocks() {
            buffer.read(i * BLOCK_LEN, &mut block)?;
            let result = search(&mut block, job.difficulty_mask);
            buffer.write(results + i * RESULT_LEN, &encode_result(&result))?;
        }
        Ok(())
    }
}

/// Which target(s) a benchmark run measures.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Target {
    /// the core alone
    Accelerator,
    Cpu,
    /// accelerator and CPU, side by side
    Compare,
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, String> {
        match s {
            "accelerator" | "accel" => Ok(Target::Accelerator),
            "cpu" => Ok(Target::Cpu),
            "compare" => Ok(Target::Compare),
            _ => Err(format!(
                "unknown target '{}', expected accelerator, cpu or compare",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        layout::{buffer_size, decode_result},
        search::{mask, verify},
        testing::random_blocks,
    };
    use fpga::{Allocator as _, HostMemory};

    #[test]
    fn cpu_writes_one_result_per_block() {
        let memory = HostMemory::new(1 << 16);
        let blocks = random_blocks(7, 3);
        let mut buffer = memory.allocate(buffer_size(3)).unwrap();
        for (i, block) in blocks.iter().enumerate() {
            buffer.write(i * BLOCK_LEN, block).unwrap();
        }
        let mask = mask(6).unwrap();
        let job = Job::new(buffer.phys(), 3, mask).unwrap();
        Cpu.execute(&job, &mut buffer).unwrap();

        let mut region = vec![0u8; result_region_size(3)];
        buffer.read(job.result_offset(), &mut region).unwrap();
        for (i, block) in blocks.iter().enumerate() {
            let result = decode_result(&region, i).unwrap();
            let expected = search(&mut block.clone(), mask);
            assert_eq!(result, expected);
            assert!(verify(block, &result, mask));
        }
    }

    #[test]
    fn rejects_foreign_or_short_buffers() {
        let memory = HostMemory::new(1 << 16);
        let mut small = memory.allocate(buffer_size(2) - 1).unwrap();
        let job = Job::new(small.phys(), 2, 0).unwrap();
        assert!(matches!(
            Cpu.execute(&job, &mut small),
            Err(Error::BufferTooSmall { .. })
        ));

        let mut other = memory.allocate(buffer_size(2)).unwrap();
        assert!(matches!(
            Cpu.execute(&job, &mut other),
            Err(Error::AddressRange(_))
        ));
    }

    #[test]
    fn parses_targets() {
        assert_eq!("cpu".parse::<Target>(), Ok(Target::Cpu));
        assert_eq!("accel".parse::<Target>(), Ok(Target::Accelerator));
        assert_eq!("compare".parse::<Target>(), Ok(Target::Compare));
        assert!("gpu".parse::<Target>().is_err());
    }
}
