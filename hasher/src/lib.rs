//! Host-side benchmark of the SHA-1 nonce-search accelerator.
//!
//! The accelerator takes a batch of 64-byte blocks and, for each, searches
//! for the smallest nonce whose single-block SHA-1 compression has its first
//! state word clear under a difficulty mask. This crate describes such jobs
//! in memory, hands them to the core (register by register, or through its
//! kernel driver), waits for completion, and measures latency and hash rate
//! against the same search run on the CPU.
//!
//! Steps:
//! - lay out blocks, pad and result records in a DMA buffer ([`layout`])
//! - submit the job and wait for completion ([`sync`], [`app`])
//! - decode results and aggregate timings over sweeps ([`harness`], [`report`])

pub mod app;
pub use app::{Accelerator, Cpu, KernelDriver, Offload, Register, Target};

pub mod harness;
pub use harness::{Config, Harness};

pub mod layout;
pub use layout::{Block, Digest, HashResult, Job};

pub mod report;
pub use report::Report;

pub mod search;

pub mod sim;
pub use sim::Simulator;

pub mod sync;
pub use sync::{State, Synchronizer, Wait};

pub mod testing;

pub mod timing;

pub use fpga;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Fpga(#[from] fpga::Error),
    #[error("difficulty {0} is above 32")]
    InvalidDifficulty(u32),
    #[error("a job needs at least one block")]
    EmptyJob,
    #[error("job at {0:#010x} does not match its buffer or the 32-bit address space")]
    AddressRange(u32),
    #[error("buffer of {len} bytes is too small, {needed} needed")]
    BufferTooSmall { needed: usize, len: usize },
    #[error("device rejected the job (status {0})")]
    Rejected(usize),
    #[error("interrupt line released while waiting for completion")]
    Aborted,
    #[error("result for block {0} does not solve it")]
    Mismatch(usize),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("cannot write report: {0}")]
    Report(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, Error>;
