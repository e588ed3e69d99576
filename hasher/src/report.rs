//! JSON report of a benchmark sweep.
//!
//! ```json
//! [
//!   {
//!     "DIFFICULTY": "f0000000",
//!     "BLOCK_EXPERIMENTS": [
//!       { "Blocks": 1, "min_time": 0.1, "max_time": 0.2, "avg_time": 0.15, "avg_hash_per_sec": 1e6 }
//!     ]
//!   }
//! ]
//! ```
//!
//! When two targets are compared, each block entry carries an `Accelerator`
//! and a `CPU` object instead of the flat statistics.

use std::io;

use serde::Serialize;

use crate::Result;

/// Latency and throughput over the repetitions of one experiment.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct Statistics {
    /// milliseconds
    pub min_time: f64,
    /// milliseconds
    pub max_time: f64,
    /// milliseconds
    pub avg_time: f64,
    pub avg_hash_per_sec: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Measurements {
    Single(Statistics),
    Compared {
        #[serde(rename = "Accelerator")]
        accelerator: Statistics,
        #[serde(rename = "CPU")]
        cpu: Statistics,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlockReport {
    #[serde(rename = "Blocks")]
    pub blocks: u32,
    #[serde(flatten)]
    pub measurements: Measurements,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DifficultyReport {
    /// the difficulty mask, as eight hex digits
    #[serde(rename = "DIFFICULTY")]
    pub difficulty: String,
    #[serde(rename = "BLOCK_EXPERIMENTS")]
    pub experiments: Vec<BlockReport>,
}

impl DifficultyReport {
    pub fn new(mask: u32) -> Self {
        Self {
            difficulty: format!("{:08x}", mask),
            experiments: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Report {
    pub difficulties: Vec<DifficultyReport>,
}

impl Report {
    pub fn write(&self, writer: impl io::Write) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
