//! Benchmark sweeps over block count and difficulty.
use core::ops::Range;
use std::time::Duration;

use fpga::{Allocator, DmaBuffer};
use tracing::{debug, info};

use crate::{
    app::Offload,
    layout::{buffer_size, decode_result, result_region_size, HashResult, Job, BLOCK_LEN},
    report::{BlockReport, DifficultyReport, Measurements, Report, Statistics},
    search::{self, verify, MAX_DIFFICULTY},
    testing::{pattern_blocks, random_blocks, CHECK_MASK},
    timing::{millis, stopwatch, timed},
    Error, Result,
};

/// Sweep configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// block counts `1..max_blocks` are measured
    pub max_blocks: u32,
    /// repetitions per (difficulty, block count)
    pub experiments: u32,
    pub max_difficulty: u32,
    pub min_difficulty: u32,
    pub difficulty_step: u32,
    /// payload seed, reused for every repetition
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_blocks: 16,
            experiments: 5,
            max_difficulty: 16,
            min_difficulty: 4,
            difficulty_step: 4,
            seed: 12,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.max_difficulty > MAX_DIFFICULTY {
            return Err(Error::InvalidDifficulty(self.max_difficulty));
        }
        if self.difficulty_step == 0 {
            return Err(Error::Config("difficulty step must be positive".into()));
        }
        if self.max_blocks < 2 {
            return Err(Error::Config(format!(
                "max blocks must be at least 2, got {}",
                self.max_blocks
            )));
        }
        if self.experiments == 0 {
            return Err(Error::Config("at least one experiment is needed".into()));
        }
        Ok(())
    }

    /// Empty when `max_difficulty` is below `min_difficulty`.
    pub fn difficulties(&self) -> impl Iterator<Item = u32> {
        (self.min_difficulty..=self.max_difficulty).step_by(self.difficulty_step.max(1) as usize)
    }

    pub fn block_counts(&self) -> Range<u32> {
        1..self.max_blocks
    }
}

/// One timed job.
#[derive(Clone, Debug)]
pub struct Experiment {
    pub elapsed: Duration,
    pub results: Vec<HashResult>,
}

impl Experiment {
    /// Hashes per second, counting each winning nonce as that many attempts.
    pub fn hash_rate(&self) -> f64 {
        hash_rate(&self.results, self.elapsed)
    }
}

pub fn hash_rate(results: &[HashResult], elapsed: Duration) -> f64 {
    let ms = millis(elapsed);
    if ms == 0.0 {
        return 0.0;
    }
    let nonces: u64 = results.iter().map(|result| result.nonce as u64).sum();
    nonces as f64 * 1000.0 / ms
}

/// Name of one repetition in step timings; empty when they are compiled out.
fn label(target: &str, blocks: u32, mask: u32) -> String {
    if cfg!(feature = "timings") {
        format!("{} {}x{:08x}", target, blocks, mask)
    } else {
        String::new()
    }
}

#[derive(Copy, Clone, Debug)]
struct Accumulator {
    min: f64,
    max: f64,
    time: f64,
    rate: f64,
    count: u32,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: 0.0,
            time: 0.0,
            rate: 0.0,
            count: 0,
        }
    }
}

impl Accumulator {
    fn add(&mut self, experiment: &Experiment) {
        let ms = millis(experiment.elapsed);
        self.min = self.min.min(ms);
        self.max = self.max.max(ms);
        self.time += ms;
        self.rate += experiment.hash_rate();
        self.count += 1;
    }

    fn statistics(&self) -> Statistics {
        if self.count == 0 {
            return Statistics::default();
        }
        let n = self.count as f64;
        Statistics {
            min_time: self.min,
            max_time: self.max,
            avg_time: self.time / n,
            avg_hash_per_sec: self.rate / n,
        }
    }
}

/// Drives jobs through offload targets and aggregates their timings.
pub struct Harness<A> {
    allocator: A,
    config: Config,
}

impl<A: Allocator> Harness<A> {
    pub fn new(allocator: A, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { allocator, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn prepare(&self, blocks: &[[u8; BLOCK_LEN]], mask: u32) -> Result<(A::Buffer, Job)> {
        let count = blocks.len();
        let mut buffer = self.allocator.allocate(buffer_size(count))?;
        for (i, block) in blocks.iter().enumerate() {
            buffer.write(i * BLOCK_LEN, block)?;
        }
        let count = u32::try_from(count).map_err(|_| Error::Config("too many blocks".into()))?;
        let job = Job::new(buffer.phys(), count, mask)?;
        Ok((buffer, job))
    }

    fn collect(buffer: &A::Buffer, job: &Job) -> Result<Vec<HashResult>> {
        let mut region = vec![0u8; result_region_size(job.blocks())];
        buffer.read(job.result_offset(), &mut region)?;
        (0..job.blocks())
            .map(|i| decode_result(&region, i))
            .collect()
    }

    /// Run `blocks` through `target` once, timing only the offload.
    pub fn run_blocks<T: Offload>(
        &self,
        target: &mut T,
        blocks: &[[u8; BLOCK_LEN]],
        mask: u32,
    ) -> Result<Experiment> {
        let (mut buffer, job) = self.prepare(blocks, mask)?;
        let (executed, elapsed) = stopwatch(|| target.execute(&job, &mut buffer));
        executed?;
        let results = Self::collect(&buffer, &job)?;
        Ok(Experiment { elapsed, results })
    }

    /// One repetition on freshly seeded payload.
    pub fn run_experiment<T: Offload>(
        &self,
        target: &mut T,
        blocks: u32,
        mask: u32,
    ) -> Result<Experiment> {
        let payload = random_blocks(self.config.seed, blocks as usize);
        timed(&label(target.name(), blocks, mask), || {
            self.run_blocks(target, &payload, mask)
        })
    }

    /// All repetitions of one (difficulty, block count) point.
    pub fn measure<T: Offload>(&self, target: &mut T, blocks: u32, mask: u32) -> Result<Statistics> {
        let mut accumulator = Accumulator::default();
        for _ in 0..self.config.experiments {
            accumulator.add(&self.run_experiment(target, blocks, mask)?);
        }
        Ok(accumulator.statistics())
    }

    fn sweep(&self, mut point: impl FnMut(u32, u32) -> Result<Measurements>) -> Result<Report> {
        let mut report = Report::default();
        for difficulty in self.config.difficulties() {
            let mask = search::mask(difficulty)?;
            let mut entry = DifficultyReport::new(mask);
            for blocks in self.config.block_counts() {
                let measurements = point(blocks, mask)?;
                info!(
                    "difficulty {:2} ({:08x}), {:2} blocks: {:?}",
                    difficulty, mask, blocks, measurements
                );
                entry.experiments.push(BlockReport {
                    blocks,
                    measurements,
                });
            }
            report.difficulties.push(entry);
        }
        Ok(report)
    }

    /// Full sweep over a single target.
    pub fn run<T: Offload>(&self, target: &mut T) -> Result<Report> {
        info!("sweeping {} with {:?}", target.name(), self.config);
        self.sweep(|blocks, mask| Ok(Measurements::Single(self.measure(target, blocks, mask)?)))
    }

    /// Full sweep, accelerator and CPU back to back per repetition.
    pub fn compare<H: Offload, C: Offload>(&self, accelerator: &mut H, cpu: &mut C) -> Result<Report> {
        info!(
            "comparing {} against {} with {:?}",
            accelerator.name(),
            cpu.name(),
            self.config
        );
        self.sweep(|blocks, mask| {
            let mut on_accelerator = Accumulator::default();
            let mut on_cpu = Accumulator::default();
            for _ in 0..self.config.experiments {
                on_accelerator.add(&self.run_experiment(accelerator, blocks, mask)?);
                on_cpu.add(&self.run_experiment(cpu, blocks, mask)?);
            }
            Ok(Measurements::Compared {
                accelerator: on_accelerator.statistics(),
                cpu: on_cpu.statistics(),
            })
        })
    }

    /// Functional check on the two pattern blocks.
    pub fn check<T: Offload>(&self, target: &mut T) -> Result<Vec<HashResult>> {
        let blocks = pattern_blocks();
        let experiment = self.run_blocks(target, &blocks, CHECK_MASK)?;
        info!("{} check took {:?}", target.name(), experiment.elapsed);
        for (i, (block, result)) in blocks.iter().zip(&experiment.results).enumerate() {
            info!("block {}: hash {} nonce {:08x}", i, result.digest, result.nonce);
            if !verify(block, result, CHECK_MASK) {
                return Err(Error::Mismatch(i));
            }
            debug!("block {} verified", i);
        }
        Ok(experiment.results)
    }
}
