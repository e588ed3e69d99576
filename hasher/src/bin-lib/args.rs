//! Command line of the hasher benchmark.

use hasher_bench::{Config, Error, Result, Target, Wait};

#[derive(argh::FromArgs)]
/// Benchmark the SHA-1 hasher accelerator against the CPU.
pub struct Args {
    /// max_blocks experiments max_difficulty, all three or none
    #[argh(positional)]
    pub sweep: Vec<u32>,

    /// accelerator, cpu or compare (default)
    #[argh(option, default = "Target::Compare")]
    pub target: Target,

    /// interrupt or poll; defaults to interrupt under --sim and --driver, poll otherwise
    #[argh(option)]
    pub wait: Option<Wait>,

    /// reach the accelerator through its kernel driver
    #[argh(switch)]
    pub driver: bool,

    /// drive the in-memory model of the accelerator
    #[argh(switch)]
    pub sim: bool,

    /// run the two-block functional check instead of a sweep
    #[argh(switch)]
    pub check: bool,

    /// payload seed
    #[argh(option, default = "12")]
    pub seed: u64,

    /// lowest difficulty of the sweep, 4 unless given
    #[argh(option)]
    pub min_difficulty: Option<u32>,

    /// difficulty increment of the sweep
    #[argh(option, default = "4")]
    pub difficulty_step: u32,

    /// device node of the kernel driver
    #[argh(option, default = "String::from(hasher_bench::fpga::driver::DEVICE)")]
    pub device: String,

    /// u-dma-buf holding the job buffers
    #[argh(option, default = "String::from(\"udmabuf0\")")]
    pub udmabuf: String,

    /// physical base of the register window, in hex
    #[argh(option, default = "hasher_bench::fpga::BASE_MAP", from_str_fn(parse_hex))]
    pub base: u64,

    /// verbose output
    #[argh(switch, short = 'v')]
    pub verbose: bool,
}

fn parse_hex(value: &str) -> core::result::Result<u64, String> {
    let digits = value.trim_start_matches("0x").replace('_', "");
    u64::from_str_radix(&digits, 16).map_err(|error| format!("bad address '{}': {}", value, error))
}

impl Args {
    /// The sweep described on the command line, validated.
    pub fn config(&self) -> Result<Config> {
        let mut config = Config {
            seed: self.seed,
            difficulty_step: self.difficulty_step,
            ..Config::default()
        };
        match self.sweep[..] {
            [] => {}
            [max_blocks, experiments, max_difficulty] => {
                config.max_blocks = max_blocks;
                config.experiments = experiments;
                config.max_difficulty = max_difficulty;
            }
            _ => {
                return Err(Error::Config(
                    "usage: hasher-bench [max_blocks experiments max_difficulty]".into(),
                ))
            }
        }
        if let Some(min_difficulty) = self.min_difficulty {
            if min_difficulty > config.max_difficulty {
                return Err(Error::Config(format!(
                    "min difficulty {} is above max difficulty {}",
                    min_difficulty, config.max_difficulty
                )));
            }
            config.min_difficulty = min_difficulty;
        }
        config.validate()?;
        Ok(config)
    }

    /// Wait policy, after defaults.
    pub fn wait(&self) -> Result<Wait> {
        match (self.wait, self.sim || self.driver) {
            (Some(Wait::Interrupt), false) => Err(Error::Config(
                "interrupt wait needs --sim or --driver, mapped registers can only poll".into(),
            )),
            (Some(wait), _) => Ok(wait),
            (None, true) => Ok(Wait::Interrupt),
            (None, false) => Ok(Wait::Poll),
        }
    }
}
