use std::{io::Write as _, sync::Arc};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use hasher_bench::{
    fpga::{Allocator, HostMemory},
    layout::buffer_size,
    timing::always_timed,
    Accelerator, Config, Cpu, Harness, Offload, Result, Simulator, Target, Wait,
};

#[path = "../bin-lib/args.rs"]
mod args;
use args::Args;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args: Args = argh::from_env();
    init_logging(args.verbose);

    if let Err(error) = run(&args) {
        error!("{}", error);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = args.config()?;
    let wait = args.wait()?;

    if args.target == Target::Cpu {
        let harness = Harness::new(HostMemory::new(sim_capacity(&config)), config)?;
        return execute(args, &harness, &mut Cpu);
    }
    if args.sim {
        return simulated(args, config, wait);
    }
    hardware(args, config, wait)
}

fn sim_capacity(config: &Config) -> usize {
    buffer_size(config.max_blocks.max(2) as usize)
}

fn simulated(args: &Args, config: Config, wait: Wait) -> Result<()> {
    let memory = HostMemory::new(sim_capacity(&config));
    let sim = Arc::new(Simulator::new(memory.clone()));
    let mut accelerator = Accelerator::new(sim.clone(), wait);
    if wait == Wait::Interrupt {
        sim.attach(accelerator.interrupt_handler());
    }
    info!("simulated accelerator, {:?} wait", wait);

    let harness = Harness::new(memory, config)?;
    let result = execute(args, &harness, &mut accelerator);
    sim.detach();
    info!("simulator ran {} jobs, raised {} interrupts", sim.jobs(), sim.interrupts());
    result
}

#[cfg(all(feature = "hw", target_os = "linux"))]
fn hardware(args: &Args, config: Config, wait: Wait) -> Result<()> {
    use hasher_bench::{
        fpga::{mmio::MAP_SIZE, Mmio, Udmabuf},
        KernelDriver,
    };

    let memory = Udmabuf::open(&args.udmabuf)?;
    let harness = Harness::new(memory, config)?;
    if args.driver {
        if wait == Wait::Poll {
            tracing::warn!("the kernel driver always waits on the interrupt");
        }
        info!("accelerator through {}", args.device);
        let mut driver = KernelDriver::open(&args.device)?;
        execute(args, &harness, &mut driver)
    } else {
        info!("accelerator registers at {:#010x}", args.base);
        let port = Arc::new(Mmio::open(args.base, MAP_SIZE)?);
        let mut accelerator = Accelerator::new(port, wait);
        execute(args, &harness, &mut accelerator)
    }
}

#[cfg(not(all(feature = "hw", target_os = "linux")))]
fn hardware(_: &Args, _: Config, _: Wait) -> Result<()> {
    Err(hasher_bench::Error::Config(
        "built without hardware support, use --sim or --target cpu".into(),
    ))
}

fn execute<A: Allocator, T: Offload>(args: &Args, harness: &Harness<A>, target: &mut T) -> Result<()> {
    if args.check {
        always_timed("check", || harness.check(target))?;
        info!("==> SUCCESS <==");
        return Ok(());
    }

    let report = match args.target {
        Target::Compare => always_timed("sweep", || harness.compare(target, &mut Cpu))?,
        Target::Accelerator | Target::Cpu => always_timed("sweep", || harness.run(target))?,
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    report.write(&mut out)?;
    writeln!(out).map_err(hasher_bench::fpga::Error::from)?;
    Ok(())
}
