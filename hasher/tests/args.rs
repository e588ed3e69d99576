use argh::FromArgs as _;

use hasher_bench::{fpga::BASE_MAP, Config, Error, Target, Wait};

#[path = "../src/bin-lib/args.rs"]
mod args;
use args::Args;

fn parse(line: &[&str]) -> Args {
    match Args::from_args(&["hasher-bench"], line) {
        Ok(args) => args,
        Err(exit) => panic!("{:?} rejected: {}", line, exit.output),
    }
}

#[test]
fn defaults_without_positionals() {
    let args = parse(&[]);
    assert_eq!(args.config().unwrap(), Config::default());
    assert_eq!(args.target, Target::Compare);
    assert_eq!(args.base, BASE_MAP);
}

#[test]
fn three_positionals_set_the_sweep() {
    let config = parse(&["9", "3", "12"]).config().unwrap();
    assert_eq!(config.max_blocks, 9);
    assert_eq!(config.experiments, 3);
    assert_eq!(config.max_difficulty, 12);
    assert_eq!(config.min_difficulty, 4);
}

#[test]
fn partial_positionals_are_a_usage_error() {
    assert!(matches!(parse(&["16", "5"]).config(), Err(Error::Config(_))));
    assert!(matches!(parse(&["16"]).config(), Err(Error::Config(_))));
    assert!(matches!(
        parse(&["16", "5", "16", "1"]).config(),
        Err(Error::Config(_))
    ));
}

#[test]
fn difficulty_above_32_is_rejected() {
    assert!(matches!(
        parse(&["16", "5", "33"]).config(),
        Err(Error::InvalidDifficulty(33))
    ));
    assert!(parse(&["16", "5", "32"]).config().is_ok());
}

#[test]
fn low_max_difficulty_gives_an_empty_sweep() {
    let config = parse(&["16", "5", "2"]).config().unwrap();
    assert_eq!(config.difficulties().count(), 0);

    // an explicit lower bound above the upper one is a mistake
    assert!(matches!(
        parse(&["--min-difficulty", "8", "16", "5", "4"]).config(),
        Err(Error::Config(_))
    ));
    let config = parse(&["--min-difficulty", "2", "16", "5", "2"]).config().unwrap();
    assert_eq!(config.difficulties().collect::<Vec<_>>(), [2]);
}

#[test]
fn wait_policy_defaults() {
    assert_eq!(parse(&[]).wait().unwrap(), Wait::Poll);
    assert_eq!(parse(&["--sim"]).wait().unwrap(), Wait::Interrupt);
    assert_eq!(parse(&["--driver"]).wait().unwrap(), Wait::Interrupt);
    assert_eq!(
        parse(&["--sim", "--wait", "poll"]).wait().unwrap(),
        Wait::Poll
    );
}

#[test]
fn interrupt_wait_needs_an_interrupt_line() {
    assert!(matches!(
        parse(&["--wait", "interrupt"]).wait(),
        Err(Error::Config(_))
    ));
    assert_eq!(
        parse(&["--wait", "interrupt", "--sim"]).wait().unwrap(),
        Wait::Interrupt
    );
}

#[test]
fn base_is_parsed_as_hex() {
    assert_eq!(parse(&["--base", "0x4000_0000"]).base, 0x4000_0000);
    assert_eq!(parse(&["--base", "43c10000"]).base, 0x43C1_0000);
    assert!(Args::from_args(&["hasher-bench"], &["--base", "xyz"]).is_err());
}
