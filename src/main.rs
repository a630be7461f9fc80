// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use verifuzz::equiv::EquivChecker;
use verifuzz::fuzz::{self, Classification, FuzzConfig};
use verifuzz::generator;
use verifuzz::sim::Simulator;
use verifuzz::synth::{Synth, SynthConfig};

/// Differential fuzzer for Verilog synthesis toolchains.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Seed for reproducible generation; disables the automatic retries.
    #[arg(long)]
    seed: Option<u64>,

    /// Parent directory for run folders.
    #[arg(long, default_value = "fuzz_out")]
    dir: PathBuf,

    /// Run-folder prefix.
    #[arg(long, default_value = "run")]
    prefix: String,

    /// Keep passing run directories instead of deleting them.
    #[arg(long)]
    keep: bool,

    /// Generator size budget (expression depth and body-item bound).
    #[arg(long, default_value_t = 5)]
    size: u32,

    /// Per-tool timeout in seconds.
    #[arg(long, default_value_t = 120)]
    timeout: u64,

    /// Also synthesize with the vivado back-end.
    #[arg(long)]
    with_vivado: bool,

    /// Also synthesize with the xst/netgen back-end.
    #[arg(long)]
    with_xst: bool,

    /// Yosys executable (synthesis and equivalence checking).
    #[arg(long, default_value = "yosys")]
    yosys: String,

    /// Vivado executable.
    #[arg(long, default_value = "vivado")]
    vivado: String,

    /// Xst executable.
    #[arg(long, default_value = "xst")]
    xst: String,

    /// Netgen executable (re-emits xst netlists as Verilog).
    #[arg(long, default_value = "netgen")]
    netgen: String,

    /// Simulator compile step.
    #[arg(long, default_value = "iverilog")]
    iverilog: String,

    /// Simulator run step.
    #[arg(long, default_value = "vvp")]
    vvp: String,
}

fn main() -> Result<()> {
    let _ = env_logger::builder().init();
    let args = Args::parse();
    fuzz::register_sigint();

    let timeout = Duration::from_secs(args.timeout);
    let synth_config = SynthConfig {
        yosys: args.yosys.clone(),
        vivado: args.vivado.clone(),
        xst: args.xst.clone(),
        netgen: args.netgen.clone(),
    };
    let mut synths = vec![Synth::identity(), Synth::yosys(&synth_config)];
    if args.with_vivado {
        synths.push(Synth::vivado(&synth_config));
    }
    if args.with_xst {
        synths.push(Synth::xst(&synth_config));
    }

    let config = FuzzConfig {
        gen_config: generator::Config::default(),
        size: args.size,
        synths,
        checker: EquivChecker {
            exe: args.yosys,
            timeout,
        },
        simulator: Simulator {
            compiler: args.iverilog,
            runtime: args.vvp,
            timeout,
        },
        synth_timeout: timeout,
        keep: args.keep,
    };

    std::fs::create_dir_all(&args.dir)?;
    let results = fuzz::fuzz(&config, args.seed, &args.prefix, &args.dir);

    let passed = results
        .iter()
        .filter(|c| **c == Classification::Pass)
        .count();
    let failed = results
        .iter()
        .filter(|c| **c == Classification::Fail)
        .count();
    let timeouts = results
        .iter()
        .filter(|c| **c == Classification::Timeout)
        .count();
    println!(
        "{} runs: {} passed, {} failed, {} timed out",
        results.len(),
        passed,
        failed,
        timeouts
    );
    if failed > 0 || timeouts > 0 {
        println!("artifacts retained under {}", args.dir.display());
    }
    Ok(())
}
