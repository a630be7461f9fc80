// SPDX-License-Identifier: Apache-2.0

//! The outer fuzz loop: generate, synthesize, compare, simulate, classify,
//! archive.
//!
//! One module at a time moves through the pipeline; the external tools are
//! the bottleneck, so there is nothing to gain from overlapping
//! iterations. Run directories are the durable record: everything needed
//! to reproduce a reported disagreement (seed, inputs, netlists, logs) is
//! on disk before the loop moves on.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::ast::validate;
use crate::equiv::{run_equiv, EquivChecker, EquivOutcome};
use crate::errors::VerifuzzError;
use crate::generator::{self, Gen};
use crate::sim::{self, SimOutcome, Simulator};
use crate::synth::{Synth, SynthOutcome};

/// Automatic retry count when no explicit seed pins the run.
const MAX_AUTO_RUNS: usize = 5;

static INTERRUPTED: Lazy<Arc<AtomicBool>> = Lazy::new(|| Arc::new(AtomicBool::new(false)));

/// Registers a SIGINT handler that stops the loop after the current
/// external invocation returns. Safe to call more than once.
pub fn register_sigint() {
    static REGISTERED: AtomicBool = AtomicBool::new(false);
    if !REGISTERED.swap(true, Ordering::SeqCst) {
        let _ = signal_hook::flag::register(
            signal_hook::consts::SIGINT,
            Arc::clone(&INTERRUPTED),
        );
    }
}

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Pass,
    Fail,
    Timeout,
}

impl Classification {
    fn archive_suffix(self) -> Option<&'static str> {
        match self {
            Classification::Pass => None,
            Classification::Fail => Some("_failed"),
            Classification::Timeout => Some("_timeout"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FuzzConfig {
    pub gen_config: generator::Config,
    /// Size budget handed to the generator.
    pub size: u32,
    pub synths: Vec<Synth>,
    pub checker: EquivChecker,
    pub simulator: Simulator,
    pub synth_timeout: Duration,
    /// Keep passing run directories instead of deleting them.
    pub keep: bool,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        FuzzConfig {
            gen_config: generator::Config::default(),
            size: 5,
            synths: vec![Synth::identity()],
            checker: EquivChecker::default(),
            simulator: Simulator::default(),
            synth_timeout: Duration::from_secs(120),
            keep: false,
        }
    }
}

#[derive(Serialize)]
struct EquivRecord {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    witness: Option<String>,
}

#[derive(Serialize)]
struct SimRecord {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_hash: Option<String>,
}

#[derive(Serialize)]
struct RunRecord {
    seed: u64,
    generator_version: &'static str,
    synth_results: Vec<SynthOutcome>,
    equiv: EquivRecord,
    sim: SimRecord,
    classification: Classification,
}

/// Runs one fuzz iteration in `<parent>/<prefix>_<index>`.
pub fn fuzz_once(
    config: &FuzzConfig,
    seed: Option<u64>,
    prefix: &str,
    parent: &Path,
    index: usize,
) -> Result<Classification, VerifuzzError> {
    let seed = seed.unwrap_or_else(generator::fresh_seed);
    log::info!("fuzz iteration {} with seed {}", index, seed);

    let mut gen = Gen::new(seed, config.gen_config);
    let src = gen.gen_source(config.size);
    validate(&src)?;
    let inputs = gen.gen_bytes(sim::input_len());

    let run_dir = parent.join(format!("{}_{}", prefix, index));
    std::fs::create_dir_all(&run_dir)
        .map_err(|e| VerifuzzError::fs(run_dir.display().to_string(), e))?;
    write_input_hex(&run_dir, &inputs)?;

    let equiv_report = run_equiv(
        &src,
        &config.synths,
        &config.checker,
        &run_dir,
        config.synth_timeout,
    );
    log::info!(
        "equivalence: {}",
        equiv_report.classification.status_str()
    );

    let sim_outcome = if interrupted() {
        SimOutcome::Fail
    } else {
        config.simulator.run(&src, &inputs, &run_dir)
    };
    if let SimOutcome::Ok { hash, .. } = &sim_outcome {
        std::fs::write(run_dir.join("sim_output.hex"), format!("{}\n", hash))
            .map_err(|e| VerifuzzError::fs("sim_output.hex", e))?;
    }

    let timed_out = equiv_report.timed_out || sim_outcome == SimOutcome::Timeout;
    let classification = if timed_out {
        Classification::Timeout
    } else if equiv_report.classification != EquivOutcome::Equiv || !sim_outcome.is_ok() {
        Classification::Fail
    } else {
        Classification::Pass
    };

    let record = RunRecord {
        seed,
        generator_version: env!("CARGO_PKG_VERSION"),
        synth_results: equiv_report.synth_outcomes.clone(),
        equiv: EquivRecord {
            status: equiv_report.classification.status_str(),
            witness: match &equiv_report.classification {
                EquivOutcome::Counterexample { witness } => Some(witness.clone()),
                _ => None,
            },
        },
        sim: SimRecord {
            ok: sim_outcome.is_ok(),
            output_hash: match &sim_outcome {
                SimOutcome::Ok { hash, .. } => Some(hash.clone()),
                _ => None,
            },
        },
        classification,
    };
    let json = serde_json::to_string_pretty(&record).expect("record serializes");
    std::fs::write(run_dir.join("run.json"), json)
        .map_err(|e| VerifuzzError::fs("run.json", e))?;

    if let Some(suffix) = classification.archive_suffix() {
        let archive = parent.join(format!("{}_{}{}", prefix, index, suffix));
        copy_dir_recursive(&run_dir, &archive)?;
        log::info!("archived failing run to {}", archive.display());
    }
    if !config.keep {
        let _ = std::fs::remove_dir_all(&run_dir);
    }
    Ok(classification)
}

/// Drives up to five iterations: an explicit seed pins the result to a
/// single reproducible run, no seed retries with fresh entropy.
pub fn fuzz(
    config: &FuzzConfig,
    seed: Option<u64>,
    prefix: &str,
    parent: &Path,
) -> Vec<Classification> {
    let mut results = Vec::new();
    let mut index = 1usize;
    loop {
        if interrupted() {
            log::warn!("interrupted; stopping after {} iterations", results.len());
            break;
        }
        match fuzz_once(config, seed, prefix, parent, index) {
            Ok(classification) => results.push(classification),
            Err(e) => {
                // Internal errors abort the iteration, not the loop.
                log::error!("iteration {} aborted: {}", index, e);
            }
        }
        if seed.is_some() || index >= MAX_AUTO_RUNS {
            break;
        }
        index += 1;
    }
    results
}

fn write_input_hex(run_dir: &Path, inputs: &[u8]) -> Result<(), VerifuzzError> {
    let mut text = String::with_capacity(inputs.len() * 2 + sim::INPUT_BLOCKS);
    for block in inputs.chunks(sim::BLOCK_BYTES) {
        for byte in block {
            write!(text, "{:02x}", byte).unwrap();
        }
        text.push('\n');
    }
    std::fs::write(run_dir.join("sim_input.hex"), text)
        .map_err(|e| VerifuzzError::fs("sim_input.hex", e))
}

pub(crate) fn copy_dir_recursive(from: &Path, to: &Path) -> Result<(), VerifuzzError> {
    std::fs::create_dir_all(to).map_err(|e| VerifuzzError::fs(to.display().to_string(), e))?;
    let entries = std::fs::read_dir(from)
        .map_err(|e| VerifuzzError::fs(from.display().to_string(), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| VerifuzzError::fs(from.display().to_string(), e))?;
        let target = to.join(entry.file_name());
        let path = entry.path();
        if path.is_dir() {
            copy_dir_recursive(&path, &target)?;
        } else {
            std::fs::copy(&path, &target)
                .map_err(|e| VerifuzzError::fs(path.display().to_string(), e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_dir_recursive_copies_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("from");
        std::fs::create_dir_all(from.join("sub")).unwrap();
        std::fs::write(from.join("a.txt"), "a").unwrap();
        std::fs::write(from.join("sub/b.txt"), "b").unwrap();
        let to = dir.path().join("to");
        copy_dir_recursive(&from, &to).unwrap();
        assert_eq!(std::fs::read_to_string(to.join("a.txt")).unwrap(), "a");
        assert_eq!(std::fs::read_to_string(to.join("sub/b.txt")).unwrap(), "b");
    }

    #[test]
    fn input_hex_has_one_line_per_block() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![0u8; sim::input_len()];
        write_input_hex(dir.path(), &inputs).unwrap();
        let text = std::fs::read_to_string(dir.path().join("sim_input.hex")).unwrap();
        assert_eq!(text.lines().count(), sim::INPUT_BLOCKS);
        assert!(text.lines().all(|l| l.len() == sim::BLOCK_BYTES * 2));
    }
}
