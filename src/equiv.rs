// SPDX-License-Identifier: Apache-2.0

//! Equivalence driver: synthesize with every back-end, then compare each
//! pair of surviving netlists with an external SAT-based checker.
//!
//! The checker is handed a miter script that ties the two candidates'
//! inputs together and asks for an input assignment distinguishing the
//! outputs; a satisfying assignment is a counterexample to equivalence.

use std::path::Path;
use std::time::Duration;

use crate::ast::SourceInfo;
use crate::synth::{Synth, SynthOutcome, SynthStatus};
use crate::tool_runner::{invoke, RunStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EquivOutcome {
    Equiv,
    Counterexample { witness: String },
    Inconclusive,
    ToolFailure(String),
}

impl EquivOutcome {
    pub fn status_str(&self) -> &'static str {
        match self {
            EquivOutcome::Equiv => "equiv",
            EquivOutcome::Counterexample { .. } => "counterexample",
            EquivOutcome::Inconclusive => "inconclusive",
            EquivOutcome::ToolFailure(_) => "tool_failure",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PairResult {
    pub lhs: String,
    pub rhs: String,
    pub outcome: EquivOutcome,
}

#[derive(Debug)]
pub struct EquivReport {
    pub synth_outcomes: Vec<SynthOutcome>,
    pub pairs: Vec<PairResult>,
    pub classification: EquivOutcome,
    /// True when any synthesis or checker step hit its deadline; the fuzz
    /// loop archives such runs separately from content failures.
    pub timed_out: bool,
}

/// External SAT/miter equivalence checker (yosys-class).
#[derive(Debug, Clone)]
pub struct EquivChecker {
    pub exe: String,
    pub timeout: Duration,
}

impl Default for EquivChecker {
    fn default() -> Self {
        EquivChecker {
            exe: "yosys".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl EquivChecker {
    /// Compares two netlist files that both declare module `top`.
    pub fn check_pair(
        &self,
        cwd: &Path,
        lhs: &str,
        rhs: &str,
        top: &str,
    ) -> (EquivOutcome, bool) {
        let script = miter_script(lhs, rhs, top);
        let script_name = "equiv.ys";
        if std::fs::write(cwd.join(script_name), script).is_err() {
            return (EquivOutcome::ToolFailure("equiv".to_string()), false);
        }
        let result = invoke("equiv", &self.exe, &["-s", script_name], cwd, self.timeout);
        let outcome = match result.status {
            RunStatus::Ok => EquivOutcome::Equiv,
            RunStatus::Timeout => return (EquivOutcome::Inconclusive, true),
            RunStatus::LaunchFail(_) => EquivOutcome::ToolFailure("equiv".to_string()),
            RunStatus::NonZeroExit(_) => match extract_witness(&result.stdout) {
                Some(witness) => EquivOutcome::Counterexample { witness },
                None => EquivOutcome::Inconclusive,
            },
        };
        (outcome, false)
    }
}

fn miter_script(lhs: &str, rhs: &str, top: &str) -> String {
    format!(
        "read_verilog {lhs}\n\
         prep -top {top}\n\
         rename {top} gold\n\
         design -stash gold\n\
         design -reset\n\
         read_verilog {rhs}\n\
         prep -top {top}\n\
         rename {top} gate\n\
         design -stash gate\n\
         design -reset\n\
         design -copy-from gold gold gold\n\
         design -copy-from gate gate gate\n\
         miter -equiv -flatten gold gate miter\n\
         hierarchy -top miter\n\
         sat -verify -prove trigger 0 -show-inputs -show-outputs miter\n"
    )
}

/// Pulls the model table out of a failed `sat -verify` transcript.
fn extract_witness(stdout: &str) -> Option<String> {
    let marker = stdout.find("model found")?;
    let tail = &stdout[marker..];
    let witness: String = tail.lines().take(40).collect::<Vec<_>>().join("\n");
    Some(witness)
}

/// Runs every synthesizer over `src` in `cwd`, then checks all pairs of
/// surviving netlists.
pub fn run_equiv(
    src: &SourceInfo,
    synths: &[Synth],
    checker: &EquivChecker,
    cwd: &Path,
    synth_timeout: Duration,
) -> EquivReport {
    let mut synth_outcomes = Vec::with_capacity(synths.len());
    let mut survivors: Vec<(String, String)> = Vec::new();
    let mut timed_out = false;
    for synth in synths {
        let outcome = synth.run(src, cwd, synth_timeout);
        match outcome.status {
            SynthStatus::Ok => {
                survivors.push((outcome.name.clone(), synth.output_path().to_string()));
            }
            SynthStatus::Timeout => timed_out = true,
            SynthStatus::Fail => {}
        }
        synth_outcomes.push(outcome);
    }

    let mut pairs = Vec::new();
    let mut transcript = String::new();
    for i in 0..survivors.len() {
        for j in (i + 1)..survivors.len() {
            let (lhs_name, lhs_path) = &survivors[i];
            let (rhs_name, rhs_path) = &survivors[j];
            let (outcome, pair_timed_out) =
                checker.check_pair(cwd, lhs_path, rhs_path, src.top.as_str());
            timed_out |= pair_timed_out;
            log::info!(
                "equiv {} vs {}: {}",
                lhs_name,
                rhs_name,
                outcome.status_str()
            );
            transcript.push_str(&format!(
                "== {} vs {}: {}\n",
                lhs_name,
                rhs_name,
                outcome.status_str()
            ));
            if let EquivOutcome::Counterexample { witness } = &outcome {
                transcript.push_str(witness);
                transcript.push('\n');
            }
            pairs.push(PairResult {
                lhs: lhs_name.clone(),
                rhs: rhs_name.clone(),
                outcome,
            });
        }
    }
    let _ = std::fs::write(cwd.join("equiv.log"), transcript);

    let classification = classify(&synth_outcomes, &pairs);
    EquivReport {
        synth_outcomes,
        pairs,
        classification,
        timed_out,
    }
}

fn classify(synth_outcomes: &[SynthOutcome], pairs: &[PairResult]) -> EquivOutcome {
    for pair in pairs {
        if let EquivOutcome::Counterexample { .. } = pair.outcome {
            return pair.outcome.clone();
        }
    }
    for outcome in synth_outcomes {
        if outcome.status != SynthStatus::Ok {
            return EquivOutcome::ToolFailure(outcome.name.clone());
        }
    }
    for pair in pairs {
        if let EquivOutcome::ToolFailure(_) = pair.outcome {
            return pair.outcome.clone();
        }
    }
    if pairs
        .iter()
        .any(|p| p.outcome == EquivOutcome::Inconclusive)
    {
        return EquivOutcome::Inconclusive;
    }
    EquivOutcome::Equiv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, status: SynthStatus) -> SynthOutcome {
        SynthOutcome {
            name: name.to_string(),
            status,
            duration_ms: 0,
        }
    }

    fn pair(outcome: EquivOutcome) -> PairResult {
        PairResult {
            lhs: "a".to_string(),
            rhs: "b".to_string(),
            outcome,
        }
    }

    #[test]
    fn classify_prefers_counterexamples() {
        let synths = vec![outcome("yosys", SynthStatus::Fail)];
        let pairs = vec![
            pair(EquivOutcome::Equiv),
            pair(EquivOutcome::Counterexample {
                witness: "x0 = 1".to_string(),
            }),
        ];
        assert!(matches!(
            classify(&synths, &pairs),
            EquivOutcome::Counterexample { .. }
        ));
    }

    #[test]
    fn classify_reports_failed_synth() {
        let synths = vec![
            outcome("identity", SynthStatus::Ok),
            outcome("yosys", SynthStatus::Timeout),
        ];
        assert_eq!(
            classify(&synths, &[]),
            EquivOutcome::ToolFailure("yosys".to_string())
        );
    }

    #[test]
    fn classify_all_proven_is_equiv() {
        let synths = vec![outcome("identity", SynthStatus::Ok)];
        let pairs = vec![pair(EquivOutcome::Equiv)];
        assert_eq!(classify(&synths, &pairs), EquivOutcome::Equiv);
    }

    #[test]
    fn extract_witness_finds_model() {
        let stdout = "solving...\nSAT model found:\n  x0 = 1\n  x1 = 0\n";
        let witness = extract_witness(stdout).unwrap();
        assert!(witness.contains("x0 = 1"));
        assert!(extract_witness("all proven").is_none());
    }
}
