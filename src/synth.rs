// SPDX-License-Identifier: Apache-2.0

//! Synthesis back-end descriptions.
//!
//! The set of back-ends is small and closed, so they are tagged variants
//! rather than trait objects. Each `run` materializes its script in the
//! working directory, writes the source under test to `rtl.v`, drives the
//! tool(s) through the tool runner and, on success, leaves a Verilog
//! netlist at `output_path` that re-exports the top module's interface.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::ast::SourceInfo;
use crate::codegen;
use crate::tool_runner::{invoke, RunStatus};

pub const SOURCE_FILE: &str = "rtl.v";

/// Executable locations, passed explicitly from the caller's configuration.
#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub yosys: String,
    pub vivado: String,
    pub xst: String,
    pub netgen: String,
}

impl Default for SynthConfig {
    fn default() -> Self {
        SynthConfig {
            yosys: "yosys".to_string(),
            vivado: "vivado".to_string(),
            xst: "xst".to_string(),
            netgen: "netgen".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthStatus {
    Ok,
    Fail,
    Timeout,
}

#[derive(Debug, Clone, Serialize)]
pub struct SynthOutcome {
    pub name: String,
    pub status: SynthStatus,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Synth {
    Yosys { exe: String, output: String },
    Vivado { exe: String, output: String },
    Xst { exe: String, netgen: String, output: String },
    /// Copies the source through unchanged; the reference leg of every
    /// equivalence comparison.
    Identity { output: String },
}

impl Synth {
    pub fn yosys(config: &SynthConfig) -> Synth {
        Synth::Yosys {
            exe: config.yosys.clone(),
            output: "yosys.v".to_string(),
        }
    }

    pub fn vivado(config: &SynthConfig) -> Synth {
        Synth::Vivado {
            exe: config.vivado.clone(),
            output: "vivado.v".to_string(),
        }
    }

    pub fn xst(config: &SynthConfig) -> Synth {
        Synth::Xst {
            exe: config.xst.clone(),
            netgen: config.netgen.clone(),
            output: "xst.v".to_string(),
        }
    }

    pub fn identity() -> Synth {
        Synth::Identity {
            output: "identity.v".to_string(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Synth::Yosys { .. } => "yosys",
            Synth::Vivado { .. } => "vivado",
            Synth::Xst { .. } => "xst",
            Synth::Identity { .. } => "identity",
        }
    }

    pub fn output_path(&self) -> &str {
        match self {
            Synth::Yosys { output, .. }
            | Synth::Vivado { output, .. }
            | Synth::Xst { output, .. }
            | Synth::Identity { output } => output,
        }
    }

    pub fn with_output_path(mut self, path: impl Into<String>) -> Synth {
        match &mut self {
            Synth::Yosys { output, .. }
            | Synth::Vivado { output, .. }
            | Synth::Xst { output, .. }
            | Synth::Identity { output } => *output = path.into(),
        }
        self
    }

    /// Synthesizes `src` in `cwd`, leaving the netlist at `output_path`.
    pub fn run(&self, src: &SourceInfo, cwd: &Path, timeout: Duration) -> SynthOutcome {
        let start = std::time::Instant::now();
        let status = self.run_inner(src, cwd, timeout);
        let outcome = SynthOutcome {
            name: self.name().to_string(),
            status,
            duration_ms: start.elapsed().as_millis(),
        };
        log::info!("synth {}: {:?}", outcome.name, outcome.status);
        outcome
    }

    fn run_inner(&self, src: &SourceInfo, cwd: &Path, timeout: Duration) -> SynthStatus {
        if std::fs::create_dir_all(cwd).is_err() {
            return SynthStatus::Fail;
        }
        if std::fs::write(cwd.join(SOURCE_FILE), codegen::emit(src)).is_err() {
            return SynthStatus::Fail;
        }
        match self {
            Synth::Identity { output } => {
                match std::fs::copy(cwd.join(SOURCE_FILE), cwd.join(output)) {
                    Ok(_) => SynthStatus::Ok,
                    Err(_) => SynthStatus::Fail,
                }
            }
            Synth::Yosys { exe, output } => {
                let script = format!(
                    "read_verilog {}\nsynth\nwrite_verilog -noattr {}\n",
                    SOURCE_FILE, output
                );
                if std::fs::write(cwd.join("yosys.ys"), script).is_err() {
                    return SynthStatus::Fail;
                }
                let result = invoke("yosys", exe, &["-s", "yosys.ys"], cwd, timeout);
                to_status(&result.status, cwd, output)
            }
            Synth::Vivado { exe, output } => {
                let script = format!(
                    "read_verilog {}\nsynth_design -top {} -part xc7k70t\nwrite_verilog -force {}\n",
                    SOURCE_FILE, src.top, output
                );
                if std::fs::write(cwd.join("synth.tcl"), script).is_err() {
                    return SynthStatus::Fail;
                }
                let args = [
                    "-mode", "batch", "-nojournal", "-nolog", "-source", "synth.tcl",
                ];
                let result = invoke("vivado", exe, &args, cwd, timeout);
                to_status(&result.status, cwd, output)
            }
            Synth::Xst { exe, netgen, output } => {
                if std::fs::write(
                    cwd.join("rtl.prj"),
                    format!("verilog work \"{}\"\n", SOURCE_FILE),
                )
                .is_err()
                {
                    return SynthStatus::Fail;
                }
                let script = format!(
                    "run -ifn rtl.prj -ifmt mixed -top {} -ofn rtl -ofmt NGC\n",
                    src.top
                );
                if std::fs::write(cwd.join("xst.scr"), script).is_err() {
                    return SynthStatus::Fail;
                }
                let xst_result = invoke("xst", exe, &["-ifn", "xst.scr"], cwd, timeout);
                if !xst_result.status.is_ok() {
                    return to_status(&xst_result.status, cwd, "rtl.ngc");
                }
                let netgen_result = invoke(
                    "netgen",
                    netgen,
                    &["-w", "-ofmt", "verilog", "rtl.ngc", output],
                    cwd,
                    timeout,
                );
                let status = to_status(&netgen_result.status, cwd, output);
                if status == SynthStatus::Ok {
                    if let Err(e) = clean_netlist(&cwd.join(output)) {
                        log::warn!("xst netlist cleanup failed: {}", e);
                        return SynthStatus::Fail;
                    }
                }
                status
            }
        }
    }
}

fn to_status(status: &RunStatus, cwd: &Path, output: &str) -> SynthStatus {
    match status {
        RunStatus::Ok => {
            if cwd.join(output).is_file() {
                SynthStatus::Ok
            } else {
                SynthStatus::Fail
            }
        }
        RunStatus::Timeout => SynthStatus::Timeout,
        RunStatus::NonZeroExit(_) | RunStatus::LaunchFail(_) => SynthStatus::Fail,
    }
}

/// Strips timestamps and the vendor `glbl` guard block from a re-emitted
/// netlist so two runs over the same input compare bit-identical.
fn clean_netlist(path: &Path) -> std::io::Result<()> {
    let text = std::fs::read_to_string(path)?;
    let mut cleaned = String::with_capacity(text.len());
    let mut in_guard = false;
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("`ifndef") {
            in_guard = true;
            continue;
        }
        if in_guard {
            if trimmed.starts_with("`endif") {
                in_guard = false;
            }
            continue;
        }
        if trimmed.starts_with("//") {
            continue;
        }
        cleaned.push_str(line);
        cleaned.push('\n');
    }
    std::fs::write(path, cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Direction, Expr, Ident, ModDecl, ModItem, Port};

    fn tiny_source() -> SourceInfo {
        let mut m = ModDecl::new("top");
        m.ports.push(Port::wire(Direction::Input, 1, "x0"));
        m.ports.push(Port::wire(Direction::Output, 1, "y"));
        m.items.push(ModItem::Assign(Ident::new("y"), Expr::id("x0")));
        SourceInfo::new("top", vec![m])
    }

    #[test]
    fn identity_backend_copies_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = tiny_source();
        let outcome = Synth::identity().run(&src, dir.path(), Duration::from_secs(5));
        assert_eq!(outcome.status, SynthStatus::Ok);
        let rtl = std::fs::read_to_string(dir.path().join(SOURCE_FILE)).unwrap();
        let out = std::fs::read_to_string(dir.path().join("identity.v")).unwrap();
        assert_eq!(rtl, out);
    }

    #[test]
    fn with_output_path_renames() {
        let synth = Synth::identity().with_output_path("other.v");
        assert_eq!(synth.output_path(), "other.v");
        assert_eq!(synth.name(), "identity");
    }

    #[test]
    fn missing_tool_is_a_fail_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let src = tiny_source();
        let synth = Synth::Yosys {
            exe: "definitely-not-yosys".to_string(),
            output: "yosys.v".to_string(),
        };
        let outcome = synth.run(&src, dir.path(), Duration::from_secs(5));
        assert_eq!(outcome.status, SynthStatus::Fail);
    }

    #[test]
    fn clean_netlist_strips_noise() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("n.v");
        std::fs::write(
            &path,
            "// Generated 2026-01-01 12:00\nmodule top(y);\nendmodule\n`ifndef GLBL\nmodule glbl;\nendmodule\n`endif\n",
        )
        .unwrap();
        clean_netlist(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "module top(y);\nendmodule\n");
    }
}
