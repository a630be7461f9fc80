// SPDX-License-Identifier: Apache-2.0

//! Reference-simulator driver.
//!
//! Emits a testbench that applies each 32-byte block of the input vector
//! to the top module's inputs and prints the output bits once per block,
//! then compiles and runs it through an Icarus-class simulator. The
//! collected output bytes are hashed for the run record; for a fixed
//! (module, simulator, input vector) the bytes are bit-identical across
//! runs.

use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use num_bigint::BigUint;
use sha2::{Digest, Sha256};

use crate::ast::SourceInfo;
use crate::codegen;
use crate::synth::SOURCE_FILE;
use crate::tool_runner::{invoke, RunStatus};

pub const INPUT_BLOCKS: usize = 20;
pub const BLOCK_BYTES: usize = 32;

pub fn input_len() -> usize {
    INPUT_BLOCKS * BLOCK_BYTES
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimOutcome {
    Ok { output: Vec<u8>, hash: String },
    Fail,
    Timeout,
}

impl SimOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, SimOutcome::Ok { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Simulator {
    pub compiler: String,
    pub runtime: String,
    pub timeout: Duration,
}

impl Default for Simulator {
    fn default() -> Self {
        Simulator {
            compiler: "iverilog".to_string(),
            runtime: "vvp".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl Simulator {
    /// Simulates `src` against `inputs` (INPUT_BLOCKS blocks of
    /// BLOCK_BYTES bytes) in `cwd` and returns the concatenated output
    /// bytes plus their hex-encoded digest.
    pub fn run(&self, src: &SourceInfo, inputs: &[u8], cwd: &Path) -> SimOutcome {
        assert_eq!(inputs.len(), input_len(), "input vector has a fixed size");
        if std::fs::create_dir_all(cwd).is_err() {
            return SimOutcome::Fail;
        }
        let Some(tb) = testbench(src, inputs) else {
            return SimOutcome::Fail;
        };
        if std::fs::write(cwd.join(SOURCE_FILE), codegen::emit(src)).is_err()
            || std::fs::write(cwd.join("tb.v"), tb).is_err()
        {
            return SimOutcome::Fail;
        }

        let compile = invoke(
            "sim_compile",
            &self.compiler,
            &["-o", "sim.out", SOURCE_FILE, "tb.v"],
            cwd,
            self.timeout,
        );
        match compile.status {
            RunStatus::Ok => {}
            RunStatus::Timeout => return SimOutcome::Timeout,
            _ => return SimOutcome::Fail,
        }
        let run = invoke("sim_run", &self.runtime, &["sim.out"], cwd, self.timeout);
        match run.status {
            RunStatus::Ok => {}
            RunStatus::Timeout => return SimOutcome::Timeout,
            _ => return SimOutcome::Fail,
        }

        let out_width = match src.top_module().and_then(|m| m.output_ports().next()) {
            Some(p) => p.width,
            None => return SimOutcome::Fail,
        };
        match parse_output(&run.stdout, out_width) {
            Some(output) => {
                let hash = hex_digest(&output);
                log::info!("sim output hash {}", hash);
                SimOutcome::Ok { output, hash }
            }
            None => SimOutcome::Fail,
        }
    }
}

pub fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for b in digest {
        write!(hex, "{:02x}", b).unwrap();
    }
    hex
}

/// Builds the driving testbench: one stimulus line per input block, each
/// followed by a delay and a `$display` of the output port.
fn testbench(src: &SourceInfo, inputs: &[u8]) -> Option<String> {
    let top = src.top_module()?;
    let inputs_ports: Vec<_> = top.input_ports().collect();
    let output = top.output_ports().next()?;

    let mut tb = String::new();
    tb.push_str("module tb;\n");
    for port in &inputs_ports {
        if port.width > 1 {
            writeln!(tb, "  reg [{}:0] {};", port.width - 1, port.name).unwrap();
        } else {
            writeln!(tb, "  reg {};", port.name).unwrap();
        }
    }
    if output.width > 1 {
        writeln!(tb, "  wire [{}:0] {};", output.width - 1, output.name).unwrap();
    } else {
        writeln!(tb, "  wire {};", output.name).unwrap();
    }
    write!(tb, "  {} dut(", top.name).unwrap();
    for (i, port) in top.ports.iter().enumerate() {
        if i > 0 {
            tb.push_str(", ");
        }
        write!(tb, ".{}({})", port.name, port.name).unwrap();
    }
    tb.push_str(");\n  initial begin\n");
    for block in inputs.chunks(BLOCK_BYTES) {
        let mut offset = 0usize;
        for port in &inputs_ports {
            let value = bits_from_block(block, offset, port.width);
            offset += port.width as usize;
            writeln!(tb, "    {} = {}'h{:x};", port.name, port.width, value).unwrap();
        }
        writeln!(tb, "    #1 $display(\"%h\", {});", output.name).unwrap();
    }
    tb.push_str("    $finish;\n  end\nendmodule\n");
    Some(tb)
}

/// Reads `width` bits from `block` starting at bit `offset`, LSB first,
/// wrapping around the block when the ports need more bits than it holds.
fn bits_from_block(block: &[u8], offset: usize, width: u32) -> BigUint {
    let nbits = block.len() * 8;
    let mut value = BigUint::from(0u32);
    for i in 0..width as usize {
        let bit_index = (offset + i) % nbits;
        let bit = (block[bit_index / 8] >> (bit_index % 8)) & 1;
        if bit == 1 {
            value |= BigUint::from(1u32) << i;
        }
    }
    value
}

/// Collects the per-block output values printed by the testbench into a
/// byte string, one little-endian chunk per block.
fn parse_output(stdout: &str, out_width: u32) -> Option<Vec<u8>> {
    let chunk_len = ((out_width + 7) / 8) as usize;
    let mut output = Vec::with_capacity(INPUT_BLOCKS * chunk_len);
    let mut blocks = 0usize;
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() || !line.chars().all(|c| c.is_ascii_hexdigit()) {
            continue;
        }
        let value = BigUint::parse_bytes(line.as_bytes(), 16)?;
        let mut bytes = value.to_bytes_le();
        if bytes.len() > chunk_len {
            return None;
        }
        bytes.resize(chunk_len, 0);
        output.extend_from_slice(&bytes);
        blocks += 1;
    }
    if blocks == INPUT_BLOCKS {
        Some(output)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Direction, Expr, Ident, ModDecl, ModItem, Port};

    fn two_input_source() -> SourceInfo {
        let mut m = ModDecl::new("top");
        m.ports.push(Port::wire(Direction::Input, 8, "x0"));
        m.ports.push(Port::wire(Direction::Input, 3, "x1"));
        m.ports.push(Port::wire(Direction::Output, 8, "y"));
        m.items.push(ModItem::Assign(Ident::new("y"), Expr::id("x0")));
        SourceInfo::new("top", vec![m])
    }

    #[test]
    fn testbench_applies_every_block() {
        let src = two_input_source();
        let inputs = vec![0xa5u8; input_len()];
        let tb = testbench(&src, &inputs).unwrap();
        assert_eq!(tb.matches("$display").count(), INPUT_BLOCKS);
        assert!(tb.contains("top dut(.x0(x0), .x1(x1), .y(y));"));
        // 0xa5 repeated: x0 takes bits 0..8 of the block.
        assert!(tb.contains("x0 = 8'ha5;"));
    }

    #[test]
    fn testbench_is_deterministic() {
        let src = two_input_source();
        let inputs: Vec<u8> = (0..input_len()).map(|i| i as u8).collect();
        assert_eq!(testbench(&src, &inputs), testbench(&src, &inputs));
    }

    #[test]
    fn bits_from_block_wraps() {
        let block = [0b1000_0001u8];
        assert_eq!(bits_from_block(&block, 0, 1), BigUint::from(1u32));
        assert_eq!(bits_from_block(&block, 7, 1), BigUint::from(1u32));
        // Offset 7 then 1 more bit wraps to bit 0.
        assert_eq!(bits_from_block(&block, 7, 2), BigUint::from(3u32));
    }

    #[test]
    fn parse_output_packs_blocks() {
        let mut stdout = String::new();
        for _ in 0..INPUT_BLOCKS {
            stdout.push_str("0f\n");
        }
        let output = parse_output(&stdout, 8).unwrap();
        assert_eq!(output.len(), INPUT_BLOCKS);
        assert!(output.iter().all(|b| *b == 0x0f));
        assert!(parse_output("0f\n", 8).is_none());
    }

    #[test]
    fn hex_digest_is_stable() {
        assert_eq!(hex_digest(b""), hex_digest(b""));
        assert_ne!(hex_digest(b"a"), hex_digest(b"b"));
        assert_eq!(hex_digest(b"x").len(), 64);
    }
}
