// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for unit and integration tests.

use std::path::{Path, PathBuf};

use crate::ast::{BinaryOp, Direction, Expr, Ident, ModDecl, ModItem, Port, SourceInfo};

/// `module top(input a, input b, output y); assign y = a & b; endmodule`
pub fn two_input_gate(op: BinaryOp) -> SourceInfo {
    let mut m = ModDecl::new("top");
    m.ports.push(Port::wire(Direction::Input, 1, "a"));
    m.ports.push(Port::wire(Direction::Input, 1, "b"));
    m.ports.push(Port::wire(Direction::Output, 1, "y"));
    m.items.push(ModItem::Assign(
        Ident::new("y"),
        Expr::Binary(op, Box::new(Expr::id("a")), Box::new(Expr::id("b"))),
    ));
    SourceInfo::new("top", vec![m])
}

/// Two netlists differing in exactly one gate: AND vs OR over the same
/// two-input interface. A formal-equivalence check over the pair must find
/// the distinguishing assignment (a != b).
pub fn planted_disagreement() -> (SourceInfo, SourceInfo) {
    (
        two_input_gate(BinaryOp::BitAnd),
        two_input_gate(BinaryOp::BitOr),
    )
}

/// Writes an executable shell script into `dir` and returns its path.
pub fn write_stub_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    path
}

/// A stub simulator runtime that prints `blocks` lines of `value` so the
/// output parser sees a complete run.
pub fn stub_sim_script(blocks: usize, value: &str) -> String {
    format!(
        "i=0\nwhile [ $i -lt {} ]; do echo {}; i=$((i+1)); done",
        blocks, value
    )
}
