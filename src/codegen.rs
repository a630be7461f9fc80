// SPDX-License-Identifier: Apache-2.0

//! Prints the subset AST as Verilog text.
//!
//! The output is deterministic: identical trees print identical text, which
//! the fuzz loop relies on for reproducible `rtl.v` artifacts and the
//! reducer relies on for memoization keys. Binary and conditional
//! expressions are always parenthesized so the printed form round-trips
//! through the subset parser without precedence bookkeeping.

use std::fmt::Write;

use crate::ast::{Direction, Expr, ModDecl, ModItem, NetKind, Port, SourceInfo};

pub fn emit(src: &SourceInfo) -> String {
    let mut out = String::new();
    for (i, module) in src.modules.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        emit_module(&mut out, module);
    }
    out
}

pub fn emit_module(out: &mut String, module: &ModDecl) {
    write!(out, "module {}(", module.name).unwrap();
    for (i, port) in module.ports.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        emit_port(out, port, true);
    }
    out.push_str(");\n");
    for item in &module.items {
        match item {
            ModItem::Decl(port) => {
                out.push_str("  ");
                emit_port(out, port, false);
                out.push_str(";\n");
            }
            ModItem::Assign(lhs, rhs) => {
                write!(out, "  assign {} = {};\n", lhs, emit_expr(rhs)).unwrap();
            }
        }
    }
    out.push_str("endmodule\n");
}

fn emit_port(out: &mut String, port: &Port, with_direction: bool) {
    if with_direction {
        let dir = match port.dir {
            Direction::Input => "input",
            Direction::Output => "output",
            Direction::Inout => "inout",
        };
        out.push_str(dir);
        out.push(' ');
    }
    out.push_str(match port.net {
        NetKind::Wire => "wire",
        NetKind::Reg => "reg",
    });
    if port.signed {
        out.push_str(" signed");
    }
    if port.width > 1 {
        write!(out, " [{}:0]", port.width - 1).unwrap();
    }
    write!(out, " {}", port.name).unwrap();
}

pub fn emit_expr(expr: &Expr) -> String {
    let mut s = String::new();
    write_expr(&mut s, expr);
    s
}

fn write_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Number { width, value } => {
            write!(out, "{}'h{:x}", width, value).unwrap();
        }
        Expr::Id(name) => out.push_str(name.as_str()),
        Expr::Concat(es) => {
            out.push('{');
            for (i, e) in es.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, e);
            }
            out.push('}');
        }
        Expr::Unary(op, e) => {
            out.push_str(op.token());
            write_atom(out, e);
        }
        Expr::Binary(op, a, b) => {
            out.push('(');
            write_expr(out, a);
            write!(out, " {} ", op.token()).unwrap();
            write_expr(out, b);
            out.push(')');
        }
        Expr::Cond(c, t, e) => {
            out.push('(');
            write_expr(out, c);
            out.push_str(" ? ");
            write_expr(out, t);
            out.push_str(" : ");
            write_expr(out, e);
            out.push(')');
        }
        Expr::Cast(f, e) => {
            out.push_str(f.token());
            out.push('(');
            write_expr(out, e);
            out.push(')');
        }
    }
}

/// Writes `expr` so it binds as a unary operand: atoms print bare, anything
/// compound gets parentheses.
fn write_atom(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Number { .. } | Expr::Id(_) | Expr::Concat(_) | Expr::Cast(..) => {
            write_expr(out, expr)
        }
        _ => {
            out.push('(');
            write_expr(out, expr);
            out.push(')');
        }
    }
}
