// SPDX-License-Identifier: Apache-2.0

//! Size-budgeted random producer of well-defined modules, with shrinking.
//!
//! Generation is deterministic for a fixed `(seed, Config)`: all entropy
//! flows through one seeded `Pcg64Mcg`. The size budget bounds expression
//! recursion depth and the number of body items; every recursive call
//! strictly decreases the remaining depth, with leaves at depth zero.
//!
//! Expressions are generated against a target width so the result is
//! width-consistent by construction: single-bit operators (comparisons,
//! reductions, logical connectives) appear only where the target width is
//! one, divisors are never statically zero, and shift amounts are bounded
//! literals.

use num_bigint::BigUint;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::OsRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

use crate::ast::{
    BinaryOp, CastFn, Direction, Expr, Ident, ModDecl, ModItem, Port, SourceInfo, UnaryOp,
};
use crate::circuit::Circuit;

/// Generator knobs, passed explicitly.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Largest signal width, in bits.
    pub max_width: u32,
    /// Most input ports per generated module.
    pub max_ports: usize,
    /// Soft upper bound on body assignments.
    pub max_items: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_width: 32,
            max_ports: 8,
            max_items: 20,
        }
    }
}

/// Draws a fresh seed from OS entropy, so an unseeded fuzz run can still
/// report a seed that reproduces it.
pub fn fresh_seed() -> u64 {
    OsRng.next_u64()
}

pub struct Gen {
    rng: Pcg64Mcg,
    config: Config,
}

// Width-preserving binary operators with selection weights.
const WIDE_BINOPS: &[(BinaryOp, u32)] = &[
    (BinaryOp::Add, 4),
    (BinaryOp::Sub, 4),
    (BinaryOp::Mul, 2),
    (BinaryOp::Div, 1),
    (BinaryOp::Mod, 1),
    (BinaryOp::Pow, 1),
    (BinaryOp::ShiftLeft, 2),
    (BinaryOp::ShiftRight, 2),
    (BinaryOp::ArithShiftLeft, 1),
    (BinaryOp::ArithShiftRight, 1),
    (BinaryOp::BitAnd, 4),
    (BinaryOp::BitOr, 4),
    (BinaryOp::BitXor, 4),
    (BinaryOp::BitXnor, 2),
];

// Operators whose result is one bit, usable only at target width 1.
const SINGLE_BIT_BINOPS: &[(BinaryOp, u32)] = &[
    (BinaryOp::Lt, 2),
    (BinaryOp::Gt, 2),
    (BinaryOp::Le, 2),
    (BinaryOp::Ge, 2),
    (BinaryOp::Eq, 2),
    (BinaryOp::Ne, 2),
    (BinaryOp::CaseEq, 1),
    (BinaryOp::CaseNe, 1),
    (BinaryOp::LogicAnd, 2),
    (BinaryOp::LogicOr, 2),
];

const REDUCTIONS: &[UnaryOp] = &[
    UnaryOp::LogicNot,
    UnaryOp::ReduceAnd,
    UnaryOp::ReduceOr,
    UnaryOp::ReduceXor,
    UnaryOp::ReduceNand,
    UnaryOp::ReduceNor,
    UnaryOp::ReduceXnor,
];

const PRESERVING_UNOPS: &[UnaryOp] = &[UnaryOp::BitNot, UnaryOp::Plus, UnaryOp::Minus];

impl Gen {
    pub fn new(seed: u64, config: Config) -> Self {
        Gen {
            rng: Pcg64Mcg::seed_from_u64(seed),
            config,
        }
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// Random bytes for simulation input vectors.
    pub fn gen_bytes(&mut self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        self.rng.fill_bytes(&mut bytes);
        bytes
    }

    /// A random literal value of at most `width` bits.
    fn gen_value(&mut self, width: u32) -> BigUint {
        let nbytes = ((width + 7) / 8) as usize;
        let mut bytes = vec![0u8; nbytes];
        self.rng.fill_bytes(&mut bytes);
        crate::ast::truncate(BigUint::from_bytes_le(&bytes), width)
    }

    fn gen_width(&mut self) -> u32 {
        self.rng.gen_range(1..=self.config.max_width)
    }

    /// Leaf expression at the target width: a literal, or an in-scope
    /// signal of exactly that width when one exists.
    fn gen_leaf(&mut self, scope: &[(Ident, u32)], width: u32) -> Expr {
        let compatible: Vec<&Ident> = scope
            .iter()
            .filter(|(_, w)| *w == width)
            .map(|(name, _)| name)
            .collect();
        if !compatible.is_empty() && self.rng.gen_bool(0.6) {
            let idx = self.rng.gen_range(0..compatible.len());
            Expr::Id(compatible[idx].clone())
        } else {
            Expr::number(width, self.gen_value(width))
        }
    }

    /// Expression of exactly `width` bits with recursion depth at most
    /// `depth`.
    pub fn gen_expr(&mut self, scope: &[(Ident, u32)], width: u32, depth: u32) -> Expr {
        if depth == 0 {
            return self.gen_leaf(scope, width);
        }
        // leaf / unary / binary / concat / cond / cast
        let weights = [1u32, 2, 5, if width >= 2 { 2 } else { 0 }, 2, 1];
        let dist = WeightedIndex::new(weights).unwrap();
        match dist.sample(&mut self.rng) {
            0 => self.gen_leaf(scope, width),
            1 => self.gen_unary(scope, width, depth - 1),
            2 => self.gen_binary(scope, width, depth - 1),
            3 => self.gen_concat(scope, width, depth - 1),
            4 => {
                let c = self.gen_expr(scope, 1, depth - 1);
                let t = self.gen_expr(scope, width, depth - 1);
                let e = self.gen_expr(scope, width, depth - 1);
                Expr::Cond(Box::new(c), Box::new(t), Box::new(e))
            }
            _ => {
                let f = if self.rng.gen_bool(0.5) {
                    CastFn::Signed
                } else {
                    CastFn::Unsigned
                };
                Expr::Cast(f, Box::new(self.gen_expr(scope, width, depth - 1)))
            }
        }
    }

    fn gen_unary(&mut self, scope: &[(Ident, u32)], width: u32, depth: u32) -> Expr {
        if width == 1 && self.rng.gen_bool(0.5) {
            let op = REDUCTIONS[self.rng.gen_range(0..REDUCTIONS.len())];
            let operand_width = self.gen_width();
            let operand = self.gen_expr(scope, operand_width, depth);
            Expr::Unary(op, Box::new(operand))
        } else {
            let op = PRESERVING_UNOPS[self.rng.gen_range(0..PRESERVING_UNOPS.len())];
            Expr::Unary(op, Box::new(self.gen_expr(scope, width, depth)))
        }
    }

    fn gen_binary(&mut self, scope: &[(Ident, u32)], width: u32, depth: u32) -> Expr {
        let table: Vec<(BinaryOp, u32)> = if width == 1 {
            WIDE_BINOPS.iter().chain(SINGLE_BIT_BINOPS).copied().collect()
        } else {
            WIDE_BINOPS.to_vec()
        };
        let dist = WeightedIndex::new(table.iter().map(|(_, w)| *w)).unwrap();
        let op = table[dist.sample(&mut self.rng)].0;

        if op.is_single_bit() {
            // Comparison operands share an arbitrary width; logical
            // connectives take single-bit operands.
            let operand_width = match op {
                BinaryOp::LogicAnd | BinaryOp::LogicOr => 1,
                _ => self.gen_width(),
            };
            let a = self.gen_expr(scope, operand_width, depth);
            let b = self.gen_expr(scope, operand_width, depth);
            return Expr::Binary(op, Box::new(a), Box::new(b));
        }
        if op.is_shift() {
            let lhs = self.gen_expr(scope, width, depth);
            let amount = self.rng.gen_range(0..2 * width as u64);
            return Expr::Binary(
                op,
                Box::new(lhs),
                Box::new(Expr::number_u64(width, amount)),
            );
        }
        if op.is_division() {
            let lhs = self.gen_expr(scope, width, depth);
            return Expr::Binary(op, Box::new(lhs), Box::new(self.gen_divisor(scope, width, depth)));
        }
        if op == BinaryOp::Pow {
            // Keep exponents tiny so every back-end agrees on the result.
            let lhs = self.gen_expr(scope, width, depth);
            let exponent = self.rng.gen_range(0..=3u64);
            return Expr::Binary(
                op,
                Box::new(lhs),
                Box::new(Expr::number_u64(width, exponent)),
            );
        }
        let a = self.gen_expr(scope, width, depth);
        let b = self.gen_expr(scope, width, depth);
        Expr::Binary(op, Box::new(a), Box::new(b))
    }

    /// Right operand for `/` and `%`: either a non-zero literal or an
    /// arbitrary expression forced odd with `| 1`, never a bare expression.
    fn gen_divisor(&mut self, scope: &[(Ident, u32)], width: u32, depth: u32) -> Expr {
        if self.rng.gen_bool(0.5) {
            let mut value = self.gen_value(width);
            if value.bits() == 0 {
                value = BigUint::from(1u32);
            }
            Expr::number(width, value)
        } else {
            let inner = self.gen_expr(scope, width, depth);
            Expr::Binary(
                BinaryOp::BitOr,
                Box::new(inner),
                Box::new(Expr::number_u64(width, 1)),
            )
        }
    }

    fn gen_concat(&mut self, scope: &[(Ident, u32)], width: u32, depth: u32) -> Expr {
        debug_assert!(width >= 2);
        let max_parts = width.min(4);
        let parts = self.rng.gen_range(2..=max_parts);
        // Partition `width` into `parts` positive chunks.
        let mut widths = Vec::with_capacity(parts as usize);
        let mut remaining = width;
        for i in 0..parts {
            let slots_left = parts - i - 1;
            let w = if slots_left == 0 {
                remaining
            } else {
                self.rng.gen_range(1..=remaining - slots_left)
            };
            widths.push(w);
            remaining -= w;
        }
        let elems = widths
            .into_iter()
            .map(|w| self.gen_expr(scope, w, depth))
            .collect();
        Expr::Concat(elems)
    }

    /// Generates a complete module: random input ports, a body of
    /// dependency-ordered wire assignments, and a final output wire `y`
    /// driven last.
    pub fn gen_module(&mut self, name: &str, size: u32) -> ModDecl {
        let mut module = ModDecl::new(name);
        let mut scope: Vec<(Ident, u32)> = Vec::new();

        let num_inputs = self.rng.gen_range(1..=self.config.max_ports);
        for i in 0..num_inputs {
            let width = self.gen_width();
            let ident = Ident::new(format!("x{}", i));
            module
                .ports
                .push(Port::wire(Direction::Input, width, ident.as_str()));
            scope.push((ident, width));
        }
        let out_width = self.gen_width();
        module.ports.push(Port::wire(Direction::Output, out_width, "y"));

        let num_items = self
            .rng
            .gen_range(0..=(size as usize).min(self.config.max_items));
        for i in 0..num_items {
            let width = self.gen_width();
            let ident = Ident::new(format!("w{}", i));
            let rhs = self.gen_expr(&scope, width, size);
            module
                .items
                .push(ModItem::Decl(Port::wire(Direction::Input, width, ident.as_str())));
            module.items.push(ModItem::Assign(ident.clone(), rhs));
            scope.push((ident, width));
        }

        let out_rhs = self.gen_expr(&scope, out_width, size);
        module.items.push(ModItem::Assign(Ident::new("y"), out_rhs));
        module
    }

    /// Generates a module through the structural path: a random gate DAG
    /// folded into continuous assignments.
    pub fn gen_from_graph(&mut self, name: &str, resize: usize) -> ModDecl {
        Circuit::random(&mut self.rng, resize).to_mod_decl(name)
    }

    /// A single-module source with the conventional top name.
    pub fn gen_source(&mut self, size: u32) -> SourceInfo {
        let module = self.gen_module("top", size);
        SourceInfo::new("top", vec![module])
    }
}

/// Strictly-smaller alternatives for a generated value. The induced tree
/// is finite: every candidate decreases the (node count, literal weight)
/// measure, so unfolding always bottoms out.
pub trait Shrink: Sized {
    fn shrink(&self) -> Vec<Self>;
}

impl Shrink for Expr {
    fn shrink(&self) -> Vec<Expr> {
        let mut out = Vec::new();
        match self {
            Expr::Number { width, value } => {
                if value.bits() != 0 {
                    out.push(Expr::number(*width, BigUint::from(0u32)));
                    let halved = value >> 1u32;
                    if halved.bits() != 0 {
                        out.push(Expr::number(*width, halved));
                    }
                }
            }
            Expr::Id(_) => {}
            Expr::Concat(es) => {
                for (i, e) in es.iter().enumerate() {
                    out.push(e.clone());
                    if es.len() > 2 {
                        let mut fewer = es.clone();
                        fewer.remove(i);
                        out.push(Expr::Concat(fewer));
                    }
                    for smaller in e.shrink() {
                        let mut next = es.clone();
                        next[i] = smaller;
                        out.push(Expr::Concat(next));
                    }
                }
            }
            Expr::Unary(op, e) => {
                out.push((**e).clone());
                for smaller in e.shrink() {
                    out.push(Expr::Unary(*op, Box::new(smaller)));
                }
            }
            Expr::Binary(op, a, b) => {
                out.push((**a).clone());
                out.push((**b).clone());
                for smaller in a.shrink() {
                    out.push(Expr::Binary(*op, Box::new(smaller), b.clone()));
                }
                for smaller in b.shrink() {
                    out.push(Expr::Binary(*op, a.clone(), Box::new(smaller)));
                }
            }
            Expr::Cond(c, t, e) => {
                out.push((**t).clone());
                out.push((**e).clone());
                for smaller in c.shrink() {
                    out.push(Expr::Cond(Box::new(smaller), t.clone(), e.clone()));
                }
                for smaller in t.shrink() {
                    out.push(Expr::Cond(c.clone(), Box::new(smaller), e.clone()));
                }
                for smaller in e.shrink() {
                    out.push(Expr::Cond(c.clone(), t.clone(), Box::new(smaller)));
                }
            }
            Expr::Cast(f, e) => {
                out.push((**e).clone());
                for smaller in e.shrink() {
                    out.push(Expr::Cast(*f, Box::new(smaller)));
                }
            }
        }
        out
    }
}

impl Shrink for ModDecl {
    fn shrink(&self) -> Vec<ModDecl> {
        let mut out = Vec::new();
        let referenced = self.referenced_ids();

        // Drop body items whose removal keeps the module well-formed.
        for i in 0..self.items.len() {
            let mut smaller = self.clone();
            smaller.items.remove(i);
            if module_is_well_formed(&smaller) {
                out.push(smaller);
            }
        }

        // Drop unused input ports.
        for (i, port) in self.ports.iter().enumerate() {
            if port.dir == Direction::Input && !referenced.contains(&port.name) {
                let mut smaller = self.clone();
                smaller.ports.remove(i);
                out.push(smaller);
            }
        }

        // Shrink assignment right-hand sides in place, and canonicalize
        // identifiers toward the lexicographically smallest in-scope name
        // of the same width.
        let mut in_scope: Vec<(Ident, u32)> = self
            .ports
            .iter()
            .map(|p| (p.name.clone(), p.width))
            .collect();
        for (i, item) in self.items.iter().enumerate() {
            match item {
                ModItem::Decl(p) => in_scope.push((p.name.clone(), p.width)),
                ModItem::Assign(lhs, rhs) => {
                    for smaller_rhs in rhs.shrink() {
                        let mut smaller = self.clone();
                        smaller.items[i] = ModItem::Assign(lhs.clone(), smaller_rhs);
                        out.push(smaller);
                    }
                    let widths: std::collections::HashMap<Ident, u32> =
                        in_scope.iter().cloned().collect();
                    for renamed in rename_variants(rhs, lhs, &in_scope, &widths) {
                        let mut smaller = self.clone();
                        smaller.items[i] = ModItem::Assign(lhs.clone(), renamed);
                        out.push(smaller);
                    }
                }
            }
        }
        out
    }
}

/// Variants of `expr` with one identifier occurrence replaced by the
/// lexicographically smallest in-scope name of the same width. The LHS is
/// excluded so a rename can never close a combinational loop.
fn rename_variants(
    expr: &Expr,
    lhs: &Ident,
    in_scope: &[(Ident, u32)],
    widths: &std::collections::HashMap<Ident, u32>,
) -> Vec<Expr> {
    let best = |name: &Ident| -> Option<Ident> {
        let width = *widths.get(name)?;
        let smallest = in_scope
            .iter()
            .filter(|(n, w)| *w == width && n != lhs)
            .map(|(n, _)| n)
            .min()?;
        (smallest < name).then(|| smallest.clone())
    };
    let mut out = Vec::new();
    match expr {
        Expr::Number { .. } => {}
        Expr::Id(name) => {
            if let Some(better) = best(name) {
                out.push(Expr::Id(better));
            }
        }
        Expr::Concat(es) => {
            for (i, e) in es.iter().enumerate() {
                for v in rename_variants(e, lhs, in_scope, widths) {
                    let mut next = es.clone();
                    next[i] = v;
                    out.push(Expr::Concat(next));
                }
            }
        }
        Expr::Unary(op, e) => {
            for v in rename_variants(e, lhs, in_scope, widths) {
                out.push(Expr::Unary(*op, Box::new(v)));
            }
        }
        Expr::Binary(op, a, b) => {
            for v in rename_variants(a, lhs, in_scope, widths) {
                out.push(Expr::Binary(*op, Box::new(v), b.clone()));
            }
            for v in rename_variants(b, lhs, in_scope, widths) {
                out.push(Expr::Binary(*op, a.clone(), Box::new(v)));
            }
        }
        Expr::Cond(c, t, e) => {
            for v in rename_variants(c, lhs, in_scope, widths) {
                out.push(Expr::Cond(Box::new(v), t.clone(), e.clone()));
            }
            for v in rename_variants(t, lhs, in_scope, widths) {
                out.push(Expr::Cond(c.clone(), Box::new(v), e.clone()));
            }
            for v in rename_variants(e, lhs, in_scope, widths) {
                out.push(Expr::Cond(c.clone(), t.clone(), Box::new(v)));
            }
        }
        Expr::Cast(f, e) => {
            for v in rename_variants(e, lhs, in_scope, widths) {
                out.push(Expr::Cast(*f, Box::new(v)));
            }
        }
    }
    out
}

impl Shrink for SourceInfo {
    fn shrink(&self) -> Vec<SourceInfo> {
        let mut out = Vec::new();
        for (i, module) in self.modules.iter().enumerate() {
            if module.name != self.top && self.modules.len() > 1 {
                let mut smaller = self.clone();
                smaller.modules.remove(i);
                out.push(smaller);
            }
            for smaller_module in module.shrink() {
                let mut smaller = self.clone();
                smaller.modules[i] = smaller_module;
                out.push(smaller);
            }
        }
        out
    }
}

fn module_is_well_formed(module: &ModDecl) -> bool {
    let src = SourceInfo::new(module.name.as_str(), vec![module.clone()]);
    crate::ast::validate(&src).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::validate;
    use crate::codegen;

    fn walk_divisors(expr: &Expr, check: &mut impl FnMut(&Expr)) {
        match expr {
            Expr::Number { .. } | Expr::Id(_) => {}
            Expr::Concat(es) => {
                for e in es {
                    walk_divisors(e, check);
                }
            }
            Expr::Unary(_, e) | Expr::Cast(_, e) => walk_divisors(e, check),
            Expr::Binary(op, a, b) => {
                if op.is_division() {
                    check(b);
                }
                walk_divisors(a, check);
                walk_divisors(b, check);
            }
            Expr::Cond(c, t, e) => {
                walk_divisors(c, check);
                walk_divisors(t, check);
                walk_divisors(e, check);
            }
        }
    }

    #[test]
    fn generated_sources_are_well_formed() {
        for seed in 0..40u64 {
            for size in 0..6u32 {
                let mut g = Gen::new(seed, Config::default());
                let src = g.gen_source(size);
                validate(&src).unwrap_or_else(|e| {
                    panic!("seed {} size {}: {}\n{}", seed, size, e, codegen::emit(&src))
                });
            }
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let mut a = Gen::new(0, Config::default());
        let mut b = Gen::new(0, Config::default());
        let src_a = a.gen_source(5);
        let src_b = b.gen_source(5);
        assert_eq!(src_a, src_b);
        assert_eq!(codegen::emit(&src_a), codegen::emit(&src_b));
    }

    #[test]
    fn distinct_seeds_vary() {
        let mut a = Gen::new(1, Config::default());
        let mut b = Gen::new(2, Config::default());
        assert_ne!(a.gen_source(5), b.gen_source(5));
    }

    #[test]
    fn depth_zero_yields_leaves() {
        let mut g = Gen::new(3, Config::default());
        let scope = vec![(Ident::new("a"), 8u32)];
        for _ in 0..50 {
            let e = g.gen_expr(&scope, 8, 0);
            assert!(matches!(e, Expr::Number { .. } | Expr::Id(_)));
            assert_eq!(e.size(), 1);
        }
    }

    #[test]
    fn divisors_are_never_statically_zero() {
        for seed in 0..40u64 {
            let mut g = Gen::new(seed, Config::default());
            let src = g.gen_source(5);
            for module in &src.modules {
                for item in &module.items {
                    if let ModItem::Assign(_, rhs) = item {
                        walk_divisors(rhs, &mut |d| {
                            match d {
                                Expr::Number { value, .. } => assert!(value.bits() != 0),
                                Expr::Binary(BinaryOp::BitOr, _, literal) => {
                                    match &**literal {
                                        Expr::Number { value, .. } => {
                                            assert!(value.bits() != 0)
                                        }
                                        other => panic!("unexpected or-guard: {:?}", other),
                                    }
                                }
                                other => panic!("unguarded divisor: {:?}", other),
                            };
                        });
                    }
                }
            }
        }
    }

    #[test]
    fn shift_amounts_are_bounded_literals() {
        for seed in 0..20u64 {
            let mut g = Gen::new(seed, Config::default());
            let src = g.gen_source(4);
            // validate() enforces literal shift amounts; spot-check bounds.
            for module in &src.modules {
                let scope = module.scope();
                for item in &module.items {
                    if let ModItem::Assign(_, rhs) = item {
                        check_shift_bounds(rhs, &scope);
                    }
                }
            }
        }
    }

    fn check_shift_bounds(expr: &Expr, scope: &std::collections::HashMap<Ident, u32>) {
        if let Expr::Binary(op, a, b) = expr {
            if op.is_shift() {
                let lhs_width = a.width(scope).unwrap();
                match &**b {
                    Expr::Number { value, .. } => {
                        assert!(value < &(BigUint::from(2 * lhs_width as u64 + 1)))
                    }
                    other => panic!("non-literal shift amount: {:?}", other),
                }
            }
        }
        match expr {
            Expr::Concat(es) => es.iter().for_each(|e| check_shift_bounds(e, scope)),
            Expr::Unary(_, e) | Expr::Cast(_, e) => check_shift_bounds(e, scope),
            Expr::Binary(_, a, b) => {
                check_shift_bounds(a, scope);
                check_shift_bounds(b, scope);
            }
            Expr::Cond(c, t, e) => {
                check_shift_bounds(c, scope);
                check_shift_bounds(t, scope);
                check_shift_bounds(e, scope);
            }
            _ => {}
        }
    }

    /// Walks the full shrink tree of `expr`, checking each step strictly
    /// decreases the (size, literal weight) measure. Termination of this
    /// walk is itself the finiteness property.
    fn assert_well_founded(expr: &Expr, budget: &mut usize) {
        let measure = (expr.size(), expr.literal_weight());
        for smaller in expr.shrink() {
            assert!(
                (smaller.size(), smaller.literal_weight()) < measure,
                "shrink did not decrease: {:?} -> {:?}",
                expr,
                smaller
            );
            if *budget == 0 {
                return;
            }
            *budget -= 1;
            assert_well_founded(&smaller, budget);
        }
    }

    #[test]
    fn shrink_trees_are_finite_and_decreasing() {
        for seed in 0..10u64 {
            let mut g = Gen::new(seed, Config::default());
            let scope = vec![(Ident::new("a"), 4u32), (Ident::new("b"), 1u32)];
            let e = g.gen_expr(&scope, 4, 3);
            let mut budget = 20_000usize;
            assert_well_founded(&e, &mut budget);
        }
    }

    #[test]
    fn module_shrinks_preserve_well_formedness_for_item_removal() {
        let mut g = Gen::new(11, Config::default());
        let src = g.gen_source(5);
        let module = src.top_module().unwrap();
        for smaller in module.shrink() {
            if smaller.items.len() < module.items.len() {
                assert!(module_is_well_formed(&smaller));
            }
        }
    }

    #[test]
    fn graph_modules_are_well_formed() {
        for seed in 0..20u64 {
            let mut g = Gen::new(seed, Config::default());
            let module = g.gen_from_graph("top", 10);
            let src = SourceInfo::new("top", vec![module]);
            validate(&src).unwrap();
        }
    }
}
