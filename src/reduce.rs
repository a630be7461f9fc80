// SPDX-License-Identifier: Apache-2.0

//! Property-preserving test-case reduction (delta debugging over the AST).
//!
//! `reduce` takes an opaque predicate (in the fuzz flow: "the equivalence
//! driver still reports a disagreement on this module") and a source known
//! to satisfy it, and keeps applying one-step reductions until no step
//! preserves the predicate. The result is a local minimum, not a global
//! one. Predicate verdicts are memoized by a stable hash of the printed
//! candidate so external tools never re-run on a module already tested.

use std::collections::HashMap;

use crate::ast::{validate, Expr, Ident, ModItem, SourceInfo};
use crate::codegen;
use crate::generator::Shrink;
use crate::sim::hex_digest;

pub struct Reducer {
    cache: HashMap<String, bool>,
    evals: usize,
    hits: usize,
}

impl Default for Reducer {
    fn default() -> Self {
        Reducer::new()
    }
}

impl Reducer {
    pub fn new() -> Self {
        Reducer {
            cache: HashMap::new(),
            evals: 0,
            hits: 0,
        }
    }

    /// Predicate evaluations that actually ran.
    pub fn evals(&self) -> usize {
        self.evals
    }

    /// Candidates answered from the memo cache.
    pub fn cache_hits(&self) -> usize {
        self.hits
    }

    /// Shrinks `src` to a local minimum still satisfying `predicate`.
    pub fn reduce<P>(&mut self, mut predicate: P, src: &SourceInfo) -> SourceInfo
    where
        P: FnMut(&SourceInfo) -> bool,
    {
        if !self.check(&mut predicate, src) {
            return src.clone();
        }
        let mut current = src.clone();
        loop {
            let current_size = current.size();
            let mut candidates: Vec<SourceInfo> = one_step_reductions(&current)
                .into_iter()
                .filter(|c| validate(c).is_ok())
                .collect();
            // Largest size win first; the stable sort keeps earlier
            // structural positions ahead on ties.
            candidates.sort_by_key(|c| std::cmp::Reverse(current_size - c.size()));

            let mut advanced = false;
            for candidate in candidates {
                if self.check(&mut predicate, &candidate) {
                    current = candidate;
                    advanced = true;
                    break;
                }
            }
            if !advanced {
                break;
            }
        }
        current
    }

    fn check<P>(&mut self, predicate: &mut P, candidate: &SourceInfo) -> bool
    where
        P: FnMut(&SourceInfo) -> bool,
    {
        let key = hex_digest(codegen::emit(candidate).as_bytes());
        if let Some(verdict) = self.cache.get(&key) {
            self.hits += 1;
            return *verdict;
        }
        let verdict = predicate(candidate);
        self.evals += 1;
        self.cache.insert(key, verdict);
        verdict
    }
}

/// All one-step reductions of `src`: the generator's shrink alternatives
/// (item removal, child replacement, literal narrowing, identifier
/// canonicalization, unused-port removal) plus replacement of arbitrary
/// subtrees by a zero literal of the same width.
fn one_step_reductions(src: &SourceInfo) -> Vec<SourceInfo> {
    let mut out = src.shrink();
    for (mi, module) in src.modules.iter().enumerate() {
        let scope = module.scope();
        for (ii, item) in module.items.iter().enumerate() {
            if let ModItem::Assign(lhs, rhs) = item {
                for zeroed in zero_variants(rhs, &scope) {
                    let mut smaller = src.clone();
                    smaller.modules[mi].items[ii] = ModItem::Assign(lhs.clone(), zeroed);
                    out.push(smaller);
                }
            }
        }
    }
    out
}

/// Variants of `expr` with one subtree replaced by `Number(width, 0)`.
fn zero_variants(expr: &Expr, scope: &HashMap<Ident, u32>) -> Vec<Expr> {
    let mut out = Vec::new();
    if !expr.is_zero_literal() {
        if let Some(width) = expr.width(scope) {
            out.push(Expr::number_u64(width, 0));
        }
    }
    match expr {
        Expr::Number { .. } | Expr::Id(_) => {}
        Expr::Concat(es) => {
            for (i, e) in es.iter().enumerate() {
                for v in zero_variants(e, scope) {
                    let mut next = es.clone();
                    next[i] = v;
                    out.push(Expr::Concat(next));
                }
            }
        }
        Expr::Unary(op, e) => {
            for v in zero_variants(e, scope) {
                out.push(Expr::Unary(*op, Box::new(v)));
            }
        }
        Expr::Binary(op, a, b) => {
            for v in zero_variants(a, scope) {
                out.push(Expr::Binary(*op, Box::new(v), b.clone()));
            }
            for v in zero_variants(b, scope) {
                out.push(Expr::Binary(*op, a.clone(), Box::new(v)));
            }
        }
        Expr::Cond(c, t, e) => {
            for v in zero_variants(c, scope) {
                out.push(Expr::Cond(Box::new(v), t.clone(), e.clone()));
            }
            for v in zero_variants(t, scope) {
                out.push(Expr::Cond(c.clone(), Box::new(v), e.clone()));
            }
            for v in zero_variants(e, scope) {
                out.push(Expr::Cond(c.clone(), t.clone(), Box::new(v)));
            }
        }
        Expr::Cast(f, e) => {
            for v in zero_variants(e, scope) {
                out.push(Expr::Cast(*f, Box::new(v)));
            }
        }
    }
    out
}

/// True when the module still contains a division whose right operand is
/// not a bare literal. Handy as a reduction predicate in tests and when
/// triaging division miscompiles.
pub fn contains_variable_division(src: &SourceInfo) -> bool {
    fn expr_has(expr: &Expr) -> bool {
        match expr {
            Expr::Number { .. } | Expr::Id(_) => false,
            Expr::Concat(es) => es.iter().any(expr_has),
            Expr::Unary(_, e) | Expr::Cast(_, e) => expr_has(e),
            Expr::Binary(op, a, b) => {
                (op.is_division() && !matches!(**b, Expr::Number { .. }))
                    || expr_has(a)
                    || expr_has(b)
            }
            Expr::Cond(c, t, e) => expr_has(c) || expr_has(t) || expr_has(e),
        }
    }
    src.modules.iter().any(|m| {
        m.items.iter().any(|i| match i {
            ModItem::Assign(_, rhs) => expr_has(rhs),
            ModItem::Decl(_) => false,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Direction, ModDecl, Port};

    fn division_module() -> SourceInfo {
        let mut m = ModDecl::new("top");
        m.ports.push(Port::wire(Direction::Input, 8, "x0"));
        m.ports.push(Port::wire(Direction::Input, 8, "x1"));
        m.ports.push(Port::wire(Direction::Output, 8, "y"));
        // Ten assignments; only w3 carries the interesting division.
        for i in 0..10 {
            let name = format!("w{}", i);
            m.items
                .push(ModItem::Decl(Port::wire(Direction::Input, 8, name.as_str())));
            let rhs = if i == 3 {
                Expr::Binary(
                    BinaryOp::Div,
                    Box::new(Expr::id("x0")),
                    Box::new(Expr::Binary(
                        BinaryOp::BitOr,
                        Box::new(Expr::id("x1")),
                        Box::new(Expr::number_u64(8, 1)),
                    )),
                )
            } else {
                Expr::Binary(
                    BinaryOp::Add,
                    Box::new(Expr::id("x0")),
                    Box::new(Expr::number_u64(8, i as u64)),
                )
            };
            m.items.push(ModItem::Assign(Ident::new(name), rhs));
        }
        m.items
            .push(ModItem::Assign(Ident::new("y"), Expr::id("w3")));
        SourceInfo::new("top", vec![m])
    }

    fn assign_count(src: &SourceInfo) -> usize {
        src.modules
            .iter()
            .flat_map(|m| m.items.iter())
            .filter(|i| matches!(i, ModItem::Assign(..)))
            .count()
    }

    #[test]
    fn reduces_to_single_interesting_assignment() {
        let src = division_module();
        assert!(contains_variable_division(&src));
        let mut reducer = Reducer::new();
        let reduced = reducer.reduce(contains_variable_division, &src);
        assert!(contains_variable_division(&reduced));
        assert_eq!(assign_count(&reduced), 1);
        assert!(reduced.size() < src.size());
        validate(&reduced).unwrap();
    }

    #[test]
    fn reduce_is_idempotent() {
        let src = division_module();
        let mut reducer = Reducer::new();
        let once = reducer.reduce(contains_variable_division, &src);
        let twice = Reducer::new().reduce(contains_variable_division, &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn reduce_returns_input_when_predicate_fails() {
        let src = division_module();
        let mut reducer = Reducer::new();
        let result = reducer.reduce(|_| false, &src);
        assert_eq!(result, src);
        assert_eq!(reducer.evals(), 1);
    }

    #[test]
    fn memoization_skips_repeat_evaluations() {
        let src = division_module();
        let mut reducer = Reducer::new();
        let mut calls = 0usize;
        let verdict_a = reducer.check(
            &mut |s: &SourceInfo| {
                calls += 1;
                contains_variable_division(s)
            },
            &src,
        );
        let verdict_b = reducer.check(
            &mut |s: &SourceInfo| {
                calls += 1;
                contains_variable_division(s)
            },
            &src,
        );
        assert_eq!(verdict_a, verdict_b);
        assert_eq!(calls, 1);
        assert_eq!(reducer.cache_hits(), 1);
    }

    #[test]
    fn zero_variants_cover_whole_expression() {
        let scope: HashMap<Ident, u32> = [(Ident::new("a"), 4)].into_iter().collect();
        let e = Expr::Binary(
            BinaryOp::Add,
            Box::new(Expr::id("a")),
            Box::new(Expr::number_u64(4, 3)),
        );
        let variants = zero_variants(&e, &scope);
        assert!(variants.contains(&Expr::number_u64(4, 0)));
        // The literal operand also zeroes in place.
        assert!(variants.contains(&Expr::Binary(
            BinaryOp::Add,
            Box::new(Expr::id("a")),
            Box::new(Expr::number_u64(4, 0)),
        )));
    }
}
