// SPDX-License-Identifier: Apache-2.0

//! Random gate-level circuit DAGs and their reduction to module syntax.
//!
//! Nodes live in an arena indexed by `GateRef`; edges point from a node to
//! earlier nodes only, so the arena order is already topological and the
//! fold into continuous assignments emits one wire per internal node.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::ast::{BinaryOp, Direction, Expr, Ident, ModDecl, ModItem, Port};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateKind {
    And,
    Or,
    Xor,
    Nand,
    Nor,
}

impl GateKind {
    pub fn all() -> [GateKind; 5] {
        [
            GateKind::And,
            GateKind::Or,
            GateKind::Xor,
            GateKind::Nand,
            GateKind::Nor,
        ]
    }

    /// Expresses `a <kind> b` in the subset AST.
    fn apply(self, a: Expr, b: Expr) -> Expr {
        let plain = |op: BinaryOp, a: Expr, b: Expr| Expr::Binary(op, Box::new(a), Box::new(b));
        match self {
            GateKind::And => plain(BinaryOp::BitAnd, a, b),
            GateKind::Or => plain(BinaryOp::BitOr, a, b),
            GateKind::Xor => plain(BinaryOp::BitXor, a, b),
            GateKind::Nand => Expr::Unary(
                crate::ast::UnaryOp::BitNot,
                Box::new(plain(BinaryOp::BitAnd, a, b)),
            ),
            GateKind::Nor => Expr::Unary(
                crate::ast::UnaryOp::BitNot,
                Box::new(plain(BinaryOp::BitOr, a, b)),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GateRef {
    pub id: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateNode {
    /// A designated circuit input; in-degree zero.
    Input,
    /// An internal gate over earlier nodes; in-degree at least one after
    /// duplicate-edge removal.
    Gate { kind: GateKind, preds: Vec<GateRef> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circuit {
    pub nodes: Vec<GateNode>,
    pub inputs: Vec<GateRef>,
    pub output: GateRef,
}

impl Circuit {
    /// Samples a random DAG with roughly `resize` internal gates. Every
    /// internal node draws two predecessors among strictly earlier nodes;
    /// duplicate edges are removed afterwards.
    pub fn random<R: Rng>(rng: &mut R, resize: usize) -> Circuit {
        let num_inputs = rng.gen_range(2..=2 + resize / 4);
        let num_gates = resize.max(1);
        let mut nodes = Vec::with_capacity(num_inputs + num_gates);
        let mut inputs = Vec::with_capacity(num_inputs);
        for _ in 0..num_inputs {
            inputs.push(GateRef { id: nodes.len() });
            nodes.push(GateNode::Input);
        }
        for _ in 0..num_gates {
            let kind = *GateKind::all().choose(rng).unwrap();
            let a = GateRef {
                id: rng.gen_range(0..nodes.len()),
            };
            let b = GateRef {
                id: rng.gen_range(0..nodes.len()),
            };
            let mut preds = vec![a, b];
            preds.dedup();
            nodes.push(GateNode::Gate { kind, preds });
        }
        let output = GateRef { id: nodes.len() - 1 };
        Circuit {
            nodes,
            inputs,
            output,
        }
    }

    /// Folds the DAG into a module: inputs become 1-bit ports, each gate
    /// becomes a wire driven by its gate function, and the designated
    /// output node drives the `y` port.
    pub fn to_mod_decl(&self, name: &str) -> ModDecl {
        let mut module = ModDecl::new(name);
        let mut signal_names: Vec<Ident> = Vec::with_capacity(self.nodes.len());
        let mut input_index = 0usize;
        for node in &self.nodes {
            match node {
                GateNode::Input => {
                    let ident = Ident::new(format!("x{}", input_index));
                    input_index += 1;
                    module
                        .ports
                        .push(Port::wire(Direction::Input, 1, ident.as_str()));
                    signal_names.push(ident);
                }
                GateNode::Gate { kind, preds } => {
                    let ident = Ident::new(format!("n{}", signal_names.len()));
                    let mut operands = preds.iter().map(|p| Expr::Id(signal_names[p.id].clone()));
                    let first = operands.next().expect("gate with no predecessors");
                    let rhs = operands.fold(first, |acc, e| kind.apply(acc, e));
                    module.items.push(ModItem::Decl(Port::wire(
                        Direction::Input,
                        1,
                        ident.as_str(),
                    )));
                    module.items.push(ModItem::Assign(ident.clone(), rhs));
                    signal_names.push(ident);
                }
            }
        }
        module.ports.push(Port::wire(Direction::Output, 1, "y"));
        module.items.push(ModItem::Assign(
            Ident::new("y"),
            Expr::Id(signal_names[self.output.id].clone()),
        ));
        module
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{validate, SourceInfo};
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    #[test]
    fn random_circuits_fold_to_valid_modules() {
        for seed in 0..20 {
            let mut rng = Pcg64Mcg::seed_from_u64(seed);
            let circuit = Circuit::random(&mut rng, 12);
            let module = circuit.to_mod_decl("top");
            let src = SourceInfo::new("top", vec![module]);
            validate(&src).unwrap();
        }
    }

    #[test]
    fn edges_point_backwards() {
        let mut rng = Pcg64Mcg::seed_from_u64(7);
        let circuit = Circuit::random(&mut rng, 30);
        for (id, node) in circuit.nodes.iter().enumerate() {
            if let GateNode::Gate { preds, .. } = node {
                assert!(!preds.is_empty());
                for p in preds {
                    assert!(p.id < id);
                }
            }
        }
    }

    #[test]
    fn duplicate_edges_are_removed() {
        for seed in 0..50 {
            let mut rng = Pcg64Mcg::seed_from_u64(seed);
            let circuit = Circuit::random(&mut rng, 20);
            for node in &circuit.nodes {
                if let GateNode::Gate { preds, .. } = node {
                    let mut sorted = preds.clone();
                    sorted.sort();
                    sorted.dedup();
                    assert_eq!(sorted.len(), preds.len());
                }
            }
        }
    }
}
