// SPDX-License-Identifier: Apache-2.0

//! Typed representation of the generated Verilog subset.
//!
//! Values are immutable trees; the reducer produces new, smaller trees
//! rather than mutating in place. Everything derives `Hash`/`Eq` so the
//! reducer can deduplicate candidates.

use std::collections::{HashMap, HashSet};
use std::fmt;

use num_bigint::BigUint;

use crate::errors::ValidateError;

/// A Verilog identifier: `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident(String);

impl Ident {
    pub fn new(s: impl Into<String>) -> Self {
        let s = s.into();
        debug_assert!(is_valid_ident(&s), "invalid identifier: {:?}", s);
        Ident(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn is_valid_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
    Inout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetKind {
    Wire,
    Reg,
}

/// A port or local net declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Port {
    pub dir: Direction,
    pub net: NetKind,
    pub signed: bool,
    pub width: u32,
    pub name: Ident,
}

impl Port {
    pub fn wire(dir: Direction, width: u32, name: impl Into<String>) -> Self {
        Port {
            dir,
            net: NetKind::Wire,
            signed: false,
            width,
            name: Ident::new(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    LogicNot,
    BitNot,
    ReduceAnd,
    ReduceOr,
    ReduceXor,
    ReduceNand,
    ReduceNor,
    ReduceXnor,
    Plus,
    Minus,
}

impl UnaryOp {
    pub fn token(self) -> &'static str {
        match self {
            UnaryOp::LogicNot => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::ReduceAnd => "&",
            UnaryOp::ReduceOr => "|",
            UnaryOp::ReduceXor => "^",
            UnaryOp::ReduceNand => "~&",
            UnaryOp::ReduceNor => "~|",
            UnaryOp::ReduceXnor => "~^",
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
        }
    }

    /// Operators whose result is a single bit regardless of operand width.
    pub fn is_single_bit(self) -> bool {
        !matches!(self, UnaryOp::BitNot | UnaryOp::Plus | UnaryOp::Minus)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    ShiftLeft,
    ShiftRight,
    ArithShiftLeft,
    ArithShiftRight,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    CaseEq,
    CaseNe,
    BitAnd,
    BitOr,
    BitXor,
    BitXnor,
    LogicAnd,
    LogicOr,
}

impl BinaryOp {
    pub fn token(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::ArithShiftLeft => "<<<",
            BinaryOp::ArithShiftRight => ">>>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::CaseEq => "===",
            BinaryOp::CaseNe => "!==",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::BitXnor => "~^",
            BinaryOp::LogicAnd => "&&",
            BinaryOp::LogicOr => "||",
        }
    }

    /// Comparison and logical connective results are one bit wide.
    pub fn is_single_bit(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt
                | BinaryOp::Gt
                | BinaryOp::Le
                | BinaryOp::Ge
                | BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::CaseEq
                | BinaryOp::CaseNe
                | BinaryOp::LogicAnd
                | BinaryOp::LogicOr
        )
    }

    pub fn is_shift(self) -> bool {
        matches!(
            self,
            BinaryOp::ShiftLeft
                | BinaryOp::ShiftRight
                | BinaryOp::ArithShiftLeft
                | BinaryOp::ArithShiftRight
        )
    }

    pub fn is_division(self) -> bool {
        matches!(self, BinaryOp::Div | BinaryOp::Mod)
    }
}

/// `$signed` / `$unsigned` system functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastFn {
    Signed,
    Unsigned,
}

impl CastFn {
    pub fn token(self) -> &'static str {
        match self {
            CastFn::Signed => "$signed",
            CastFn::Unsigned => "$unsigned",
        }
    }
}

/// An expression of the subset. Literal values are kept truncated to their
/// declared width, so structural equality is semantic equality for numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Number { width: u32, value: BigUint },
    Id(Ident),
    Concat(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
    Cast(CastFn, Box<Expr>),
}

impl Expr {
    /// A literal of the given width, value truncated modulo `2^width`.
    pub fn number(width: u32, value: BigUint) -> Expr {
        Expr::Number {
            width,
            value: truncate(value, width),
        }
    }

    pub fn number_u64(width: u32, value: u64) -> Expr {
        Expr::number(width, BigUint::from(value))
    }

    pub fn id(name: impl Into<String>) -> Expr {
        Expr::Id(Ident::new(name))
    }

    /// Number of nodes in the expression tree.
    pub fn size(&self) -> usize {
        match self {
            Expr::Number { .. } | Expr::Id(_) => 1,
            Expr::Concat(es) => 1 + es.iter().map(Expr::size).sum::<usize>(),
            Expr::Unary(_, e) | Expr::Cast(_, e) => 1 + e.size(),
            Expr::Binary(_, a, b) => 1 + a.size() + b.size(),
            Expr::Cond(c, t, e) => 1 + c.size() + t.size() + e.size(),
        }
    }

    /// Bit width of the expression under `scope`, or `None` if some
    /// identifier is unresolved.
    pub fn width(&self, scope: &HashMap<Ident, u32>) -> Option<u32> {
        match self {
            Expr::Number { width, .. } => Some(*width),
            Expr::Id(name) => scope.get(name).copied(),
            Expr::Concat(es) => {
                let mut total = 0u32;
                for e in es {
                    total = total.checked_add(e.width(scope)?)?;
                }
                Some(total)
            }
            Expr::Unary(op, e) => {
                let w = e.width(scope)?;
                Some(if op.is_single_bit() { 1 } else { w })
            }
            Expr::Binary(op, a, b) => {
                let wa = a.width(scope)?;
                let wb = b.width(scope)?;
                if op.is_single_bit() {
                    Some(1)
                } else if op.is_shift() || *op == BinaryOp::Pow {
                    Some(wa)
                } else {
                    Some(wa.max(wb))
                }
            }
            Expr::Cond(c, t, e) => {
                c.width(scope)?;
                Some(t.width(scope)?.max(e.width(scope)?))
            }
            Expr::Cast(_, e) => e.width(scope),
        }
    }

    /// Collects every identifier referenced by the expression.
    pub fn collect_ids(&self, out: &mut HashSet<Ident>) {
        match self {
            Expr::Number { .. } => {}
            Expr::Id(name) => {
                out.insert(name.clone());
            }
            Expr::Concat(es) => {
                for e in es {
                    e.collect_ids(out);
                }
            }
            Expr::Unary(_, e) | Expr::Cast(_, e) => e.collect_ids(out),
            Expr::Binary(_, a, b) => {
                a.collect_ids(out);
                b.collect_ids(out);
            }
            Expr::Cond(c, t, e) => {
                c.collect_ids(out);
                t.collect_ids(out);
                e.collect_ids(out);
            }
        }
    }

    pub fn is_zero_literal(&self) -> bool {
        matches!(self, Expr::Number { value, .. } if value.bits() == 0)
    }

    /// Sum of literal values and widths; used as a secondary measure so
    /// literal-narrowing steps are still strictly decreasing.
    pub fn literal_weight(&self) -> BigUint {
        match self {
            Expr::Number { width, value } => value + BigUint::from(*width),
            Expr::Id(_) => BigUint::from(0u32),
            Expr::Concat(es) => es.iter().map(Expr::literal_weight).sum(),
            Expr::Unary(_, e) | Expr::Cast(_, e) => e.literal_weight(),
            Expr::Binary(_, a, b) => a.literal_weight() + b.literal_weight(),
            Expr::Cond(c, t, e) => {
                c.literal_weight() + t.literal_weight() + e.literal_weight()
            }
        }
    }
}

pub fn truncate(value: BigUint, width: u32) -> BigUint {
    let modulus = BigUint::from(1u32) << width;
    value % modulus
}

/// A module body item. Local declarations reuse `Port`; their `dir` field
/// is not printed and is canonically `Input` so round-tripping preserves
/// structural equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModItem {
    Decl(Port),
    Assign(Ident, Expr),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModDecl {
    pub name: Ident,
    pub ports: Vec<Port>,
    pub items: Vec<ModItem>,
}

impl ModDecl {
    pub fn new(name: impl Into<String>) -> Self {
        ModDecl {
            name: Ident::new(name),
            ports: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn input_ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.dir == Direction::Input)
    }

    pub fn output_ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.dir == Direction::Output)
    }

    /// Width environment over ports and local declarations.
    pub fn scope(&self) -> HashMap<Ident, u32> {
        let mut scope = HashMap::new();
        for p in &self.ports {
            scope.insert(p.name.clone(), p.width);
        }
        for item in &self.items {
            if let ModItem::Decl(p) = item {
                scope.insert(p.name.clone(), p.width);
            }
        }
        scope
    }

    /// Identifiers referenced by any assignment RHS.
    pub fn referenced_ids(&self) -> HashSet<Ident> {
        let mut ids = HashSet::new();
        for item in &self.items {
            if let ModItem::Assign(_, rhs) = item {
                rhs.collect_ids(&mut ids);
            }
        }
        ids
    }

    pub fn size(&self) -> usize {
        let items: usize = self
            .items
            .iter()
            .map(|i| match i {
                ModItem::Decl(_) => 1,
                ModItem::Assign(_, rhs) => 1 + rhs.size(),
            })
            .sum();
        1 + self.ports.len() + items
    }
}

/// A compilation unit plus the name of the device under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceInfo {
    pub top: Ident,
    pub modules: Vec<ModDecl>,
}

impl SourceInfo {
    pub fn new(top: impl Into<String>, modules: Vec<ModDecl>) -> Self {
        SourceInfo {
            top: Ident::new(top),
            modules,
        }
    }

    pub fn top_module(&self) -> Option<&ModDecl> {
        self.modules.iter().find(|m| m.name == self.top)
    }

    pub fn size(&self) -> usize {
        self.modules.iter().map(ModDecl::size).sum()
    }

    pub fn literal_weight(&self) -> BigUint {
        self.modules
            .iter()
            .flat_map(|m| m.items.iter())
            .map(|i| match i {
                ModItem::Decl(_) => BigUint::from(0u32),
                ModItem::Assign(_, rhs) => rhs.literal_weight(),
            })
            .sum()
    }
}

/// Checks every structural invariant of the subset. The generator produces
/// only passing sources; the reducer discards candidates that fail.
pub fn validate(src: &SourceInfo) -> Result<(), ValidateError> {
    if src.modules.is_empty() {
        return Err(ValidateError::EmptySource);
    }
    if src.top_module().is_none() {
        return Err(ValidateError::MissingTop(src.top.as_str().to_string()));
    }
    for module in &src.modules {
        validate_module(module)?;
    }
    Ok(())
}

fn validate_module(module: &ModDecl) -> Result<(), ValidateError> {
    let mod_name = module.name.as_str().to_string();

    // Declarations are unique across ports and locals. The bool records
    // whether the declaration is a header port (directions only bind there).
    let mut declared: HashMap<Ident, (&Port, bool)> = HashMap::new();
    for p in &module.ports {
        if declared.insert(p.name.clone(), (p, true)).is_some() {
            return Err(ValidateError::DuplicateDecl(
                p.name.as_str().to_string(),
                mod_name,
            ));
        }
    }
    for item in &module.items {
        if let ModItem::Decl(p) = item {
            if declared.insert(p.name.clone(), (p, false)).is_some() {
                return Err(ValidateError::DuplicateDecl(
                    p.name.as_str().to_string(),
                    mod_name,
                ));
            }
        }
    }

    // Assignments: LHS is a declared, non-input wire with a single driver;
    // RHS references only signals declared earlier (ports count as earliest)
    // and has a width matching the target.
    let mut in_scope: HashMap<Ident, u32> = module
        .ports
        .iter()
        .map(|p| (p.name.clone(), p.width))
        .collect();
    let mut driven: HashSet<Ident> = HashSet::new();
    for item in &module.items {
        match item {
            ModItem::Decl(p) => {
                in_scope.insert(p.name.clone(), p.width);
            }
            ModItem::Assign(lhs, rhs) => {
                let (port, is_header_port) = declared
                    .get(lhs)
                    .copied()
                    .ok_or_else(|| {
                        ValidateError::Undeclared(lhs.as_str().to_string(), mod_name.clone())
                    })?;
                if port.net != NetKind::Wire
                    || (is_header_port && port.dir == Direction::Input)
                {
                    return Err(ValidateError::BadAssignTarget(
                        lhs.as_str().to_string(),
                        mod_name,
                    ));
                }
                if !driven.insert(lhs.clone()) {
                    return Err(ValidateError::MultipleDrivers(
                        lhs.as_str().to_string(),
                        mod_name,
                    ));
                }
                let mut ids = HashSet::new();
                rhs.collect_ids(&mut ids);
                for id in &ids {
                    if !in_scope.contains_key(id) {
                        return Err(ValidateError::Undeclared(
                            id.as_str().to_string(),
                            mod_name,
                        ));
                    }
                }
                let actual = rhs
                    .width(&in_scope)
                    .ok_or_else(|| ValidateError::NoWidth(mod_name.clone()))?;
                if actual != port.width {
                    return Err(ValidateError::WidthMismatch {
                        target: lhs.as_str().to_string(),
                        declared: port.width,
                        actual,
                    });
                }
                validate_expr(rhs, &mod_name)?;
            }
        }
    }

    // Combinational cycles: no driven wire may be reachable from its own
    // right-hand side through other continuous assignments.
    let mut deps: HashMap<Ident, HashSet<Ident>> = HashMap::new();
    for item in &module.items {
        if let ModItem::Assign(lhs, rhs) = item {
            let mut ids = HashSet::new();
            rhs.collect_ids(&mut ids);
            deps.insert(lhs.clone(), ids);
        }
    }
    for start in deps.keys() {
        let mut visited: HashSet<&Ident> = HashSet::new();
        let mut worklist: Vec<&Ident> = deps[start].iter().collect();
        while let Some(id) = worklist.pop() {
            if id == start {
                return Err(ValidateError::CombinationalLoop(
                    start.as_str().to_string(),
                    mod_name,
                ));
            }
            if visited.insert(id) {
                if let Some(next) = deps.get(id) {
                    worklist.extend(next.iter());
                }
            }
        }
    }
    Ok(())
}

fn validate_expr(expr: &Expr, mod_name: &str) -> Result<(), ValidateError> {
    match expr {
        Expr::Number { .. } | Expr::Id(_) => Ok(()),
        Expr::Concat(es) => {
            for e in es {
                validate_expr(e, mod_name)?;
            }
            Ok(())
        }
        Expr::Unary(_, e) | Expr::Cast(_, e) => validate_expr(e, mod_name),
        Expr::Binary(op, a, b) => {
            if op.is_division() && b.is_zero_literal() {
                return Err(ValidateError::ZeroDivisor(mod_name.to_string()));
            }
            if op.is_shift() && !matches!(**b, Expr::Number { .. }) {
                return Err(ValidateError::UnboundedShift(mod_name.to_string()));
            }
            validate_expr(a, mod_name)?;
            validate_expr(b, mod_name)
        }
        Expr::Cond(c, t, e) => {
            validate_expr(c, mod_name)?;
            validate_expr(t, mod_name)?;
            validate_expr(e, mod_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_assign_module(rhs: Expr) -> SourceInfo {
        let mut m = ModDecl::new("top");
        m.ports.push(Port::wire(Direction::Input, 8, "x0"));
        m.ports.push(Port::wire(Direction::Output, 8, "y"));
        m.items.push(ModItem::Assign(Ident::new("y"), rhs));
        SourceInfo::new("top", vec![m])
    }

    #[test]
    fn validate_accepts_simple_module() {
        let src = one_assign_module(Expr::id("x0"));
        assert_eq!(validate(&src), Ok(()));
    }

    #[test]
    fn validate_rejects_undeclared_id() {
        let src = one_assign_module(Expr::id("nope"));
        assert!(matches!(
            validate(&src),
            Err(ValidateError::Undeclared(..))
        ));
    }

    #[test]
    fn validate_rejects_zero_divisor() {
        let src = one_assign_module(Expr::Binary(
            BinaryOp::Div,
            Box::new(Expr::id("x0")),
            Box::new(Expr::number_u64(8, 0)),
        ));
        assert!(matches!(validate(&src), Err(ValidateError::ZeroDivisor(_))));
    }

    #[test]
    fn validate_rejects_width_mismatch() {
        let src = one_assign_module(Expr::number_u64(4, 3));
        assert!(matches!(
            validate(&src),
            Err(ValidateError::WidthMismatch { .. })
        ));
    }

    #[test]
    fn validate_rejects_assign_to_input() {
        let mut m = ModDecl::new("top");
        m.ports.push(Port::wire(Direction::Input, 1, "x0"));
        m.ports.push(Port::wire(Direction::Output, 1, "y"));
        m.items
            .push(ModItem::Assign(Ident::new("x0"), Expr::number_u64(1, 0)));
        m.items
            .push(ModItem::Assign(Ident::new("y"), Expr::number_u64(1, 0)));
        let src = SourceInfo::new("top", vec![m]);
        assert!(matches!(
            validate(&src),
            Err(ValidateError::BadAssignTarget(..))
        ));
    }

    #[test]
    fn validate_rejects_direct_self_assignment() {
        let src = one_assign_module(Expr::id("y"));
        assert!(matches!(
            validate(&src),
            Err(ValidateError::CombinationalLoop(..))
        ));
    }

    #[test]
    fn validate_rejects_multi_wire_cycle() {
        // w0 := w1; w1 := w0 has no defined value even though every name
        // resolves and no assignment mentions its own target.
        let mut m = ModDecl::new("top");
        m.ports.push(Port::wire(Direction::Output, 1, "y"));
        m.items
            .push(ModItem::Decl(Port::wire(Direction::Input, 1, "w0")));
        m.items
            .push(ModItem::Decl(Port::wire(Direction::Input, 1, "w1")));
        m.items
            .push(ModItem::Assign(Ident::new("w0"), Expr::id("w1")));
        m.items
            .push(ModItem::Assign(Ident::new("w1"), Expr::id("w0")));
        m.items
            .push(ModItem::Assign(Ident::new("y"), Expr::id("w0")));
        let src = SourceInfo::new("top", vec![m]);
        assert!(matches!(
            validate(&src),
            Err(ValidateError::CombinationalLoop(..))
        ));
    }

    #[test]
    fn number_values_are_truncated() {
        let e = Expr::number_u64(4, 0x1ff);
        assert_eq!(e, Expr::number_u64(4, 0xf));
    }

    #[test]
    fn width_of_single_bit_ops() {
        let scope: HashMap<Ident, u32> =
            [(Ident::new("a"), 8), (Ident::new("b"), 8)].into_iter().collect();
        let cmp = Expr::Binary(
            BinaryOp::Lt,
            Box::new(Expr::id("a")),
            Box::new(Expr::id("b")),
        );
        assert_eq!(cmp.width(&scope), Some(1));
        let red = Expr::Unary(UnaryOp::ReduceXor, Box::new(Expr::id("a")));
        assert_eq!(red.width(&scope), Some(1));
        let cat = Expr::Concat(vec![Expr::id("a"), Expr::id("b")]);
        assert_eq!(cat.width(&scope), Some(16));
    }
}
