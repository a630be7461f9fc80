// SPDX-License-Identifier: Apache-2.0

//! Minimal recursive-descent parser for the generated Verilog subset.
//!
//! Accepts exactly the shapes `codegen` emits, modulo whitespace and `//`
//! comments, so that `parse(emit(m)) == m` for every generated module.

use num_bigint::BigUint;

use crate::ast::{
    BinaryOp, CastFn, Direction, Expr, Ident, ModDecl, ModItem, NetKind, Port, SourceInfo,
    UnaryOp,
};

#[derive(Debug)]
pub struct ParseError {
    msg: String,
}

impl ParseError {
    fn new(msg: String) -> Self {
        Self { msg }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ParseError: {}", self.msg)
    }
}

impl std::error::Error for ParseError {}

/// Parses a compilation unit; the returned modules are in source order.
pub fn parse(input: &str) -> Result<Vec<ModDecl>, ParseError> {
    let mut parser = Parser::new(input);
    let mut modules = Vec::new();
    while !parser.at_eof() {
        modules.push(parser.parse_module()?);
    }
    if modules.is_empty() {
        return Err(ParseError::new("no modules in input".to_string()));
    }
    Ok(modules)
}

/// Parses a compilation unit and designates `top` as the device under test.
pub fn parse_source(input: &str, top: &str) -> Result<SourceInfo, ParseError> {
    let modules = parse(input)?;
    if !modules.iter().any(|m| m.name.as_str() == top) {
        return Err(ParseError::new(format!("top module `{}` not found", top)));
    }
    Ok(SourceInfo::new(top, modules))
}

// Binary operator tokens, longest first so maximal munch works.
const BINOP_TOKENS: &[(&str, BinaryOp)] = &[
    ("<<<", BinaryOp::ArithShiftLeft),
    (">>>", BinaryOp::ArithShiftRight),
    ("===", BinaryOp::CaseEq),
    ("!==", BinaryOp::CaseNe),
    ("**", BinaryOp::Pow),
    ("<<", BinaryOp::ShiftLeft),
    (">>", BinaryOp::ShiftRight),
    ("<=", BinaryOp::Le),
    (">=", BinaryOp::Ge),
    ("==", BinaryOp::Eq),
    ("!=", BinaryOp::Ne),
    ("&&", BinaryOp::LogicAnd),
    ("||", BinaryOp::LogicOr),
    ("~^", BinaryOp::BitXnor),
    ("+", BinaryOp::Add),
    ("-", BinaryOp::Sub),
    ("*", BinaryOp::Mul),
    ("/", BinaryOp::Div),
    ("%", BinaryOp::Mod),
    ("<", BinaryOp::Lt),
    (">", BinaryOp::Gt),
    ("&", BinaryOp::BitAnd),
    ("|", BinaryOp::BitOr),
    ("^", BinaryOp::BitXor),
];

const UNOP_TOKENS: &[(&str, UnaryOp)] = &[
    ("~&", UnaryOp::ReduceNand),
    ("~|", UnaryOp::ReduceNor),
    ("~^", UnaryOp::ReduceXnor),
    ("!", UnaryOp::LogicNot),
    ("~", UnaryOp::BitNot),
    ("&", UnaryOp::ReduceAnd),
    ("|", UnaryOp::ReduceOr),
    ("^", UnaryOp::ReduceXor),
    ("+", UnaryOp::Plus),
    ("-", UnaryOp::Minus),
];

struct Parser {
    chars: Vec<char>,
    offset: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            offset: 0,
        }
    }

    fn at_eof(&mut self) -> bool {
        self.skip_trivia();
        self.offset >= self.chars.len()
    }

    fn skip_trivia(&mut self) {
        loop {
            while let Some(c) = self.peekc() {
                if c.is_whitespace() {
                    self.offset += 1;
                } else {
                    break;
                }
            }
            if self.peek_is("//") {
                while let Some(c) = self.peekc() {
                    self.offset += 1;
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn peekc(&self) -> Option<char> {
        self.chars.get(self.offset).copied()
    }

    fn peek_is(&self, s: &str) -> bool {
        let mut i = self.offset;
        for c in s.chars() {
            if self.chars.get(i) != Some(&c) {
                return false;
            }
            i += 1;
        }
        true
    }

    fn context(&self) -> String {
        self.chars[self.offset..self.chars.len().min(self.offset + 24)]
            .iter()
            .collect()
    }

    fn try_drop(&mut self, s: &str) -> bool {
        self.skip_trivia();
        if self.peek_is(s) {
            self.offset += s.chars().count();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, s: &str) -> Result<(), ParseError> {
        if self.try_drop(s) {
            Ok(())
        } else {
            Err(ParseError::new(format!(
                "expected `{}` at `{}`",
                s,
                self.context()
            )))
        }
    }

    /// Consumes `kw` only when it is not a prefix of a longer identifier.
    fn try_keyword(&mut self, kw: &str) -> bool {
        self.skip_trivia();
        if !self.peek_is(kw) {
            return false;
        }
        let after = self.chars.get(self.offset + kw.chars().count());
        match after {
            Some(c) if c.is_ascii_alphanumeric() || *c == '_' => false,
            _ => {
                self.offset += kw.chars().count();
                true
            }
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<(), ParseError> {
        if self.try_keyword(kw) {
            Ok(())
        } else {
            Err(ParseError::new(format!(
                "expected keyword `{}` at `{}`",
                kw,
                self.context()
            )))
        }
    }

    fn parse_ident(&mut self) -> Result<Ident, ParseError> {
        self.skip_trivia();
        let mut name = String::new();
        match self.peekc() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                name.push(c);
                self.offset += 1;
            }
            _ => {
                return Err(ParseError::new(format!(
                    "expected identifier at `{}`",
                    self.context()
                )))
            }
        }
        while let Some(c) = self.peekc() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.offset += 1;
            } else {
                break;
            }
        }
        Ok(Ident::new(name))
    }

    fn parse_decimal(&mut self) -> Result<u64, ParseError> {
        self.skip_trivia();
        let mut digits = String::new();
        while let Some(c) = self.peekc() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.offset += 1;
            } else {
                break;
            }
        }
        if digits.is_empty() {
            return Err(ParseError::new(format!(
                "expected number at `{}`",
                self.context()
            )));
        }
        digits
            .parse::<u64>()
            .map_err(|e| ParseError::new(format!("bad number `{}`: {}", digits, e)))
    }

    fn parse_module(&mut self) -> Result<ModDecl, ParseError> {
        self.expect_keyword("module")?;
        let name = self.parse_ident()?;
        self.expect("(")?;
        let mut ports = Vec::new();
        if !self.peek_after_trivia(")") {
            loop {
                ports.push(self.parse_port()?);
                if !self.try_drop(",") {
                    break;
                }
            }
        }
        self.expect(")")?;
        self.expect(";")?;
        let mut items = Vec::new();
        while !self.try_keyword("endmodule") {
            items.push(self.parse_item()?);
        }
        Ok(ModDecl { name, ports, items })
    }

    fn peek_after_trivia(&mut self, s: &str) -> bool {
        self.skip_trivia();
        self.peek_is(s)
    }

    fn parse_port(&mut self) -> Result<Port, ParseError> {
        let dir = if self.try_keyword("input") {
            Direction::Input
        } else if self.try_keyword("output") {
            Direction::Output
        } else if self.try_keyword("inout") {
            Direction::Inout
        } else {
            return Err(ParseError::new(format!(
                "expected port direction at `{}`",
                self.context()
            )));
        };
        let (net, signed, width, name) = self.parse_net_decl()?;
        Ok(Port {
            dir,
            net,
            signed,
            width,
            name,
        })
    }

    fn parse_net_decl(&mut self) -> Result<(NetKind, bool, u32, Ident), ParseError> {
        let net = if self.try_keyword("wire") {
            NetKind::Wire
        } else if self.try_keyword("reg") {
            NetKind::Reg
        } else {
            return Err(ParseError::new(format!(
                "expected `wire` or `reg` at `{}`",
                self.context()
            )));
        };
        let signed = self.try_keyword("signed");
        let width = if self.try_drop("[") {
            let msb = self.parse_decimal()?;
            self.expect(":")?;
            let lsb = self.parse_decimal()?;
            if lsb != 0 {
                return Err(ParseError::new(format!(
                    "only [msb:0] ranges are supported, got [{}:{}]",
                    msb, lsb
                )));
            }
            self.expect("]")?;
            (msb + 1) as u32
        } else {
            1
        };
        let name = self.parse_ident()?;
        Ok((net, signed, width, name))
    }

    fn parse_item(&mut self) -> Result<ModItem, ParseError> {
        if self.try_keyword("assign") {
            let lhs = self.parse_ident()?;
            self.expect("=")?;
            let rhs = self.parse_expr()?;
            self.expect(";")?;
            Ok(ModItem::Assign(lhs, rhs))
        } else {
            // Local declaration: like a port but with no direction. Locals
            // are always wires in the subset; `reg` is accepted for
            // tolerance when reading tool output back.
            let (net, signed, width, name) = self.parse_net_decl()?;
            self.expect(";")?;
            Ok(ModItem::Decl(Port {
                dir: Direction::Input,
                net,
                signed,
                width,
                name,
            }))
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.skip_trivia();
        if self.try_drop("(") {
            let first = self.parse_expr()?;
            if self.try_drop(")") {
                return Ok(first);
            }
            if self.try_drop("?") {
                let then = self.parse_expr()?;
                self.expect(":")?;
                let els = self.parse_expr()?;
                self.expect(")")?;
                return Ok(Expr::Cond(Box::new(first), Box::new(then), Box::new(els)));
            }
            let op = self.parse_binop()?;
            let rhs = self.parse_expr()?;
            self.expect(")")?;
            return Ok(Expr::Binary(op, Box::new(first), Box::new(rhs)));
        }
        self.parse_operand()
    }

    fn parse_binop(&mut self) -> Result<BinaryOp, ParseError> {
        self.skip_trivia();
        for (tok, op) in BINOP_TOKENS {
            if self.peek_is(tok) {
                self.offset += tok.chars().count();
                return Ok(*op);
            }
        }
        Err(ParseError::new(format!(
            "expected binary operator at `{}`",
            self.context()
        )))
    }

    fn parse_operand(&mut self) -> Result<Expr, ParseError> {
        self.skip_trivia();
        if self.try_drop("{") {
            let mut elems = vec![self.parse_expr()?];
            while self.try_drop(",") {
                elems.push(self.parse_expr()?);
            }
            self.expect("}")?;
            return Ok(Expr::Concat(elems));
        }
        if self.try_drop("$signed") {
            self.expect("(")?;
            let e = self.parse_expr()?;
            self.expect(")")?;
            return Ok(Expr::Cast(CastFn::Signed, Box::new(e)));
        }
        if self.try_drop("$unsigned") {
            self.expect("(")?;
            let e = self.parse_expr()?;
            self.expect(")")?;
            return Ok(Expr::Cast(CastFn::Unsigned, Box::new(e)));
        }
        for (tok, op) in UNOP_TOKENS {
            if self.peek_is(tok) {
                self.offset += tok.chars().count();
                let operand = if self.peek_after_trivia("(") {
                    self.parse_expr()?
                } else {
                    self.parse_operand()?
                };
                return Ok(Expr::Unary(*op, Box::new(operand)));
            }
        }
        if self.peekc().map_or(false, |c| c.is_ascii_digit()) {
            return self.parse_number();
        }
        Ok(Expr::Id(self.parse_ident()?))
    }

    fn parse_number(&mut self) -> Result<Expr, ParseError> {
        let width = self.parse_decimal()?;
        if width == 0 || width > u32::MAX as u64 {
            return Err(ParseError::new(format!("bad literal width {}", width)));
        }
        self.expect("'")?;
        let (radix, digits_ok): (u32, fn(char) -> bool) = match self.peekc() {
            Some('h') | Some('H') => (16, |c: char| c.is_ascii_hexdigit()),
            Some('b') | Some('B') => (2, |c: char| c == '0' || c == '1'),
            Some('d') | Some('D') => (10, |c: char| c.is_ascii_digit()),
            other => {
                return Err(ParseError::new(format!(
                    "unsupported literal base {:?}",
                    other
                )))
            }
        };
        self.offset += 1;
        let mut digits = String::new();
        while let Some(c) = self.peekc() {
            if digits_ok(c) || c == '_' {
                if c != '_' {
                    digits.push(c);
                }
                self.offset += 1;
            } else {
                break;
            }
        }
        if digits.is_empty() {
            return Err(ParseError::new(format!(
                "empty literal value at `{}`",
                self.context()
            )));
        }
        let value = BigUint::parse_bytes(digits.as_bytes(), radix)
            .ok_or_else(|| ParseError::new(format!("bad literal digits `{}`", digits)))?;
        Ok(Expr::number(width as u32, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen;

    #[test]
    fn parse_simple_module() {
        let text = "module top(input wire [3:0] x0, output wire [3:0] y);\n\
                    \x20 assign y = (x0 + 4'h3);\n\
                    endmodule\n";
        let modules = parse(text).unwrap();
        assert_eq!(modules.len(), 1);
        let m = &modules[0];
        assert_eq!(m.name.as_str(), "top");
        assert_eq!(m.ports.len(), 2);
        assert_eq!(m.items.len(), 1);
    }

    #[test]
    fn parse_tolerates_comments_and_whitespace() {
        let text = "// generated\nmodule top(output wire y);\n\
                    // drive the output\n  assign y = 1'h1;  // done\nendmodule\n";
        let modules = parse(text).unwrap();
        assert_eq!(modules[0].items.len(), 1);
    }

    #[test]
    fn roundtrip_operator_zoo() {
        let text = "module top(input wire [7:0] a, input wire b, output wire y);\n\
                    \x20 wire [7:0] w0;\n\
                    \x20 assign w0 = ((a <<< 8'h2) ~^ $signed((a ** 8'h2)));\n\
                    \x20 assign y = ((w0 === a) ? ~&w0 : (b && !b));\n\
                    endmodule\n";
        let modules = parse(text).unwrap();
        let src = SourceInfo::new("top", modules);
        let printed = codegen::emit(&src);
        let reparsed = parse_source(&printed, "top").unwrap();
        assert_eq!(src, reparsed);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse("module top(; endmodule").is_err());
        assert!(parse("").is_err());
        assert!(parse("module top(output wire y); assign y = 1'h; endmodule").is_err());
    }
}
