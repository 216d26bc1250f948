//! Breakpoint condition expressions.
//!
//! Conditions are stored as postfix bytecode in the breakpoint table's arena
//! and evaluated with an [`ExpressionEvaluator`]. [`compile`] turns infix text
//! such as `a == $40 && [$d012] > 100` into that bytecode.

use anyhow::{Result, anyhow, bail};

use crate::cpu::{Registers, Status};
use crate::memory::Memory;
use crate::symbols::SymbolTable;

/// Machine state visible to a condition.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub regs: &'a Registers,
    pub memory: &'a Memory,
}

impl<'a> EvalContext<'a> {
    pub fn new(regs: &'a Registers, memory: &'a Memory) -> Self {
        Self { regs, memory }
    }
}

pub trait ExpressionEvaluator {
    /// Evaluates `bytecode`; a non-zero result means "true".
    fn eval(&self, bytecode: &[u8], ctx: &EvalContext<'_>) -> i64;
}

pub mod op {
    pub const END: u8 = 0x00;
    pub const CONST: u8 = 0x01;
    pub const REG: u8 = 0x02;
    pub const PEEK: u8 = 0x03;
    pub const PEEK_WORD: u8 = 0x04;
    pub const NEG: u8 = 0x10;
    pub const NOT: u8 = 0x11;
    pub const CPL: u8 = 0x12;
    pub const LOW: u8 = 0x13;
    pub const HIGH: u8 = 0x14;
    pub const MUL: u8 = 0x20;
    pub const DIV: u8 = 0x21;
    pub const MOD: u8 = 0x22;
    pub const ADD: u8 = 0x23;
    pub const SUB: u8 = 0x24;
    pub const SHL: u8 = 0x25;
    pub const SHR: u8 = 0x26;
    pub const AND: u8 = 0x27;
    pub const XOR: u8 = 0x28;
    pub const OR: u8 = 0x29;
    pub const LT: u8 = 0x2a;
    pub const LE: u8 = 0x2b;
    pub const GT: u8 = 0x2c;
    pub const GE: u8 = 0x2d;
    pub const EQ: u8 = 0x2e;
    pub const NE: u8 = 0x2f;
    pub const LAND: u8 = 0x30;
    pub const LOR: u8 = 0x31;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    A = 0,
    X,
    Y,
    S,
    P,
    Pc,
    C,
    Z,
    I,
    D,
    V,
    N,
}

impl Register {
    const ALL: [Register; 12] = [
        Register::A,
        Register::X,
        Register::Y,
        Register::S,
        Register::P,
        Register::Pc,
        Register::C,
        Register::Z,
        Register::I,
        Register::D,
        Register::V,
        Register::N,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        let r = match name.to_ascii_lowercase().as_str() {
            "a" => Register::A,
            "x" => Register::X,
            "y" => Register::Y,
            "s" | "sp" => Register::S,
            "p" | "fl" => Register::P,
            "pc" => Register::Pc,
            "c" => Register::C,
            "z" => Register::Z,
            "i" => Register::I,
            "d" => Register::D,
            "v" => Register::V,
            "n" => Register::N,
            _ => return None,
        };
        Some(r)
    }

    fn from_byte(b: u8) -> Option<Self> {
        Self::ALL.get(b as usize).copied()
    }

    fn value(self, regs: &Registers) -> i64 {
        let flag = |f: Status| regs.flag(f) as i64;
        match self {
            Register::A => regs.a as i64,
            Register::X => regs.x as i64,
            Register::Y => regs.y as i64,
            Register::S => regs.s as i64,
            Register::P => regs.p.bits() as i64,
            Register::Pc => regs.pc as i64,
            Register::C => flag(Status::CARRY),
            Register::Z => flag(Status::ZERO),
            Register::I => flag(Status::IRQ_DISABLE),
            Register::D => flag(Status::DECIMAL),
            Register::V => flag(Status::OVERFLOW),
            Register::N => flag(Status::NEGATIVE),
        }
    }
}

/// Stack machine for the bytecode produced by [`compile`].
///
/// Malformed bytecode evaluates to 0 rather than failing; division by zero
/// yields 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct StackEvaluator;

impl ExpressionEvaluator for StackEvaluator {
    fn eval(&self, bytecode: &[u8], ctx: &EvalContext<'_>) -> i64 {
        run(bytecode, ctx).unwrap_or(0)
    }
}

fn run(code: &[u8], ctx: &EvalContext<'_>) -> Option<i64> {
    let mut stack: Vec<i64> = Vec::with_capacity(16);
    let mut pc = 0;
    while pc < code.len() {
        let instr = code[pc];
        pc += 1;
        match instr {
            op::END => break,
            op::CONST => {
                let bytes = code.get(pc..pc + 4)?;
                stack.push(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64);
                pc += 4;
            }
            op::REG => {
                let reg = Register::from_byte(*code.get(pc)?)?;
                stack.push(reg.value(ctx.regs));
                pc += 1;
            }
            op::PEEK | op::PEEK_WORD | op::NEG | op::NOT | op::CPL | op::LOW | op::HIGH => {
                let v = stack.pop()?;
                let addr = v as u16;
                stack.push(match instr {
                    op::PEEK => ctx.memory.get(addr) as i64,
                    op::PEEK_WORD => {
                        ctx.memory.get(addr) as i64
                            | (ctx.memory.get(addr.wrapping_add(1)) as i64) << 8
                    }
                    op::NEG => v.wrapping_neg(),
                    op::NOT => (v == 0) as i64,
                    op::CPL => !v,
                    op::LOW => v & 0xff,
                    _ => (v >> 8) & 0xff,
                });
            }
            op::MUL..=op::LOR => {
                let rhs = stack.pop()?;
                let lhs = stack.pop()?;
                stack.push(binary(instr, lhs, rhs));
            }
            _ => return None,
        }
    }
    stack.pop()
}

fn binary(instr: u8, l: i64, r: i64) -> i64 {
    match instr {
        op::MUL => l.wrapping_mul(r),
        op::DIV => l.checked_div(r).unwrap_or(0),
        op::MOD => l.checked_rem(r).unwrap_or(0),
        op::ADD => l.wrapping_add(r),
        op::SUB => l.wrapping_sub(r),
        op::SHL => l.wrapping_shl(r as u32),
        op::SHR => l.wrapping_shr(r as u32),
        op::AND => l & r,
        op::XOR => l ^ r,
        op::OR => l | r,
        op::LT => (l < r) as i64,
        op::LE => (l <= r) as i64,
        op::GT => (l > r) as i64,
        op::GE => (l >= r) as i64,
        op::EQ => (l == r) as i64,
        op::NE => (l != r) as i64,
        op::LAND => (l != 0 && r != 0) as i64,
        _ => (l != 0 || r != 0) as i64,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(i64),
    Ident(String),
    Op(&'static str),
}

const OPERATORS: [&str; 26] = [
    "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "*", "/", "%", "+", "-", "&", "^", "|", "<",
    ">", "!", "~", "(", ")", "[", "]", "{", "}",
];

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    'outer: while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if c == '$' || (c == '0' && matches!(bytes.get(i + 1), Some(b'x' | b'X'))) {
            let start = if c == '$' { i + 1 } else { i + 2 };
            let end = scan(bytes, start, |b| b.is_ascii_hexdigit());
            if end == start {
                bail!("missing hex digits at column {}", i + 1);
            }
            tokens.push(Token::Number(i64::from_str_radix(&text[start..end], 16)?));
            i = end;
            continue;
        }
        if c.is_ascii_digit() {
            let end = scan(bytes, i, |b| b.is_ascii_digit());
            tokens.push(Token::Number(text[i..end].parse()?));
            i = end;
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' || c == '.' {
            let end = scan(bytes, i + 1, |b| b.is_ascii_alphanumeric() || b == b'_');
            tokens.push(Token::Ident(text[i..end].to_string()));
            i = end;
            continue;
        }
        for operator in OPERATORS {
            if text[i..].starts_with(operator) {
                tokens.push(Token::Op(operator));
                i += operator.len();
                continue 'outer;
            }
        }
        bail!("unexpected '{}' at column {}", c, i + 1);
    }
    Ok(tokens)
}

fn scan(bytes: &[u8], from: usize, pred: impl Fn(u8) -> bool) -> usize {
    let mut end = from;
    while end < bytes.len() && pred(bytes[end]) {
        end += 1;
    }
    end
}

fn binary_op(token: &Token) -> Option<(u8, u8)> {
    let Token::Op(s) = token else {
        return None;
    };
    let entry = match *s {
        "||" => (1, op::LOR),
        "&&" => (2, op::LAND),
        "|" => (3, op::OR),
        "^" => (4, op::XOR),
        "&" => (5, op::AND),
        "==" => (6, op::EQ),
        "!=" => (6, op::NE),
        "<" => (7, op::LT),
        "<=" => (7, op::LE),
        ">" => (7, op::GT),
        ">=" => (7, op::GE),
        "<<" => (8, op::SHL),
        ">>" => (8, op::SHR),
        "+" => (9, op::ADD),
        "-" => (9, op::SUB),
        "*" => (10, op::MUL),
        "/" => (10, op::DIV),
        "%" => (10, op::MOD),
        _ => return None,
    };
    Some(entry)
}

/// Deepest nesting of brackets and unary operators `compile` accepts.
const MAX_DEPTH: usize = 64;

struct Compiler<'a> {
    tokens: Vec<Token>,
    pos: usize,
    out: Vec<u8>,
    symbols: Option<&'a dyn SymbolTable>,
    depth: usize,
}

impl Compiler<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, close: &'static str) -> Result<()> {
        match self.next() {
            Some(Token::Op(s)) if s == close => Ok(()),
            _ => bail!("expected '{}'", close),
        }
    }

    fn expression(&mut self, min_prec: u8) -> Result<()> {
        self.unary()?;
        while let Some((prec, code)) = self.peek().and_then(binary_op) {
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            self.expression(prec + 1)?;
            self.out.push(code);
        }
        Ok(())
    }

    fn unary(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            bail!("expression nested deeper than {} levels", MAX_DEPTH);
        }
        let code = match self.peek() {
            Some(Token::Op("-")) => Some(op::NEG),
            Some(Token::Op("!")) => Some(op::NOT),
            Some(Token::Op("~")) => Some(op::CPL),
            Some(Token::Op("<")) => Some(op::LOW),
            Some(Token::Op(">")) => Some(op::HIGH),
            _ => None,
        };
        match code {
            Some(code) => {
                self.pos += 1;
                self.unary()?;
                self.out.push(code);
            }
            None => self.primary()?,
        }
        self.depth -= 1;
        Ok(())
    }

    fn constant(&mut self, value: i64) -> Result<()> {
        let value = i32::try_from(value)
            .map_err(|_| anyhow!("constant {} does not fit in 32 bits", value))?;
        self.out.push(op::CONST);
        self.out.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn primary(&mut self) -> Result<()> {
        match self.next() {
            Some(Token::Number(n)) => self.constant(n)?,
            Some(Token::Ident(name)) => {
                if let Some(reg) = Register::from_name(&name) {
                    self.out.push(op::REG);
                    self.out.push(reg as u8);
                } else {
                    let label = name.trim_start_matches('.');
                    let addr = self
                        .symbols
                        .and_then(|s| s.get_address(label))
                        .ok_or_else(|| anyhow!("unknown name '{}'", name))?;
                    self.constant(addr as i64)?;
                }
            }
            Some(Token::Op("(")) => {
                self.expression(1)?;
                self.expect(")")?;
            }
            Some(Token::Op("[")) => {
                self.expression(1)?;
                self.expect("]")?;
                self.out.push(op::PEEK);
            }
            Some(Token::Op("{")) => {
                self.expression(1)?;
                self.expect("}")?;
                self.out.push(op::PEEK_WORD);
            }
            Some(t) => bail!("unexpected {:?}", t),
            None => bail!("unexpected end of expression"),
        }
        Ok(())
    }
}

/// Compiles an infix condition to bytecode for [`StackEvaluator`].
pub fn compile(text: &str) -> Result<Vec<u8>> {
    compile_with_symbols(text, None)
}

/// Like [`compile`], resolving names that are not registers through `symbols`.
pub fn compile_with_symbols(text: &str, symbols: Option<&dyn SymbolTable>) -> Result<Vec<u8>> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        bail!("empty expression");
    }
    let mut compiler = Compiler {
        tokens,
        pos: 0,
        out: Vec::new(),
        symbols,
        depth: 0,
    };
    compiler.expression(1)?;
    if let Some(t) = compiler.peek() {
        bail!("unexpected {:?} after expression", t);
    }
    compiler.out.push(op::END);
    Ok(compiler.out)
}
