//! Single-instruction disassembler and line assembler over the shared opcode
//! table.

use crate::cpu::{AddressingMode, Operation, Registers, opcode, get_opcodes};
use crate::memory::Memory;
use crate::symbols::SymbolTable;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisasmOptions {
    /// Prefix the text with the raw instruction bytes.
    pub show_bytes: bool,
    /// Decode undocumented opcodes instead of emitting `dc.b`.
    pub illegals: bool,
    /// Replace absolute and branch operands with symbol names.
    pub show_labels: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disassembly {
    pub text: String,
    pub bytes: u8,
    /// Destination of a branch, `jsr` or absolute `jmp`.
    pub branch_target: Option<u16>,
}

fn decodes(byte: u8, illegals: bool) -> bool {
    let op = opcode(byte);
    op.operation != Operation::Jam && (illegals || !op.is_illegal())
}

/// Length in bytes of the instruction at `addr`. Bytes that do not decode
/// count as one.
pub fn instruction_bytes(mem: &Memory, addr: u16, illegals: bool) -> u8 {
    let byte = mem.get(addr);
    if decodes(byte, illegals) {
        opcode(byte).size()
    } else {
        1
    }
}

fn read_word(mem: &Memory, addr: u16) -> u16 {
    mem.get(addr) as u16 | (mem.get(addr.wrapping_add(1)) as u16) << 8
}

pub fn disassemble(
    mem: &Memory,
    addr: u16,
    options: DisasmOptions,
    symbols: Option<&dyn SymbolTable>,
) -> Disassembly {
    let byte = mem.get(addr);
    let valid = decodes(byte, options.illegals);
    let op = opcode(byte);
    let size = if valid { op.size() } else { 1 };

    let mut text = String::new();
    if options.show_bytes {
        for i in 0..size {
            text.push_str(&format!("{:02x} ", mem.get(addr.wrapping_add(i as u16))));
        }
        while text.len() < 9 {
            text.push(' ');
        }
    }

    if !valid {
        text.push_str(&format!("dc.b ${:02x}", byte));
        return Disassembly {
            text,
            bytes: 1,
            branch_target: None,
        };
    }

    let mnemonic = op.mnemonic();
    let arg_addr = addr.wrapping_add(1);
    let b1 = mem.get(arg_addr);
    let label = |target: u16| {
        if options.show_labels {
            symbols.and_then(|s| s.get_symbol(target))
        } else {
            None
        }
    };

    let mut branch_target = None;
    let body = match op.mode {
        AddressingMode::Implied => mnemonic.to_string(),
        AddressingMode::Accumulator => format!("{} A", mnemonic),
        AddressingMode::Immediate => format!("{} #${:02x}", mnemonic, b1),
        AddressingMode::ZeroPage => format!("{} ${:02x}", mnemonic, b1),
        AddressingMode::ZeroPageX => format!("{} ${:02x},x", mnemonic, b1),
        AddressingMode::ZeroPageY => format!("{} ${:02x},y", mnemonic, b1),
        AddressingMode::IndirectX => format!("{} (${:02x},x)", mnemonic, b1),
        AddressingMode::IndirectY => format!("{} (${:02x}),y", mnemonic, b1),
        AddressingMode::Relative => {
            let target = addr.wrapping_add(2).wrapping_add(b1 as i8 as u16);
            branch_target = Some(target);
            match label(target) {
                Some(name) => format!("{} {} ; ${:04x}", mnemonic, name, target),
                None => format!("{} ${:04x}", mnemonic, target),
            }
        }
        AddressingMode::Absolute
        | AddressingMode::AbsoluteX
        | AddressingMode::AbsoluteY
        | AddressingMode::Indirect => {
            let arg = read_word(mem, arg_addr);
            if byte == 0x20 || byte == 0x4c {
                branch_target = Some(arg);
            }
            let (pre, post) = match op.mode {
                AddressingMode::AbsoluteX => ("", ",x"),
                AddressingMode::AbsoluteY => ("", ",y"),
                AddressingMode::Indirect => ("(", ")"),
                _ => ("", ""),
            };
            match label(arg) {
                Some(name) => format!("{} {}{}{} ; ${:04x}", mnemonic, pre, name, post, arg),
                None => format!("{} {}${:04x}{}", mnemonic, pre, arg, post),
            }
        }
    };
    text.push_str(&body);

    Disassembly {
        text,
        bytes: size,
        branch_target,
    }
}

/// Effective-address annotation for the instruction at `pc`, evaluated
/// against `regs`: `(d020)=0e`, `A=05`, or empty for modes with no memory
/// operand.
pub fn instruction_reference(mem: &Memory, regs: &Registers, pc: u16) -> String {
    let op = opcode(mem.get(pc));
    let arg = pc.wrapping_add(1);
    let zp = mem.get(arg);
    let zp_word = |z: u8| mem.get(z as u16) as u16 | (mem.get(z.wrapping_add(1) as u16) as u16) << 8;
    let show = |addr: u16| format!("({:04x})={:02x}", addr, mem.get(addr));
    let show_zp = |z: u8| format!("({:02x})={:02x}", z, mem.get(z as u16));

    match op.mode {
        AddressingMode::IndirectX => show(zp_word(zp.wrapping_add(regs.x))),
        AddressingMode::IndirectY => show(zp_word(zp).wrapping_add(regs.y as u16)),
        AddressingMode::ZeroPage => show_zp(zp),
        AddressingMode::ZeroPageX => show_zp(zp.wrapping_add(regs.x)),
        AddressingMode::ZeroPageY => show_zp(zp.wrapping_add(regs.y)),
        AddressingMode::Absolute => show(read_word(mem, arg)),
        AddressingMode::AbsoluteX => show(read_word(mem, arg).wrapping_add(regs.x as u16)),
        AddressingMode::AbsoluteY => show(read_word(mem, arg).wrapping_add(regs.y as u16)),
        AddressingMode::Indirect => {
            let ptr = read_word(mem, arg);
            let target = mem.get(ptr) as u16
                | (mem.get((ptr & 0xff00) | (ptr.wrapping_add(1) & 0xff)) as u16) << 8;
            format!("({:04x})={:04x}", ptr, target)
        }
        AddressingMode::Accumulator => format!("A={:02x}", regs.a),
        AddressingMode::Implied | AddressingMode::Immediate | AddressingMode::Relative => {
            String::new()
        }
    }
}

fn parse_number(s: &str) -> Option<(i32, &str)> {
    let (digits_start, radix) = match s.strip_prefix('$') {
        Some(rest) => (rest, 16),
        None => (s, 10),
    };
    let end = digits_start
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits_start.len());
    if end == 0 {
        return None;
    }
    let value = i32::from_str_radix(&digits_start[..end], radix).ok()?;
    Some((value, digits_start[end..].trim_start()))
}

fn parse_index(s: &str) -> Option<(char, &str)> {
    let rest = s.strip_prefix(',')?.trim_start();
    let c = rest.chars().next()?.to_ascii_lowercase();
    if c == 'x' || c == 'y' {
        Some((c, rest[1..].trim_start()))
    } else {
        None
    }
}

/// Assembles one instruction at `addr`, writing it into `mem`. Returns the
/// number of bytes written, or `None` if the line does not assemble.
pub fn assemble(line: &str, addr: u16, mem: &mut Memory) -> Option<u8> {
    let line = line.split(';').next().unwrap_or("").trim();
    let name_len = line
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(line.len());
    if name_len == 0 {
        return None;
    }
    let mnemonic = line[..name_len].to_ascii_lowercase();
    let operand = line[name_len..].trim();

    // mode -> opcode byte, documented encodings win over undocumented ones
    let mut forms: Vec<(AddressingMode, u8)> = Vec::new();
    for (byte, op) in get_opcodes().iter().enumerate() {
        if op.operation == Operation::Jam || op.mnemonic() != mnemonic {
            continue;
        }
        match forms.iter_mut().find(|(m, _)| *m == op.mode) {
            Some(slot) if opcode(slot.1).is_illegal() && !op.is_illegal() => slot.1 = byte as u8,
            Some(_) => {}
            None => forms.push((op.mode, byte as u8)),
        }
    }
    if forms.is_empty() {
        return None;
    }
    let has = |mode: AddressingMode| forms.iter().any(|(m, _)| *m == mode);

    let (mode, arg): (AddressingMode, i32) = if operand.is_empty()
        || (operand.eq_ignore_ascii_case("a") && has(AddressingMode::Accumulator))
    {
        if has(AddressingMode::Accumulator) {
            (AddressingMode::Accumulator, 0)
        } else {
            (AddressingMode::Implied, 0)
        }
    } else if let Some(imm) = operand.strip_prefix('#') {
        let (value, rest) = parse_number(imm.trim_start())?;
        if !rest.is_empty() || !(0..0x100).contains(&value) {
            return None;
        }
        (AddressingMode::Immediate, value)
    } else if let Some(inner) = operand.strip_prefix('(') {
        let (value, rest) = parse_number(inner.trim_start())?;
        if let Some(('x', after)) = parse_index(rest) {
            if after.trim() != ")" {
                return None;
            }
            (AddressingMode::IndirectX, value)
        } else {
            let after = rest.strip_prefix(')')?.trim_start();
            if after.is_empty() {
                (AddressingMode::Indirect, value)
            } else if let Some(('y', tail)) = parse_index(after)
                && tail.is_empty()
            {
                (AddressingMode::IndirectY, value)
            } else {
                return None;
            }
        }
    } else {
        let (value, rest) = parse_number(operand)?;
        let index = if rest.is_empty() {
            None
        } else {
            let (c, tail) = parse_index(rest)?;
            if !tail.is_empty() {
                return None;
            }
            Some(c)
        };
        if has(AddressingMode::Relative) && index.is_none() {
            let offset = value - (addr as i32 + 2);
            if !(-128..=127).contains(&offset) {
                return None;
            }
            (AddressingMode::Relative, offset)
        } else {
            let zp = match index {
                None => AddressingMode::ZeroPage,
                Some('x') => AddressingMode::ZeroPageX,
                _ => AddressingMode::ZeroPageY,
            };
            let abs = match index {
                None => AddressingMode::Absolute,
                Some('x') => AddressingMode::AbsoluteX,
                _ => AddressingMode::AbsoluteY,
            };
            if (0..0x100).contains(&value) && has(zp) {
                (zp, value)
            } else {
                (abs, value)
            }
        }
    };

    let &(_, byte) = forms.iter().find(|(m, _)| *m == mode)?;
    let size = opcode(byte).size();
    if size > 1 && mode != AddressingMode::Relative && !(0..0x10000).contains(&arg) {
        return None;
    }
    mem.set(addr, byte);
    if size > 1 {
        mem.set(addr.wrapping_add(1), arg as u8);
    }
    if size > 2 {
        mem.set(addr.wrapping_add(2), (arg >> 8) as u8);
    }
    Some(size)
}
