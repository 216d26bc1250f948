//! Cycle-timed 6502 instruction interpreter.
//!
//! The interpreter is a pure function of `(Registers, Bus)`: it owns no state
//! between calls, so the same code serves foreground stepping, the background
//! run loop and tests.

use crate::cpu::{AddressingMode, JAM, Operation, Registers, Status, opcode};
use crate::memory::Bus;

pub const NMI_VECTOR: u16 = 0xfffa;
pub const RESET_VECTOR: u16 = 0xfffc;
pub const IRQ_VECTOR: u16 = 0xfffe;

const STACK_PAGE: u16 = 0x0100;
const INTERRUPT_CYCLES: u8 = 7;
const RESET_CYCLES: u8 = 6;

#[derive(Debug, Clone, Copy)]
enum Operand {
    None,
    Accumulator,
    Address(u16),
}

struct Cpu<'a, B: Bus + ?Sized> {
    r: Registers,
    bus: &'a mut B,
    penalty: bool,
}

/// Executes one instruction and returns the new register file.
///
/// Registers that are already jammed are returned unchanged. An undefined
/// opcode jams the CPU with PC past the opcode and its operand bytes.
pub fn step<B: Bus + ?Sized>(regs: Registers, bus: &mut B) -> Registers {
    if regs.is_jammed() {
        return regs;
    }
    let code = opcode(bus.read(regs.pc));

    let mut cpu = Cpu {
        r: regs,
        bus,
        penalty: false,
    };
    cpu.r.pc = cpu.r.pc.wrapping_add(1);
    let operand = cpu.resolve(code.mode);
    cpu.execute(code.operation, operand);

    let mut r = cpu.r;
    r.t = if r.t == JAM || code.timing == JAM {
        JAM
    } else {
        (code.timing >> 1) + if cpu.penalty { code.timing & 1 } else { 0 }
    };
    r
}

/// Maskable interrupt. Ignored while the I flag is set.
pub fn irq<B: Bus + ?Sized>(regs: Registers, bus: &mut B) -> Registers {
    if regs.flag(Status::IRQ_DISABLE) {
        return regs;
    }
    interrupt(regs, bus, IRQ_VECTOR)
}

pub fn nmi<B: Bus + ?Sized>(regs: Registers, bus: &mut B) -> Registers {
    interrupt(regs, bus, NMI_VECTOR)
}

pub fn reset<B: Bus + ?Sized>(regs: Registers, bus: &mut B) -> Registers {
    let mut r = regs;
    r.a = 0;
    r.x = 0;
    r.y = 0;
    r.pc = read_word(bus, RESET_VECTOR);
    r.s = 0xfd;
    r.p.insert(Status::UNUSED);
    r.t = RESET_CYCLES;
    r
}

fn interrupt<B: Bus + ?Sized>(regs: Registers, bus: &mut B, vector: u16) -> Registers {
    let mut cpu = Cpu {
        r: regs,
        bus,
        penalty: false,
    };
    cpu.r.p.remove(Status::BREAK);
    let pc = cpu.r.pc;
    cpu.push((pc >> 8) as u8);
    cpu.push(pc as u8);
    cpu.push(cpu.r.p.bits());
    cpu.r.p.insert(Status::IRQ_DISABLE);
    cpu.r.pc = read_word(&mut *cpu.bus, vector);
    cpu.r.t = INTERRUPT_CYCLES;
    cpu.r
}

fn read_word<B: Bus + ?Sized>(bus: &mut B, addr: u16) -> u16 {
    let lo = bus.read(addr) as u16;
    let hi = bus.read(addr.wrapping_add(1)) as u16;
    lo | (hi << 8)
}

impl<B: Bus + ?Sized> Cpu<'_, B> {
    fn fetch(&mut self) -> u8 {
        let b = self.bus.read(self.r.pc);
        self.r.pc = self.r.pc.wrapping_add(1);
        b
    }

    fn fetch_word(&mut self) -> u16 {
        let lo = self.fetch() as u16;
        let hi = self.fetch() as u16;
        lo | (hi << 8)
    }

    fn zero_page_word(&mut self, zp: u8) -> u16 {
        let lo = self.bus.read(zp as u16) as u16;
        let hi = self.bus.read(zp.wrapping_add(1) as u16) as u16;
        lo | (hi << 8)
    }

    fn resolve(&mut self, mode: AddressingMode) -> Operand {
        match mode {
            AddressingMode::Implied => Operand::None,
            AddressingMode::Accumulator => Operand::Accumulator,
            AddressingMode::Immediate => {
                let at = self.r.pc;
                self.r.pc = self.r.pc.wrapping_add(1);
                Operand::Address(at)
            }
            AddressingMode::ZeroPage => Operand::Address(self.fetch() as u16),
            AddressingMode::ZeroPageX => {
                Operand::Address(self.fetch().wrapping_add(self.r.x) as u16)
            }
            AddressingMode::ZeroPageY => {
                Operand::Address(self.fetch().wrapping_add(self.r.y) as u16)
            }
            AddressingMode::Relative => {
                let offset = self.fetch() as i8;
                Operand::Address(self.r.pc.wrapping_add(offset as u16))
            }
            AddressingMode::Absolute => Operand::Address(self.fetch_word()),
            AddressingMode::AbsoluteX => {
                let base = self.fetch_word();
                self.penalty = (base & 0xff) + self.r.x as u16 >= 0x100;
                Operand::Address(base.wrapping_add(self.r.x as u16))
            }
            AddressingMode::AbsoluteY => {
                let base = self.fetch_word();
                self.penalty = (base & 0xff) + self.r.y as u16 >= 0x100;
                Operand::Address(base.wrapping_add(self.r.y as u16))
            }
            AddressingMode::Indirect => {
                // JMP ($xxFF) fetches the high byte from $xx00
                let ptr = self.fetch_word();
                let lo = self.bus.read(ptr) as u16;
                let hi = self.bus.read((ptr & 0xff00) | (ptr.wrapping_add(1) & 0x00ff)) as u16;
                Operand::Address(lo | (hi << 8))
            }
            AddressingMode::IndirectX => {
                let zp = self.fetch().wrapping_add(self.r.x);
                Operand::Address(self.zero_page_word(zp))
            }
            AddressingMode::IndirectY => {
                let zp = self.fetch();
                let base = self.zero_page_word(zp);
                self.penalty = (base & 0xff) + self.r.y as u16 >= 0x100;
                Operand::Address(base.wrapping_add(self.r.y as u16))
            }
        }
    }

    fn load(&mut self, operand: Operand) -> u8 {
        match operand {
            Operand::Address(addr) => self.bus.read(addr),
            Operand::Accumulator => self.r.a,
            Operand::None => 0,
        }
    }

    fn store(&mut self, operand: Operand, value: u8) {
        match operand {
            Operand::Address(addr) => self.bus.write(addr, value),
            Operand::Accumulator => self.r.a = value,
            Operand::None => {}
        }
    }

    fn target(operand: Operand) -> u16 {
        match operand {
            Operand::Address(addr) => addr,
            _ => 0,
        }
    }

    fn push(&mut self, value: u8) {
        self.bus.write(STACK_PAGE | self.r.s as u16, value);
        self.r.s = self.r.s.wrapping_sub(1);
    }

    fn pop(&mut self) -> u8 {
        self.r.s = self.r.s.wrapping_add(1);
        self.bus.read(STACK_PAGE | self.r.s as u16)
    }

    fn branch(&mut self, taken: bool, operand: Operand) {
        if taken {
            self.r.pc = Self::target(operand);
            self.penalty = true;
        }
    }

    fn carry(&self) -> u16 {
        self.r.flag(Status::CARRY) as u16
    }

    fn adc(&mut self, m: u8) {
        let a = self.r.a;
        let c = self.carry();
        let mut tmp = a as u16 + m as u16 + c;
        let signed = a as i8 as i16 + m as i8 as i16 + c as i16;
        self.r.set_flag(Status::ZERO, tmp & 0xff == 0);
        self.r.set_flag(Status::OVERFLOW, !(-0x80..0x80).contains(&signed));
        if self.r.flag(Status::DECIMAL) {
            if (a & 0x0f) as u16 + (m & 0x0f) as u16 + c > 9 {
                tmp += 6;
            }
            self.r.set_flag(Status::NEGATIVE, tmp & 0x80 != 0);
            if tmp > 0x99 {
                tmp += 0x60;
            }
            self.r.set_flag(Status::CARRY, tmp > 0x99);
        } else {
            self.r.set_flag(Status::NEGATIVE, tmp & 0x80 != 0);
            self.r.set_flag(Status::CARRY, tmp > 0xff);
        }
        self.r.a = tmp as u8;
    }

    fn sbc(&mut self, m: u8) {
        let a = self.r.a;
        let borrow = 1 - self.carry();
        let mut tmp = (a as u16).wrapping_sub(m as u16).wrapping_sub(borrow);
        let signed = a as i8 as i16 - m as i8 as i16 - borrow as i16;
        self.r.set_nz(tmp as u8);
        self.r.set_flag(Status::OVERFLOW, !(-0x80..0x80).contains(&signed));
        if self.r.flag(Status::DECIMAL) {
            if ((a & 0x0f) as i16 - borrow as i16) < (m & 0x0f) as i16 {
                tmp = tmp.wrapping_sub(6);
            }
            if tmp > 0x99 {
                tmp = tmp.wrapping_sub(0x60);
            }
        }
        self.r.set_flag(Status::CARRY, tmp < 0x100);
        self.r.a = tmp as u8;
    }

    fn compare(&mut self, reg: u8, m: u8) {
        self.r.set_flag(Status::CARRY, reg >= m);
        self.r.set_nz(reg.wrapping_sub(m));
    }

    fn execute(&mut self, operation: Operation, operand: Operand) {
        match operation {
            Operation::Adc => {
                let m = self.load(operand);
                self.adc(m);
            }
            Operation::Sbc => {
                let m = self.load(operand);
                self.sbc(m);
            }
            Operation::And => {
                self.r.a &= self.load(operand);
                self.r.set_nz(self.r.a);
            }
            Operation::Ora => {
                self.r.a |= self.load(operand);
                self.r.set_nz(self.r.a);
            }
            Operation::Eor => {
                self.r.a ^= self.load(operand);
                self.r.set_nz(self.r.a);
            }
            Operation::Asl => {
                let m = self.load(operand);
                self.r.set_flag(Status::CARRY, m & 0x80 != 0);
                let v = m << 1;
                self.r.set_nz(v);
                self.store(operand, v);
            }
            Operation::Lsr => {
                let m = self.load(operand);
                self.r.set_flag(Status::CARRY, m & 0x01 != 0);
                let v = m >> 1;
                self.r.set_nz(v);
                self.store(operand, v);
            }
            Operation::Rol => {
                let m = self.load(operand);
                let v = (m << 1) | self.carry() as u8;
                self.r.set_flag(Status::CARRY, m & 0x80 != 0);
                self.r.set_nz(v);
                self.store(operand, v);
            }
            Operation::Ror => {
                let m = self.load(operand);
                let v = (m >> 1) | ((self.carry() as u8) << 7);
                self.r.set_flag(Status::CARRY, m & 0x01 != 0);
                self.r.set_nz(v);
                self.store(operand, v);
            }
            Operation::Bit => {
                let m = self.load(operand);
                self.r.set_flag(Status::NEGATIVE, m & 0x80 != 0);
                self.r.set_flag(Status::OVERFLOW, m & 0x40 != 0);
                self.r.set_flag(Status::ZERO, m & self.r.a == 0);
            }
            Operation::Cmp => {
                let m = self.load(operand);
                self.compare(self.r.a, m);
            }
            Operation::Cpx => {
                let m = self.load(operand);
                self.compare(self.r.x, m);
            }
            Operation::Cpy => {
                let m = self.load(operand);
                self.compare(self.r.y, m);
            }
            Operation::Inc => {
                let v = self.load(operand).wrapping_add(1);
                self.r.set_nz(v);
                self.store(operand, v);
            }
            Operation::Dec => {
                let v = self.load(operand).wrapping_sub(1);
                self.r.set_nz(v);
                self.store(operand, v);
            }
            Operation::Inx => {
                self.r.x = self.r.x.wrapping_add(1);
                self.r.set_nz(self.r.x);
            }
            Operation::Iny => {
                self.r.y = self.r.y.wrapping_add(1);
                self.r.set_nz(self.r.y);
            }
            Operation::Dex => {
                self.r.x = self.r.x.wrapping_sub(1);
                self.r.set_nz(self.r.x);
            }
            Operation::Dey => {
                self.r.y = self.r.y.wrapping_sub(1);
                self.r.set_nz(self.r.y);
            }
            Operation::Lda => {
                self.r.a = self.load(operand);
                self.r.set_nz(self.r.a);
            }
            Operation::Ldx => {
                self.r.x = self.load(operand);
                self.r.set_nz(self.r.x);
            }
            Operation::Ldy => {
                self.r.y = self.load(operand);
                self.r.set_nz(self.r.y);
            }
            Operation::Sta => self.store(operand, self.r.a),
            Operation::Stx => self.store(operand, self.r.x),
            Operation::Sty => self.store(operand, self.r.y),
            Operation::Tax => {
                self.r.x = self.r.a;
                self.r.set_nz(self.r.x);
            }
            Operation::Tay => {
                self.r.y = self.r.a;
                self.r.set_nz(self.r.y);
            }
            Operation::Txa => {
                self.r.a = self.r.x;
                self.r.set_nz(self.r.a);
            }
            Operation::Tya => {
                self.r.a = self.r.y;
                self.r.set_nz(self.r.a);
            }
            Operation::Tsx => {
                self.r.x = self.r.s;
                self.r.set_nz(self.r.x);
            }
            Operation::Txs => self.r.s = self.r.x,
            Operation::Pha => self.push(self.r.a),
            Operation::Php => self.push((self.r.p | Status::BREAK).bits()),
            Operation::Pla => {
                self.r.a = self.pop();
                self.r.set_nz(self.r.a);
            }
            Operation::Plp => {
                self.r.p = Status::from_bits_retain(self.pop()) | Status::UNUSED;
            }
            Operation::Clc => self.r.set_flag(Status::CARRY, false),
            Operation::Sec => self.r.set_flag(Status::CARRY, true),
            Operation::Cli => self.r.set_flag(Status::IRQ_DISABLE, false),
            Operation::Sei => self.r.set_flag(Status::IRQ_DISABLE, true),
            Operation::Cld => self.r.set_flag(Status::DECIMAL, false),
            Operation::Sed => self.r.set_flag(Status::DECIMAL, true),
            Operation::Clv => self.r.set_flag(Status::OVERFLOW, false),
            Operation::Bcc => self.branch(!self.r.flag(Status::CARRY), operand),
            Operation::Bcs => self.branch(self.r.flag(Status::CARRY), operand),
            Operation::Bne => self.branch(!self.r.flag(Status::ZERO), operand),
            Operation::Beq => self.branch(self.r.flag(Status::ZERO), operand),
            Operation::Bpl => self.branch(!self.r.flag(Status::NEGATIVE), operand),
            Operation::Bmi => self.branch(self.r.flag(Status::NEGATIVE), operand),
            Operation::Bvc => self.branch(!self.r.flag(Status::OVERFLOW), operand),
            Operation::Bvs => self.branch(self.r.flag(Status::OVERFLOW), operand),
            Operation::Jmp => self.r.pc = Self::target(operand),
            Operation::Jsr => {
                let ret = self.r.pc.wrapping_sub(1);
                self.push((ret >> 8) as u8);
                self.push(ret as u8);
                self.r.pc = Self::target(operand);
            }
            Operation::Rts => {
                let lo = self.pop() as u16;
                let hi = self.pop() as u16;
                self.r.pc = (lo | (hi << 8)).wrapping_add(1);
            }
            Operation::Rti => {
                self.r.p = Status::from_bits_retain(self.pop());
                let lo = self.pop() as u16;
                let hi = self.pop() as u16;
                self.r.pc = lo | (hi << 8);
            }
            Operation::Brk => {
                self.r.pc = self.r.pc.wrapping_add(1);
                let pc = self.r.pc;
                self.push((pc >> 8) as u8);
                self.push(pc as u8);
                self.push((self.r.p | Status::BREAK).bits());
                self.r.set_flag(Status::IRQ_DISABLE, true);
                self.r.pc = read_word(&mut *self.bus, IRQ_VECTOR);
            }
            Operation::Nop => {}
            // undocumented opcodes are not executed
            Operation::Aac
            | Operation::Ahx
            | Operation::Alr
            | Operation::Anc
            | Operation::Arr
            | Operation::Axs
            | Operation::Dcp
            | Operation::Isc
            | Operation::Las
            | Operation::Lax
            | Operation::Lax2
            | Operation::Rla
            | Operation::Rra
            | Operation::Sax
            | Operation::Sbi
            | Operation::Shx
            | Operation::Shy
            | Operation::Slo
            | Operation::Sre
            | Operation::Tas
            | Operation::Xaa
            | Operation::Jam => self.r.t = JAM,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Memory;

    fn run(program: &[u8], regs: Registers) -> (Registers, Memory) {
        let mut mem = Memory::new();
        mem.load(regs.pc, program);
        let out = step(regs, &mut mem);
        (out, mem)
    }

    #[test]
    fn test_lda_immediate_sets_flags() {
        let (r, _) = run(&[0xa9, 0x00], Registers::default());
        assert_eq!(r.a, 0);
        assert!(r.flag(Status::ZERO));
        assert_eq!(r.pc, 0x1002);
        assert_eq!(r.t, 2);

        let (r, _) = run(&[0xa9, 0x80], Registers::default());
        assert!(r.flag(Status::NEGATIVE));
        assert!(!r.flag(Status::ZERO));
    }

    #[test]
    fn test_binary_adc_overflow_and_carry() {
        let regs = Registers {
            a: 0x7f,
            ..Registers::default()
        };
        let (r, _) = run(&[0x69, 0x01], regs);
        assert_eq!(r.a, 0x80);
        assert!(r.flag(Status::OVERFLOW));
        assert!(!r.flag(Status::CARRY));

        let regs = Registers {
            a: 0xff,
            ..Registers::default()
        };
        let (r, _) = run(&[0x69, 0x01], regs);
        assert_eq!(r.a, 0x00);
        assert!(r.flag(Status::CARRY));
        assert!(r.flag(Status::ZERO));
        assert!(!r.flag(Status::OVERFLOW));
    }

    #[test]
    fn test_decimal_adc() {
        let regs = Registers {
            a: 0x09,
            p: Status::DECIMAL,
            ..Registers::default()
        };
        let (r, _) = run(&[0x69, 0x01], regs);
        assert_eq!(r.a, 0x10);
        assert!(!r.flag(Status::CARRY));

        let regs = Registers {
            a: 0x99,
            p: Status::DECIMAL,
            ..Registers::default()
        };
        let (r, _) = run(&[0x69, 0x01], regs);
        assert_eq!(r.a, 0x00);
        assert!(r.flag(Status::CARRY));
    }

    #[test]
    fn test_decimal_sbc_uses_operand_value() {
        let regs = Registers {
            a: 0x10,
            p: Status::DECIMAL | Status::CARRY,
            ..Registers::default()
        };
        let (r, _) = run(&[0xe9, 0x01], regs);
        assert_eq!(r.a, 0x09);
        assert!(r.flag(Status::CARRY));

        let regs = Registers {
            a: 0x00,
            p: Status::DECIMAL | Status::CARRY,
            ..Registers::default()
        };
        let (r, _) = run(&[0xe9, 0x01], regs);
        assert_eq!(r.a, 0x99);
        assert!(!r.flag(Status::CARRY));
    }

    #[test]
    fn test_binary_sbc_borrow() {
        let regs = Registers {
            a: 0x05,
            p: Status::CARRY,
            ..Registers::default()
        };
        let (r, _) = run(&[0xe9, 0x03], regs);
        assert_eq!(r.a, 0x02);
        assert!(r.flag(Status::CARRY));

        let regs = Registers {
            a: 0x03,
            p: Status::empty(),
            ..Registers::default()
        };
        let (r, _) = run(&[0xe9, 0x03], regs);
        assert_eq!(r.a, 0xff);
        assert!(!r.flag(Status::CARRY));
        assert!(r.flag(Status::NEGATIVE));
    }

    #[test]
    fn test_compare_sets_carry_when_greater_or_equal() {
        let regs = Registers {
            a: 0x40,
            ..Registers::default()
        };
        let (r, _) = run(&[0xc9, 0x40], regs);
        assert!(r.flag(Status::CARRY));
        assert!(r.flag(Status::ZERO));

        let (r, _) = run(&[0xc9, 0x41], regs);
        assert!(!r.flag(Status::CARRY));
        assert!(r.flag(Status::NEGATIVE));
    }

    #[test]
    fn test_bit_copies_high_bits() {
        let mut mem = Memory::new();
        mem.load(0x1000, &[0x24, 0x10]);
        mem.set(0x10, 0xc0);
        let regs = Registers {
            a: 0x01,
            ..Registers::default()
        };
        let r = step(regs, &mut mem);
        assert!(r.flag(Status::NEGATIVE));
        assert!(r.flag(Status::OVERFLOW));
        assert!(r.flag(Status::ZERO));
        assert_eq!(r.t, 3);
    }

    #[test]
    fn test_absolute_x_page_cross_penalty() {
        let regs = Registers {
            x: 0x01,
            ..Registers::default()
        };
        let (r, _) = run(&[0xbd, 0xff, 0x20], regs);
        assert_eq!(r.t, 5);
        let (r, _) = run(&[0xbd, 0x00, 0x20], regs);
        assert_eq!(r.t, 4);
    }

    #[test]
    fn test_indirect_y_penalty_uses_pointer_low_byte() {
        let mut mem = Memory::new();
        mem.load(0x1000, &[0xb1, 0x80]);
        mem.load(0x0080, &[0xf0, 0x20]);
        let regs = Registers {
            y: 0x20,
            ..Registers::default()
        };
        let r = step(regs, &mut mem);
        assert_eq!(r.t, 6);

        let regs = Registers {
            y: 0x05,
            ..Registers::default()
        };
        let r = step(regs, &mut mem);
        assert_eq!(r.t, 5);
    }

    #[test]
    fn test_branch_timing() {
        // BNE +2, Z clear: taken
        let (r, _) = run(&[0xd0, 0x02], Registers::default());
        assert_eq!(r.pc, 0x1004);
        assert_eq!(r.t, 3);

        let regs = Registers {
            p: Status::ZERO,
            ..Registers::default()
        };
        let (r, _) = run(&[0xd0, 0x02], regs);
        assert_eq!(r.pc, 0x1002);
        assert_eq!(r.t, 2);

        // backwards
        let (r, _) = run(&[0xd0, 0xfe], Registers::default());
        assert_eq!(r.pc, 0x1000);
    }

    #[test]
    fn test_jmp_indirect_page_wrap() {
        let mut mem = Memory::new();
        mem.load(0x1000, &[0x6c, 0xff, 0x30]);
        mem.set(0x30ff, 0x34);
        mem.set(0x3000, 0x12);
        mem.set(0x3100, 0x99);
        let r = step(Registers::default(), &mut mem);
        assert_eq!(r.pc, 0x1234);
        assert_eq!(r.t, 5);
    }

    #[test]
    fn test_jsr_rts_round_trip() {
        let mut mem = Memory::new();
        mem.load(0x1000, &[0x20, 0x00, 0x20]);
        mem.set(0x2000, 0x60);
        let regs = Registers {
            s: 0xff,
            ..Registers::default()
        };
        let r = step(regs, &mut mem);
        assert_eq!(r.pc, 0x2000);
        assert_eq!(r.s, 0xfd);
        assert_eq!(mem.get(0x01ff), 0x10);
        assert_eq!(mem.get(0x01fe), 0x02);
        assert_eq!(r.t, 6);

        let r = step(r, &mut mem);
        assert_eq!(r.pc, 0x1003);
        assert_eq!(r.s, 0xff);
    }

    #[test]
    fn test_brk_pushes_break_flag_and_vectors() {
        let mut mem = Memory::new();
        mem.set(0x1000, 0x00);
        mem.load(IRQ_VECTOR, &[0x00, 0xe0]);
        let regs = Registers {
            s: 0xff,
            ..Registers::default()
        };
        let r = step(regs, &mut mem);
        assert_eq!(r.pc, 0xe000);
        assert!(r.flag(Status::IRQ_DISABLE));
        assert_eq!(mem.get(0x01ff), 0x10);
        assert_eq!(mem.get(0x01fe), 0x02);
        assert_eq!(mem.get(0x01fd) & Status::BREAK.bits(), Status::BREAK.bits());
        assert_eq!(r.t, 7);
    }

    #[test]
    fn test_plp_forces_unused() {
        let mut mem = Memory::new();
        mem.set(0x1000, 0x28);
        mem.set(0x01ff, 0x01);
        let regs = Registers {
            s: 0xfe,
            ..Registers::default()
        };
        let r = step(regs, &mut mem);
        assert_eq!(r.p, Status::CARRY | Status::UNUSED);
        assert_eq!(r.t, 4);
    }

    #[test]
    fn test_illegal_opcode_jams_past_operands() {
        let (r, mem) = run(&[0x02], Registers::default());
        assert_eq!(r.t, JAM);
        assert_eq!(r.pc, 0x1001);

        let mut mem = mem;
        let again = step(r, &mut mem);
        assert_eq!(again, r);
        assert_eq!(again.t, JAM);

        // lax $10,y: nothing but PC and T change
        let regs = Registers {
            y: 1,
            ..Registers::default()
        };
        let (r, mem) = run(&[0xb7, 0x10], regs);
        assert_eq!(r, Registers { pc: 0x1002, t: JAM, ..regs });
        assert_eq!(mem.get(0x0011), 0);

        // slo $2000 leaves memory alone
        let (r, mem) = run(&[0x0f, 0x00, 0x20], Registers::default());
        assert_eq!(r.pc, 0x1003);
        assert_eq!(mem.get(0x2000), 0);
    }

    #[test]
    fn test_irq_respects_interrupt_disable() {
        let mut mem = Memory::new();
        mem.load(IRQ_VECTOR, &[0x00, 0xc0]);
        let regs = Registers {
            s: 0xff,
            p: Status::IRQ_DISABLE,
            ..Registers::default()
        };
        let r = irq(regs, &mut mem);
        assert_eq!(r.pc, 0x1000);

        let regs = Registers {
            s: 0xff,
            p: Status::BREAK | Status::CARRY,
            ..Registers::default()
        };
        let r = irq(regs, &mut mem);
        assert_eq!(r.pc, 0xc000);
        assert_eq!(r.s, 0xfc);
        assert_eq!(mem.get(0x01fd), Status::CARRY.bits());
        assert!(r.flag(Status::IRQ_DISABLE));
        assert_eq!(r.t, 7);
    }

    #[test]
    fn test_nmi_ignores_interrupt_disable() {
        let mut mem = Memory::new();
        mem.load(NMI_VECTOR, &[0x34, 0x12]);
        let regs = Registers {
            s: 0xff,
            p: Status::IRQ_DISABLE,
            ..Registers::default()
        };
        let r = nmi(regs, &mut mem);
        assert_eq!(r.pc, 0x1234);
    }

    #[test]
    fn test_reset_loads_vector() {
        let mut mem = Memory::new();
        mem.load(RESET_VECTOR, &[0x00, 0x08]);
        let regs = Registers {
            a: 1,
            x: 2,
            y: 3,
            ..Registers::default()
        };
        let r = reset(regs, &mut mem);
        assert_eq!(r.pc, 0x0800);
        assert_eq!((r.a, r.x, r.y, r.s), (0, 0, 0, 0xfd));
        assert!(r.flag(Status::UNUSED));
        assert_eq!(r.t, 6);
    }

    #[test]
    fn test_rmw_zero_page_x_wraps() {
        let mut mem = Memory::new();
        mem.load(0x1000, &[0xf6, 0xff]);
        mem.set(0x0001, 0x7f);
        let regs = Registers {
            x: 0x02,
            ..Registers::default()
        };
        let r = step(regs, &mut mem);
        assert_eq!(mem.get(0x0001), 0x80);
        assert!(r.flag(Status::NEGATIVE));
        assert_eq!(r.t, 6);
    }

    #[test]
    fn test_ror_accumulator_through_carry() {
        let regs = Registers {
            a: 0x01,
            p: Status::CARRY,
            ..Registers::default()
        };
        let (r, _) = run(&[0x6a], regs);
        assert_eq!(r.a, 0x80);
        assert!(r.flag(Status::CARRY));
        assert!(r.flag(Status::NEGATIVE));
    }
}
