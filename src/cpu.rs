use bitflags::bitflags;

/// `Registers::t` value marking a CPU halted on an undefined opcode.
pub const JAM: u8 = 0xff;

bitflags! {
    /// Processor status register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Status: u8 {
        const CARRY = 1 << 0;
        const ZERO = 1 << 1;
        const IRQ_DISABLE = 1 << 2;
        const DECIMAL = 1 << 3;
        const BREAK = 1 << 4;
        const UNUSED = 1 << 5;
        const OVERFLOW = 1 << 6;
        const NEGATIVE = 1 << 7;
    }
}

impl Status {
    /// Flags as the `NV-BDIZC` column shown in register dumps.
    pub fn to_flag_string(self) -> String {
        const NAMES: [char; 8] = ['N', 'V', '-', 'B', 'D', 'I', 'Z', 'C'];
        NAMES
            .iter()
            .enumerate()
            .map(|(i, &name)| {
                if self.bits() & (0x80 >> i) != 0 {
                    name
                } else {
                    '.'
                }
            })
            .collect()
    }
}

/// CPU register file. `t` holds the cycle count of the last executed
/// instruction, or [`JAM`] once the CPU has halted.
#[derive(Debug, Clone, Copy, Eq)]
pub struct Registers {
    pub pc: u16,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub p: Status,
    pub s: u8,
    pub t: u8,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            pc: 0x1000,
            a: 0,
            x: 0,
            y: 0,
            p: Status::empty(),
            s: 0,
            t: 0,
        }
    }
}

impl PartialEq for Registers {
    // `t` is bookkeeping, not architectural state
    fn eq(&self, other: &Self) -> bool {
        self.pc == other.pc
            && self.a == other.a
            && self.x == other.x
            && self.y == other.y
            && self.p == other.p
            && self.s == other.s
    }
}

impl Registers {
    pub fn is_jammed(&self) -> bool {
        self.t == JAM
    }

    pub fn flag(&self, flag: Status) -> bool {
        self.p.contains(flag)
    }

    pub(crate) fn set_flag(&mut self, flag: Status, on: bool) {
        self.p.set(flag, on);
    }

    pub(crate) fn set_nz(&mut self, value: u8) {
        self.p.set(Status::ZERO, value == 0);
        self.p.set(Status::NEGATIVE, value & 0x80 != 0);
    }
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PC={:04X} A={:02X} X={:02X} Y={:02X} S={:02X} P={} ({:02X})",
            self.pc,
            self.a,
            self.x,
            self.y,
            self.s,
            self.p.to_flag_string(),
            self.p.bits()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Relative,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
}

impl AddressingMode {
    /// Number of operand bytes following the opcode.
    pub const fn operand_bytes(self) -> u8 {
        match self {
            AddressingMode::Implied | AddressingMode::Accumulator => 0,
            AddressingMode::Immediate
            | AddressingMode::ZeroPage
            | AddressingMode::ZeroPageX
            | AddressingMode::ZeroPageY
            | AddressingMode::Relative
            | AddressingMode::IndirectX
            | AddressingMode::IndirectY => 1,
            AddressingMode::Absolute
            | AddressingMode::AbsoluteX
            | AddressingMode::AbsoluteY
            | AddressingMode::Indirect => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Adc,
    And,
    Asl,
    Bcc,
    Bcs,
    Beq,
    Bit,
    Bmi,
    Bne,
    Bpl,
    Brk,
    Bvc,
    Bvs,
    Clc,
    Cld,
    Cli,
    Clv,
    Cmp,
    Cpx,
    Cpy,
    Dec,
    Dex,
    Dey,
    Eor,
    Inc,
    Inx,
    Iny,
    Jmp,
    Jsr,
    Lda,
    Ldx,
    Ldy,
    Lsr,
    Nop,
    Ora,
    Pha,
    Php,
    Pla,
    Plp,
    Rol,
    Ror,
    Rti,
    Rts,
    Sbc,
    Sec,
    Sed,
    Sei,
    Sta,
    Stx,
    Sty,
    Tax,
    Tay,
    Tsx,
    Txa,
    Txs,
    Tya,
    // Undocumented
    Aac,
    Ahx,
    Alr,
    Anc,
    Arr,
    Axs,
    Dcp,
    Isc,
    Las,
    Lax,
    Lax2,
    Rla,
    Rra,
    Sax,
    Sbi,
    Shx,
    Shy,
    Slo,
    Sre,
    Tas,
    Xaa,
    Jam,
}

impl Operation {
    pub const fn is_illegal(self) -> bool {
        matches!(
            self,
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
                | Operation::Jam
        )
    }

    pub const fn is_branch(self) -> bool {
        matches!(
            self,
            Operation::Bcc
                | Operation::Bcs
                | Operation::Beq
                | Operation::Bmi
                | Operation::Bne
                | Operation::Bpl
                | Operation::Bvc
                | Operation::Bvs
        )
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Operation::Adc => "adc",
            Operation::And => "and",
            Operation::Asl => "asl",
            Operation::Bcc => "bcc",
            Operation::Bcs => "bcs",
            Operation::Beq => "beq",
            Operation::Bit => "bit",
            Operation::Bmi => "bmi",
            Operation::Bne => "bne",
            Operation::Bpl => "bpl",
            Operation::Brk => "brk",
            Operation::Bvc => "bvc",
            Operation::Bvs => "bvs",
            Operation::Clc => "clc",
            Operation::Cld => "cld",
            Operation::Cli => "cli",
            Operation::Clv => "clv",
            Operation::Cmp => "cmp",
            Operation::Cpx => "cpx",
            Operation::Cpy => "cpy",
            Operation::Dec => "dec",
            Operation::Dex => "dex",
            Operation::Dey => "dey",
            Operation::Eor => "eor",
            Operation::Inc => "inc",
            Operation::Inx => "inx",
            Operation::Iny => "iny",
            Operation::Jmp => "jmp",
            Operation::Jsr => "jsr",
            Operation::Lda => "lda",
            Operation::Ldx => "ldx",
            Operation::Ldy => "ldy",
            Operation::Lsr => "lsr",
            Operation::Nop => "nop",
            Operation::Ora => "ora",
            Operation::Pha => "pha",
            Operation::Php => "php",
            Operation::Pla => "pla",
            Operation::Plp => "plp",
            Operation::Rol => "rol",
            Operation::Ror => "ror",
            Operation::Rti => "rti",
            Operation::Rts => "rts",
            Operation::Sbc => "sbc",
            Operation::Sec => "sec",
            Operation::Sed => "sed",
            Operation::Sei => "sei",
            Operation::Sta => "sta",
            Operation::Stx => "stx",
            Operation::Sty => "sty",
            Operation::Tax => "tax",
            Operation::Tay => "tay",
            Operation::Tsx => "tsx",
            Operation::Txa => "txa",
            Operation::Txs => "txs",
            Operation::Tya => "tya",
            Operation::Aac => "aac",
            Operation::Ahx => "ahx",
            Operation::Alr => "alr",
            Operation::Anc => "anc",
            Operation::Arr => "arr",
            Operation::Axs => "axs",
            Operation::Dcp => "dcp",
            Operation::Isc => "isc",
            Operation::Las => "las",
            Operation::Lax | Operation::Lax2 => "lax",
            Operation::Rla => "rla",
            Operation::Rra => "rra",
            Operation::Sax => "sax",
            Operation::Sbi => "sbi",
            Operation::Shx => "shx",
            Operation::Shy => "shy",
            Operation::Slo => "slo",
            Operation::Sre => "sre",
            Operation::Tas => "tas",
            Operation::Xaa => "xaa",
            Operation::Jam => "jam",
        }
    }

    /// Short description, used by the console's instruction help.
    pub const fn description(self) -> &'static str {
        match self {
            Operation::Adc => "Add with Carry",
            Operation::And => "Logical AND",
            Operation::Asl => "Arithmetic Shift Left",
            Operation::Bcc => "Branch if Carry Clear",
            Operation::Bcs => "Branch if Carry Set",
            Operation::Beq => "Branch if Equal",
            Operation::Bit => "Bit Test",
            Operation::Bmi => "Branch if Minus",
            Operation::Bne => "Branch if Not Equal",
            Operation::Bpl => "Branch if Positive",
            Operation::Brk => "Force Interrupt",
            Operation::Bvc => "Branch if Overflow Clear",
            Operation::Bvs => "Branch if Overflow Set",
            Operation::Clc => "Clear Carry Flag",
            Operation::Cld => "Clear Decimal Mode",
            Operation::Cli => "Clear Interrupt Disable",
            Operation::Clv => "Clear Overflow Flag",
            Operation::Cmp => "Compare",
            Operation::Cpx => "Compare X Register",
            Operation::Cpy => "Compare Y Register",
            Operation::Dec => "Decrement Memory",
            Operation::Dex => "Decrement X Register",
            Operation::Dey => "Decrement Y Register",
            Operation::Eor => "Exclusive OR",
            Operation::Inc => "Increment Memory",
            Operation::Inx => "Increment X Register",
            Operation::Iny => "Increment Y Register",
            Operation::Jmp => "Jump",
            Operation::Jsr => "Jump to Subroutine",
            Operation::Lda => "Load Accumulator",
            Operation::Ldx => "Load X Register",
            Operation::Ldy => "Load Y Register",
            Operation::Lsr => "Logical Shift Right",
            Operation::Nop => "No Operation",
            Operation::Ora => "Logical Inclusive OR",
            Operation::Pha => "Push Accumulator",
            Operation::Php => "Push Processor Status",
            Operation::Pla => "Pull Accumulator",
            Operation::Plp => "Pull Processor Status",
            Operation::Rol => "Rotate Left",
            Operation::Ror => "Rotate Right",
            Operation::Rti => "Return from Interrupt",
            Operation::Rts => "Return from Subroutine",
            Operation::Sbc => "Subtract with Carry",
            Operation::Sec => "Set Carry Flag",
            Operation::Sed => "Set Decimal Flag",
            Operation::Sei => "Set Interrupt Disable",
            Operation::Sta => "Store Accumulator",
            Operation::Stx => "Store X Register",
            Operation::Sty => "Store Y Register",
            Operation::Tax => "Transfer Accumulator to X",
            Operation::Tay => "Transfer Accumulator to Y",
            Operation::Tsx => "Transfer Stack Pointer to X",
            Operation::Txa => "Transfer X to Accumulator",
            Operation::Txs => "Transfer X to Stack Pointer",
            Operation::Tya => "Transfer Y to Accumulator",
            Operation::Jam => "Halt the CPU",
            _ => "Undocumented instruction",
        }
    }
}

/// One entry of the decode table. `timing` packs `cycles << 1` with the low
/// bit set when a page crossing or taken branch costs one extra cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub operation: Operation,
    pub mode: AddressingMode,
    pub timing: u8,
}

impl Opcode {
    pub fn mnemonic(&self) -> &'static str {
        self.operation.mnemonic()
    }

    pub fn size(&self) -> u8 {
        1 + self.mode.operand_bytes()
    }

    pub fn is_illegal(&self) -> bool {
        self.operation.is_illegal()
    }

    /// Base cycle count, `None` for opcodes the interpreter does not execute.
    pub fn cycles(&self) -> Option<u8> {
        if self.timing == JAM {
            None
        } else {
            Some(self.timing >> 1)
        }
    }

    pub fn may_add_cycle(&self) -> bool {
        self.timing != JAM && self.timing & 1 != 0
    }
}

const fn op(operation: Operation, mode: AddressingMode, timing: u8) -> Opcode {
    Opcode {
        operation,
        mode,
        timing,
    }
}

pub fn get_opcodes() -> &'static [Opcode; 256] {
    &OPCODES
}

pub fn opcode(byte: u8) -> &'static Opcode {
    &OPCODES[byte as usize]
}

pub static OPCODES: [Opcode; 256] = [
    op(Operation::Brk, AddressingMode::Implied, 0x0e), // $00
    op(Operation::Ora, AddressingMode::IndirectX, 0x0c), // $01
    op(Operation::Jam, AddressingMode::Implied, JAM), // $02
    op(Operation::Slo, AddressingMode::IndirectX, JAM), // $03
    op(Operation::Jam, AddressingMode::Implied, JAM), // $04
    op(Operation::Ora, AddressingMode::ZeroPage, 0x06), // $05
    op(Operation::Asl, AddressingMode::ZeroPage, 0x0a), // $06
    op(Operation::Slo, AddressingMode::ZeroPage, JAM), // $07
    op(Operation::Php, AddressingMode::Implied, 0x06), // $08
    op(Operation::Ora, AddressingMode::Immediate, 0x04), // $09
    op(Operation::Asl, AddressingMode::Accumulator, 0x04), // $0A
    op(Operation::Anc, AddressingMode::Immediate, JAM), // $0B
    op(Operation::Jam, AddressingMode::Implied, JAM), // $0C
    op(Operation::Ora, AddressingMode::Absolute, 0x08), // $0D
    op(Operation::Asl, AddressingMode::Absolute, 0x0c), // $0E
    op(Operation::Slo, AddressingMode::Absolute, JAM), // $0F
    op(Operation::Bpl, AddressingMode::Relative, 0x05), // $10
    op(Operation::Ora, AddressingMode::IndirectY, 0x0b), // $11
    op(Operation::Jam, AddressingMode::Implied, JAM), // $12
    op(Operation::Slo, AddressingMode::IndirectY, JAM), // $13
    op(Operation::Jam, AddressingMode::Implied, JAM), // $14
    op(Operation::Ora, AddressingMode::ZeroPageX, 0x08), // $15
    op(Operation::Asl, AddressingMode::ZeroPageX, 0x0c), // $16
    op(Operation::Slo, AddressingMode::ZeroPageX, JAM), // $17
    op(Operation::Clc, AddressingMode::Implied, 0x04), // $18
    op(Operation::Ora, AddressingMode::AbsoluteY, 0x09), // $19
    op(Operation::Jam, AddressingMode::Implied, JAM), // $1A
    op(Operation::Slo, AddressingMode::AbsoluteY, JAM), // $1B
    op(Operation::Jam, AddressingMode::Implied, JAM), // $1C
    op(Operation::Ora, AddressingMode::AbsoluteX, 0x09), // $1D
    op(Operation::Asl, AddressingMode::AbsoluteX, 0x0e), // $1E
    op(Operation::Slo, AddressingMode::AbsoluteX, JAM), // $1F
    op(Operation::Jsr, AddressingMode::Absolute, 0x0c), // $20
    op(Operation::And, AddressingMode::IndirectX, 0x0c), // $21
    op(Operation::Jam, AddressingMode::Implied, JAM), // $22
    op(Operation::Rla, AddressingMode::IndirectX, JAM), // $23
    op(Operation::Bit, AddressingMode::ZeroPage, 0x06), // $24
    op(Operation::And, AddressingMode::ZeroPage, 0x06), // $25
    op(Operation::Rol, AddressingMode::ZeroPage, 0x0a), // $26
    op(Operation::Rla, AddressingMode::ZeroPage, JAM), // $27
    op(Operation::Plp, AddressingMode::Implied, 0x08), // $28
    op(Operation::And, AddressingMode::Immediate, 0x04), // $29
    op(Operation::Rol, AddressingMode::Accumulator, 0x04), // $2A
    op(Operation::Aac, AddressingMode::Immediate, JAM), // $2B
    op(Operation::Bit, AddressingMode::Absolute, 0x08), // $2C
    op(Operation::And, AddressingMode::Absolute, 0x08), // $2D
    op(Operation::Rol, AddressingMode::Absolute, 0x0c), // $2E
    op(Operation::Rla, AddressingMode::Absolute, JAM), // $2F
    op(Operation::Bmi, AddressingMode::Relative, 0x05), // $30
    op(Operation::And, AddressingMode::IndirectY, 0x0b), // $31
    op(Operation::Jam, AddressingMode::Implied, JAM), // $32
    op(Operation::Rla, AddressingMode::IndirectY, JAM), // $33
    op(Operation::Jam, AddressingMode::Implied, JAM), // $34
    op(Operation::And, AddressingMode::ZeroPageX, 0x08), // $35
    op(Operation::Rol, AddressingMode::ZeroPageX, 0x0c), // $36
    op(Operation::Rla, AddressingMode::ZeroPageX, JAM), // $37
    op(Operation::Sec, AddressingMode::Implied, 0x04), // $38
    op(Operation::And, AddressingMode::AbsoluteY, 0x09), // $39
    op(Operation::Jam, AddressingMode::Implied, JAM), // $3A
    op(Operation::Rla, AddressingMode::AbsoluteY, JAM), // $3B
    op(Operation::Jam, AddressingMode::Implied, JAM), // $3C
    op(Operation::And, AddressingMode::AbsoluteX, 0x09), // $3D
    op(Operation::Rol, AddressingMode::AbsoluteX, 0x0e), // $3E
    op(Operation::Rla, AddressingMode::AbsoluteX, JAM), // $3F
    op(Operation::Rti, AddressingMode::Implied, 0x0c), // $40
    op(Operation::Eor, AddressingMode::IndirectX, 0x0c), // $41
    op(Operation::Jam, AddressingMode::Implied, JAM), // $42
    op(Operation::Sre, AddressingMode::IndirectX, JAM), // $43
    op(Operation::Jam, AddressingMode::Implied, JAM), // $44
    op(Operation::Eor, AddressingMode::ZeroPage, 0x06), // $45
    op(Operation::Lsr, AddressingMode::ZeroPage, 0x0a), // $46
    op(Operation::Sre, AddressingMode::ZeroPage, JAM), // $47
    op(Operation::Pha, AddressingMode::Implied, 0x06), // $48
    op(Operation::Eor, AddressingMode::Immediate, 0x04), // $49
    op(Operation::Lsr, AddressingMode::Accumulator, 0x04), // $4A
    op(Operation::Alr, AddressingMode::Immediate, JAM), // $4B
    op(Operation::Jmp, AddressingMode::Absolute, 0x06), // $4C
    op(Operation::Eor, AddressingMode::Absolute, 0x08), // $4D
    op(Operation::Lsr, AddressingMode::Absolute, 0x0c), // $4E
    op(Operation::Sre, AddressingMode::Absolute, JAM), // $4F
    op(Operation::Bvc, AddressingMode::Relative, 0x05), // $50
    op(Operation::Eor, AddressingMode::IndirectY, 0x0b), // $51
    op(Operation::Jam, AddressingMode::Implied, JAM), // $52
    op(Operation::Sre, AddressingMode::IndirectY, JAM), // $53
    op(Operation::Jam, AddressingMode::Implied, JAM), // $54
    op(Operation::Eor, AddressingMode::ZeroPageX, 0x08), // $55
    op(Operation::Lsr, AddressingMode::ZeroPageX, 0x0c), // $56
    op(Operation::Sre, AddressingMode::ZeroPageX, JAM), // $57
    op(Operation::Cli, AddressingMode::Implied, 0x04), // $58
    op(Operation::Eor, AddressingMode::AbsoluteY, 0x09), // $59
    op(Operation::Jam, AddressingMode::Implied, JAM), // $5A
    op(Operation::Sre, AddressingMode::AbsoluteY, JAM), // $5B
    op(Operation::Jam, AddressingMode::Implied, JAM), // $5C
    op(Operation::Eor, AddressingMode::AbsoluteX, 0x09), // $5D
    op(Operation::Lsr, AddressingMode::AbsoluteX, 0x0e), // $5E
    op(Operation::Sre, AddressingMode::AbsoluteX, JAM), // $5F
    op(Operation::Rts, AddressingMode::Implied, 0x0c), // $60
    op(Operation::Adc, AddressingMode::IndirectX, 0x0c), // $61
    op(Operation::Jam, AddressingMode::Implied, JAM), // $62
    op(Operation::Rra, AddressingMode::IndirectX, JAM), // $63
    op(Operation::Jam, AddressingMode::Implied, JAM), // $64
    op(Operation::Adc, AddressingMode::ZeroPage, 0x06), // $65
    op(Operation::Ror, AddressingMode::ZeroPage, 0x0a), // $66
    op(Operation::Rra, AddressingMode::ZeroPage, JAM), // $67
    op(Operation::Pla, AddressingMode::Implied, 0x08), // $68
    op(Operation::Adc, AddressingMode::Immediate, 0x04), // $69
    op(Operation::Ror, AddressingMode::Accumulator, 0x04), // $6A
    op(Operation::Arr, AddressingMode::Immediate, JAM), // $6B
    op(Operation::Jmp, AddressingMode::Indirect, 0x0a), // $6C
    op(Operation::Adc, AddressingMode::Absolute, 0x08), // $6D
    op(Operation::Ror, AddressingMode::Absolute, 0x0c), // $6E
    op(Operation::Rra, AddressingMode::Absolute, JAM), // $6F
    op(Operation::Bvs, AddressingMode::Relative, 0x05), // $70
    op(Operation::Adc, AddressingMode::IndirectY, 0x0b), // $71
    op(Operation::Jam, AddressingMode::Implied, JAM), // $72
    op(Operation::Rra, AddressingMode::IndirectY, JAM), // $73
    op(Operation::Jam, AddressingMode::Implied, JAM), // $74
    op(Operation::Adc, AddressingMode::ZeroPageX, 0x08), // $75
    op(Operation::Ror, AddressingMode::ZeroPageX, 0x0c), // $76
    op(Operation::Rra, AddressingMode::ZeroPageX, JAM), // $77
    op(Operation::Sei, AddressingMode::Implied, 0x04), // $78
    op(Operation::Adc, AddressingMode::AbsoluteY, 0x09), // $79
    op(Operation::Jam, AddressingMode::Implied, JAM), // $7A
    op(Operation::Rra, AddressingMode::AbsoluteY, JAM), // $7B
    op(Operation::Jam, AddressingMode::Implied, JAM), // $7C
    op(Operation::Adc, AddressingMode::AbsoluteX, 0x09), // $7D
    op(Operation::Ror, AddressingMode::AbsoluteX, 0x0e), // $7E
    op(Operation::Rra, AddressingMode::AbsoluteX, JAM), // $7F
    op(Operation::Jam, AddressingMode::Implied, JAM), // $80
    op(Operation::Sta, AddressingMode::IndirectX, 0x0c), // $81
    op(Operation::Jam, AddressingMode::Implied, JAM), // $82
    op(Operation::Sax, AddressingMode::IndirectX, JAM), // $83
    op(Operation::Sty, AddressingMode::ZeroPage, 0x06), // $84
    op(Operation::Sta, AddressingMode::ZeroPage, 0x06), // $85
    op(Operation::Stx, AddressingMode::ZeroPage, 0x06), // $86
    op(Operation::Sax, AddressingMode::ZeroPage, JAM), // $87
    op(Operation::Dey, AddressingMode::Implied, 0x04), // $88
    op(Operation::Jam, AddressingMode::Implied, JAM), // $89
    op(Operation::Txa, AddressingMode::Implied, 0x04), // $8A
    op(Operation::Xaa, AddressingMode::Immediate, JAM), // $8B
    op(Operation::Sty, AddressingMode::Absolute, 0x08), // $8C
    op(Operation::Sta, AddressingMode::Absolute, 0x08), // $8D
    op(Operation::Stx, AddressingMode::Absolute, 0x08), // $8E
    op(Operation::Sax, AddressingMode::Absolute, JAM), // $8F
    op(Operation::Bcc, AddressingMode::Relative, 0x05), // $90
    op(Operation::Sta, AddressingMode::IndirectY, 0x0c), // $91
    op(Operation::Jam, AddressingMode::Implied, JAM), // $92
    op(Operation::Ahx, AddressingMode::IndirectY, JAM), // $93
    op(Operation::Sty, AddressingMode::ZeroPageX, 0x08), // $94
    op(Operation::Sta, AddressingMode::ZeroPageX, 0x08), // $95
    op(Operation::Stx, AddressingMode::ZeroPageY, 0x08), // $96
    op(Operation::Sax, AddressingMode::ZeroPageY, JAM), // $97
    op(Operation::Tya, AddressingMode::Implied, 0x04), // $98
    op(Operation::Sta, AddressingMode::AbsoluteY, 0x0a), // $99
    op(Operation::Txs, AddressingMode::Implied, 0x04), // $9A
    op(Operation::Tas, AddressingMode::AbsoluteY, JAM), // $9B
    op(Operation::Shy, AddressingMode::AbsoluteX, JAM), // $9C
    op(Operation::Sta, AddressingMode::AbsoluteX, 0x0a), // $9D
    op(Operation::Shx, AddressingMode::AbsoluteY, JAM), // $9E
    op(Operation::Ahx, AddressingMode::AbsoluteY, JAM), // $9F
    op(Operation::Ldy, AddressingMode::Immediate, 0x04), // $A0
    op(Operation::Lda, AddressingMode::IndirectX, 0x0c), // $A1
    op(Operation::Ldx, AddressingMode::Immediate, 0x04), // $A2
    op(Operation::Lax, AddressingMode::IndirectX, JAM), // $A3
    op(Operation::Ldy, AddressingMode::ZeroPage, 0x06), // $A4
    op(Operation::Lda, AddressingMode::ZeroPage, 0x06), // $A5
    op(Operation::Ldx, AddressingMode::ZeroPage, 0x06), // $A6
    op(Operation::Lax, AddressingMode::ZeroPage, JAM), // $A7
    op(Operation::Tay, AddressingMode::Implied, 0x04), // $A8
    op(Operation::Lda, AddressingMode::Immediate, 0x04), // $A9
    op(Operation::Tax, AddressingMode::Implied, 0x04), // $AA
    op(Operation::Lax2, AddressingMode::Immediate, JAM), // $AB
    op(Operation::Ldy, AddressingMode::Absolute, 0x08), // $AC
    op(Operation::Lda, AddressingMode::Absolute, 0x08), // $AD
    op(Operation::Ldx, AddressingMode::Absolute, 0x08), // $AE
    op(Operation::Lax, AddressingMode::Absolute, JAM), // $AF
    op(Operation::Bcs, AddressingMode::Relative, 0x05), // $B0
    op(Operation::Lda, AddressingMode::IndirectY, 0x0b), // $B1
    op(Operation::Jam, AddressingMode::Implied, JAM), // $B2
    op(Operation::Jam, AddressingMode::Implied, JAM), // $B3
    op(Operation::Ldy, AddressingMode::ZeroPageX, 0x08), // $B4
    op(Operation::Lda, AddressingMode::ZeroPageX, 0x08), // $B5
    op(Operation::Ldx, AddressingMode::ZeroPageY, 0x08), // $B6
    op(Operation::Lax, AddressingMode::ZeroPageY, JAM), // $B7
    op(Operation::Clv, AddressingMode::Implied, 0x04), // $B8
    op(Operation::Lda, AddressingMode::AbsoluteY, 0x09), // $B9
    op(Operation::Tsx, AddressingMode::Implied, 0x04), // $BA
    op(Operation::Las, AddressingMode::AbsoluteY, JAM), // $BB
    op(Operation::Ldy, AddressingMode::AbsoluteX, 0x09), // $BC
    op(Operation::Lda, AddressingMode::AbsoluteX, 0x09), // $BD
    op(Operation::Ldx, AddressingMode::AbsoluteY, 0x09), // $BE
    op(Operation::Lax, AddressingMode::AbsoluteY, JAM), // $BF
    op(Operation::Cpy, AddressingMode::Immediate, 0x04), // $C0
    op(Operation::Cmp, AddressingMode::IndirectX, 0x0c), // $C1
    op(Operation::Jam, AddressingMode::Implied, JAM), // $C2
    op(Operation::Dcp, AddressingMode::IndirectX, JAM), // $C3
    op(Operation::Cpy, AddressingMode::ZeroPage, 0x06), // $C4
    op(Operation::Cmp, AddressingMode::ZeroPage, 0x06), // $C5
    op(Operation::Dec, AddressingMode::ZeroPage, 0x0a), // $C6
    op(Operation::Dcp, AddressingMode::ZeroPage, JAM), // $C7
    op(Operation::Iny, AddressingMode::Implied, 0x04), // $C8
    op(Operation::Cmp, AddressingMode::Immediate, 0x04), // $C9
    op(Operation::Dex, AddressingMode::Implied, 0x04), // $CA
    op(Operation::Axs, AddressingMode::Immediate, JAM), // $CB
    op(Operation::Cpy, AddressingMode::Absolute, 0x08), // $CC
    op(Operation::Cmp, AddressingMode::Absolute, 0x08), // $CD
    op(Operation::Dec, AddressingMode::Absolute, 0x0c), // $CE
    op(Operation::Dcp, AddressingMode::Absolute, JAM), // $CF
    op(Operation::Bne, AddressingMode::Relative, 0x05), // $D0
    op(Operation::Cmp, AddressingMode::IndirectY, 0x0b), // $D1
    op(Operation::Jam, AddressingMode::Implied, JAM), // $D2
    op(Operation::Dcp, AddressingMode::IndirectY, JAM), // $D3
    op(Operation::Jam, AddressingMode::Implied, JAM), // $D4
    op(Operation::Cmp, AddressingMode::ZeroPageX, 0x08), // $D5
    op(Operation::Dec, AddressingMode::ZeroPageX, 0x0c), // $D6
    op(Operation::Dcp, AddressingMode::ZeroPageX, JAM), // $D7
    op(Operation::Cld, AddressingMode::Implied, 0x04), // $D8
    op(Operation::Cmp, AddressingMode::AbsoluteY, 0x09), // $D9
    op(Operation::Jam, AddressingMode::Implied, JAM), // $DA
    op(Operation::Dcp, AddressingMode::AbsoluteY, JAM), // $DB
    op(Operation::Jam, AddressingMode::Implied, JAM), // $DC
    op(Operation::Cmp, AddressingMode::AbsoluteX, 0x09), // $DD
    op(Operation::Dec, AddressingMode::AbsoluteX, 0x0e), // $DE
    op(Operation::Dcp, AddressingMode::AbsoluteX, JAM), // $DF
    op(Operation::Cpx, AddressingMode::Immediate, 0x04), // $E0
    op(Operation::Sbc, AddressingMode::IndirectX, 0x0c), // $E1
    op(Operation::Jam, AddressingMode::Implied, JAM), // $E2
    op(Operation::Isc, AddressingMode::IndirectX, JAM), // $E3
    op(Operation::Cpx, AddressingMode::ZeroPage, 0x06), // $E4
    op(Operation::Sbc, AddressingMode::ZeroPage, 0x06), // $E5
    op(Operation::Inc, AddressingMode::ZeroPage, 0x0a), // $E6
    op(Operation::Isc, AddressingMode::ZeroPage, JAM), // $E7
    op(Operation::Inx, AddressingMode::Implied, 0x04), // $E8
    op(Operation::Sbc, AddressingMode::Immediate, 0x04), // $E9
    op(Operation::Nop, AddressingMode::Implied, 0x04), // $EA
    op(Operation::Sbi, AddressingMode::Immediate, JAM), // $EB
    op(Operation::Cpx, AddressingMode::Absolute, 0x08), // $EC
    op(Operation::Sbc, AddressingMode::Absolute, 0x08), // $ED
    op(Operation::Inc, AddressingMode::Absolute, 0x0c), // $EE
    op(Operation::Isc, AddressingMode::Absolute, JAM), // $EF
    op(Operation::Beq, AddressingMode::Relative, 0x05), // $F0
    op(Operation::Sbc, AddressingMode::IndirectY, 0x0b), // $F1
    op(Operation::Jam, AddressingMode::Implied, JAM), // $F2
    op(Operation::Isc, AddressingMode::IndirectY, JAM), // $F3
    op(Operation::Jam, AddressingMode::Implied, JAM), // $F4
    op(Operation::Sbc, AddressingMode::ZeroPageX, 0x08), // $F5
    op(Operation::Inc, AddressingMode::ZeroPageX, 0x0c), // $F6
    op(Operation::Isc, AddressingMode::ZeroPageX, JAM), // $F7
    op(Operation::Sed, AddressingMode::Implied, 0x04), // $F8
    op(Operation::Sbc, AddressingMode::AbsoluteY, 0x09), // $F9
    op(Operation::Jam, AddressingMode::Implied, JAM), // $FA
    op(Operation::Isc, AddressingMode::AbsoluteY, JAM), // $FB
    op(Operation::Jam, AddressingMode::Implied, JAM), // $FC
    op(Operation::Sbc, AddressingMode::AbsoluteX, 0x09), // $FD
    op(Operation::Inc, AddressingMode::AbsoluteX, 0x0e), // $FE
    op(Operation::Isc, AddressingMode::AbsoluteX, JAM), // $FF
];
