use rewind6502::cpu::{AddressingMode, JAM, Operation, Registers, Status, get_opcodes, opcode};
use rewind6502::interpreter;
use rewind6502::memory::Memory;
use std::collections::HashSet;

fn run(program: &[u8], regs: Registers, steps: usize) -> (Registers, Memory) {
    let mut mem = Memory::new();
    mem.load(regs.pc, program);
    let mut regs = regs;
    for _ in 0..steps {
        regs = interpreter::step(regs, &mut mem);
    }
    (regs, mem)
}

// =============================================================================
// OPCODE TABLE TESTS
// =============================================================================

#[test]
fn test_opcode_table_has_256_entries() {
    assert_eq!(get_opcodes().len(), 256);
}

#[test]
fn test_documented_opcode_count() {
    let documented = get_opcodes().iter().filter(|op| !op.is_illegal()).count();
    assert_eq!(documented, 151, "6502 has 151 documented opcodes");
}

#[test]
fn test_illegal_opcodes_do_not_execute() {
    for (i, op) in get_opcodes().iter().enumerate() {
        assert_eq!(
            op.is_illegal(),
            op.cycles().is_none(),
            "Opcode ${:02X} ({}) timing does not match legality",
            i,
            op.mnemonic()
        );
    }
}

#[test]
fn test_instruction_sizes_match_addressing_modes() {
    for (i, op) in get_opcodes().iter().enumerate() {
        let expected = match op.mode {
            AddressingMode::Implied | AddressingMode::Accumulator => 1,
            AddressingMode::Immediate
            | AddressingMode::ZeroPage
            | AddressingMode::ZeroPageX
            | AddressingMode::ZeroPageY
            | AddressingMode::Relative
            | AddressingMode::IndirectX
            | AddressingMode::IndirectY => 2,
            AddressingMode::Absolute
            | AddressingMode::AbsoluteX
            | AddressingMode::AbsoluteY
            | AddressingMode::Indirect => 3,
        };
        assert_eq!(op.size(), expected, "Opcode ${:02X} ({})", i, op.mnemonic());
    }
}

#[test]
fn test_all_branches_are_relative() {
    for (i, op) in get_opcodes().iter().enumerate() {
        if op.operation.is_branch() {
            assert_eq!(op.mode, AddressingMode::Relative, "Branch ${:02X}", i);
            assert!(op.may_add_cycle(), "Branch ${:02X} must allow a taken cycle", i);
        }
    }
}

#[test]
fn test_no_duplicate_documented_mnemonic_mode_combinations() {
    let mut seen = HashSet::new();
    for (i, op) in get_opcodes().iter().enumerate() {
        if op.is_illegal() {
            continue;
        }
        assert!(
            seen.insert((op.mnemonic(), op.mode)),
            "Opcode ${:02X} duplicates {} {:?}",
            i,
            op.mnemonic(),
            op.mode
        );
    }
}

#[test]
fn test_specific_cycle_counts() {
    let cases = [
        (0xa9, 2, false), // lda #
        (0xad, 4, false), // lda abs
        (0xbd, 4, true),  // lda abs,x
        (0xb1, 5, true),  // lda (zp),y
        (0x9d, 5, false), // sta abs,x
        (0x20, 6, false), // jsr
        (0x60, 6, false), // rts
        (0x00, 7, false), // brk
        (0x6c, 5, false), // jmp (ind)
        (0xfe, 7, false), // inc abs,x
    ];
    for (byte, cycles, extra) in cases {
        let op = opcode(byte);
        assert_eq!(op.cycles(), Some(cycles), "Opcode ${:02X}", byte);
        assert_eq!(op.may_add_cycle(), extra, "Opcode ${:02X}", byte);
    }
}

#[test]
fn test_brk_and_nop() {
    assert_eq!(opcode(0x00).operation, Operation::Brk);
    assert_eq!(opcode(0xea).operation, Operation::Nop);
    assert_eq!(opcode(0xea).mnemonic(), "nop");
}

// =============================================================================
// EXECUTION TESTS
// =============================================================================

#[test]
fn test_lda_immediate() {
    let (regs, _) = run(&[0xa9, 0x05], Registers::default(), 1);
    assert_eq!(regs.a, 0x05);
    assert_eq!(regs.pc, 0x1002);
    assert!(!regs.flag(Status::ZERO));
    assert!(!regs.flag(Status::NEGATIVE));
    assert_eq!(Some(regs.t), opcode(0xa9).cycles());
}

#[test]
fn test_decimal_adc_carries() {
    let regs = Registers {
        a: 0x09,
        p: Status::CARRY | Status::DECIMAL,
        ..Registers::default()
    };
    let (regs, _) = run(&[0x69, 0x01], regs, 1);
    assert_eq!(regs.a, 0x11);
    assert!(!regs.flag(Status::CARRY));
}

#[test]
fn test_decimal_sbc_borrows() {
    // 0x10 - 0x01 with carry set (no borrow) = 0x09
    let regs = Registers {
        a: 0x10,
        p: Status::CARRY | Status::DECIMAL,
        ..Registers::default()
    };
    let (regs, _) = run(&[0xe9, 0x01], regs, 1);
    assert_eq!(regs.a, 0x09);
    assert!(regs.flag(Status::CARRY));
}

#[test]
fn test_page_cross_costs_a_cycle() {
    let regs = Registers {
        x: 0x01,
        ..Registers::default()
    };
    let (same_page, _) = run(&[0xbd, 0x00, 0x20], regs, 1);
    assert_eq!(same_page.t, 4);
    let (crossed, _) = run(&[0xbd, 0xff, 0x20], regs, 1);
    assert_eq!(crossed.t, 5);
}

#[test]
fn test_taken_branch_timing() {
    // bne +2 with Z clear is taken
    let (taken, _) = run(&[0xd0, 0x02], Registers::default(), 1);
    assert_eq!(taken.pc, 0x1004);
    assert_eq!(taken.t, 3);

    let regs = Registers {
        p: Status::ZERO,
        ..Registers::default()
    };
    let (not_taken, _) = run(&[0xd0, 0x02], regs, 1);
    assert_eq!(not_taken.pc, 0x1002);
    assert_eq!(not_taken.t, 2);
}

#[test]
fn test_jsr_rts_round_trip() {
    let mut mem = Memory::new();
    mem.load(0x1000, &[0x20, 0x00, 0x20]);
    mem.load(0x2000, &[0x60]);
    let regs = Registers {
        s: 0xff,
        ..Registers::default()
    };
    let regs = interpreter::step(regs, &mut mem);
    assert_eq!(regs.pc, 0x2000);
    assert_eq!(regs.s, 0xfd);
    assert_eq!(mem.get(0x01ff), 0x10);
    assert_eq!(mem.get(0x01fe), 0x02);
    let regs = interpreter::step(regs, &mut mem);
    assert_eq!(regs.pc, 0x1003);
    assert_eq!(regs.s, 0xff);
}

#[test]
fn test_jam_halts() {
    let (regs, _) = run(&[0x02, 0xea], Registers::default(), 3);
    assert_eq!(regs.t, JAM);
    assert!(regs.is_jammed());
    assert_eq!(regs.pc, 0x1001);
}

#[test]
fn test_step_is_deterministic() {
    // lda #$80 ; sta $0200,x ; inx ; rol $0200 ; pha
    let program = [0xa9, 0x80, 0x9d, 0x00, 0x02, 0xe8, 0x2e, 0x00, 0x02, 0x48];
    let regs = Registers {
        s: 0xff,
        ..Registers::default()
    };
    let (r1, m1) = run(&program, regs, 5);
    let (r2, m2) = run(&program, regs, 5);
    assert_eq!(r1, r2);
    assert_eq!(r1.t, r2.t);
    assert_eq!(m1.as_slice(), m2.as_slice());
    assert_eq!(m1.get(0x0200), 0x00);
    assert!(r1.flag(Status::CARRY));
}
