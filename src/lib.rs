#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod cpu;
pub mod interpreter;
pub mod memory;

pub mod breakpoints;
pub mod disassembler;
pub mod expr;
pub mod machine;
pub mod symbols;
pub mod undo;

pub mod config;
pub mod console;
pub mod vice;
