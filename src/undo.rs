//! Reverse-execution log.
//!
//! Every executed step opens a record holding the registers from before the
//! step, followed by the previous value of each byte the step overwrote.
//! Stepping back pops the newest record and replays it in reverse.
//!
//! The log is bounded by a byte budget computed as if records were stored in
//! a flat buffer: a register snapshot costs 7 bytes and each byte change 3.
//! When the budget is exceeded whole records are dropped from the oldest end.

use std::collections::VecDeque;

use crate::cpu::Registers;
use crate::memory::Memory;

pub const DEFAULT_UNDO_CAPACITY: usize = 16 * 1024 * 1024;

const SNAPSHOT_COST: usize = 7;
const BYTE_CHANGE_COST: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UndoEntry {
    Snapshot(Registers),
    Byte { addr: u16, old: u8 },
}

impl UndoEntry {
    fn cost(&self) -> usize {
        match self {
            UndoEntry::Snapshot(_) => SNAPSHOT_COST,
            UndoEntry::Byte { .. } => BYTE_CHANGE_COST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UndoLog {
    entries: VecDeque<UndoEntry>,
    records: usize,
    used: usize,
    capacity: usize,
}

impl Default for UndoLog {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_CAPACITY)
    }
}

impl UndoLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            records: 0,
            used: 0,
            capacity: capacity.max(SNAPSHOT_COST),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes accounted for by the stored records.
    pub fn used(&self) -> usize {
        self.used
    }

    /// Number of complete steps that can be undone.
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Opens a new record for a step about to run from `pre`.
    pub fn record_step(&mut self, pre: Registers) {
        self.push(UndoEntry::Snapshot(pre));
        self.records += 1;
        self.evict();
    }

    /// Appends the previous value of `addr` to the open record.
    ///
    /// Callers only report writes that actually change memory. Without an
    /// open record there is nothing to attach the change to and it is
    /// dropped.
    pub fn record_byte_change(&mut self, addr: u16, old: u8) {
        if self.records == 0 {
            return;
        }
        self.push(UndoEntry::Byte { addr, old });
        self.evict();
    }

    pub fn have_undo_step(&self) -> bool {
        self.records > 0
    }

    /// Reverts the newest record: restores overwritten bytes newest first,
    /// then the registers, and takes the undone step's cycles off `cycles`.
    pub fn step_back(&mut self, regs: &mut Registers, cycles: &mut u64, mem: &mut Memory) -> bool {
        if self.records == 0 {
            return false;
        }
        while let Some(entry) = self.entries.pop_back() {
            self.used -= entry.cost();
            match entry {
                UndoEntry::Byte { addr, old } => mem.set(addr, old),
                UndoEntry::Snapshot(pre) => {
                    if !regs.is_jammed() {
                        *cycles = cycles.saturating_sub(regs.t as u64);
                    }
                    *regs = pre;
                    self.records -= 1;
                    return true;
                }
            }
        }
        false
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.records = 0;
        self.used = 0;
    }

    fn push(&mut self, entry: UndoEntry) {
        self.used += entry.cost();
        self.entries.push_back(entry);
    }

    // Drops whole records from the front, never the open one at the back.
    fn evict(&mut self) {
        while self.used > self.capacity && self.records > 1 {
            if let Some(first) = self.entries.pop_front() {
                self.used -= first.cost();
            }
            while let Some(UndoEntry::Byte { .. }) = self.entries.front() {
                if let Some(byte) = self.entries.pop_front() {
                    self.used -= byte.cost();
                }
            }
            self.records -= 1;
        }
    }
}
