//! Execution breakpoints and memory watches.
//!
//! Slots are kept partitioned in place: `[0, n_active)` are enabled and the
//! rest are disabled, so the hot check in the run loop only walks the active
//! prefix. Every mutation keeps the partition with O(1) swaps.
//!
//! Condition bytecode for all slots lives in one shared arena. Removing a
//! condition closes the gap and shifts the offsets of later conditions down.

use crate::expr::{EvalContext, ExpressionEvaluator};

pub const MAX_BREAKPOINTS: usize = 256;
pub const MAX_CONDITION_BYTES: usize = 4 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakpointKind {
    Break,
    WatchStore,
    WatchRead,
}

impl BreakpointKind {
    pub fn name(self) -> &'static str {
        match self {
            BreakpointKind::Break => "break",
            BreakpointKind::WatchStore => "store",
            BreakpointKind::WatchRead => "load",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

/// One bus access made by an instruction, checked against watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryAccess {
    pub addr: u16,
    pub kind: AccessKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition {
    pub offset: u16,
    pub size: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub id: u32,
    pub address: u16,
    /// Last address of a watched range; equals `address` for breaks.
    pub end: u16,
    pub kind: BreakpointKind,
    pub condition: Option<Condition>,
    pub disabled: bool,
    /// Index assigned by the external monitor, if it knows this entry.
    pub external_index: Option<u32>,
}

impl Breakpoint {
    pub fn covers(&self, addr: u16) -> bool {
        self.address <= addr && addr <= self.end
    }
}

#[derive(Debug, Clone, Default)]
pub struct BreakpointTable {
    slots: Vec<Breakpoint>,
    n_active: usize,
    arena: Vec<u8>,
    next_id: u32,
}

impl BreakpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn active(&self) -> &[Breakpoint] {
        &self.slots[..self.n_active]
    }

    pub fn disabled(&self) -> &[Breakpoint] {
        &self.slots[self.n_active..]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.slots.iter()
    }

    pub fn get(&self, id: u32) -> Option<&Breakpoint> {
        self.slots.iter().find(|b| b.id == id)
    }

    pub fn address_of(&self, id: u32) -> Option<u16> {
        self.get(id).map(|b| b.address)
    }

    pub fn external_index_of(&self, id: u32) -> Option<u32> {
        self.get(id).and_then(|b| b.external_index)
    }

    /// Bytes of bytecode currently stored for `id`.
    pub fn condition_of(&self, id: u32) -> Option<&[u8]> {
        let cond = self.get(id)?.condition?;
        let start = cond.offset as usize;
        self.arena.get(start..start + cond.size as usize)
    }

    pub fn condition_bytes_used(&self) -> usize {
        self.arena.len()
    }

    fn slot_of(&self, id: u32) -> Option<usize> {
        self.slots.iter().position(|b| b.id == id)
    }

    fn slot_of_pc(&self, addr: u16) -> Option<usize> {
        self.slots
            .iter()
            .position(|b| b.kind == BreakpointKind::Break && b.address == addr)
    }

    fn insert(
        &mut self,
        address: u16,
        end: u16,
        kind: BreakpointKind,
        disabled: bool,
        external_index: Option<u32>,
    ) -> Option<u32> {
        if self.slots.len() >= MAX_BREAKPOINTS {
            log::warn!(
                "Breakpoint table full, dropping {} at ${:04x}",
                kind.name(),
                address
            );
            return None;
        }
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.slots.push(Breakpoint {
            id,
            address,
            end,
            kind,
            condition: None,
            disabled,
            external_index,
        });
        if !disabled {
            // first disabled slot moves to the end, the new entry takes its place
            let last = self.slots.len() - 1;
            self.slots.swap(self.n_active, last);
            self.n_active += 1;
        }
        Some(id)
    }

    fn remove_slot(&mut self, slot: usize) -> Breakpoint {
        self.erase_condition(slot);
        let mut slot = slot;
        if slot < self.n_active {
            // last active entry fills the hole; the removed one becomes the
            // first disabled slot and is replaced by the last disabled one
            self.n_active -= 1;
            self.slots.swap(slot, self.n_active);
            slot = self.n_active;
        }
        self.slots.swap_remove(slot)
    }

    fn set_enabled_slot(&mut self, slot: usize, enable: bool) -> bool {
        if enable && slot >= self.n_active {
            self.slots.swap(slot, self.n_active);
            self.slots[self.n_active].disabled = false;
            self.n_active += 1;
            true
        } else if !enable && slot < self.n_active {
            self.n_active -= 1;
            self.slots.swap(slot, self.n_active);
            self.slots[self.n_active].disabled = true;
            true
        } else {
            false
        }
    }

    /// Adds an execution breakpoint. Returns the existing id if one is
    /// already set at `addr`, enabled or not, and `None` if the table is full.
    pub fn set_pc(&mut self, addr: u16) -> Option<u32> {
        if let Some(slot) = self.slot_of_pc(addr) {
            return Some(self.slots[slot].id);
        }
        self.insert(addr, addr, BreakpointKind::Break, false, None)
    }

    /// Removes the breakpoint at `addr` and returns its id, or adds one and
    /// returns `None`.
    pub fn toggle(&mut self, addr: u16) -> Option<u32> {
        if let Some(slot) = self.slot_of_pc(addr) {
            return Some(self.remove_slot(slot).id);
        }
        self.insert(addr, addr, BreakpointKind::Break, false, None);
        None
    }

    /// The execution breakpoint [`toggle`](Self::toggle) would remove.
    pub fn find_pc(&self, addr: u16) -> Option<&Breakpoint> {
        self.slot_of_pc(addr).map(|slot| &self.slots[slot])
    }

    /// Removes enabled execution breakpoints at `addr` and returns them.
    /// Disabled ones stay.
    pub fn clear_pc(&mut self, addr: u16) -> Vec<Breakpoint> {
        let mut removed = Vec::new();
        while let Some(slot) = self.slots[..self.n_active]
            .iter()
            .position(|b| b.kind == BreakpointKind::Break && b.address == addr)
        {
            removed.push(self.remove_slot(slot));
        }
        removed
    }

    /// Adds a watch on `address..=end`.
    pub fn set_watch(&mut self, address: u16, end: u16, kind: BreakpointKind) -> Option<u32> {
        let (lo, hi) = if end < address {
            (end, address)
        } else {
            (address, end)
        };
        if let Some(b) = self
            .slots
            .iter()
            .find(|b| b.kind == kind && b.address == lo && b.end == hi)
        {
            return Some(b.id);
        }
        self.insert(lo, hi, kind, false, None)
    }

    /// Moves `id` across the enabled/disabled boundary. Returns false if the
    /// id is unknown or already in the requested state.
    pub fn enable(&mut self, id: u32, enable: bool) -> bool {
        match self.slot_of(id) {
            Some(slot) => self.set_enabled_slot(slot, enable),
            None => false,
        }
    }

    pub fn remove(&mut self, id: u32) -> Option<Breakpoint> {
        let slot = self.slot_of(id)?;
        Some(self.remove_slot(slot))
    }

    pub fn remove_all(&mut self) {
        self.slots.clear();
        self.arena.clear();
        self.n_active = 0;
    }

    /// Attaches condition bytecode to `id`. Fails if the id is unknown, the
    /// bytecode is empty or the arena has no room for it.
    pub fn set_condition(&mut self, id: u32, bytecode: &[u8]) -> bool {
        let Some(slot) = self.slot_of(id) else {
            return false;
        };
        if let Some(cond) = self.slots[slot].condition
            && cond.size as usize == bytecode.len()
        {
            let start = cond.offset as usize;
            self.arena[start..start + bytecode.len()].copy_from_slice(bytecode);
            return true;
        }
        self.erase_condition(slot);
        if bytecode.is_empty() || bytecode.len() >= MAX_CONDITION_BYTES - self.arena.len() {
            return false;
        }
        self.slots[slot].condition = Some(Condition {
            offset: self.arena.len() as u16,
            size: bytecode.len() as u16,
        });
        self.arena.extend_from_slice(bytecode);
        true
    }

    pub fn clear_condition(&mut self, id: u32) {
        if let Some(slot) = self.slot_of(id) {
            self.erase_condition(slot);
        }
    }

    fn erase_condition(&mut self, slot: usize) {
        let Some(cond) = self.slots[slot].condition.take() else {
            return;
        };
        let start = cond.offset as usize;
        self.arena.drain(start..start + cond.size as usize);
        for b in &mut self.slots {
            if let Some(c) = &mut b.condition
                && c.offset > cond.offset
            {
                c.offset -= cond.size;
            }
        }
    }

    fn passes(&self, b: &Breakpoint, ctx: &EvalContext<'_>, eval: &dyn ExpressionEvaluator) -> bool {
        match b.condition {
            None => true,
            Some(c) => {
                let start = c.offset as usize;
                match self.arena.get(start..start + c.size as usize) {
                    Some(code) => eval.eval(code, ctx) != 0,
                    None => false,
                }
            }
        }
    }

    /// Id of the enabled execution breakpoint at `pc` whose condition holds.
    pub fn find_hit(
        &self,
        pc: u16,
        ctx: &EvalContext<'_>,
        eval: &dyn ExpressionEvaluator,
    ) -> Option<u32> {
        self.active()
            .iter()
            .find(|b| b.kind == BreakpointKind::Break && b.address == pc && self.passes(b, ctx, eval))
            .map(|b| b.id)
    }

    pub fn check_hit(&self, pc: u16, ctx: &EvalContext<'_>, eval: &dyn ExpressionEvaluator) -> bool {
        self.find_hit(pc, ctx, eval).is_some()
    }

    /// Id of the enabled watch matching any of `accesses`.
    pub fn find_watch(
        &self,
        accesses: &[MemoryAccess],
        ctx: &EvalContext<'_>,
        eval: &dyn ExpressionEvaluator,
    ) -> Option<u32> {
        self.active()
            .iter()
            .filter(|b| b.kind != BreakpointKind::Break)
            .find(|b| {
                let want = if b.kind == BreakpointKind::WatchStore {
                    AccessKind::Write
                } else {
                    AccessKind::Read
                };
                accesses
                    .iter()
                    .any(|a| a.kind == want && b.covers(a.addr))
                    && self.passes(b, ctx, eval)
            })
            .map(|b| b.id)
    }

    pub fn check_watch(
        &self,
        accesses: &[MemoryAccess],
        ctx: &EvalContext<'_>,
        eval: &dyn ExpressionEvaluator,
    ) -> bool {
        self.find_watch(accesses, ctx, eval).is_some()
    }

    pub fn has_watches(&self) -> bool {
        self.active().iter().any(|b| b.kind != BreakpointKind::Break)
    }

    /// Merges a breakpoint reported by the external monitor.
    ///
    /// An untagged local entry with the same address and kind adopts the
    /// monitor's index; an entry already carrying `index` is updated in
    /// place; otherwise a new tagged entry is inserted.
    pub fn apply_monitor_breakpoint(
        &mut self,
        index: u32,
        address: u16,
        end: u16,
        kind: BreakpointKind,
        disabled: bool,
    ) -> Option<u32> {
        let slot = self
            .slots
            .iter()
            .position(|b| b.external_index.is_none() && b.address == address && b.kind == kind)
            .or_else(|| {
                self.slots
                    .iter()
                    .position(|b| b.external_index == Some(index))
            });
        match slot {
            Some(slot) => {
                let b = &mut self.slots[slot];
                b.external_index = Some(index);
                b.address = address;
                b.end = end;
                b.kind = kind;
                let id = b.id;
                self.set_enabled_slot(slot, !disabled);
                Some(id)
            }
            None => self.insert(address, end, kind, disabled, Some(index)),
        }
    }

    /// Removes the entry the monitor knows as `index`.
    pub fn remove_external(&mut self, index: u32) -> Option<Breakpoint> {
        let slot = self
            .slots
            .iter()
            .position(|b| b.external_index == Some(index))?;
        Some(self.remove_slot(slot))
    }

    /// Drops every entry tagged by the monitor, ahead of a full resync.
    pub fn clear_external(&mut self) {
        while let Some(slot) = self.slots.iter().position(|b| b.external_index.is_some()) {
            self.remove_slot(slot);
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_partition(&self) {
        assert!(self.n_active <= self.slots.len());
        for (i, b) in self.slots.iter().enumerate() {
            assert_eq!(b.disabled, i >= self.n_active, "slot {} out of partition", i);
        }
        let mut ids: Vec<u32> = self.slots.iter().map(|b| b.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), self.slots.len(), "duplicate ids");
        for b in &self.slots {
            if let Some(c) = b.condition {
                assert!(c.offset as usize + c.size as usize <= self.arena.len());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Registers;
    use crate::expr::{StackEvaluator, compile};
    use crate::memory::Memory;

    fn hit(table: &BreakpointTable, pc: u16, regs: &Registers) -> bool {
        let mem = Memory::new();
        table.check_hit(pc, &EvalContext::new(regs, &mem), &StackEvaluator)
    }

    #[test]
    fn test_set_pc_is_idempotent() {
        let mut t = BreakpointTable::new();
        let id = t.set_pc(0x1000).unwrap();
        assert_eq!(t.set_pc(0x1000), Some(id));
        assert_eq!(t.len(), 1);

        t.enable(id, false);
        assert_eq!(t.set_pc(0x1000), Some(id), "disabled entry still counts");
        assert_eq!(t.len(), 1);
        t.assert_partition();
    }

    #[test]
    fn test_toggle_twice_restores_table() {
        let mut t = BreakpointTable::new();
        t.set_pc(0x2000);
        assert_eq!(t.toggle(0x1000), None);
        assert_eq!(t.len(), 2);
        let removed = t.toggle(0x1000);
        assert!(removed.is_some());
        assert_eq!(t.len(), 1);
        assert_eq!(t.active()[0].address, 0x2000);
        t.assert_partition();
    }

    #[test]
    fn test_insert_with_disabled_entries_keeps_partition() {
        let mut t = BreakpointTable::new();
        let a = t.set_pc(0x1000).unwrap();
        let b = t.set_pc(0x1001).unwrap();
        assert!(t.enable(a, false));
        assert!(t.enable(b, false));
        assert!(!t.enable(b, false), "already disabled");
        let c = t.set_pc(0x1002).unwrap();
        t.assert_partition();
        assert_eq!(t.active().len(), 1);
        assert_eq!(t.active()[0].id, c);
        assert_eq!(t.disabled().len(), 2);

        assert!(t.enable(a, true));
        t.assert_partition();
        assert_eq!(t.active().len(), 2);
    }

    #[test]
    fn test_remove_from_either_partition() {
        let mut t = BreakpointTable::new();
        let ids: Vec<u32> = (0..6).map(|i| t.set_pc(0x1000 + i).unwrap()).collect();
        t.enable(ids[1], false);
        t.enable(ids[4], false);
        t.remove(ids[0]);
        t.assert_partition();
        t.remove(ids[4]);
        t.assert_partition();
        assert_eq!(t.active().len(), 3);
        assert_eq!(t.disabled().len(), 1);
        assert_eq!(t.disabled()[0].id, ids[1]);
        assert!(t.remove(99).is_none());
    }

    #[test]
    fn test_clear_pc_only_touches_active() {
        let mut t = BreakpointTable::new();
        let a = t.set_pc(0x1000).unwrap();
        t.set_pc(0x2000);
        t.enable(a, false);
        assert!(t.clear_pc(0x1000).is_empty());
        assert_eq!(t.clear_pc(0x2000).len(), 1);
        t.assert_partition();
        assert_eq!(t.len(), 1);
        assert_eq!(t.disabled()[0].id, a);
    }

    #[test]
    fn test_disabled_breakpoint_does_not_hit() {
        let mut t = BreakpointTable::new();
        let regs = Registers::default();
        let id = t.set_pc(0x1234).unwrap();
        assert!(hit(&t, 0x1234, &regs));
        t.enable(id, false);
        assert!(!hit(&t, 0x1234, &regs));
    }

    #[test]
    fn test_condition_gates_hit() {
        let mut t = BreakpointTable::new();
        let id = t.set_pc(0x1000).unwrap();
        assert!(t.set_condition(id, &compile("a == 5").unwrap()));
        let mut regs = Registers::default();
        assert!(!hit(&t, 0x1000, &regs));
        regs.a = 5;
        assert!(hit(&t, 0x1000, &regs));
    }

    #[test]
    fn test_condition_arena_compacts_on_erase() {
        let mut t = BreakpointTable::new();
        let a = t.set_pc(0x1000).unwrap();
        let b = t.set_pc(0x1001).unwrap();
        let c = t.set_pc(0x1002).unwrap();
        assert!(t.set_condition(a, &[1, 2, 3]));
        assert!(t.set_condition(b, &[4, 5]));
        assert!(t.set_condition(c, &[6, 7, 8, 9]));
        assert_eq!(t.condition_bytes_used(), 9);

        // same size overwrites in place
        assert!(t.set_condition(b, &[10, 11]));
        assert_eq!(t.condition_of(b), Some(&[10u8, 11][..]));

        t.clear_condition(a);
        assert_eq!(t.condition_bytes_used(), 6);
        assert_eq!(t.condition_of(b), Some(&[10u8, 11][..]));
        assert_eq!(t.condition_of(c), Some(&[6u8, 7, 8, 9][..]));

        // different size moves to the end
        assert!(t.set_condition(b, &[1, 1, 1]));
        assert_eq!(t.condition_of(c), Some(&[6u8, 7, 8, 9][..]));
        assert_eq!(t.condition_of(b), Some(&[1u8, 1, 1][..]));
        assert_eq!(t.condition_bytes_used(), 7);
        t.assert_partition();

        t.remove(c);
        assert_eq!(t.condition_bytes_used(), 3);
        assert_eq!(t.condition_of(b), Some(&[1u8, 1, 1][..]));
    }

    #[test]
    fn test_condition_arena_limit() {
        let mut t = BreakpointTable::new();
        let a = t.set_pc(0x1000).unwrap();
        let b = t.set_pc(0x1001).unwrap();
        assert!(t.set_condition(a, &vec![0u8; MAX_CONDITION_BYTES - 10]));
        assert!(!t.set_condition(b, &[0u8; 10]));
        assert!(t.set_condition(b, &[0u8; 9]));
        assert!(!t.set_condition(b, &[]));
        assert_eq!(t.condition_of(b), None);
    }

    #[test]
    fn test_table_full_returns_none() {
        let mut t = BreakpointTable::new();
        for i in 0..MAX_BREAKPOINTS {
            assert!(t.set_pc(i as u16).is_some());
        }
        assert_eq!(t.set_pc(0xffff), None);
        assert_eq!(t.len(), MAX_BREAKPOINTS);
        assert!(t.set_pc(5).is_some(), "existing address still resolves");
    }

    #[test]
    fn test_watch_kinds() {
        let mut t = BreakpointTable::new();
        let regs = Registers::default();
        let mem = Memory::new();
        let ctx = EvalContext::new(&regs, &mem);
        let store = t.set_watch(0xd020, 0xd021, BreakpointKind::WatchStore).unwrap();
        let write = [MemoryAccess {
            addr: 0xd021,
            kind: AccessKind::Write,
        }];
        let read = [MemoryAccess {
            addr: 0xd021,
            kind: AccessKind::Read,
        }];
        assert_eq!(t.find_watch(&write, &ctx, &StackEvaluator), Some(store));
        assert!(!t.check_watch(&read, &ctx, &StackEvaluator));

        let load = t.set_watch(0xd021, 0xd021, BreakpointKind::WatchRead).unwrap();
        assert_eq!(t.find_watch(&read, &ctx, &StackEvaluator), Some(load));
        assert!(!t.check_hit(0xd021, &ctx, &StackEvaluator));
    }

    #[test]
    fn test_monitor_breakpoint_tags_local_entry() {
        let mut t = BreakpointTable::new();
        let local = t.set_pc(0x1000).unwrap();
        assert_eq!(
            t.apply_monitor_breakpoint(3, 0x1000, 0x1000, BreakpointKind::Break, false),
            Some(local)
        );
        assert_eq!(t.external_index_of(local), Some(3));
        assert_eq!(t.len(), 1);

        // the monitor now reports index 3 disabled
        t.apply_monitor_breakpoint(3, 0x1000, 0x1000, BreakpointKind::Break, true);
        assert_eq!(t.disabled().len(), 1);
        t.assert_partition();

        let new = t
            .apply_monitor_breakpoint(4, 0x2000, 0x2010, BreakpointKind::WatchStore, false)
            .unwrap();
        assert_ne!(new, local);
        assert_eq!(t.len(), 2);

        t.clear_external();
        assert!(t.is_empty());
    }

    #[test]
    fn test_remove_external() {
        let mut t = BreakpointTable::new();
        t.set_pc(0x3000);
        t.apply_monitor_breakpoint(7, 0x1000, 0x1000, BreakpointKind::Break, false);
        assert!(t.remove_external(7).is_some());
        assert!(t.remove_external(7).is_none());
        assert_eq!(t.len(), 1);
        t.assert_partition();
    }
}
