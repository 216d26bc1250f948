//! Flat 64K address space and the bus abstraction the interpreter runs on.

/// Byte-level access used by the interpreter for every operand fetch and store.
///
/// `read` takes `&mut self` so wrappers can observe accesses (watchpoints,
/// undo recording) without interior mutability.
pub trait Bus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);
}

pub const MEMORY_SIZE: usize = 0x10000;

/// 64K of RAM with a "memory changed" latch for views.
///
/// The latch stays up for one extra [`Memory::clear_changed`] after the last
/// change so a consumer polling once per frame never misses an update that
/// landed while it was redrawing.
#[derive(Clone)]
pub struct Memory {
    ram: Box<[u8]>,
    changed: bool,
    changed_prev: bool,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("changed", &self.changed)
            .field("changed_prev", &self.changed_prev)
            .finish_non_exhaustive()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self {
            ram: vec![0u8; MEMORY_SIZE].into_boxed_slice(),
            changed: true,
            changed_prev: false,
        }
    }

    pub fn get(&self, addr: u16) -> u8 {
        self.ram[addr as usize]
    }

    /// Stores `value`, raising the changed flag only if the byte differs.
    pub fn set(&mut self, addr: u16, value: u8) {
        let slot = &mut self.ram[addr as usize];
        if *slot != value {
            *slot = value;
            self.changed = true;
        }
    }

    /// Copies `bytes` starting at `addr`, wrapping at the top of memory.
    pub fn load(&mut self, addr: u16, bytes: &[u8]) {
        let mut at = addr;
        for &b in bytes {
            self.set(at, b);
            at = at.wrapping_add(1);
        }
    }

    /// Reads `len` bytes starting at `addr`, wrapping at the top of memory.
    pub fn slice(&self, addr: u16, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| self.get(addr.wrapping_add(i as u16)))
            .collect()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.ram
    }

    pub fn changed(&self) -> bool {
        self.changed || self.changed_prev
    }

    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    pub fn clear_changed(&mut self) {
        self.changed_prev = self.changed;
        self.changed = false;
    }
}

impl Bus for Memory {
    fn read(&mut self, addr: u16) -> u8 {
        self.get(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.set(addr, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_same_value_does_not_flag_change() {
        let mut mem = Memory::new();
        mem.clear_changed();
        mem.clear_changed();
        assert!(!mem.changed());

        mem.set(0x2000, 0);
        assert!(!mem.changed());

        mem.set(0x2000, 1);
        assert!(mem.changed());
    }

    #[test]
    fn test_changed_latch_survives_one_clear() {
        let mut mem = Memory::new();
        mem.clear_changed();
        mem.clear_changed();

        mem.set(0x10, 0x42);
        mem.clear_changed();
        assert!(mem.changed(), "previous-frame latch should still report");
        mem.clear_changed();
        assert!(!mem.changed());
    }

    #[test]
    fn test_load_wraps_at_top() {
        let mut mem = Memory::new();
        mem.load(0xfffe, &[1, 2, 3]);
        assert_eq!(mem.get(0xfffe), 1);
        assert_eq!(mem.get(0xffff), 2);
        assert_eq!(mem.get(0x0000), 3);
        assert_eq!(mem.slice(0xffff, 2), vec![2, 3]);
    }
}
