use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock, Mutex};

use anyhow::{Context, Result};
use regex::Regex;

/// Address-to-name lookup used by the disassembler, the expression compiler
/// and the monitor bridge.
pub trait SymbolTable {
    fn add_symbol(&mut self, addr: u16, name: &str);
    fn get_symbol(&self, addr: u16) -> Option<&str>;
    fn get_address(&self, name: &str) -> Option<u16>;
    fn clear(&mut self);
}

/// Symbol table shared between the console and the monitor bridge.
pub type SharedSymbols = Arc<Mutex<dyn SymbolTable + Send>>;

/// In-memory symbol table. One name per address; the latest add wins.
#[derive(Debug, Clone, Default)]
pub struct SymbolMap {
    by_addr: BTreeMap<u16, String>,
    by_name: HashMap<String, u16>,
}

impl SymbolMap {
    pub fn len(&self) -> usize {
        self.by_addr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_addr.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &str)> {
        self.by_addr.iter().map(|(a, n)| (*a, n.as_str()))
    }

    pub fn to_vec(&self) -> Vec<(u16, String)> {
        self.by_addr.iter().map(|(a, n)| (*a, n.clone())).collect()
    }
}

impl SymbolTable for SymbolMap {
    fn add_symbol(&mut self, addr: u16, name: &str) {
        if let Some(old) = self.by_addr.insert(addr, name.to_string())
            && self.by_name.get(&old) == Some(&addr)
        {
            self.by_name.remove(&old);
        }
        self.by_name.insert(name.to_string(), addr);
    }

    fn get_symbol(&self, addr: u16) -> Option<&str> {
        self.by_addr.get(&addr).map(String::as_str)
    }

    fn get_address(&self, name: &str) -> Option<u16> {
        self.by_name.get(name).copied()
    }

    fn clear(&mut self) {
        self.by_addr.clear();
        self.by_name.clear();
    }
}

static LABEL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^al\s+(?:C:)?\$?([0-9a-f]{1,4})\s+\.?([A-Za-z_][\w.]*)\s*$").ok()
});

/// Adds the labels of a VICE label file (`al C:c000 .main`) to `table` and
/// returns how many were added. Names lose their leading dot. Lines that are
/// not `al` commands are skipped; a malformed `al` line is an error.
pub fn import_vice_labels(content: &str, table: &mut dyn SymbolTable) -> Result<usize> {
    let re = LABEL_RE.as_ref().context("label pattern failed to compile")?;
    let mut added = 0;
    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        let is_label = line
            .get(..3)
            .is_some_and(|head| head.eq_ignore_ascii_case("al "));
        if !is_label {
            continue;
        }
        let caps = re
            .captures(line)
            .with_context(|| format!("line {}: malformed label '{}'", n + 1, line))?;
        let addr = u16::from_str_radix(&caps[1], 16)?;
        table.add_symbol(addr, &caps[2]);
        added += 1;
    }
    log::debug!("Imported {} labels", added);
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_vice_labels() {
        let content = "
; generated
al $1000 .start
AL C:2000 .data_start
al 3000 no_dot
al C:1000 .entry
";
        let mut map = SymbolMap::default();
        assert_eq!(import_vice_labels(content, &mut map).unwrap(), 4);
        assert_eq!(map.get_address("data_start"), Some(0x2000));
        assert_eq!(map.get_address("no_dot"), Some(0x3000));
        // later label for the same address replaces the earlier one
        assert_eq!(map.get_symbol(0x1000), Some("entry"));
        assert_eq!(map.get_address("start"), None);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_import_rejects_malformed_label() {
        let mut map = SymbolMap::default();
        let err = import_vice_labels("al $1000 .ok\nal $12345 .too_wide\n", &mut map).unwrap_err();
        assert!(err.to_string().starts_with("line 2:"), "{}", err);
        assert_eq!(map.get_address("ok"), Some(0x1000));
    }

    #[test]
    fn test_symbol_map_replaces_name_at_address() {
        let mut map = SymbolMap::default();
        map.add_symbol(0xc000, "init");
        map.add_symbol(0xc000, "main");
        assert_eq!(map.get_symbol(0xc000), Some("main"));
        assert_eq!(map.get_address("main"), Some(0xc000));
        assert_eq!(map.get_address("init"), None);
        assert_eq!(map.len(), 1);

        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.get_address("main"), None);
    }
}
