//! VICE text monitor wire format: byte stream to lines, line classification
//! and outbound command formatting.

use std::sync::LazyLock;

use regex::Regex;

pub const DEFAULT_PORT: u16 = 6510;

/// A chunk longer than this without a newline is delivered as its own line.
pub const LINE_LIMIT: usize = 512;

/// Commands sent on every resync: registers, labels, breakpoints and a full
/// memory dump.
pub const BUNDLE: &str = "registers\nshow_labels\nbreak\nm $0000 $ffff\n";

/// Asks a running VICE to enter the monitor.
pub const STOP_COMMAND: &str = "r\n";

const PROMPT_LEN: usize = 9;

/// Bytes per `>` memory patch line.
const PATCH_CHUNK: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    Line(String),
    /// `(C:$xxxx)` at the start of a line. Text following it on the same
    /// line arrives as a separate event.
    Prompt(u16),
}

#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(LINE_LIMIT),
        }
    }

    pub fn reset(&mut self) {
        self.buf.clear();
    }

    pub fn push(&mut self, byte: u8) -> Option<LineEvent> {
        self.buf.push(byte);
        if byte == b'\n' {
            let mut line = std::mem::take(&mut self.buf);
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Some(LineEvent::Line(String::from_utf8_lossy(&line).into_owned()));
        }
        if self.buf.len() == PROMPT_LEN
            && self.buf.starts_with(b"(C:$")
            && self.buf[PROMPT_LEN - 1] == b')'
            && let Some(addr) = std::str::from_utf8(&self.buf[4..8])
                .ok()
                .and_then(|s| u16::from_str_radix(s, 16).ok())
        {
            self.buf.clear();
            return Some(LineEvent::Prompt(addr));
        }
        if self.buf.len() >= LINE_LIMIT {
            let line = std::mem::take(&mut self.buf);
            return Some(LineEvent::Line(String::from_utf8_lossy(&line).into_owned()));
        }
        None
    }

    /// Feeds a received block, collecting every completed event.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<LineEvent> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }
}

/// Register values reported by `registers`. Fields the line was too short to
/// carry are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterDump {
    pub pc: Option<u16>,
    pub a: Option<u8>,
    pub x: Option<u8>,
    pub y: Option<u8>,
    pub s: Option<u8>,
    pub p: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorLine {
    MemoryDump {
        address: u16,
        bytes: Vec<u8>,
    },
    Registers(RegisterDump),
    Symbol {
        address: u16,
        name: String,
    },
    Break {
        index: u32,
        address: u16,
        disabled: bool,
    },
    Watch {
        index: u32,
        address: u16,
        end: u16,
        store: bool,
        disabled: bool,
    },
    TraceStart,
    Other,
}

static BREAK_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^break:?\s*(\d+)\s+C:\$([0-9a-f]{1,4})\s*(?:\([^)]*\))?\s*(disabled)?").ok()
});

static WATCH_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^watch:?\s*(\d+)\s+C:\$([0-9a-f]{1,4})(?:\s*-\s*\$?([0-9a-f]{1,4}))?\s*(\([^)]*\))?\s*(disabled)?",
    )
    .ok()
});

fn hex_u8(s: &str, at: usize) -> Option<u8> {
    s.get(at..at + 2)
        .and_then(|h| u8::from_str_radix(h, 16).ok())
}

fn parse_memory_dump(line: &str) -> Option<MonitorLine> {
    let rest = line.strip_prefix(">C:")?;
    let address = u16::from_str_radix(rest.get(..4)?, 16).ok()?;
    let mut rest = &rest[4..];
    let mut bytes = Vec::new();
    loop {
        rest = rest.trim_start_matches(' ');
        let Some(byte) = hex_u8(rest, 0) else {
            break;
        };
        bytes.push(byte);
        rest = &rest[2..];
        // three spaces separate the hex columns from the character column
        if rest.is_empty() || rest.starts_with("   ") {
            break;
        }
    }
    Some(MonitorLine::MemoryDump { address, bytes })
}

// .;e5cf 00 00 0a f3 2f 37 00100010 000 002
fn parse_registers(line: &str) -> MonitorLine {
    let len = line.len();
    let mut dump = RegisterDump::default();
    if len >= 6 {
        dump.pc = line.get(2..6).and_then(|h| u16::from_str_radix(h, 16).ok());
    }
    if len >= 9 {
        dump.a = hex_u8(line, 7);
    }
    if len >= 12 {
        dump.x = hex_u8(line, 10);
    }
    if len >= 15 {
        dump.y = hex_u8(line, 13);
    }
    if len >= 18 {
        dump.s = hex_u8(line, 16);
    }
    if len >= 33 {
        dump.p = line.get(25..33).and_then(|b| u8::from_str_radix(b, 2).ok());
    }
    MonitorLine::Registers(dump)
}

fn parse_symbol(line: &str) -> Option<MonitorLine> {
    let bytes = line.as_bytes();
    if bytes.len() <= 7 || bytes[5] != b' ' || bytes[6] != b'.' {
        return None;
    }
    let address = u16::from_str_radix(line.get(1..5)?, 16).ok()?;
    let name = line[7..].trim();
    if name.is_empty() {
        return None;
    }
    Some(MonitorLine::Symbol {
        address,
        name: name.to_string(),
    })
}

fn parse_break(line: &str) -> Option<MonitorLine> {
    let caps = BREAK_RE.as_ref()?.captures(line)?;
    Some(MonitorLine::Break {
        index: caps.get(1)?.as_str().parse().ok()?,
        address: u16::from_str_radix(caps.get(2)?.as_str(), 16).ok()?,
        disabled: caps.get(3).is_some(),
    })
}

fn parse_watch(line: &str) -> Option<MonitorLine> {
    let caps = WATCH_RE.as_ref()?.captures(line)?;
    let address = u16::from_str_radix(caps.get(2)?.as_str(), 16).ok()?;
    let end = match caps.get(3) {
        Some(m) => u16::from_str_radix(m.as_str(), 16).ok()?,
        None => address,
    };
    let store = caps
        .get(4)
        .is_some_and(|m| m.as_str().to_ascii_lowercase().contains("store"));
    Some(MonitorLine::Watch {
        index: caps.get(1)?.as_str().parse().ok()?,
        address,
        end,
        store,
        disabled: caps.get(5).is_some(),
    })
}

impl MonitorLine {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_start();
        let parsed = match line.as_bytes().first() {
            Some(b'>') => parse_memory_dump(line),
            Some(b'.') if line.as_bytes().get(1) == Some(&b';') => Some(parse_registers(line)),
            Some(b'$') => parse_symbol(line),
            Some(b'B' | b'b') => parse_break(line),
            Some(b'W' | b'w') => parse_watch(line),
            Some(b'#') => Some(MonitorLine::TraceStart),
            _ => None,
        };
        parsed.unwrap_or(MonitorLine::Other)
    }
}

/// `x`, `g` and their long forms resume the target.
pub fn is_resume_command(cmd: &str) -> bool {
    matches!(cmd.trim_start().bytes().next(), Some(b'x' | b'X' | b'g' | b'G'))
}

pub fn is_quit_command(cmd: &str) -> bool {
    cmd.trim_start()
        .get(..4)
        .is_some_and(|w| w.eq_ignore_ascii_case("quit"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViceRegister {
    Pc,
    A,
    X,
    Y,
    Sp,
    Flags,
}

pub fn format_register(reg: ViceRegister, value: u16) -> String {
    match reg {
        ViceRegister::Pc => format!("r pc={:04x}\n", value),
        ViceRegister::A => format!("r a={:02x}\n", value as u8),
        ViceRegister::X => format!("r x={:02x}\n", value as u8),
        ViceRegister::Y => format!("r y={:02x}\n", value as u8),
        ViceRegister::Sp => format!("r sp={:02x}\n", value as u8),
        ViceRegister::Flags => format!("r fl={:02x}\n", value as u8),
    }
}

/// `>$0400 $01$02...`, split into lines of at most 32 bytes.
pub fn format_memory_patch(addr: u16, bytes: &[u8]) -> Vec<String> {
    bytes
        .chunks(PATCH_CHUNK)
        .enumerate()
        .map(|(i, chunk)| {
            let mut line = format!(">${:04x} ", addr.wrapping_add((i * PATCH_CHUNK) as u16));
            for b in chunk {
                line.push_str(&format!("${:02x}", b));
            }
            line.push('\n');
            line
        })
        .collect()
}

pub fn format_break(addr: u16) -> String {
    format!("break ${:04x}\n", addr)
}

pub fn format_delete(index: u32) -> String {
    format!("del {}\n", index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembler_splits_lines_and_prompts() {
        let mut asm = LineAssembler::new();
        let events = asm.feed(b"(C:$e5cf) >C:0400  01 02\r\nnext");
        assert_eq!(
            events,
            vec![
                LineEvent::Prompt(0xe5cf),
                LineEvent::Line(" >C:0400  01 02".to_string()),
            ]
        );
        assert_eq!(asm.feed(b"\n"), vec![LineEvent::Line("next".to_string())]);
    }

    #[test]
    fn test_assembler_prompt_only_at_line_start() {
        let mut asm = LineAssembler::new();
        let events = asm.feed(b"x (C:$1000)\n");
        assert_eq!(events, vec![LineEvent::Line("x (C:$1000)".to_string())]);
    }

    #[test]
    fn test_assembler_overflow() {
        let mut asm = LineAssembler::new();
        let long = vec![b'a'; LINE_LIMIT + 3];
        let events = asm.feed(&long);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], LineEvent::Line(s) if s.len() == LINE_LIMIT));
    }

    #[test]
    fn test_parse_memory_dump() {
        let line = ">C:0400  00 01 02 03  04 05 06 07   ........";
        assert_eq!(
            MonitorLine::parse(line),
            MonitorLine::MemoryDump {
                address: 0x0400,
                bytes: vec![0, 1, 2, 3, 4, 5, 6, 7]
            }
        );
    }

    #[test]
    fn test_parse_memory_dump_stops_at_bad_pair() {
        let line = ">C:c000  a9 05 zz 8d";
        assert_eq!(
            MonitorLine::parse(line),
            MonitorLine::MemoryDump {
                address: 0xc000,
                bytes: vec![0xa9, 0x05]
            }
        );
    }

    #[test]
    fn test_parse_registers() {
        let line = ".;e5cf 01 02 0a f3 2f 37 00100011 000 002    5963015";
        assert_eq!(
            MonitorLine::parse(line),
            MonitorLine::Registers(RegisterDump {
                pc: Some(0xe5cf),
                a: Some(0x01),
                x: Some(0x02),
                y: Some(0x0a),
                s: Some(0xf3),
                p: Some(0b0010_0011),
            })
        );
    }

    #[test]
    fn test_parse_short_registers() {
        let MonitorLine::Registers(dump) = MonitorLine::parse(".;1000 05") else {
            panic!("not a register line");
        };
        assert_eq!(dump.pc, Some(0x1000));
        assert_eq!(dump.a, Some(0x05));
        assert_eq!(dump.x, None);
        assert_eq!(dump.p, None);
    }

    #[test]
    fn test_parse_symbol() {
        assert_eq!(
            MonitorLine::parse("$c000 .main_loop"),
            MonitorLine::Symbol {
                address: 0xc000,
                name: "main_loop".to_string()
            }
        );
        assert_eq!(MonitorLine::parse("$c000 main"), MonitorLine::Other);
    }

    #[test]
    fn test_parse_break() {
        assert_eq!(
            MonitorLine::parse("BREAK: 3  C:$1234  (Stop on exec)"),
            MonitorLine::Break {
                index: 3,
                address: 0x1234,
                disabled: false
            }
        );
        assert_eq!(
            MonitorLine::parse("break: 4  C:$c000  (Stop on exec) disabled"),
            MonitorLine::Break {
                index: 4,
                address: 0xc000,
                disabled: true
            }
        );
    }

    #[test]
    fn test_parse_watch() {
        assert_eq!(
            MonitorLine::parse("WATCH: 2  C:$0400-$07e7  (Stop on store)"),
            MonitorLine::Watch {
                index: 2,
                address: 0x0400,
                end: 0x07e7,
                store: true,
                disabled: false
            }
        );
        assert_eq!(
            MonitorLine::parse("WATCH: 5  C:$d012  (Stop on load) disabled"),
            MonitorLine::Watch {
                index: 5,
                address: 0xd012,
                end: 0xd012,
                store: false,
                disabled: true
            }
        );
    }

    #[test]
    fn test_parse_other() {
        assert_eq!(MonitorLine::parse("#1 (Stop on exec 1000)"), MonitorLine::TraceStart);
        assert_eq!(MonitorLine::parse("bogus"), MonitorLine::Other);
        assert_eq!(MonitorLine::parse(""), MonitorLine::Other);
    }

    #[test]
    fn test_format_memory_patch() {
        let lines = format_memory_patch(0x0400, &[0x01, 0xff]);
        assert_eq!(lines, vec![">$0400 $01$ff\n".to_string()]);

        let lines = format_memory_patch(0x1000, &[0u8; 40]);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with(">$1020 "));
        assert_eq!(lines[1].matches('$').count(), 9);
    }

    #[test]
    fn test_command_classification() {
        assert!(is_resume_command("x"));
        assert!(is_resume_command("G 1000"));
        assert!(!is_resume_command("m 0400"));
        assert!(is_quit_command("QUIT"));
        assert!(!is_quit_command("qu"));
        assert_eq!(format_register(ViceRegister::Pc, 0xc000), "r pc=c000\n");
        assert_eq!(format_register(ViceRegister::Flags, 0x24), "r fl=24\n");
        assert_eq!(format_break(0x1234), "break $1234\n");
        assert_eq!(format_delete(7), "del 7\n");
    }
}
