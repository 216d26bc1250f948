//! Line console over a [`Machine`] and an optional VICE connection.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use anyhow::{Context, bail};

use crate::breakpoints::{Breakpoint, BreakpointKind};
use crate::config::DebuggerConfig;
use crate::cpu::Registers;
use crate::disassembler::{DisasmOptions, assemble, disassemble, instruction_reference};
use crate::expr::{EvalContext, compile_with_symbols};
use crate::machine::{Machine, RunEvent, StepResult, StopReason, lock};
use crate::symbols::{SharedSymbols, SymbolMap, import_vice_labels};
use crate::vice::{ViceClient, ViceEvent, ViceRegister, is_vice_command};

const HELP: &[&str] = &[
    "Local commands:",
    " step/s, back/b, over/o, overback/ob - single step forward or back",
    " go/g [n], reverse/rev [n] - run n instructions or until a breakpoint",
    " runto <addr>, revto <addr>, stop",
    " regs/r, reg <name>=<value>, mem/m <addr> [len], d/disasm <addr> [n]",
    " asm/a <addr> <instruction>",
    " bp <addr>, tbp <addr>, cbp <addr>, watch <addr>[-<end>] [r|w]",
    " en <id>, dis/disable <id>, del <id>, cond <id> [expr], bps",
    " reset, irq, nmi, hist, eval <expr>",
    " load <file> [addr], labels <file>",
    " connect/cnct [host[:port]], disconnect, pause, sync, vice <command>",
    " history, help/cmd, q",
    "Other monitor commands are forwarded to VICE when connected.",
];

/// Upper bound for `mem` lengths and `d` line counts: one full address space.
const MAX_VIEW: usize = 0x10000;

pub struct Console {
    machine: Machine,
    symbols: SharedSymbols,
    config: DebuggerConfig,
    vice: Option<ViceClient>,
    vice_tx: Sender<ViceEvent>,
    vice_rx: Receiver<ViceEvent>,
    disasm: DisasmOptions,
    history: Vec<String>,
}

fn parse_count(arg: Option<&str>) -> anyhow::Result<u64> {
    match arg {
        Some(s) => s
            .parse()
            .with_context(|| format!("bad count '{}'", s)),
        None => Ok(0),
    }
}

fn view_size(value: usize, what: &str) -> anyhow::Result<usize> {
    if value > MAX_VIEW {
        bail!("{} too large: {} (max {})", what, value, MAX_VIEW);
    }
    Ok(value)
}

fn parse_id(arg: Option<&str>) -> anyhow::Result<u32> {
    let s = arg.context("missing breakpoint id")?;
    s.parse().with_context(|| format!("bad breakpoint id '{}'", s))
}

fn describe_stop(reason: StopReason, regs: &Registers) -> String {
    match reason {
        StopReason::Breakpoint(id) => format!("Breakpoint {} at ${:04x}", id, regs.pc),
        StopReason::Watch(id) => format!("Watch {} hit at ${:04x}", id, regs.pc),
        StopReason::Target => format!("Reached ${:04x}", regs.pc),
        StopReason::Limit => format!("Stopped at ${:04x}", regs.pc),
        StopReason::Jammed => format!("CPU jammed at ${:04x}", regs.pc),
        StopReason::NoHistory => "No more history".to_string(),
        StopReason::Requested => format!("Stopped by request at ${:04x}", regs.pc),
    }
}

fn describe_breakpoint(bp: &Breakpoint) -> String {
    let mut line = format!("{:3}: {:<5} ${:04x}", bp.id, bp.kind.name(), bp.address);
    if bp.end != bp.address {
        line.push_str(&format!("-${:04x}", bp.end));
    }
    if bp.disabled {
        line.push_str(" disabled");
    }
    if bp.condition.is_some() {
        line.push_str(" if");
    }
    if let Some(index) = bp.external_index {
        line.push_str(&format!(" (vice {})", index));
    }
    line
}

impl Console {
    pub fn new(config: DebuggerConfig) -> Self {
        let (vice_tx, vice_rx) = mpsc::channel();
        Self {
            machine: Machine::new(config.run_settings()),
            symbols: Arc::new(Mutex::new(SymbolMap::default())),
            config,
            vice: None,
            vice_tx,
            vice_rx,
            disasm: DisasmOptions {
                show_bytes: true,
                illegals: false,
                show_labels: true,
            },
            history: Vec::new(),
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn symbols(&self) -> &SharedSymbols {
        &self.symbols
    }

    pub fn is_connected(&self) -> bool {
        self.vice.as_ref().is_some_and(ViceClient::is_connected)
    }

    /// Evaluates an expression against the current machine state.
    pub fn evaluate(&self, text: &str) -> anyhow::Result<i64> {
        let code = {
            let symbols = lock(&self.symbols);
            compile_with_symbols(text, Some(&*symbols))?
        };
        let eval = self.machine.evaluator();
        Ok(self
            .machine
            .with_core(|core| eval.eval(&code, &EvalContext::new(&core.regs, &core.memory))))
    }

    /// Bare hex (`c000`, `$c000`) or any expression.
    pub fn parse_address(&self, text: &str) -> anyhow::Result<u16> {
        let digits = text.strip_prefix('$').unwrap_or(text);
        if !digits.is_empty() && digits.len() <= 4 && digits.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Ok(u16::from_str_radix(digits, 16)?);
        }
        let value = self.evaluate(text)?;
        u16::try_from(value).with_context(|| format!("address out of range: {}", value))
    }

    fn address_arg(&self, arg: Option<&str>) -> anyhow::Result<u16> {
        self.parse_address(arg.context("missing address")?)
    }

    fn status_line(&self) -> String {
        let (regs, cycles, next, reference) = self.machine.with_core(|core| {
            let symbols = lock(&self.symbols);
            let next = disassemble(&core.memory, core.regs.pc, self.disasm, Some(&*symbols));
            let reference = instruction_reference(&core.memory, &core.regs, core.regs.pc);
            (core.regs, core.cycles, next.text, reference)
        });
        format!(
            "{} CYC={}  {:04x} {} {}",
            regs,
            cycles,
            regs.pc,
            next,
            reference
        )
        .trim_end()
        .to_string()
    }

    fn report(&self, result: StepResult) -> Vec<String> {
        match result {
            StepResult::Done => vec![self.status_line()],
            StepResult::Running => vec!["Running...".to_string()],
            StepResult::Busy => vec!["CPU is running, 'stop' first".to_string()],
            StepResult::Stopped(reason) => {
                let regs = self.machine.registers();
                vec![describe_stop(reason, &regs), self.status_line()]
            }
        }
    }

    /// Output from background activity since the last call: run completions
    /// and VICE monitor output.
    pub fn poll(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(RunEvent::Stopped { reason, regs }) = self.machine.poll_event() {
            out.push(describe_stop(reason, &regs));
            out.push(self.status_line());
        }
        while let Ok(event) = self.vice_rx.try_recv() {
            match event {
                ViceEvent::Connected => out.push("<VICE connected>".to_string()),
                ViceEvent::Disconnected(reason) => {
                    out.push(format!("<VICE disconnected: {}>", reason));
                    self.vice = None;
                }
                ViceEvent::Log(text) => out.extend(text.lines().map(str::to_string)),
                ViceEvent::Synced => out.push("<VICE synchronized>".to_string()),
            }
        }
        out
    }

    /// Blocks until a background run started by `go`/`reverse` ends.
    pub fn wait(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(RunEvent::Stopped { reason, regs }) = self.machine.wait() {
            out.push(describe_stop(reason, &regs));
            out.push(self.status_line());
        }
        out.extend(self.poll());
        out
    }

    pub fn load_file(&self, path: &Path, addr: Option<u16>) -> anyhow::Result<(u16, usize)> {
        let data =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let (addr, bytes) = match addr {
            Some(addr) => (addr, &data[..]),
            None => {
                if data.len() < 2 {
                    bail!("{} has no load address", path.display());
                }
                (u16::from_le_bytes([data[0], data[1]]), &data[2..])
            }
        };
        self.machine.load(addr, bytes);
        self.machine.reset_undo();
        if let Some(vice) = &self.vice {
            vice.send_memory_range(addr, bytes.len());
        }
        log::info!("Loaded {} bytes at ${:04x} from {}", bytes.len(), addr, path.display());
        Ok((addr, bytes.len()))
    }

    pub fn load_labels(&self, path: &Path) -> anyhow::Result<usize> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut symbols = lock(&self.symbols);
        import_vice_labels(&content, &mut *symbols)
            .with_context(|| format!("Failed to import labels from {}", path.display()))
    }

    pub fn connect(&mut self, address: &str) -> anyhow::Result<()> {
        if self.is_connected() {
            bail!("already connected");
        }
        let client = ViceClient::connect(
            address,
            self.machine.handle(),
            Arc::clone(&self.symbols),
            self.config.accept_vice_symbols,
            self.vice_tx.clone(),
        )?;
        self.vice = Some(client);
        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.machine.stop();
        self.machine.wait();
        if let Some(mut vice) = self.vice.take() {
            vice.shutdown();
        }
    }

    /// Runs one console line and returns its output.
    pub fn execute(&mut self, line: &str) -> Vec<String> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }
        if let Some(pos) = self.history.iter().position(|h| h.eq_ignore_ascii_case(line)) {
            self.history.remove(pos);
        }
        self.history.push(line.to_string());

        match self.run(line) {
            Ok(out) => out,
            Err(e) => vec![format!("[error] {:#}", e)],
        }
    }

    fn run(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        let mut words = line.split_whitespace();
        let cmd = words.next().unwrap_or("").to_ascii_lowercase();
        let args: Vec<&str> = words.collect();
        let arg = |i: usize| args.get(i).copied();
        let rest = line[cmd.len()..].trim();
        let m = &self.machine;

        let out = match cmd.as_str() {
            "step" | "s" => self.report(m.step()),
            "back" | "b" => self.report(m.step_back()),
            "over" | "o" => self.report(m.step_over()),
            "overback" | "ob" => self.report(m.step_over_back()),
            "go" | "g" => self.report(m.go(parse_count(arg(0))?)),
            "reverse" | "rev" => self.report(m.reverse(parse_count(arg(0))?)),
            "runto" => {
                let addr = self.address_arg(arg(0))?;
                self.report(self.machine.run_to(addr))
            }
            "revto" => {
                let addr = self.address_arg(arg(0))?;
                self.report(self.machine.reverse_to(addr))
            }
            "stop" => {
                m.stop();
                Vec::new()
            }
            "regs" | "r" => vec![self.status_line()],
            "reg" => self.set_register(rest)?,
            "mem" | "m" => {
                let addr = self.address_arg(arg(0))?;
                let len = match arg(1) {
                    Some(n) => usize::from_str_radix(n.trim_start_matches('$'), 16)
                        .with_context(|| format!("bad length '{}'", n))?,
                    None => 0x40,
                };
                let len = view_size(len, "length")?;
                self.memory_dump(addr, len)
            }
            "d" | "disasm" => {
                let addr = match arg(0) {
                    Some(a) => self.parse_address(a)?,
                    None => m.registers().pc,
                };
                let count = match arg(1) {
                    Some(n) => n.parse().with_context(|| format!("bad count '{}'", n))?,
                    None => 16,
                };
                let count = view_size(count, "count")?;
                self.disassembly(addr, count)
            }
            "asm" | "a" => {
                let addr = self.address_arg(arg(0))?;
                let text = rest.get(arg(0).map_or(0, str::len)..).unwrap_or("").trim();
                let size = m
                    .with_core(|core| assemble(text, addr, &mut core.memory))
                    .with_context(|| format!("cannot assemble '{}'", text))?;
                if let Some(vice) = &self.vice {
                    vice.send_memory_range(addr, size as usize);
                }
                self.disassembly(addr, 1)
            }
            "bp" => {
                let addr = self.address_arg(arg(0))?;
                let id = m.with_breakpoints(|b| b.set_pc(addr)).context("breakpoint table full")?;
                if let Some(vice) = &self.vice {
                    vice.set_breakpoint(addr);
                }
                vec![format!("Breakpoint {} at ${:04x}", id, addr)]
            }
            "tbp" => {
                let addr = self.address_arg(arg(0))?;
                let (removed, index) = m.with_breakpoints(|b| {
                    let index = b.find_pc(addr).and_then(|bp| bp.external_index);
                    (b.toggle(addr), index)
                });
                match removed {
                    Some(id) => {
                        if let (Some(vice), Some(index)) = (&self.vice, index) {
                            vice.delete_breakpoint(index);
                        }
                        vec![format!("Removed breakpoint {}", id)]
                    }
                    None => {
                        if let Some(vice) = &self.vice {
                            vice.set_breakpoint(addr);
                        }
                        vec![format!("Breakpoint set at ${:04x}", addr)]
                    }
                }
            }
            "cbp" => {
                let addr = self.address_arg(arg(0))?;
                let removed = m.with_breakpoints(|b| b.clear_pc(addr));
                if let Some(vice) = &self.vice {
                    for index in removed.iter().filter_map(|bp| bp.external_index) {
                        vice.delete_breakpoint(index);
                    }
                }
                Vec::new()
            }
            "watch" => self.add_watch(&args)?,
            "en" | "enable" | "dis" | "disable" => {
                let id = parse_id(arg(0))?;
                let enable = cmd.starts_with("en");
                if !m.with_breakpoints(|b| b.get(id).is_some()) {
                    bail!("no breakpoint {}", id);
                }
                m.with_breakpoints(|b| b.enable(id, enable));
                Vec::new()
            }
            "del" | "delete" => {
                let id = parse_id(arg(0))?;
                let removed = m
                    .with_breakpoints(|b| b.remove(id))
                    .with_context(|| format!("no breakpoint {}", id))?;
                if let (Some(vice), Some(index)) = (&self.vice, removed.external_index) {
                    vice.delete_breakpoint(index);
                }
                Vec::new()
            }
            "cond" | "condition" => {
                let id = parse_id(arg(0))?;
                let expr = rest.get(arg(0).map_or(0, str::len)..).unwrap_or("").trim();
                if expr.is_empty() {
                    m.with_breakpoints(|b| b.clear_condition(id));
                } else {
                    let code = {
                        let symbols = lock(&self.symbols);
                        compile_with_symbols(expr, Some(&*symbols))?
                    };
                    if !m.with_breakpoints(|b| b.set_condition(id, &code)) {
                        bail!("cannot set condition on breakpoint {}", id);
                    }
                }
                Vec::new()
            }
            "bps" => m.with_breakpoints(|b| b.iter().map(describe_breakpoint).collect::<Vec<_>>()),
            "reset" => self.report(m.reset()),
            "irq" => self.report(m.irq()),
            "nmi" => self.report(m.nmi()),
            "hist" => {
                let (count, max) = m.history_count();
                vec![format!("History {} of {} steps", count, max)]
            }
            "eval" => {
                let value = self.evaluate(rest)?;
                vec![format!("= ${:x} ({})", value, value)]
            }
            "load" => {
                let path = arg(0).context("missing file name")?;
                let addr = arg(1).map(|a| self.parse_address(a)).transpose()?;
                let (addr, len) = self.load_file(Path::new(path), addr)?;
                vec![format!("Loaded ${:x} bytes at ${:04x}", len, addr)]
            }
            "labels" => {
                let count = self.load_labels(Path::new(arg(0).context("missing file name")?))?;
                vec![format!("Imported {} labels", count)]
            }
            "connect" | "cnct" => {
                let address = match arg(0) {
                    None => self.config.vice_address(),
                    Some(a) if a.contains(':') => a.to_string(),
                    Some(host) => format!("{}:{}", host, self.config.vice_port),
                };
                self.connect(&address)?;
                Vec::new()
            }
            "disconnect" => {
                if let Some(mut vice) = self.vice.take() {
                    vice.shutdown();
                }
                Vec::new()
            }
            "pause" => {
                self.vice_client()?.request_break();
                Vec::new()
            }
            "sync" => {
                self.vice_client()?.request_sync();
                vec!["Syncing machine state with VICE".to_string()]
            }
            "vice" => {
                self.vice_client()?.send(rest);
                Vec::new()
            }
            "history" => self
                .history
                .iter()
                .enumerate()
                .map(|(i, h)| format!("{:3}: {}", i, h))
                .collect(),
            "help" | "cmd" | "commands" => HELP.iter().map(|s| s.to_string()).collect(),
            _ if is_vice_command(line) => {
                self.vice_client()?.send(line);
                Vec::new()
            }
            _ => bail!("Unknown command: '{}'", line),
        };
        Ok(out)
    }

    fn vice_client(&self) -> anyhow::Result<&ViceClient> {
        match &self.vice {
            Some(vice) if vice.is_connected() => Ok(vice),
            _ => bail!("Vice is not connected"),
        }
    }

    fn set_register(&self, assignment: &str) -> anyhow::Result<Vec<String>> {
        let (name, value) = assignment
            .split_once('=')
            .context("expected <name>=<value>")?;
        let value = self.parse_address(value.trim())?;
        let mut regs = self.machine.registers();
        let reg = match name.trim().to_ascii_lowercase().as_str() {
            "pc" => {
                regs.pc = value;
                ViceRegister::Pc
            }
            "a" => {
                regs.a = value as u8;
                ViceRegister::A
            }
            "x" => {
                regs.x = value as u8;
                ViceRegister::X
            }
            "y" => {
                regs.y = value as u8;
                ViceRegister::Y
            }
            "s" | "sp" => {
                regs.s = value as u8;
                ViceRegister::Sp
            }
            "p" | "fl" => {
                regs.p = crate::cpu::Status::from_bits_retain(value as u8);
                ViceRegister::Flags
            }
            other => bail!("unknown register '{}'", other),
        };
        self.machine.set_registers(regs);
        if let Some(vice) = &self.vice {
            vice.set_register(reg, value);
        }
        Ok(vec![self.status_line()])
    }

    fn add_watch(&self, args: &[&str]) -> anyhow::Result<Vec<String>> {
        let range = args.first().context("missing address")?;
        let (start, end) = match range.split_once('-') {
            Some((a, b)) => (self.parse_address(a)?, self.parse_address(b)?),
            None => {
                let a = self.parse_address(range)?;
                (a, a)
            }
        };
        let kind = match args.get(1).map(|s| s.to_ascii_lowercase()) {
            Some(k) if k.starts_with('r') => BreakpointKind::WatchRead,
            _ => BreakpointKind::WatchStore,
        };
        let id = self
            .machine
            .with_breakpoints(|b| b.set_watch(start, end, kind))
            .context("breakpoint table full")?;
        Ok(vec![format!(
            "Watch {} on ${:04x}-${:04x} ({})",
            id,
            start,
            end,
            kind.name()
        )])
    }

    fn memory_dump(&self, addr: u16, len: usize) -> Vec<String> {
        let bytes = self.machine.read_memory(addr, len);
        bytes
            .chunks(16)
            .enumerate()
            .map(|(i, row)| {
                let hex: Vec<String> = row.iter().map(|b| format!("{:02x}", b)).collect();
                let chars: String = row
                    .iter()
                    .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
                    .collect();
                format!(
                    "{:04x}  {:<48}  {}",
                    addr.wrapping_add((i * 16) as u16),
                    hex.join(" "),
                    chars
                )
            })
            .collect()
    }

    fn disassembly(&self, addr: u16, count: usize) -> Vec<String> {
        self.machine.with_core(|core| {
            let symbols = lock(&self.symbols);
            let mut out = Vec::with_capacity(count);
            let mut pc = addr;
            for _ in 0..count {
                let d = disassemble(&core.memory, pc, self.disasm, Some(&*symbols));
                let label = symbols
                    .get_symbol(pc)
                    .map(|l| format!("{}:", l))
                    .unwrap_or_default();
                out.push(format!("{:04x} {:<12}{}", pc, label, d.text));
                pc = pc.wrapping_add(d.bytes as u16);
            }
            out
        })
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        self.shutdown();
    }
}
