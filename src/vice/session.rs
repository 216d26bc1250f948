//! Monitor protocol state machine. Consumes received bytes, applies what
//! VICE reports to the machine, breakpoints and symbols, and returns the
//! bytes to send back. Owns no socket.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc::Sender;

use super::protocol::{
    BUNDLE, LineAssembler, LineEvent, MonitorLine, RegisterDump, STOP_COMMAND, is_resume_command,
};
use super::state::{ConnectionState, ViceEvent, ViceShared};
use crate::breakpoints::BreakpointKind;
use crate::cpu::Status;
use crate::machine::{MachineHandle, lock};
use crate::symbols::SharedSymbols;

pub struct Session {
    shared: Arc<ViceShared>,
    target: MachineHandle,
    symbols: SharedSymbols,
    events: Sender<ViceEvent>,
    assembler: LineAssembler,
    state: ConnectionState,
    /// Trace header waiting for its continuation line.
    trace: Option<String>,
    reload_symbols: bool,
}

impl Session {
    pub fn new(
        shared: Arc<ViceShared>,
        target: MachineHandle,
        symbols: SharedSymbols,
        events: Sender<ViceEvent>,
    ) -> Self {
        shared.set_state(ConnectionState::AwaitingMonitor);
        Self {
            shared,
            target,
            symbols,
            events,
            assembler: LineAssembler::new(),
            state: ConnectionState::AwaitingMonitor,
            trace: None,
            reload_symbols: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            log::debug!("VICE: {} -> {}", self.state, state);
        }
        self.state = state;
        self.shared.set_state(state);
    }

    fn emit(&self, event: ViceEvent) {
        let _ = self.events.send(event);
    }

    /// Processes received bytes. Returns anything that must be sent in
    /// response, usually empty.
    pub fn feed(&mut self, bytes: &[u8]) -> String {
        let mut out = String::new();
        for &b in bytes {
            if let Some(event) = self.assembler.push(b) {
                self.handle(event, &mut out);
            }
        }
        out
    }

    fn handle(&mut self, event: LineEvent, out: &mut String) {
        if let Some(mut trace) = self.trace.take() {
            match event {
                LineEvent::Line(text) => {
                    trace.push('\n');
                    trace.push_str(&text);
                    self.emit(ViceEvent::Log(trace));
                }
                LineEvent::Prompt(addr) => {
                    trace.push_str(&format!("(C:${:04x})", addr));
                    self.trace = Some(trace);
                }
            }
            return;
        }
        if let LineEvent::Line(text) = &event
            && text.starts_with('#')
        {
            self.trace = Some(text.clone());
            return;
        }
        if self.state == ConnectionState::Running {
            // any output from a running target means it stopped
            out.push_str(self.begin_sync());
            return;
        }
        match event {
            LineEvent::Line(text) => {
                if self.state != ConnectionState::Syncing && !text.trim().is_empty() {
                    self.emit(ViceEvent::Log(text.trim().to_string()));
                }
                self.apply(MonitorLine::parse(&text));
            }
            LineEvent::Prompt(_) => match self.state {
                ConnectionState::ReturnPending => {
                    self.set_state(ConnectionState::WaitingForCommand)
                }
                ConnectionState::AwaitingMonitor => out.push_str(self.begin_sync()),
                _ => {}
            },
        }
    }

    fn apply(&mut self, line: MonitorLine) {
        match line {
            MonitorLine::MemoryDump { address, bytes } => {
                let mut finished = false;
                {
                    let mut core = lock(&self.target.core);
                    let mut addr = address;
                    for b in bytes {
                        core.memory.set(addr, b);
                        addr = addr.wrapping_add(1);
                        if addr == 0 && self.state == ConnectionState::Syncing {
                            finished = true;
                        }
                    }
                }
                if finished {
                    self.finish_sync();
                }
            }
            MonitorLine::Registers(dump) => self.apply_registers(dump),
            MonitorLine::Symbol { address, name } => {
                if self.shared.accepts_symbols() {
                    let mut symbols = lock(&self.symbols);
                    if self.reload_symbols {
                        symbols.clear();
                        self.reload_symbols = false;
                    }
                    symbols.add_symbol(address, &name);
                }
            }
            MonitorLine::Break {
                index,
                address,
                disabled,
            } => {
                lock(&self.target.breakpoints).apply_monitor_breakpoint(
                    index,
                    address,
                    address,
                    BreakpointKind::Break,
                    disabled,
                );
            }
            MonitorLine::Watch {
                index,
                address,
                end,
                store,
                disabled,
            } => {
                let kind = if store {
                    BreakpointKind::WatchStore
                } else {
                    BreakpointKind::WatchRead
                };
                lock(&self.target.breakpoints)
                    .apply_monitor_breakpoint(index, address, end, kind, disabled);
            }
            MonitorLine::TraceStart | MonitorLine::Other => {}
        }
    }

    fn apply_registers(&self, dump: RegisterDump) {
        let mut core = lock(&self.target.core);
        let regs = &mut core.regs;
        if let Some(pc) = dump.pc {
            regs.pc = pc;
        }
        if let Some(a) = dump.a {
            regs.a = a;
        }
        if let Some(x) = dump.x {
            regs.x = x;
        }
        if let Some(y) = dump.y {
            regs.y = y;
        }
        if let Some(s) = dump.s {
            regs.s = s;
        }
        if let Some(p) = dump.p {
            regs.p = Status::from_bits_retain(p);
        }
    }

    /// Drops monitor-tagged breakpoints and returns the bundle that pulls the
    /// whole machine state again.
    pub fn begin_sync(&mut self) -> &'static str {
        lock(&self.target.breakpoints).clear_external();
        self.shared.monitor_on.store(true, Ordering::SeqCst);
        self.shared.target_running.store(false, Ordering::SeqCst);
        self.reload_symbols = true;
        self.assembler.reset();
        self.set_state(ConnectionState::Syncing);
        BUNDLE
    }

    fn finish_sync(&mut self) {
        self.reload_symbols = false;
        {
            let mut core = lock(&self.target.core);
            core.sandbox = false;
            // history from before the sync no longer matches memory
            core.reset_undo();
        }
        self.set_state(ConnectionState::WaitingForCommand);
        log::info!("VICE state synchronized");
        self.emit(ViceEvent::Synced);
    }

    /// Next queued command to send, if the monitor is ready for one. Asks for
    /// a stop when commands wait on a running target.
    pub fn take_command(&mut self) -> Option<String> {
        let mut cmd = None;
        if self.shared.pending_commands() > 0 {
            if self.shared.monitor_on.load(Ordering::SeqCst) {
                if self.state == ConnectionState::WaitingForCommand {
                    cmd = self.shared.pop_command();
                    if let Some(c) = &cmd {
                        if is_resume_command(c) {
                            self.shared.target_running.store(true, Ordering::SeqCst);
                        } else {
                            self.set_state(ConnectionState::ReturnPending);
                        }
                    }
                }
            } else {
                self.shared.stop_request.store(true, Ordering::SeqCst);
            }
        }
        if self.shared.target_running.load(Ordering::SeqCst) && self.shared.pending_commands() == 0
        {
            self.shared.monitor_on.store(false, Ordering::SeqCst);
            self.assembler.reset();
            self.set_state(ConnectionState::Running);
        }
        cmd
    }

    /// Called when a receive timed out: delivers pending stop and sync
    /// requests.
    pub fn on_idle(&mut self) -> Option<&'static str> {
        if matches!(
            self.state,
            ConnectionState::AwaitingMonitor | ConnectionState::Running
        ) && self.shared.stop_request.swap(false, Ordering::SeqCst)
        {
            self.assembler.reset();
            return Some(STOP_COMMAND);
        }
        if self.shared.sync_request.swap(false, Ordering::SeqCst) {
            return Some(self.begin_sync());
        }
        None
    }
}
