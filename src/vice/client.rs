use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Context;

use super::commands::is_vice_command;
use super::protocol::{ViceRegister, format_break, format_delete, format_memory_patch, format_register};
use super::session::Session;
use super::state::{ConnectionState, ViceEvent, ViceShared};
use crate::cpu::Registers;
use crate::machine::{MachineHandle, lock};
use crate::symbols::SharedSymbols;

const RECEIVE_TIMEOUT: Duration = Duration::from_millis(100);
const RECEIVE_SIZE: usize = 4096;
const SHUTDOWN_WAIT: Duration = Duration::from_secs(2);

pub struct ViceClient {
    shared: Arc<ViceShared>,
    target: MachineHandle,
    stream: TcpStream,
    thread: Option<JoinHandle<()>>,
}

impl ViceClient {
    /// Connects to VICE's text monitor (`-remotemonitor`) and starts the
    /// socket thread. Monitor output and connection changes go to `events`.
    pub fn connect(
        addr: &str,
        target: MachineHandle,
        symbols: SharedSymbols,
        accept_symbols: bool,
        events: Sender<ViceEvent>,
    ) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr)
            .with_context(|| format!("Failed to connect to VICE at {}", addr))?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(RECEIVE_TIMEOUT))?;

        let shared = Arc::new(ViceShared::new(accept_symbols));
        shared.connected.store(true, Ordering::SeqCst);

        let session = Session::new(Arc::clone(&shared), target.clone(), symbols, events.clone());
        let thread_stream = stream.try_clone()?;
        let thread_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("vice".to_string())
            .spawn(move || connection_thread(thread_stream, session, thread_shared, events))?;

        log::info!("Connected to VICE at {}", addr);
        Ok(Self {
            shared,
            target,
            stream,
            thread: Some(thread),
        })
    }

    pub fn shared(&self) -> &Arc<ViceShared> {
        &self.shared
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn is_syncing(&self) -> bool {
        self.shared.is_syncing()
    }

    /// Queues a raw monitor command.
    pub fn send(&self, cmd: &str) {
        if self.is_connected() {
            self.shared.enqueue(cmd);
        }
    }

    /// Queues `line` if its command word is a known monitor command.
    pub fn send_command(&self, line: &str) -> bool {
        if !is_vice_command(line) {
            return false;
        }
        self.send(line);
        true
    }

    pub fn set_memory(&self, addr: u16, bytes: &[u8]) {
        for line in format_memory_patch(addr, bytes) {
            self.send(&line);
        }
    }

    /// Pushes local memory `addr..addr+len` to VICE.
    pub fn send_memory_range(&self, addr: u16, len: usize) {
        let bytes = lock(&self.target.core).memory.slice(addr, len);
        self.set_memory(addr, &bytes);
    }

    pub fn set_register(&self, reg: ViceRegister, value: u16) {
        self.send(&format_register(reg, value));
    }

    pub fn set_registers(&self, regs: &Registers) {
        self.set_register(ViceRegister::Pc, regs.pc);
        self.set_register(ViceRegister::A, regs.a as u16);
        self.set_register(ViceRegister::X, regs.x as u16);
        self.set_register(ViceRegister::Y, regs.y as u16);
        self.set_register(ViceRegister::Sp, regs.s as u16);
        self.set_register(ViceRegister::Flags, regs.p.bits() as u16);
    }

    pub fn resume(&self) {
        self.send("x");
    }

    /// Asks a running target to enter the monitor.
    pub fn request_break(&self) {
        self.shared.stop_request.store(true, Ordering::SeqCst);
    }

    pub fn request_sync(&self) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.shared.sync_request.store(true, Ordering::SeqCst);
        true
    }

    pub fn set_breakpoint(&self, addr: u16) {
        self.send(&format_break(addr));
    }

    pub fn delete_breakpoint(&self, index: u32) {
        self.send(&format_delete(index));
    }

    pub fn set_accept_symbols(&self, accept: bool) {
        self.shared.accept_symbols.store(accept, Ordering::SeqCst);
    }

    pub fn accepts_symbols(&self) -> bool {
        self.shared.accepts_symbols()
    }

    /// Lets VICE run on before disconnecting, so it is not left stuck in
    /// the monitor.
    pub fn shutdown(&mut self) {
        if self.is_connected() && !self.shared.target_running.load(Ordering::SeqCst) {
            self.resume();
            let start = Instant::now();
            while self.is_connected()
                && self.state() != ConnectionState::Running
                && start.elapsed() < SHUTDOWN_WAIT
            {
                thread::sleep(RECEIVE_TIMEOUT);
            }
        }
        self.close();
    }

    pub fn close(&mut self) {
        self.shared.connected.store(false, Ordering::SeqCst);
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            log::error!("VICE thread panicked");
        }
    }
}

impl Drop for ViceClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn connection_thread(
    mut stream: TcpStream,
    mut session: Session,
    shared: Arc<ViceShared>,
    events: Sender<ViceEvent>,
) {
    let _ = events.send(ViceEvent::Connected);
    let mut buffer = [0u8; RECEIVE_SIZE];

    let reason = loop {
        if !shared.is_connected() {
            break "Disconnected".to_string();
        }
        if shared.close_request.load(Ordering::SeqCst) && shared.pending_commands() == 0 {
            break "Connection closed".to_string();
        }

        if let Some(cmd) = session.take_command() {
            log::trace!("VICE <- {}", cmd.trim_end());
            if let Err(e) = stream.write_all(cmd.as_bytes()) {
                break e.to_string();
            }
        }

        let reply = match stream.read(&mut buffer) {
            Ok(0) => break "Connection closed".to_string(),
            Ok(n) => session.feed(&buffer[..n]),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                session.on_idle().unwrap_or_default().to_string()
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => String::new(),
            Err(e) => break e.to_string(),
        };
        if !reply.is_empty() {
            log::trace!("VICE <- {}", reply.trim_end());
            if let Err(e) = stream.write_all(reply.as_bytes()) {
                break e.to_string();
            }
        }
    };

    shared.connected.store(false, Ordering::SeqCst);
    shared.monitor_on.store(false, Ordering::SeqCst);
    shared.set_state(ConnectionState::Disconnected);
    let _ = stream.shutdown(Shutdown::Both);
    log::info!("VICE connection lost: {}", reason);
    let _ = events.send(ViceEvent::Disconnected(reason));
}
