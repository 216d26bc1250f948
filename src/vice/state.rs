use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::protocol::{is_quit_command, is_resume_command};
use crate::machine::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Connected, waiting for the first monitor prompt.
    AwaitingMonitor,
    /// Target resumed; the monitor is closed.
    Running,
    /// Bundle sent, waiting for the memory dump to complete.
    Syncing,
    WaitingForCommand,
    /// One queued command sent, waiting for its prompt.
    ReturnPending,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::AwaitingMonitor => "Awaiting monitor",
            ConnectionState::Running => "Running",
            ConnectionState::Syncing => "Syncing",
            ConnectionState::WaitingForCommand => "Stopped",
            ConnectionState::ReturnPending => "Command pending",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViceEvent {
    Connected,
    Disconnected(String),
    /// Monitor output worth showing to the user, including trace blocks.
    Log(String),
    /// A full resync finished; local state matches VICE.
    Synced,
}

/// State shared between the client API and the socket thread.
#[derive(Debug, Default)]
pub struct ViceShared {
    queue: Mutex<VecDeque<String>>,
    state: Mutex<ConnectionState>,
    pub(crate) connected: AtomicBool,
    pub(crate) close_request: AtomicBool,
    /// Set when a resume command is queued, cleared on the next sync.
    pub(crate) target_running: AtomicBool,
    pub(crate) monitor_on: AtomicBool,
    pub(crate) stop_request: AtomicBool,
    pub(crate) sync_request: AtomicBool,
    pub(crate) accept_symbols: AtomicBool,
}

impl ViceShared {
    pub fn new(accept_symbols: bool) -> Self {
        Self {
            accept_symbols: AtomicBool::new(accept_symbols),
            ..Self::default()
        }
    }

    /// Queues one command line, appending the newline if missing.
    pub fn enqueue(&self, cmd: &str) {
        if cmd.is_empty() {
            return;
        }
        if is_resume_command(cmd) {
            self.target_running.store(true, Ordering::SeqCst);
        } else if is_quit_command(cmd) {
            self.close_request.store(true, Ordering::SeqCst);
        }
        let mut line = cmd.to_string();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        lock(&self.queue).push_back(line);
    }

    pub(crate) fn pop_command(&self) -> Option<String> {
        lock(&self.queue).pop_front()
    }

    pub fn pending_commands(&self) -> usize {
        lock(&self.queue).len()
    }

    pub fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *lock(&self.state) = state;
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Target executing with the monitor closed.
    pub fn is_running(&self) -> bool {
        self.is_connected() && !self.monitor_on.load(Ordering::SeqCst)
    }

    pub fn is_syncing(&self) -> bool {
        self.is_connected() && self.state() == ConnectionState::Syncing
    }

    pub fn accepts_symbols(&self) -> bool {
        self.accept_symbols.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_flags() {
        let shared = ViceShared::new(true);
        shared.enqueue("m 0400 0410");
        assert!(!shared.target_running.load(Ordering::SeqCst));
        shared.enqueue("x");
        assert!(shared.target_running.load(Ordering::SeqCst));
        shared.enqueue("quit\n");
        assert!(shared.close_request.load(Ordering::SeqCst));

        assert_eq!(shared.pending_commands(), 3);
        assert_eq!(shared.pop_command().as_deref(), Some("m 0400 0410\n"));
        assert_eq!(shared.pop_command().as_deref(), Some("x\n"));
        assert_eq!(shared.pop_command().as_deref(), Some("quit\n"));
        assert_eq!(shared.pop_command(), None);
    }

    #[test]
    fn test_running_requires_connection() {
        let shared = ViceShared::new(false);
        assert!(!shared.is_running());
        shared.connected.store(true, Ordering::SeqCst);
        assert!(shared.is_running());
        shared.monitor_on.store(true, Ordering::SeqCst);
        assert!(!shared.is_running());
    }
}
