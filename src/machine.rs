//! Execution scheduler: foreground stepping, the background run thread and
//! the shared machine state both of them (and the VICE bridge) operate on.
//!
//! Lock order is `core` before `breakpoints`. The background thread never
//! takes the breakpoint lock while holding the core; it works from a snapshot
//! that it refreshes between batches.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::breakpoints::{AccessKind, BreakpointTable, MemoryAccess};
use crate::cpu::Registers;
use crate::expr::{EvalContext, ExpressionEvaluator, StackEvaluator};
use crate::interpreter;
use crate::memory::{Bus, Memory};
use crate::undo::{DEFAULT_UNDO_CAPACITY, UndoLog};

pub const DEFAULT_CYCLES_PER_UPDATE: u64 = 8000;
pub const DEFAULT_STEP_BUDGET: u64 = 64;
pub const DEFAULT_STEP_OVER_LIMIT: u64 = 1_000_000;

/// Instructions the run thread executes per hold of the core lock.
const LOCK_SLICE: u32 = 256;

const JSR: u8 = 0x20;

pub(crate) fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    pub undo_capacity: usize,
    pub cycles_per_update: u64,
    pub step_over_budget: u64,
    /// Instruction limit for the background part of a step over.
    pub step_over_limit: u64,
    pub run_budget: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            undo_capacity: DEFAULT_UNDO_CAPACITY,
            cycles_per_update: DEFAULT_CYCLES_PER_UPDATE,
            step_over_budget: DEFAULT_STEP_BUDGET,
            step_over_limit: DEFAULT_STEP_OVER_LIMIT,
            run_budget: DEFAULT_STEP_BUDGET,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct History {
    pub count: u64,
    pub max: u64,
}

/// Accesses made by one instruction, for watch checks. Only the first few
/// are kept; no 6502 instruction makes more data accesses than fit.
#[derive(Debug, Clone, Copy)]
pub struct AccessLog {
    entries: [MemoryAccess; 8],
    len: usize,
}

impl Default for AccessLog {
    fn default() -> Self {
        Self {
            entries: [MemoryAccess {
                addr: 0,
                kind: AccessKind::Read,
            }; 8],
            len: 0,
        }
    }
}

impl AccessLog {
    fn push(&mut self, addr: u16, kind: AccessKind) {
        if self.len < self.entries.len() {
            self.entries[self.len] = MemoryAccess { addr, kind };
            self.len += 1;
        }
    }

    pub fn as_slice(&self) -> &[MemoryAccess] {
        &self.entries[..self.len]
    }
}

/// Bus handed to the interpreter for undoable execution: every write that
/// changes memory logs the old byte first.
struct StepBus<'a> {
    memory: &'a mut Memory,
    undo: &'a mut UndoLog,
    accesses: AccessLog,
}

impl Bus for StepBus<'_> {
    fn read(&mut self, addr: u16) -> u8 {
        self.accesses.push(addr, AccessKind::Read);
        self.memory.get(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.accesses.push(addr, AccessKind::Write);
        let old = self.memory.get(addr);
        if old != value {
            self.undo.record_byte_change(addr, old);
            self.memory.set(addr, value);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Irq,
    Nmi,
    Reset,
}

/// CPU state, memory and history, guarded as one unit.
#[derive(Debug)]
pub struct Core {
    pub regs: Registers,
    pub memory: Memory,
    pub undo: UndoLog,
    pub cycles: u64,
    pub history: History,
    /// Set once local execution has diverged from the external emulator.
    pub sandbox: bool,
}

impl Core {
    pub fn new(undo_capacity: usize) -> Self {
        Self {
            regs: Registers::default(),
            memory: Memory::new(),
            undo: UndoLog::new(undo_capacity),
            cycles: 0,
            history: History::default(),
            sandbox: true,
        }
    }

    fn advance(&mut self) {
        if !self.regs.is_jammed() {
            self.cycles += self.regs.t as u64;
        }
        self.history.count += 1;
        self.history.max = self.history.max.max(self.history.count);
    }

    /// Executes one undoable instruction. A jammed CPU stays put and
    /// records nothing.
    pub fn step(&mut self) -> AccessLog {
        if self.regs.is_jammed() {
            return AccessLog::default();
        }
        self.undo.record_step(self.regs);
        let mut bus = StepBus {
            memory: &mut self.memory,
            undo: &mut self.undo,
            accesses: AccessLog::default(),
        };
        self.regs = interpreter::step(self.regs, &mut bus);
        let accesses = bus.accesses;
        self.advance();
        accesses
    }

    /// Delivers an interrupt or reset as its own undoable step. Only reset
    /// gets a jammed CPU going again.
    pub fn interrupt(&mut self, kind: Interrupt) {
        if kind != Interrupt::Reset && self.regs.is_jammed() {
            return;
        }
        if kind == Interrupt::Irq && self.regs.flag(crate::cpu::Status::IRQ_DISABLE) {
            return;
        }
        self.undo.record_step(self.regs);
        let mut bus = StepBus {
            memory: &mut self.memory,
            undo: &mut self.undo,
            accesses: AccessLog::default(),
        };
        self.regs = match kind {
            Interrupt::Irq => interpreter::irq(self.regs, &mut bus),
            Interrupt::Nmi => interpreter::nmi(self.regs, &mut bus),
            Interrupt::Reset => interpreter::reset(self.regs, &mut bus),
        };
        self.advance();
    }

    pub fn step_back(&mut self) -> bool {
        if self
            .undo
            .step_back(&mut self.regs, &mut self.cycles, &mut self.memory)
        {
            self.history.count = self.history.count.saturating_sub(1);
            true
        } else {
            self.history.count = 0;
            false
        }
    }

    pub fn reset_undo(&mut self) {
        self.undo.reset();
        self.history = History::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Breakpoint(u32),
    Watch(u32),
    Target,
    Limit,
    Jammed,
    NoHistory,
    Requested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Done,
    /// Handed over to the background thread; completion arrives as a
    /// [`RunEvent`].
    Running,
    /// A background run is active.
    Busy,
    Stopped(StopReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Stopped { reason: StopReason, regs: Registers },
}

#[derive(Debug, Default)]
pub struct CancelToken(AtomicBool);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerState {
    Idle,
    SteppingForward,
    SteppingBackward,
    RunningForward,
    RunningBackward,
}

impl SchedulerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SchedulerState::SteppingForward,
            2 => SchedulerState::SteppingBackward,
            3 => SchedulerState::RunningForward,
            4 => SchedulerState::RunningBackward,
            _ => SchedulerState::Idle,
        }
    }
}

/// Flags shared between the caller and the background run thread.
#[derive(Debug, Default)]
pub struct RunControl {
    pub stop: CancelToken,
    irq: AtomicBool,
    nmi: AtomicBool,
    running: AtomicBool,
    state: AtomicU8,
}

/// Marks a foreground operation for [`Machine::state`]. Dropping it returns
/// to `Idle` unless a background run took over meanwhile.
struct Stepping<'a> {
    state: &'a AtomicU8,
    value: u8,
}

impl<'a> Stepping<'a> {
    fn enter(state: &'a AtomicU8, value: SchedulerState) -> Self {
        let value = value as u8;
        state.store(value, Ordering::SeqCst);
        Self { state, value }
    }
}

impl Drop for Stepping<'_> {
    fn drop(&mut self) {
        let _ = self.state.compare_exchange(
            self.value,
            SchedulerState::Idle as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy)]
struct RunRequest {
    direction: Direction,
    target: Option<u16>,
    limit: Option<u64>,
}

/// Shared handles the VICE bridge writes synchronized state through.
#[derive(Clone)]
pub struct MachineHandle {
    pub core: Arc<Mutex<Core>>,
    pub breakpoints: Arc<Mutex<BreakpointTable>>,
}

pub struct Machine {
    core: Arc<Mutex<Core>>,
    breakpoints: Arc<Mutex<BreakpointTable>>,
    evaluator: Arc<dyn ExpressionEvaluator + Send + Sync>,
    control: Arc<RunControl>,
    settings: RunSettings,
    worker: Mutex<Option<JoinHandle<()>>>,
    events_tx: Sender<RunEvent>,
    events_rx: Receiver<RunEvent>,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(RunSettings::default())
    }
}

fn check_stop(
    bps: &BreakpointTable,
    core: &Core,
    accesses: Option<&AccessLog>,
    eval: &dyn ExpressionEvaluator,
) -> Option<StopReason> {
    let ctx = EvalContext::new(&core.regs, &core.memory);
    if let Some(log) = accesses
        && let Some(id) = bps.find_watch(log.as_slice(), &ctx, eval)
    {
        return Some(StopReason::Watch(id));
    }
    bps.find_hit(core.regs.pc, &ctx, eval)
        .map(StopReason::Breakpoint)
}

impl Machine {
    pub fn new(settings: RunSettings) -> Self {
        Self::with_evaluator(settings, Arc::new(StackEvaluator))
    }

    pub fn with_evaluator(
        settings: RunSettings,
        evaluator: Arc<dyn ExpressionEvaluator + Send + Sync>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            core: Arc::new(Mutex::new(Core::new(settings.undo_capacity))),
            breakpoints: Arc::new(Mutex::new(BreakpointTable::new())),
            evaluator,
            control: Arc::new(RunControl::default()),
            settings,
            worker: Mutex::new(None),
            events_tx,
            events_rx,
        }
    }

    pub fn handle(&self) -> MachineHandle {
        MachineHandle {
            core: Arc::clone(&self.core),
            breakpoints: Arc::clone(&self.breakpoints),
        }
    }

    pub fn settings(&self) -> RunSettings {
        self.settings
    }

    pub fn evaluator(&self) -> &dyn ExpressionEvaluator {
        &*self.evaluator
    }

    pub fn is_running(&self) -> bool {
        self.control.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.control.state.load(Ordering::SeqCst))
    }

    fn forward(&self) -> Stepping<'_> {
        Stepping::enter(&self.control.state, SchedulerState::SteppingForward)
    }

    fn backward(&self) -> Stepping<'_> {
        Stepping::enter(&self.control.state, SchedulerState::SteppingBackward)
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        lock(&self.core)
    }

    pub fn with_breakpoints<R>(&self, f: impl FnOnce(&mut BreakpointTable) -> R) -> R {
        f(&mut lock(&self.breakpoints))
    }

    // Accessors

    pub fn registers(&self) -> Registers {
        self.core().regs
    }

    pub fn set_registers(&self, regs: Registers) {
        self.core().regs = regs;
    }

    pub fn cycles(&self) -> u64 {
        self.core().cycles
    }

    pub fn history_count(&self) -> (u64, u64) {
        let h = self.core().history;
        (h.count, h.max)
    }

    pub fn get_byte(&self, addr: u16) -> u8 {
        self.core().memory.get(addr)
    }

    /// Writes memory directly. Not recorded in the undo log.
    pub fn set_byte(&self, addr: u16, value: u8) {
        self.core().memory.set(addr, value);
    }

    pub fn load(&self, addr: u16, bytes: &[u8]) {
        self.core().memory.load(addr, bytes);
    }

    pub fn read_memory(&self, addr: u16, len: usize) -> Vec<u8> {
        self.core().memory.slice(addr, len)
    }

    /// Runs `f` with the core locked, for views that read several values
    /// consistently.
    pub fn with_core<R>(&self, f: impl FnOnce(&mut Core) -> R) -> R {
        f(&mut self.core())
    }

    pub fn memory_changed(&self) -> bool {
        self.core().memory.changed()
    }

    pub fn clear_memory_changed(&self) {
        self.core().memory.clear_changed();
    }

    pub fn reset_undo(&self) {
        self.core().reset_undo();
    }

    pub fn is_sandbox(&self) -> bool {
        self.core().sandbox
    }

    pub fn set_sandbox(&self, sandbox: bool) {
        self.core().sandbox = sandbox;
    }

    pub fn poll_event(&self) -> Option<RunEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Blocks until the background thread, if any, has finished and returns
    /// its stop event.
    pub fn wait(&self) -> Option<RunEvent> {
        let handle = lock(&self.worker).take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            log::error!("CPU thread panicked");
            self.control
                .state
                .store(SchedulerState::Idle as u8, Ordering::SeqCst);
            self.control.running.store(false, Ordering::SeqCst);
        }
        self.poll_event()
    }

    // Foreground execution

    fn check(&self, core: &Core, accesses: Option<&AccessLog>) -> Option<StopReason> {
        let bps = lock(&self.breakpoints);
        check_stop(&bps, core, accesses, &*self.evaluator)
    }

    pub fn step(&self) -> StepResult {
        if self.is_running() {
            return StepResult::Busy;
        }
        let _stepping = self.forward();
        let mut core = self.core();
        core.sandbox = true;
        core.step();
        if core.regs.is_jammed() {
            StepResult::Stopped(StopReason::Jammed)
        } else {
            StepResult::Done
        }
    }

    pub fn step_back(&self) -> StepResult {
        if self.is_running() {
            return StepResult::Busy;
        }
        let _stepping = self.backward();
        let mut core = self.core();
        core.sandbox = true;
        if core.step_back() {
            StepResult::Done
        } else {
            StepResult::Stopped(StopReason::NoHistory)
        }
    }

    /// Steps over a `jsr`: runs until the instruction after it, a breakpoint
    /// or the cycle budget, then continues in the background if needed.
    pub fn step_over(&self) -> StepResult {
        if self.is_running() {
            return StepResult::Busy;
        }
        let _stepping = self.forward();
        let mut core = self.core();
        core.sandbox = true;
        if core.memory.get(core.regs.pc) != JSR {
            drop(core);
            return self.step();
        }
        let ret = core.regs.pc.wrapping_add(3);
        let start = core.cycles;
        loop {
            let accesses = core.step();
            if core.regs.is_jammed() {
                return StepResult::Stopped(StopReason::Jammed);
            }
            if core.regs.pc == ret {
                return StepResult::Done;
            }
            if let Some(reason) = self.check(&core, Some(&accesses)) {
                return StepResult::Stopped(reason);
            }
            if core.cycles - start >= self.settings.step_over_budget {
                drop(core);
                return self.spawn(RunRequest {
                    direction: Direction::Forward,
                    target: Some(ret),
                    limit: Some(self.settings.step_over_limit.max(1)),
                });
            }
        }
    }

    /// Reverse of [`Machine::step_over`]: if the previous instruction was a
    /// `jsr`, steps back until the PC is on it again.
    pub fn step_over_back(&self) -> StepResult {
        if self.is_running() {
            return StepResult::Busy;
        }
        let _stepping = self.backward();
        let mut core = self.core();
        core.sandbox = true;
        let call = core.regs.pc.wrapping_sub(3);
        if core.memory.get(call) != JSR {
            drop(core);
            return self.step_back();
        }
        let start = core.cycles;
        loop {
            if !core.step_back() {
                return StepResult::Stopped(StopReason::NoHistory);
            }
            if core.regs.pc == call {
                return StepResult::Done;
            }
            if let Some(reason) = self.check(&core, None) {
                return StepResult::Stopped(reason);
            }
            if start.saturating_sub(core.cycles) >= self.settings.step_over_budget {
                if !core.undo.have_undo_step() {
                    return StepResult::Stopped(StopReason::NoHistory);
                }
                drop(core);
                return self.spawn(RunRequest {
                    direction: Direction::Backward,
                    target: Some(call),
                    limit: Some(self.settings.step_over_limit.max(1)),
                });
            }
        }
    }

    /// Runs forward `count` instructions, or until a breakpoint when
    /// `count` is 0.
    pub fn go(&self, count: u64) -> StepResult {
        self.run_forward(None, (count > 0).then_some(count))
    }

    pub fn run_to(&self, addr: u16) -> StepResult {
        self.run_forward(Some(addr), None)
    }

    fn run_forward(&self, target: Option<u16>, limit: Option<u64>) -> StepResult {
        if self.is_running() {
            return StepResult::Busy;
        }
        let _stepping = self.forward();
        let mut core = self.core();
        core.sandbox = true;
        let start = core.cycles;
        let mut remaining = limit;
        loop {
            if target == Some(core.regs.pc) {
                return StepResult::Stopped(StopReason::Target);
            }
            let accesses = core.step();
            if core.regs.is_jammed() {
                return StepResult::Stopped(StopReason::Jammed);
            }
            if let Some(n) = remaining.as_mut() {
                *n -= 1;
                if *n == 0 {
                    return StepResult::Stopped(StopReason::Limit);
                }
            }
            if let Some(reason) = self.check(&core, Some(&accesses)) {
                return StepResult::Stopped(reason);
            }
            if core.cycles - start > self.settings.run_budget {
                drop(core);
                return self.spawn(RunRequest {
                    direction: Direction::Forward,
                    target,
                    limit: remaining,
                });
            }
        }
    }

    /// Runs backward `count` instructions, or until a breakpoint or the start
    /// of recorded history when `count` is 0.
    pub fn reverse(&self, count: u64) -> StepResult {
        self.run_backward(None, (count > 0).then_some(count))
    }

    pub fn reverse_to(&self, addr: u16) -> StepResult {
        self.run_backward(Some(addr), None)
    }

    fn run_backward(&self, target: Option<u16>, limit: Option<u64>) -> StepResult {
        if self.is_running() {
            return StepResult::Busy;
        }
        let _stepping = self.backward();
        let mut core = self.core();
        core.sandbox = true;
        let start = core.cycles;
        let mut remaining = limit;
        loop {
            if !core.step_back() {
                return StepResult::Stopped(StopReason::NoHistory);
            }
            if let Some(n) = remaining.as_mut() {
                *n -= 1;
                if *n == 0 {
                    return StepResult::Stopped(StopReason::Limit);
                }
            }
            if let Some(reason) = self.check(&core, None) {
                return StepResult::Stopped(reason);
            }
            if target == Some(core.regs.pc) {
                return StepResult::Stopped(StopReason::Target);
            }
            if start.saturating_sub(core.cycles) > self.settings.run_budget {
                drop(core);
                return self.spawn(RunRequest {
                    direction: Direction::Backward,
                    target,
                    limit: remaining,
                });
            }
        }
    }

    /// Asks the background thread to stop at its next update point.
    pub fn stop(&self) {
        if self.is_running() {
            self.control.stop.cancel();
        }
    }

    pub fn reset(&self) -> StepResult {
        if self.is_running() {
            return StepResult::Busy;
        }
        let _stepping = self.forward();
        let mut core = self.core();
        core.sandbox = true;
        core.interrupt(Interrupt::Reset);
        StepResult::Done
    }

    /// Raises IRQ now, or at the next instruction boundary of a running CPU.
    pub fn irq(&self) -> StepResult {
        if self.is_running() {
            self.control.irq.store(true, Ordering::SeqCst);
            return StepResult::Running;
        }
        let _stepping = self.forward();
        self.core().interrupt(Interrupt::Irq);
        StepResult::Done
    }

    pub fn nmi(&self) -> StepResult {
        if self.is_running() {
            self.control.nmi.store(true, Ordering::SeqCst);
            return StepResult::Running;
        }
        let _stepping = self.forward();
        self.core().interrupt(Interrupt::Nmi);
        StepResult::Done
    }

    // Background execution

    fn spawn(&self, request: RunRequest) -> StepResult {
        if self
            .control
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return StepResult::Busy;
        }
        let mut worker = lock(&self.worker);
        if let Some(old) = worker.take() {
            // already finished: `running` was clear
            let _ = old.join();
        }
        self.control.stop.reset();
        self.control.irq.store(false, Ordering::SeqCst);
        self.control.nmi.store(false, Ordering::SeqCst);
        let state = match request.direction {
            Direction::Forward => SchedulerState::RunningForward,
            Direction::Backward => SchedulerState::RunningBackward,
        };
        self.control.state.store(state as u8, Ordering::SeqCst);

        let core = Arc::clone(&self.core);
        let breakpoints = Arc::clone(&self.breakpoints);
        let evaluator = Arc::clone(&self.evaluator);
        let control = Arc::clone(&self.control);
        let events = self.events_tx.clone();
        let cycles_per_update = self.settings.cycles_per_update;

        log::debug!("CPU thread started: {:?}", request);
        let spawned = thread::Builder::new()
            .name("cpu".to_string())
            .spawn(move || {
                let reason = run_thread(
                    &core,
                    &breakpoints,
                    &*evaluator,
                    &control,
                    request,
                    cycles_per_update,
                );
                let regs = lock(&core).regs;
                control
                    .state
                    .store(SchedulerState::Idle as u8, Ordering::SeqCst);
                control.running.store(false, Ordering::SeqCst);
                log::debug!("CPU thread stopped: {:?} at ${:04x}", reason, regs.pc);
                let _ = events.send(RunEvent::Stopped { reason, regs });
            });
        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                StepResult::Running
            }
            Err(e) => {
                log::error!("Failed to start CPU thread: {}", e);
                self.control
                    .state
                    .store(SchedulerState::Idle as u8, Ordering::SeqCst);
                self.control.running.store(false, Ordering::SeqCst);
                StepResult::Busy
            }
        }
    }
}

impl Drop for Machine {
    fn drop(&mut self) {
        self.control.stop.cancel();
        if let Some(handle) = lock(&self.worker).take() {
            let _ = handle.join();
        }
    }
}

/// Background run loop. The core lock is held for [`LOCK_SLICE`]
/// instructions at a time so foreground readers and the VICE bridge are
/// never locked out for a whole batch. Breakpoints are checked against a
/// snapshot refreshed every `cycles_per_update` cycles.
fn run_thread(
    core: &Mutex<Core>,
    breakpoints: &Mutex<BreakpointTable>,
    eval: &dyn ExpressionEvaluator,
    control: &RunControl,
    request: RunRequest,
    cycles_per_update: u64,
) -> StopReason {
    let mut bps = lock(breakpoints).clone();
    let mut remaining = request.limit;

    loop {
        let batch_start = lock(core).cycles;
        loop {
            let batch_done = {
                let mut core = lock(core);
                for _ in 0..LOCK_SLICE {
                    if let Some(reason) =
                        run_one(&mut core, &bps, eval, control, request, &mut remaining)
                    {
                        return reason;
                    }
                }
                core.cycles.abs_diff(batch_start) > cycles_per_update
            };
            if control.stop.is_cancelled() {
                return StopReason::Requested;
            }
            if batch_done {
                break;
            }
            thread::yield_now();
        }
        thread::sleep(Duration::from_millis(1));
        bps = lock(breakpoints).clone();
    }
}

/// One instruction of a background run, forward or backward.
fn run_one(
    core: &mut Core,
    bps: &BreakpointTable,
    eval: &dyn ExpressionEvaluator,
    control: &RunControl,
    request: RunRequest,
    remaining: &mut Option<u64>,
) -> Option<StopReason> {
    let accesses = match request.direction {
        Direction::Forward => {
            let accesses = core.step();
            if core.regs.is_jammed() {
                return Some(StopReason::Jammed);
            }
            if control.irq.swap(false, Ordering::SeqCst) {
                core.interrupt(Interrupt::Irq);
            }
            if control.nmi.swap(false, Ordering::SeqCst) {
                core.interrupt(Interrupt::Nmi);
            }
            if request.target == Some(core.regs.pc) {
                return Some(StopReason::Target);
            }
            Some(accesses)
        }
        Direction::Backward => {
            if request.target == Some(core.regs.pc) {
                return Some(StopReason::Target);
            }
            if !core.step_back() {
                return Some(StopReason::NoHistory);
            }
            None
        }
    };
    if let Some(n) = remaining.as_mut() {
        *n = n.saturating_sub(1);
        if *n == 0 {
            return Some(StopReason::Limit);
        }
    }
    check_stop(bps, core, accesses.as_ref(), eval)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_with(program: &[u8]) -> Machine {
        let m = Machine::default();
        m.load(0x1000, program);
        m
    }

    #[test]
    fn test_step_and_back_restores_state() {
        // lda #$05 ; sta $2000
        let m = machine_with(&[0xa9, 0x05, 0x8d, 0x00, 0x20]);
        let before = m.registers();
        assert_eq!(m.step(), StepResult::Done);
        assert_eq!(m.step(), StepResult::Done);
        assert_eq!(m.get_byte(0x2000), 0x05);
        assert_eq!(m.cycles(), 6);
        assert_eq!(m.history_count(), (2, 2));

        assert_eq!(m.step_back(), StepResult::Done);
        assert_eq!(m.get_byte(0x2000), 0x00);
        assert_eq!(m.step_back(), StepResult::Done);
        assert_eq!(m.registers(), before);
        assert_eq!(m.cycles(), 0);
        assert_eq!(m.history_count(), (0, 2));
        assert_eq!(m.step_back(), StepResult::Stopped(StopReason::NoHistory));
    }

    #[test]
    fn test_scheduler_state_follows_runs() {
        // jmp $1000
        let m = machine_with(&[0x4c, 0x00, 0x10]);
        assert_eq!(m.state(), SchedulerState::Idle);
        m.step();
        assert_eq!(m.state(), SchedulerState::Idle);
        assert_eq!(m.go(0), StepResult::Running);
        assert_eq!(m.state(), SchedulerState::RunningForward);
        m.stop();
        m.wait();
        assert_eq!(m.state(), SchedulerState::Idle);

        assert_eq!(m.reverse(0), StepResult::Running);
        m.wait();
        assert_eq!(m.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_step_on_jam() {
        let m = machine_with(&[0x02]);
        assert_eq!(m.step(), StepResult::Stopped(StopReason::Jammed));
        assert_eq!(m.registers().pc, 0x1001);
        assert_eq!(m.cycles(), 0);
    }

    #[test]
    fn test_interrupt_is_undoable() {
        let m = machine_with(&[0xea]);
        m.load(0xfffe, &[0x00, 0xc0]);
        m.set_registers(Registers {
            s: 0xff,
            ..Registers::default()
        });
        assert_eq!(m.irq(), StepResult::Done);
        assert_eq!(m.registers().pc, 0xc000);
        assert_eq!(m.cycles(), 7);
        assert_eq!(m.step_back(), StepResult::Done);
        assert_eq!(m.registers().pc, 0x1000);
        assert_eq!(m.get_byte(0x01ff), 0x00);
        assert_eq!(m.cycles(), 0);
    }

    #[test]
    fn test_access_log_records_store() {
        let mut core = Core::new(1024);
        core.memory.load(0x1000, &[0x8d, 0x20, 0xd0]);
        let log = core.step();
        assert!(log.as_slice().contains(&MemoryAccess {
            addr: 0xd020,
            kind: AccessKind::Write
        }));
    }
}
