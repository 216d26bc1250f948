use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rewind6502::machine::Machine;
use rewind6502::symbols::{SharedSymbols, SymbolMap};
use rewind6502::vice::protocol::BUNDLE;
use rewind6502::vice::{ConnectionState, Session, ViceClient, ViceEvent, ViceShared};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

struct Fixture {
    session: Session,
    machine: Machine,
    shared: Arc<ViceShared>,
    symbols: SharedSymbols,
    events: Receiver<ViceEvent>,
}

fn fixture(accept_symbols: bool) -> Fixture {
    let machine = Machine::default();
    let shared = Arc::new(ViceShared::new(accept_symbols));
    let symbols: SharedSymbols = Arc::new(Mutex::new(SymbolMap::default()));
    let (tx, events) = mpsc::channel();
    let session = Session::new(
        Arc::clone(&shared),
        machine.handle(),
        Arc::clone(&symbols),
        tx,
    );
    Fixture {
        session,
        machine,
        shared,
        symbols,
        events,
    }
}

/// The tail of a full memory dump; the wrap past $ffff completes a sync.
fn dump_tail() -> String {
    let mut line = String::from(">C:fff0 ");
    for _ in 0..16 {
        line.push_str(" ea");
    }
    line.push_str("   ................\n");
    line
}

fn synced(events: &Receiver<ViceEvent>) -> bool {
    events.try_iter().any(|e| e == ViceEvent::Synced)
}

// =============================================================================
// SESSION
// =============================================================================

#[test]
fn test_prompt_then_dump_writes_memory() {
    let mut f = fixture(true);
    assert_eq!(f.session.feed(b"(C:$e5cf) "), BUNDLE);
    assert_eq!(f.session.state(), ConnectionState::Syncing);
    assert_eq!(f.shared.state(), ConnectionState::Syncing);

    assert_eq!(f.session.feed(b">C:0400  01 02 03\n"), "");
    assert_eq!(f.machine.get_byte(0x0400), 0x01);
    assert_eq!(f.machine.get_byte(0x0401), 0x02);
    assert_eq!(f.machine.get_byte(0x0402), 0x03);
    assert_eq!(f.session.state(), ConnectionState::Syncing);
}

#[test]
fn test_break_line_adds_tagged_breakpoint() {
    let mut f = fixture(true);
    f.session.feed(b"BREAK: 1  C:$c003  (Stop on exec)\n");
    let (address, index) = f.machine.with_breakpoints(|b| {
        let bp = &b.active()[0];
        (bp.address, bp.external_index)
    });
    assert_eq!(address, 0xc003);
    assert_eq!(index, Some(1));
}

#[test]
fn test_full_sync_flow() {
    let mut f = fixture(true);
    f.machine.set_byte(0x0000, 0x55);
    f.machine.step();
    assert!(f.machine.is_sandbox());

    f.session.feed(b"(C:$e5cf) ");
    f.session
        .feed(b".;c000 01 02 03 f0 2f 37 00100001 000 002    5963015\n$c000 .start\n");
    f.session.feed(b"BREAK: 1  C:$c003  (Stop on exec)\n");
    assert!(!synced(&f.events));
    f.session.feed(dump_tail().as_bytes());

    assert!(synced(&f.events));
    assert_eq!(f.session.state(), ConnectionState::WaitingForCommand);
    assert!(!f.machine.is_sandbox());
    assert_eq!(f.machine.history_count(), (0, 0));

    let regs = f.machine.registers();
    assert_eq!(regs.pc, 0xc000);
    assert_eq!((regs.a, regs.x, regs.y, regs.s), (0x01, 0x02, 0x03, 0xf0));
    assert_eq!(regs.p.bits(), 0b0010_0001);
    assert_eq!(f.machine.get_byte(0xffff), 0xea);
    assert_eq!(f.symbols.lock().unwrap().get_address("start"), Some(0xc000));
    assert_eq!(f.machine.with_breakpoints(|b| b.len()), 1);
}

#[test]
fn test_resync_drops_only_monitor_breakpoints() {
    let mut f = fixture(true);
    let local = f.machine.with_breakpoints(|b| b.set_pc(0x1000)).unwrap();
    f.session.feed(b"BREAK: 2  C:$2000  (Stop on exec)\n");
    assert_eq!(f.machine.with_breakpoints(|b| b.len()), 2);

    assert_eq!(f.session.begin_sync(), BUNDLE);
    let ids: Vec<u32> = f
        .machine
        .with_breakpoints(|b| b.iter().map(|bp| bp.id).collect());
    assert_eq!(ids, vec![local]);
}

#[test]
fn test_symbols_ignored_when_not_accepted() {
    let mut f = fixture(false);
    f.session.feed(b"(C:$e5cf) $c000 .start\n");
    assert_eq!(f.symbols.lock().unwrap().get_address("start"), None);
}

#[test]
fn test_resume_then_output_resyncs() {
    let mut f = fixture(true);
    f.session.feed(b"(C:$e5cf) ");
    f.session.feed(dump_tail().as_bytes());
    assert_eq!(f.session.state(), ConnectionState::WaitingForCommand);

    f.shared.enqueue("x");
    assert_eq!(f.session.take_command().as_deref(), Some("x\n"));
    assert_eq!(f.session.state(), ConnectionState::Running);
    assert_eq!(f.shared.state(), ConnectionState::Running);
    assert_eq!(f.shared.pending_commands(), 0);

    assert_eq!(f.session.feed(b"#1 (Stop on exec c003)\n"), "");
    assert_eq!(f.session.feed(b".C:c003  ea  NOP\n"), "");
    assert_eq!(f.session.feed(b"(C:$c003) "), BUNDLE);
    assert_eq!(f.session.state(), ConnectionState::Syncing);
}

// =============================================================================
// SOCKET
// =============================================================================

#[test]
fn test_client_syncs_and_forwards_commands() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let (cmd_tx, cmd_rx) = mpsc::channel::<String>();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        stream.write_all(b"(C:$e5cf) ").unwrap();

        let mut bundle = String::new();
        for _ in 0..4 {
            reader.read_line(&mut bundle).unwrap();
        }
        cmd_tx.send(bundle).unwrap();

        let mut reply = String::from(
            ".;c000 01 02 03 f0 2f 37 00100000 000 002    5963015\n\
             $c000 .start\n\
             BREAK: 1  C:$c003  (Stop on exec)\n",
        );
        reply.push_str(&dump_tail());
        reply.push_str("(C:$c000) ");
        stream.write_all(reply.as_bytes()).unwrap();

        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        cmd_tx.send(line).unwrap();
        stream.write_all(b"(C:$c000) ").unwrap();
    });

    let machine = Machine::default();
    let symbols: SharedSymbols = Arc::new(Mutex::new(SymbolMap::default()));
    let (tx, events) = mpsc::channel();
    let client = ViceClient::connect(&addr, machine.handle(), Arc::clone(&symbols), true, tx)
        .unwrap();

    assert_eq!(cmd_rx.recv_timeout(EVENT_TIMEOUT).unwrap(), BUNDLE);
    loop {
        match events.recv_timeout(EVENT_TIMEOUT).unwrap() {
            ViceEvent::Synced => break,
            ViceEvent::Disconnected(reason) => panic!("disconnected: {}", reason),
            _ => {}
        }
    }
    assert_eq!(machine.registers().pc, 0xc000);
    assert_eq!(symbols.lock().unwrap().get_address("start"), Some(0xc000));
    assert!(!client.send_command("frobnicate"));
    assert!(client.send_command("m 0400 0401"));
    assert_eq!(
        cmd_rx.recv_timeout(EVENT_TIMEOUT).unwrap(),
        "m 0400 0401\n"
    );

    server.join().unwrap();
    loop {
        match events.recv_timeout(EVENT_TIMEOUT).unwrap() {
            ViceEvent::Disconnected(_) => break,
            _ => {}
        }
    }
    assert!(!client.is_connected());
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
