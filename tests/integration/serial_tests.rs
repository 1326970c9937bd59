//! Serial channel flows through the runtime: RX interrupt → executor →
//! application → TX queue → TX interrupt.

use bspcore::board::{UART_1, UART_2};
use bspcore::serial::{SerialEvent, SerialEventKind};
use bspcore::{OverflowPolicy, Runtime, RuntimeConfig, SerialConfig};

use crate::mock_hw::MockBoard;

#[derive(Default)]
struct Echo {
    received: Vec<u8>,
    tx_done: Vec<(u8, u8)>,
    /// Bytes the application wants echoed, applied after the pass.
    outbox: Vec<(u8, u8)>,
}

fn echo_rx(app: &mut Echo, e: &SerialEvent) {
    assert_eq!(e.kind, SerialEventKind::RxDeferred);
    app.received.push(e.byte);
    app.outbox.push((e.port, e.byte.to_ascii_uppercase()));
}

fn tx_done(app: &mut Echo, e: &SerialEvent) {
    assert_eq!(e.kind, SerialEventKind::TxDeferred);
    app.tx_done.push((e.port, e.byte));
}

fn flush_outbox(rt: &Runtime<Echo>, app: &mut Echo) {
    for (port, byte) in app.outbox.drain(..) {
        if let Some(uart) = rt.uart(port) {
            uart.put_async(byte);
        }
    }
}

fn drain_tx(rt: &Runtime<Echo>, port: u8) -> Vec<u8> {
    let uart = rt.uart(port).unwrap();
    std::iter::from_fn(|| uart.next_tx_byte()).collect()
}

#[test]
fn received_bytes_are_echoed_through_tx_queue() {
    let rt: Runtime<Echo> = Runtime::new(&RuntimeConfig::default()).unwrap();
    let mut app = Echo::default();
    rt.uart2().set_on_rx(Some(echo_rx));
    rt.uart2().set_on_tx(Some(tx_done));

    for &b in b"abc" {
        assert!(rt.uart2().on_rx_byte(b));
    }
    let report = rt.run_pass(&mut app);
    assert_eq!(report.serial, 3);
    assert_eq!(app.received, b"abc");

    flush_outbox(&rt, &mut app);
    assert_eq!(drain_tx(&rt, UART_2), b"ABC");

    rt.run_pass(&mut app);
    assert_eq!(app.tx_done, [(UART_2, b'C')]);
}

#[test]
fn bytes_stay_queued_without_deferred_callback() {
    let rt: Runtime<Echo> = Runtime::new(&RuntimeConfig::default()).unwrap();
    let mut app = Echo::default();
    rt.uart1().on_rx_byte(b'x');
    rt.uart1().on_rx_byte(b'y');
    assert!(rt.run_pass(&mut app).is_idle());
    assert_eq!(rt.uart1().rx_pending(), 2);
    assert_eq!(rt.uart1().read_byte(), Some(b'x'));
    assert_eq!(rt.uart1().read_byte(), Some(b'y'));
    assert_eq!(rt.uart1().read_byte(), None);
}

#[test]
fn configured_capacity_bounds_rx_queue() {
    let config = RuntimeConfig {
        uart1: SerialConfig {
            rx_capacity: 4,
            ..SerialConfig::default()
        },
        ..RuntimeConfig::default()
    };
    let rt: Runtime<Echo> = Runtime::new(&config).unwrap();
    let accepted: Vec<bool> = b"abcde".iter().map(|&b| rt.uart1().on_rx_byte(b)).collect();
    assert_eq!(accepted, [true, true, true, true, false]);
    assert_eq!(rt.uart1().rx_dropped(), 1);
    assert_eq!(rt.dropped(), 1);
    let got: Vec<u8> = std::iter::from_fn(|| rt.uart1().read_byte()).collect();
    assert_eq!(got, b"abcd");
}

#[test]
fn overwrite_policy_keeps_newest_bytes() {
    let config = RuntimeConfig {
        uart1: SerialConfig {
            rx_capacity: 3,
            tx_capacity: 3,
            overflow: OverflowPolicy::Overwrite,
        },
        ..RuntimeConfig::default()
    };
    let rt: Runtime<Echo> = Runtime::new(&config).unwrap();
    assert_eq!(rt.uart1().write_async(b"12345"), 5);
    assert_eq!(drain_tx(&rt, UART_1), b"345");
}

#[test]
fn write_async_reports_partial_queueing() {
    let config = RuntimeConfig {
        uart1: SerialConfig {
            tx_capacity: 8,
            ..SerialConfig::default()
        },
        ..RuntimeConfig::default()
    };
    let rt: Runtime<Echo> = Runtime::new(&config).unwrap();
    assert_eq!(rt.uart1().write_async(b"hello, world"), 8);
    assert!(!rt.uart1().put_async(b'!'));
    assert_eq!(drain_tx(&rt, UART_1), b"hello, w");
}

#[test]
fn blocking_write_bypasses_tx_queue() {
    let rt: Runtime<Echo> = Runtime::new(&RuntimeConfig::default()).unwrap();
    let mut board = MockBoard::new();
    board.tx_busy = 5;
    rt.uart1().put_async(b'q');
    rt.uart1().write(&mut board, "boot\r\n");
    assert_eq!(board.tx, b"boot\r\n");
    assert_eq!(rt.uart1().tx_pending(), 1);
}
