//! Fuzz target: `SerialChannel` under interleaved interrupt and executor
//! activity
//!
//! Input bytes are replayed as RX interrupts, TX interrupts, async writes
//! and executor passes.  The channel must never panic, must deliver
//! received bytes in order, and its counters must stay consistent.
//!
//! cargo fuzz run fuzz_serial_channel

#![no_main]

use bspcore::serial::{SerialChannel, SerialEvent};
use bspcore::SerialConfig;
use libfuzzer_sys::fuzz_target;

#[derive(Default)]
struct Sink {
    rx: Vec<u8>,
}

fn on_rx(sink: &mut Sink, event: &SerialEvent) {
    sink.rx.push(event.byte);
}

fuzz_target!(|data: &[u8]| {
    let config = SerialConfig {
        rx_capacity: 16,
        tx_capacity: 16,
        ..SerialConfig::default()
    };
    let uart: SerialChannel<Sink, 16, 16> = SerialChannel::new(1, &config);
    uart.set_on_rx(Some(on_rx));
    let mut sink = Sink::default();
    let mut accepted = Vec::new();

    for chunk in data.chunks(2) {
        let (op, byte) = (chunk[0], chunk.get(1).copied().unwrap_or(0));
        match op % 4 {
            0 => {
                if uart.on_rx_byte(byte) {
                    accepted.push(byte);
                }
            }
            1 => {
                let _ = uart.next_tx_byte();
            }
            2 => {
                let _ = uart.write_async(&[byte; 3]);
            }
            _ => {
                uart.dispatch(&mut sink);
            }
        }
        assert!(uart.rx_pending() <= 16);
        assert!(uart.tx_pending() <= 16);
    }

    uart.dispatch(&mut sink);
    assert_eq!(sink.rx, accepted);
});
