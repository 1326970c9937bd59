//! Queue-backed serial channel.
//!
//! ```text
//!  RX ISR ──▶ on_rx_byte ──┬─▶ rx_isr(&event)           (interrupt context)
//!                          └─▶ rx queue ──▶ dispatch ──▶ on_rx(ctx, &event)
//!
//!  put_async / write_async ──▶ tx queue ──▶ next_tx_byte ──▶ transmitter
//!                                              ├─▶ tx_isr(&event)
//!                                              └─ queue empty ─▶ on_tx(ctx, &event)
//! ```
//!
//! Received bytes are only drained by the executor while a deferred RX
//! callback is installed; otherwise they wait for `read_byte`.  The
//! blocking `put` / `write` calls bypass the TX queue and hand bytes
//! straight to the transmitter.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::debug;

use crate::config::SerialConfig;
use crate::ports::SerialPort;
use crate::queue::EventQueue;

/// Interrupt-context serial callback.
pub type SerialIsr = fn(&SerialEvent);
/// Deferred serial callback.
pub type SerialCallback<C> = fn(&mut C, &SerialEvent);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialEventKind {
    /// Byte received, reported inside the RX interrupt.
    RxIsr,
    /// Byte handed to the transmitter, reported inside the TX interrupt.
    TxIsr,
    /// Byte received, reported by the executor.
    RxDeferred,
    /// TX queue drained, reported by the executor.
    TxDeferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialEvent {
    pub kind: SerialEventKind,
    pub port: u8,
    /// Received byte, or the last byte transmitted.
    pub byte: u8,
}

struct Slots<C> {
    rx_isr: Option<SerialIsr>,
    tx_isr: Option<SerialIsr>,
    on_rx: Option<SerialCallback<C>>,
    on_tx: Option<SerialCallback<C>>,
    /// Last byte of a TX burst, waiting for the deferred TX callback.
    drained: Option<u8>,
}

/// One serial port: RX/TX queues with `RX` / `TX` bytes of storage.
pub struct SerialChannel<C, const RX: usize, const TX: usize> {
    port: u8,
    rx: EventQueue<u8, RX>,
    tx: EventQueue<u8, TX>,
    slots: Mutex<CriticalSectionRawMutex, RefCell<Slots<C>>>,
}

impl<C, const RX: usize, const TX: usize> SerialChannel<C, RX, TX> {
    pub fn new(port: u8, config: &SerialConfig) -> Self {
        debug!(
            "UART{}: rx {} / tx {} bytes, {:?} on overflow",
            port, config.rx_capacity, config.tx_capacity, config.overflow
        );
        Self {
            port,
            rx: EventQueue::with_capacity(config.rx_capacity, config.overflow),
            tx: EventQueue::with_capacity(config.tx_capacity, config.overflow),
            slots: Mutex::new(RefCell::new(Slots {
                rx_isr: None,
                tx_isr: None,
                on_rx: None,
                on_tx: None,
                drained: None,
            })),
        }
    }

    pub fn port(&self) -> u8 {
        self.port
    }

    // ── Callback slots ──────────────────────────────────────────

    pub fn set_rx_isr(&self, callback: Option<SerialIsr>) {
        self.slots.lock(|slots| slots.borrow_mut().rx_isr = callback);
    }

    pub fn set_tx_isr(&self, callback: Option<SerialIsr>) {
        self.slots.lock(|slots| slots.borrow_mut().tx_isr = callback);
    }

    pub fn set_on_rx(&self, callback: Option<SerialCallback<C>>) {
        self.slots.lock(|slots| slots.borrow_mut().on_rx = callback);
    }

    pub fn set_on_tx(&self, callback: Option<SerialCallback<C>>) {
        self.slots.lock(|slots| slots.borrow_mut().on_tx = callback);
    }

    // ── Interrupt entry points ──────────────────────────────────

    /// RX interrupt: one byte arrived.  Runs the RX ISR callback, then
    /// queues the byte.  Returns `false` if the byte was dropped.
    pub fn on_rx_byte(&self, byte: u8) -> bool {
        let isr = self.slots.lock(|slots| slots.borrow().rx_isr);
        if let Some(isr) = isr {
            isr(&self.event(SerialEventKind::RxIsr, byte));
        }
        self.rx.push(byte)
    }

    /// TX interrupt: next byte for the transmitter, or `None` when the TX
    /// queue is empty and the interrupt can be disabled.
    pub fn next_tx_byte(&self) -> Option<u8> {
        let byte = self.tx.pop()?;
        let emptied = self.tx.is_empty();
        let isr = self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            if emptied {
                slots.drained = Some(byte);
            }
            slots.tx_isr
        });
        if let Some(isr) = isr {
            isr(&self.event(SerialEventKind::TxIsr, byte));
        }
        Some(byte)
    }

    // ── Deferred-context API ────────────────────────────────────

    /// Queue one byte for transmission.  `false` if it was dropped.
    pub fn put_async(&self, byte: u8) -> bool {
        self.tx.push(byte)
    }

    /// Queue as many bytes of `data` as fit.  Returns the count queued.
    pub fn write_async(&self, data: &[u8]) -> usize {
        data.iter().take_while(|&&b| self.tx.push(b)).count()
    }

    /// Send one byte, waiting for the transmitter to accept it.
    pub fn put(&self, port: &mut impl SerialPort, byte: u8) {
        while !port.try_write(byte) {
            core::hint::spin_loop();
        }
    }

    /// Send a string, waiting for the transmitter on every byte.
    pub fn write(&self, port: &mut impl SerialPort, text: &str) {
        for byte in text.bytes() {
            self.put(port, byte);
        }
    }

    /// Oldest received byte not yet consumed.
    pub fn read_byte(&self) -> Option<u8> {
        self.rx.pop()
    }

    pub fn rx_pending(&self) -> usize {
        self.rx.len()
    }

    pub fn tx_pending(&self) -> usize {
        self.tx.len()
    }

    pub fn rx_dropped(&self) -> u32 {
        self.rx.dropped()
    }

    pub fn tx_dropped(&self) -> u32 {
        self.tx.dropped()
    }

    /// Executor step: feed received bytes to the deferred RX callback and
    /// report a drained TX queue.  Returns callbacks run.
    pub fn dispatch(&self, ctx: &mut C) -> usize {
        let (on_rx, on_tx, drained) = self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            let drained = slots.drained.take();
            (slots.on_rx, slots.on_tx, drained)
        });

        let mut delivered = 0;
        if let Some(callback) = on_rx {
            delivered += self.rx.drain(|byte| {
                callback(ctx, &self.event(SerialEventKind::RxDeferred, byte));
            });
        }
        if let (Some(callback), Some(byte)) = (on_tx, drained) {
            callback(ctx, &self.event(SerialEventKind::TxDeferred, byte));
            delivered += 1;
        }
        delivered
    }

    fn event(&self, kind: SerialEventKind, byte: u8) -> SerialEvent {
        SerialEvent {
            kind,
            port: self.port,
            byte,
        }
    }
}
