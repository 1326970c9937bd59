//! Fixed-capacity event queue shared between an interrupt handler and the
//! deferred executor.
//!
//! ```text
//! ┌─────────────┐  push()  ┌──────────────────┐  pop()   ┌──────────────┐
//! │ RX/TX ISR   │─────────▶│   EventQueue     │─────────▶│  Executor    │
//! │ tick ISR    │          │ (heapless Deque) │          │  (consumer)  │
//! └─────────────┘          └──────────────────┘          └──────────────┘
//! ```
//!
//! One producer context, one consumer context.  Every head/tail/count
//! update happens inside a critical section that lasts for the handful of
//! instructions touching the deque; nothing else is ever done while
//! interrupts are masked.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::Deque;
use serde::{Deserialize, Serialize};

/// What `push` does when the queue is already holding `capacity` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Keep the queued items, drop the new one and report failure.
    #[default]
    Reject,
    /// Drop the oldest queued item to make room for the new one.
    Overwrite,
}

struct Ring<T, const N: usize> {
    items: Deque<T, N>,
    /// Items lost to overflow since creation (rejected or overwritten).
    dropped: u32,
}

/// Bounded FIFO with a per-instance overflow policy.
///
/// `N` is the backing storage; the usable capacity is fixed at creation
/// and may be lower (`with_capacity`), which lets configuration pick the
/// size without changing the type.
pub struct EventQueue<T, const N: usize> {
    ring: Mutex<CriticalSectionRawMutex, RefCell<Ring<T, N>>>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl<T, const N: usize> EventQueue<T, N> {
    /// Queue using the full backing storage.
    pub const fn new(policy: OverflowPolicy) -> Self {
        Self {
            ring: Mutex::new(RefCell::new(Ring {
                items: Deque::new(),
                dropped: 0,
            })),
            capacity: N,
            policy,
        }
    }

    /// Queue limited to `capacity` items (clamped to `1..=N`).
    pub fn with_capacity(capacity: usize, policy: OverflowPolicy) -> Self {
        let mut queue = Self::new(policy);
        queue.capacity = capacity.clamp(1, N);
        queue
    }

    /// Append an item.  Safe to call from interrupt context; never blocks.
    ///
    /// Returns `false` only when the queue is full and the policy is
    /// [`OverflowPolicy::Reject`].  The caller must not retry in a loop.
    pub fn push(&self, item: T) -> bool {
        self.ring.lock(|ring| {
            let mut ring = ring.borrow_mut();
            if ring.items.len() >= self.capacity {
                ring.dropped = ring.dropped.wrapping_add(1);
                match self.policy {
                    OverflowPolicy::Reject => return false,
                    OverflowPolicy::Overwrite => {
                        let _ = ring.items.pop_front();
                    }
                }
            }
            // Cannot fail: len < capacity <= N here.
            ring.items.push_back(item).is_ok()
        })
    }

    /// Remove the oldest item, or `None` when nothing is pending.
    pub fn pop(&self) -> Option<T> {
        self.ring.lock(|ring| ring.borrow_mut().items.pop_front())
    }

    /// Pop items one at a time into `handler`, in FIFO order.
    ///
    /// The critical section is released between items, so `handler` always
    /// runs with interrupts enabled and may itself push to this queue.
    /// Returns the number of items handled.
    pub fn drain(&self, mut handler: impl FnMut(T)) -> usize {
        let mut handled = 0;
        while let Some(item) = self.pop() {
            handler(item);
            handled += 1;
        }
        handled
    }

    /// Discard every pending item.
    pub fn clear(&self) {
        self.ring.lock(|ring| ring.borrow_mut().items.clear());
    }

    pub fn len(&self) -> usize {
        self.ring.lock(|ring| ring.borrow().items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Items lost to overflow since creation.  Wraps silently.
    pub fn dropped(&self) -> u32 {
        self.ring.lock(|ring| ring.borrow().dropped)
    }
}
