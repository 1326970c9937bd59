//! Fuzz target: `EventQueue` push/pop sequences
//!
//! Each input byte is an operation: even bytes push, odd bytes pop.  The
//! first byte picks capacity and overflow policy.  The queue is checked
//! against a `VecDeque` model after every step.
//!
//! cargo fuzz run fuzz_event_queue

#![no_main]

use std::collections::VecDeque;

use bspcore::{EventQueue, OverflowPolicy};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&setup, ops)) = data.split_first() else {
        return;
    };
    let capacity = usize::from(setup & 0x1f).max(1);
    let policy = if setup & 0x80 == 0 {
        OverflowPolicy::Reject
    } else {
        OverflowPolicy::Overwrite
    };
    let queue: EventQueue<u8, 32> = EventQueue::with_capacity(capacity, policy);
    let mut model = VecDeque::new();

    for &op in ops {
        if op & 1 == 0 {
            let accepted = queue.push(op);
            if model.len() < capacity {
                model.push_back(op);
                assert!(accepted);
            } else if policy == OverflowPolicy::Overwrite {
                model.pop_front();
                model.push_back(op);
                assert!(accepted);
            } else {
                assert!(!accepted, "full reject queue accepted an item");
            }
        } else {
            assert_eq!(queue.pop(), model.pop_front());
        }
        assert_eq!(queue.len(), model.len());
        assert!(queue.len() <= capacity);
    }
});
