//! Shared-bus transport.
//!
//! One arbitrated resource for all nodes. Senders serialize on the
//! arbiter; a contended acquisition counts as a congestion event. Latency
//! is `base + ⌈payload / width⌉` transfer cycles.

use super::{DeliveryQueues, FabricCounters, Message};
use crate::stats::InterconnectStats;
use std::sync::Mutex;

/// Single shared bus.
#[derive(Debug)]
pub struct Bus {
    arbiter: Mutex<()>,
    queues: DeliveryQueues,
    base_latency: u64,
    width: u64,
    counters: FabricCounters,
}

impl Bus {
    /// Creates a bus connecting `nodes` endpoints.
    pub fn new(nodes: usize, base_latency: u64, width: u64) -> Self {
        Self {
            arbiter: Mutex::new(()),
            queues: DeliveryQueues::new(nodes),
            base_latency,
            width: width.max(1),
            counters: FabricCounters::default(),
        }
    }

    /// Arbitrates for the bus, transfers the message, and returns the
    /// modeled latency.
    pub fn send(&self, mut msg: Message) -> u64 {
        let _grant = match self.arbiter.try_lock() {
            Ok(guard) => guard,
            Err(std::sync::TryLockError::WouldBlock) => {
                self.counters.congestion();
                self.arbiter.lock().expect("bus arbiter poisoned")
            }
            Err(std::sync::TryLockError::Poisoned(e)) => e.into_inner(),
        };
        let transfer = msg.payload.div_ceil(self.width);
        let latency = self.base_latency + transfer;
        msg.hop_count = 1;
        self.counters.record(latency, 1, transfer);
        self.queues.push(msg);
        latency
    }

    /// Whether `node` has undelivered messages.
    pub fn has_messages(&self, node: usize) -> bool {
        self.queues.len(node) > 0
    }

    /// Pops the oldest message addressed to `node`.
    pub fn recv(&self, node: usize) -> Option<Message> {
        self.queues.pop(node)
    }

    /// Counter snapshot.
    pub fn stats(&self) -> InterconnectStats {
        self.counters.snapshot()
    }
}
