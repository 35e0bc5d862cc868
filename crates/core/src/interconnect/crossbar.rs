//! Crossbar transport.
//!
//! One output port per destination; sends to different destinations never
//! interfere. A send finding its port busy counts a conflict and stalls
//! one extra base latency.

use super::{DeliveryQueues, FabricCounters, Message};
use crate::stats::InterconnectStats;
use std::sync::Mutex;

/// Per-destination-port crossbar.
#[derive(Debug)]
pub struct Crossbar {
    ports: Vec<Mutex<()>>,
    queues: DeliveryQueues,
    base_latency: u64,
    counters: FabricCounters,
}

impl Crossbar {
    /// Creates a crossbar connecting `nodes` endpoints.
    pub fn new(nodes: usize, base_latency: u64) -> Self {
        Self {
            ports: (0..nodes).map(|_| Mutex::new(())).collect(),
            queues: DeliveryQueues::new(nodes),
            base_latency,
            counters: FabricCounters::default(),
        }
    }

    /// Acquires the destination port, transfers, and returns the latency
    /// (`base`, plus a `base` stall on a port conflict).
    pub fn send(&self, mut msg: Message) -> u64 {
        let port = &self.ports[msg.dest];
        let (conflict, _guard) = match port.try_lock() {
            Ok(guard) => (false, guard),
            Err(std::sync::TryLockError::WouldBlock) => {
                self.counters.congestion();
                (true, port.lock().expect("crossbar port poisoned"))
            }
            Err(std::sync::TryLockError::Poisoned(e)) => (false, e.into_inner()),
        };
        let latency = if conflict {
            self.base_latency * 2
        } else {
            self.base_latency
        };
        msg.hop_count = 1;
        self.counters.record(latency, 1, self.base_latency);
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
