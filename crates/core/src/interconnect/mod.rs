//! Interconnect message fabric.
//!
//! Transports coherence traffic between cores and the directory's home
//! node. Three topologies share one interface:
//! - **[`Bus`]**: a single arbitrated resource; messages serialize.
//! - **[`Crossbar`]**: a port per destination; conflicting sends stall.
//! - **[`Mesh`]**: a 2D grid with XY routing and per-hop latency.
//!
//! Latency is a pure accumulator returned from `send`; nothing sleeps and
//! timing never gates worker progress. Queues are per-destination mutexes
//! and counters are relaxed atomics, so the fabric is shared freely across
//! worker threads.

/// Shared-bus transport.
pub mod bus;
/// Crossbar transport.
pub mod crossbar;
/// 2D-mesh transport.
pub mod mesh;

pub use bus::Bus;
pub use crossbar::Crossbar;
pub use mesh::Mesh;

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::common::Addr;
use crate::config::{InterconnectKind, defaults};
use crate::stats::InterconnectStats;

/// Classification of fabric messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// Core → directory permission request, or directory → core
    /// invalidation/downgrade order.
    CoherenceRequest,
    /// Directory → core grant.
    CoherenceResponse,
    /// Block payload movement.
    DataTransfer,
    /// Acknowledgement.
    Ack,
}

/// One message in flight.
#[derive(Clone, Copy, Debug)]
pub struct Message {
    /// Sending node.
    pub source: usize,
    /// Receiving node.
    pub dest: usize,
    /// Line address the message concerns.
    pub address: Addr,
    /// Message class.
    pub kind: MessageKind,
    /// Payload size in bytes (header-only messages use 8).
    pub payload: u64,
    /// Sender-local timestamp (cycle accumulator value).
    pub timestamp: u64,
    /// Hops traversed, filled in by the fabric.
    pub hop_count: u32,
}

/// Relaxed atomic counters shared by all transport variants.
#[derive(Debug, Default)]
pub(crate) struct FabricCounters {
    pub total_messages: AtomicU64,
    pub total_latency: AtomicU64,
    pub congestion_events: AtomicU64,
    pub total_hops: AtomicU64,
    pub busy_cycles: AtomicU64,
}

impl FabricCounters {
    pub(crate) fn record(&self, latency: u64, hops: u64, busy: u64) {
        let _ = self.total_messages.fetch_add(1, Ordering::Relaxed);
        let _ = self.total_latency.fetch_add(latency, Ordering::Relaxed);
        let _ = self.total_hops.fetch_add(hops, Ordering::Relaxed);
        let _ = self.busy_cycles.fetch_add(busy, Ordering::Relaxed);
    }

    pub(crate) fn congestion(&self) {
        let _ = self.congestion_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> InterconnectStats {
        InterconnectStats {
            total_messages: self.total_messages.load(Ordering::Relaxed),
            total_latency: self.total_latency.load(Ordering::Relaxed),
            congestion_events: self.congestion_events.load(Ordering::Relaxed),
            total_hops: self.total_hops.load(Ordering::Relaxed),
            busy_cycles: self.busy_cycles.load(Ordering::Relaxed),
        }
    }
}

/// Per-destination delivery queues shared by all transport variants.
#[derive(Debug)]
pub(crate) struct DeliveryQueues {
    queues: Vec<Mutex<VecDeque<Message>>>,
}

impl DeliveryQueues {
    pub(crate) fn new(nodes: usize) -> Self {
        Self {
            queues: (0..nodes).map(|_| Mutex::new(VecDeque::new())).collect(),
        }
    }

    pub(crate) fn push(&self, msg: Message) {
        self.queues[msg.dest]
            .lock()
            .expect("interconnect queue poisoned")
            .push_back(msg);
    }

    pub(crate) fn pop(&self, node: usize) -> Option<Message> {
        self.queues[node]
            .lock()
            .expect("interconnect queue poisoned")
            .pop_front()
    }

    pub(crate) fn len(&self, node: usize) -> usize {
        self.queues[node]
            .lock()
            .expect("interconnect queue poisoned")
            .len()
    }
}

/// Topology-dispatched transport.
#[derive(Debug)]
pub enum Interconnect {
    /// Shared bus.
    Bus(Bus),
    /// Per-destination crossbar.
    Crossbar(Crossbar),
    /// 2D XY-routed mesh.
    Mesh(Mesh),
}

impl Interconnect {
    /// Builds a fabric of `nodes` endpoints (cores plus the directory's
    /// home node) with the given base latency.
    pub fn new(kind: InterconnectKind, nodes: usize, base_latency: u64) -> Self {
        match kind {
            InterconnectKind::Bus => Self::Bus(Bus::new(
                nodes,
                base_latency,
                defaults::INTERCONNECT_WIDTH,
            )),
            InterconnectKind::Crossbar => Self::Crossbar(Crossbar::new(nodes, base_latency)),
            InterconnectKind::Mesh => Self::Mesh(Mesh::new(nodes, base_latency)),
        }
    }

    /// Enqueues a message and returns its modeled latency in cycles.
    pub fn send(&self, msg: Message) -> u64 {
        match self {
            Self::Bus(b) => b.send(msg),
            Self::Crossbar(c) => c.send(msg),
            Self::Mesh(m) => m.send(msg),
        }
    }

    /// Whether `node` has undelivered messages.
    pub fn has_messages(&self, node: usize) -> bool {
        match self {
            Self::Bus(b) => b.has_messages(node),
            Self::Crossbar(c) => c.has_messages(node),
            Self::Mesh(m) => m.has_messages(node),
        }
    }

    /// Pops the oldest undelivered message for `node`.
    pub fn recv(&self, node: usize) -> Option<Message> {
        match self {
            Self::Bus(b) => b.recv(node),
            Self::Crossbar(c) => c.recv(node),
            Self::Mesh(m) => m.recv(node),
        }
    }

    /// Counter snapshot.
    pub fn stats(&self) -> InterconnectStats {
        match self {
            Self::Bus(b) => b.stats(),
            Self::Crossbar(c) => c.stats(),
            Self::Mesh(m) => m.stats(),
        }
    }
}
