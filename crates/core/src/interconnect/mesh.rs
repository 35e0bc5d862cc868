//! 2D-mesh transport.
//!
//! Nodes sit on a W×H grid (W = ⌈√nodes⌉) and messages route XY: along the
//! row first, then the column. Each hop costs the link latency; a message
//! whose destination router has more than
//! [`defaults::MESH_CONGESTION_THRESHOLD`] messages queued pays double per
//! hop and counts a congestion event.

use super::{DeliveryQueues, FabricCounters, Message};
use crate::config::defaults;
use crate::stats::InterconnectStats;

/// XY-routed 2D mesh.
#[derive(Debug)]
pub struct Mesh {
    queues: DeliveryQueues,
    width: usize,
    link_latency: u64,
    congestion_threshold: usize,
    counters: FabricCounters,
}

impl Mesh {
    /// Creates a mesh connecting `nodes` endpoints on a near-square grid.
    pub fn new(nodes: usize, link_latency: u64) -> Self {
        let width = (nodes as f64).sqrt().ceil() as usize;
        Self {
            queues: DeliveryQueues::new(nodes),
            width: width.max(1),
            link_latency,
            congestion_threshold: defaults::MESH_CONGESTION_THRESHOLD as usize,
            counters: FabricCounters::default(),
        }
    }

    fn coords(&self, node: usize) -> (usize, usize) {
        (node % self.width, node / self.width)
    }

    /// XY hop count between two nodes (minimum 1 for distinct-router
    /// delivery semantics).
    pub fn hops(&self, from: usize, to: usize) -> u64 {
        let (fx, fy) = self.coords(from);
        let (tx, ty) = self.coords(to);
        let manhattan = fx.abs_diff(tx) + fy.abs_diff(ty);
        manhattan.max(1) as u64
    }

    /// Routes the message, returning `hops × link_latency`, doubled when
    /// the destination router is congested.
    pub fn send(&self, mut msg: Message) -> u64 {
        let hops = self.hops(msg.source, msg.dest);
        let congested = self.queues.len(msg.dest) > self.congestion_threshold;
        if congested {
            self.counters.congestion();
        }
        let per_hop = if congested {
            self.link_latency * 2
        } else {
            self.link_latency
        };
        let latency = hops * per_hop;
        msg.hop_count = hops as u32;
        self.counters.record(latency, hops, hops * self.link_latency);
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
