//! Interconnect fabric unit tests.

use cachesim_core::config::InterconnectKind;
use cachesim_core::interconnect::{Interconnect, Mesh, Message, MessageKind};
use pretty_assertions::assert_eq;

fn message(source: usize, dest: usize, payload: u64) -> Message {
    Message {
        source,
        dest,
        address: 0x1000,
        kind: MessageKind::CoherenceRequest,
        payload,
        timestamp: 0,
        hop_count: 0,
    }
}

// ══════════════════════════════════════════════════════════
// 1. Bus
// ══════════════════════════════════════════════════════════

/// Bus latency is base + ⌈payload / width⌉ (width 8).
#[test]
fn bus_latency_formula() {
    let bus = Interconnect::new(InterconnectKind::Bus, 3, 2);
    assert_eq!(bus.send(message(0, 1, 8)), 2 + 1);
    assert_eq!(bus.send(message(0, 1, 64)), 2 + 8);
    assert_eq!(bus.send(message(0, 1, 1)), 2 + 1, "partial word still transfers");
}

/// Messages are delivered per destination, in order.
#[test]
fn bus_delivers_in_order() {
    let bus = Interconnect::new(InterconnectKind::Bus, 3, 1);
    let _ = bus.send(message(0, 2, 8));
    let _ = bus.send(message(1, 2, 16));
    assert!(bus.has_messages(2));
    assert!(!bus.has_messages(0));
    let first = bus.recv(2).expect("first message");
    assert_eq!(first.source, 0);
    let second = bus.recv(2).expect("second message");
    assert_eq!(second.source, 1);
    assert_eq!(bus.recv(2).map(|m| m.source), None);
}

/// Fabric counters accumulate across sends.
#[test]
fn bus_counters_accumulate() {
    let bus = Interconnect::new(InterconnectKind::Bus, 2, 2);
    let _ = bus.send(message(0, 1, 8));
    let _ = bus.send(message(1, 0, 64));
    let stats = bus.stats();
    assert_eq!(stats.total_messages, 2);
    assert_eq!(stats.total_latency, 3 + 10);
    assert_eq!(stats.total_hops, 2);
    assert!(stats.utilization() > 0.0);
}

// ══════════════════════════════════════════════════════════
// 2. Crossbar
// ══════════════════════════════════════════════════════════

/// Uncontended crossbar sends cost exactly the base latency.
#[test]
fn crossbar_base_latency() {
    let xbar = Interconnect::new(InterconnectKind::Crossbar, 4, 5);
    assert_eq!(xbar.send(message(0, 1, 8)), 5);
    assert_eq!(xbar.send(message(2, 3, 64)), 5, "payload does not matter");
}

/// Different destinations never conflict; queues stay separate.
#[test]
fn crossbar_separates_destinations() {
    let xbar = Interconnect::new(InterconnectKind::Crossbar, 4, 1);
    let _ = xbar.send(message(0, 1, 8));
    let _ = xbar.send(message(0, 2, 8));
    assert!(xbar.has_messages(1));
    assert!(xbar.has_messages(2));
    assert!(!xbar.has_messages(3));
    assert_eq!(xbar.stats().congestion_events, 0);
}

// ══════════════════════════════════════════════════════════
// 3. Mesh
// ══════════════════════════════════════════════════════════

/// XY hop counts on a 3-wide grid (5 nodes: 4 cores + home).
#[test]
fn mesh_xy_hop_counts() {
    let mesh = Mesh::new(5, 1);
    // Node layout: 0(0,0) 1(1,0) 2(2,0) 3(0,1) 4(1,1).
    assert_eq!(mesh.hops(0, 1), 1);
    assert_eq!(mesh.hops(0, 2), 2);
    assert_eq!(mesh.hops(0, 4), 2);
    assert_eq!(mesh.hops(2, 3), 3);
    assert_eq!(mesh.hops(1, 1), 1, "local delivery still crosses the router");
}

/// Mesh latency scales with hops × link latency.
#[test]
fn mesh_latency_scales_with_hops() {
    let mesh = Interconnect::new(InterconnectKind::Mesh, 5, 3);
    assert_eq!(mesh.send(message(0, 1, 8)), 3);
    assert_eq!(mesh.send(message(0, 2, 8)), 6);
    let stats = mesh.stats();
    assert_eq!(stats.total_hops, 3);
    assert!((stats.avg_hops() - 1.5).abs() < 1e-9);
}

/// A backed-up destination router doubles the per-hop cost and counts
/// congestion.
#[test]
fn mesh_congestion_penalty() {
    let mesh = Interconnect::new(InterconnectKind::Mesh, 5, 1);
    // Fill node 1's queue past the threshold without draining it.
    for _ in 0..5 {
        assert_eq!(mesh.send(message(0, 1, 8)), 1);
    }
    // The sixth send sees 5 queued (> 4) and pays double.
    assert_eq!(mesh.send(message(0, 1, 8)), 2);
    assert_eq!(mesh.stats().congestion_events, 1);
}
