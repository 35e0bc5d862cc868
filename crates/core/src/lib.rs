//! Trace-driven cache hierarchy simulator library.
//!
//! This crate implements a multi-level set-associative cache simulator with
//! the following:
//! 1. **Cache:** Set-associative levels with pluggable replacement (LRU,
//!    FIFO, Random, PLRU, NRU, MRU) and write policies, a victim cache, and
//!    a write-combining buffer.
//! 2. **Prefetch:** Stream buffer, stride predictor, and an adaptive
//!    controller that tunes the prefetch distance to observed usefulness.
//! 3. **Hierarchy:** `MemoryHierarchy` routing demand accesses through L1,
//!    the victim cache, and the optional L2.
//! 4. **Coherence:** A MESI directory arbitrating per-line permissions
//!    across cores, with invalidations delivered straight into peer L1s.
//! 5. **Multiprocessor:** One worker thread per core over a Bus, Crossbar,
//!    or 2D-mesh interconnect with purely accumulated latency.
//! 6. **I/O:** Trace parsing, JSON configuration with validation, and
//!    statistics roll-ups for reporting and CSV export.

/// Set-associative cache level, victim cache, and write-combining buffer.
pub mod cache;
/// MESI states, transition tables, and the coherence directory.
pub mod coherence;
/// Common types (addresses, decoding, errors).
pub mod common;
/// Simulator configuration (defaults, enums, validation).
pub mod config;
/// Single-core memory hierarchy.
pub mod hierarchy;
/// Interconnect fabrics (Bus, Crossbar, Mesh).
pub mod interconnect;
/// Multiprocessor system: cores, barrier, parallel workers.
pub mod mp;
/// Prefetchers (stream, stride, adaptive).
pub mod prefetch;
/// Statistics collection and reporting.
pub mod stats;
/// Trace input parsing.
pub mod trace;

/// Root configuration type; use `SimConfig::default()` or deserialize from JSON.
pub use crate::config::SimConfig;
/// Single-core hierarchy; construct with `MemoryHierarchy::new`.
pub use crate::hierarchy::MemoryHierarchy;
/// Multi-core system; construct with `MultiProcessorSystem::new`.
pub use crate::mp::MultiProcessorSystem;
/// Roll-up of one run's statistics.
pub use crate::stats::SimulationReport;
