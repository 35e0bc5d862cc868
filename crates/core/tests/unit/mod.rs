//! # Unit Components
//!
//! This module organizes the unit tests for every simulator subsystem,
//! mirroring the `src/` layout.

/// Address decoding round-trips and bit slicing.
pub mod addr;

/// One cache level: hits, misses, evictions, write policies, flush.
pub mod cache;


/// Configuration parsing, defaults, and validation.
pub mod config;


/// Interconnect fabrics: bus, crossbar, mesh.
pub mod interconnect;




/// Statistics derivations and roll-ups.
pub mod stats;

/// Trace-line parsing and the streaming reader.
pub mod trace;
