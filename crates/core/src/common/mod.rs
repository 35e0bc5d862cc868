//! Common types shared across the simulation engine.
//!
//! This module provides the building blocks used by every component:
//! 1. **Addresses:** The `Addr` alias and the `AddressDecoder` that splits an
//!    address into (tag, set index, block offset).
//! 2. **Errors:** Configuration, trace, and I/O error types.

/// Address decomposition (tag / set index / block offset).
pub mod addr;
/// Error types for configuration, trace input, and simulation I/O.
pub mod error;

pub use addr::{Addr, AddressDecoder, DecodedAddr};
pub use error::{ConfigError, SimError, TraceError};
