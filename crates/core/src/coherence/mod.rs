//! Cache coherence: MESI states and the directory controller.

/// Directory-based coherence controller and per-core slots.
pub mod directory;
/// MESI states and transition tables.
pub mod mesi;

pub use directory::{
    CoherenceDirectory, CoherenceRequest, CoherenceResponse, CoreSlot, DirectoryEntry, RequestKind,
};
pub use mesi::MesiState;
