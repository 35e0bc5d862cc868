//! Hardware prefetchers.
//!
//! Three cooperating pieces hide miss latency on regular access patterns:
//! 1. **[`StreamBuffer`]**: a sequential N-ahead buffer filled on demand
//!    misses.
//! 2. **[`StridePredictor`]**: a table detecting constant strides per
//!    address region, issuing predictions once confidence is established.
//! 3. **[`AdaptivePrefetcher`]**: combines both and, when enabled, adjusts
//!    the stream depth to the observed usefulness of past prefetches.
//!
//! Prefetch-triggered installs are invisible to demand hit/miss statistics;
//! only the dedicated prefetch counters see them.

/// Adaptive stream + stride combiner.
pub mod adaptive;
/// Sequential stream buffer.
pub mod stream;
/// Constant-stride predictor.
pub mod stride;

pub use adaptive::AdaptivePrefetcher;
pub use stream::StreamBuffer;
pub use stride::StridePredictor;
