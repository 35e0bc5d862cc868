//! MESI coherence states and transition tables.
//!
//! The per-line state machine is expressed as pure functions over
//! [`MesiState`] so the same tables serve the per-core cache controllers,
//! the directory, and the tests. Transitions are split by who observes the
//! event:
//! 1. **Local events:** the owning core reads or writes its own line.
//! 2. **Remote events:** another core's request reaches this line via the
//!    directory (read ⇒ downgrade, write/invalidate ⇒ invalidate).
//!
//! Global invariant: at most one core holds a line in M or E; if any core
//! holds it in S, none holds it in M or E; only M copies may differ from
//! memory.

use serde::Serialize;

/// Per-line MESI coherence state.
///
/// In a single-core configuration the state degenerates to a validity flag:
/// installs produce E (clean) or M (dirty) and no remote events occur.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize)]
pub enum MesiState {
    /// Dirty, exclusively owned; memory is stale.
    Modified,
    /// Clean, exclusively owned.
    Exclusive,
    /// Clean, potentially resident in several caches.
    Shared,
    /// Not resident.
    #[default]
    Invalid,
}

impl MesiState {
    /// Whether a line in this state holds usable data.
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::Invalid
    }

    /// Whether a local write may proceed without a coherence request.
    #[inline]
    pub fn permits_write(self) -> bool {
        self == Self::Modified
    }

    /// Whether a local read may proceed without a coherence request.
    #[inline]
    pub fn permits_read(self) -> bool {
        self.is_valid()
    }

    /// Short display form (`M`/`E`/`S`/`I`).
    pub fn letter(self) -> char {
        match self {
            Self::Modified => 'M',
            Self::Exclusive => 'E',
            Self::Shared => 'S',
            Self::Invalid => 'I',
        }
    }
}

/// Side effects of a remote event on a cached line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoteEffect {
    /// State the line transitions to.
    pub next: MesiState,
    /// Whether the transition forces a writeback (the line was Modified).
    pub writeback: bool,
}

/// Local read transition.
///
/// `shared_elsewhere` reports whether any other cache holds the line; it
/// decides E versus S on a fill from Invalid. Valid states read-hit without
/// changing state.
#[inline]
pub fn on_local_read(state: MesiState, shared_elsewhere: bool) -> MesiState {
    match state {
        MesiState::Invalid => {
            if shared_elsewhere {
                MesiState::Shared
            } else {
                MesiState::Exclusive
            }
        }
        other => other,
    }
}

/// Local write transition: every state moves to Modified (peers are
/// invalidated by the directory before the write is granted).
#[inline]
pub fn on_local_write(_state: MesiState) -> MesiState {
    MesiState::Modified
}

/// Remote read observed by a core holding the line in `state`.
///
/// M and E downgrade to S (M supplies data and writes back); S and I are
/// unchanged.
#[inline]
pub fn on_remote_read(state: MesiState) -> RemoteEffect {
    match state {
        MesiState::Modified => RemoteEffect {
            next: MesiState::Shared,
            writeback: true,
        },
        MesiState::Exclusive => RemoteEffect {
            next: MesiState::Shared,
            writeback: false,
        },
        MesiState::Shared => RemoteEffect {
            next: MesiState::Shared,
            writeback: false,
        },
        MesiState::Invalid => RemoteEffect {
            next: MesiState::Invalid,
            writeback: false,
        },
    }
}

/// Remote write (or explicit invalidate) observed by a core holding the
/// line in `state`: every valid state invalidates, M writing back first.
#[inline]
pub fn on_remote_write(state: MesiState) -> RemoteEffect {
    RemoteEffect {
        next: MesiState::Invalid,
        writeback: state == MesiState::Modified,
    }
}
