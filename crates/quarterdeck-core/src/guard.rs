//! Typed-name confirmation guard for destructive operations.
//!
//! Deleting an entity requires the operator to retype its human-readable
//! name exactly. The check is a pure function so it can be exercised
//! without any transport in the picture.

/// Outcome of comparing the typed confirmation against the expected name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Exact match; the destructive call may proceed.
    Match,
    /// Anything else. The operator is re-prompted; a mismatch is not a
    /// cancellation.
    Mismatch,
}

/// Case-sensitive exact comparison. No trimming: "alice " does not confirm
/// "alice".
pub fn confirm_typed(expected: &str, typed: &str) -> ConfirmOutcome {
    if expected == typed {
        ConfirmOutcome::Match
    } else {
        ConfirmOutcome::Mismatch
    }
}
