//! Session model and state machine.
//!
//! - [`Session`]: the active session and its transitions
//! - [`WarningEvaluator`]: one-shot warning threshold detection
//! - [`InterruptionPolicy`]: resume-or-invalidate decision after a gap

mod interruption;
mod machine;
mod model;
mod warning;

pub use interruption::{InterruptionPolicy, RecoveryDecision};
pub use machine::{validate_duration, Transition};
pub use model::{
    CompletionStatus, Session, SessionId, SessionOutcome, SessionSettings, SessionSnapshot,
    SessionState, MAX_DURATION_MINUTES, MIN_DURATION_MINUTES,
};
pub use warning::WarningEvaluator;
