//! Interruption recovery policy.
//!
//! A gap is wall-clock time the session could not account for: a suspend,
//! a starved scheduler, a long pause, or a process restart. Short gaps are
//! forgiven without charging the session; long ones invalidate it.

use std::time::Duration;

/// What to do with a session after an observed gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryDecision {
    /// Keep the session; the gap is not counted against it.
    Resume { gap: Duration },
    /// End the session with an Invalidated outcome.
    Invalidate { gap: Duration },
}

impl RecoveryDecision {
    pub fn gap(&self) -> Duration {
        match self {
            RecoveryDecision::Resume { gap } | RecoveryDecision::Invalidate { gap } => *gap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptionPolicy {
    resume_threshold: Duration,
}

impl InterruptionPolicy {
    pub fn new(resume_threshold: Duration) -> Self {
        Self { resume_threshold }
    }

    pub fn resume_threshold(&self) -> Duration {
        self.resume_threshold
    }

    pub fn decide(&self, gap: Duration) -> RecoveryDecision {
        if gap <= self.resume_threshold {
            RecoveryDecision::Resume { gap }
        } else {
            RecoveryDecision::Invalidate { gap }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gap_at_threshold_resumes() {
        let policy = InterruptionPolicy::new(Duration::from_secs(300));
        assert_eq!(
            policy.decide(Duration::from_secs(299)),
            RecoveryDecision::Resume { gap: Duration::from_secs(299) }
        );
        assert_eq!(
            policy.decide(Duration::from_secs(300)),
            RecoveryDecision::Resume { gap: Duration::from_secs(300) }
        );
    }

    #[test]
    fn gap_past_threshold_invalidates() {
        let policy = InterruptionPolicy::new(Duration::from_secs(300));
        let decision = policy.decide(Duration::from_millis(300_001));
        assert!(matches!(decision, RecoveryDecision::Invalidate { .. }));
        assert_eq!(decision.gap(), Duration::from_millis(300_001));
    }
}
