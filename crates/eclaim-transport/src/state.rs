//! Delivery state machine.
//!
//! ```text
//! Init → SentPrimary ─2xx→ Success
//!            │ 401
//!            ▼
//!        NeedsRetry → SentRetry ─2xx→ Success
//!            400 / timeout / conn │ 400 / 401 / timeout / conn
//!            ▼                    ▼
//!        NeedsFallbackA → SentFallbackA ─2xx→ Success
//!                               │ any failure
//!                               ▼
//!        NeedsFallbackB → SentFallbackB ─2xx→ Success, else Failed
//! ```
//!
//! Any other status at primary or retry ends the run as `Failed`.

use std::fmt;

use eclaim_storage::AuditStage;
use serde::{Deserialize, Serialize};

/// Which of the (at most four) network attempts this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttemptKind {
    Primary,
    Retry,
    FallbackA,
    FallbackB,
}

impl AttemptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Retry => "retry",
            Self::FallbackA => "fallbackA",
            Self::FallbackB => "fallbackB",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Primary | Self::Retry => "text/plain",
            Self::FallbackA => "application/x-www-form-urlencoded",
            Self::FallbackB => "application/json",
        }
    }

    /// Audit section this attempt is written to.
    pub fn audit_stage(&self) -> AuditStage {
        match self {
            Self::Primary => AuditStage::PrimaryAttempt,
            Self::Retry => AuditStage::RetryAttempt,
            Self::FallbackA => AuditStage::FallbackAAttempt,
            Self::FallbackB => AuditStage::FallbackBAttempt,
        }
    }
}

impl fmt::Display for AttemptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What came back from one attempt, reduced to what the machine needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Success,
    Unauthorized,
    BadRequest,
    OtherStatus,
    Timeout,
    ConnectionFailed,
}

impl Observation {
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => Self::Success,
            401 => Self::Unauthorized,
            400 => Self::BadRequest,
            _ => Self::OtherStatus,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Init,
    SentPrimary,
    NeedsRetry,
    SentRetry,
    NeedsFallbackA,
    SentFallbackA,
    NeedsFallbackB,
    SentFallbackB,
    Success,
    Failed,
}

impl TransportState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// The attempt to send from a waiting state, and the state after
    /// sending it. `None` from any state that has nothing to send.
    pub fn begin(self) -> Option<(AttemptKind, TransportState)> {
        match self {
            Self::Init => Some((AttemptKind::Primary, Self::SentPrimary)),
            Self::NeedsRetry => Some((AttemptKind::Retry, Self::SentRetry)),
            Self::NeedsFallbackA => Some((AttemptKind::FallbackA, Self::SentFallbackA)),
            Self::NeedsFallbackB => Some((AttemptKind::FallbackB, Self::SentFallbackB)),
            _ => None,
        }
    }

    /// Transition table for the `Sent*` states. `None` if `self` is not
    /// awaiting a response.
    pub fn on(self, observation: Observation) -> Option<TransportState> {
        use Observation::*;

        let next = match (self, observation) {
            (Self::SentPrimary, Success) => Self::Success,
            (Self::SentPrimary, Unauthorized) => Self::NeedsRetry,
            (Self::SentPrimary, BadRequest | Timeout | ConnectionFailed) => Self::NeedsFallbackA,
            (Self::SentPrimary, OtherStatus) => Self::Failed,

            (Self::SentRetry, Success) => Self::Success,
            (Self::SentRetry, Unauthorized | BadRequest | Timeout | ConnectionFailed) => {
                Self::NeedsFallbackA
            }
            (Self::SentRetry, OtherStatus) => Self::Failed,

            (Self::SentFallbackA, Success) => Self::Success,
            (Self::SentFallbackA, _) => Self::NeedsFallbackB,

            (Self::SentFallbackB, Success) => Self::Success,
            (Self::SentFallbackB, _) => Self::Failed,

            _ => return None,
        };
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Observation::*;
    use TransportState as S;

    #[test]
    fn status_classification() {
        assert_eq!(Observation::from_status(200), Success);
        assert_eq!(Observation::from_status(204), Success);
        assert_eq!(Observation::from_status(401), Unauthorized);
        assert_eq!(Observation::from_status(400), BadRequest);
        assert_eq!(Observation::from_status(500), OtherStatus);
        assert_eq!(Observation::from_status(302), OtherStatus);
    }

    #[test]
    fn primary_transitions() {
        assert_eq!(S::SentPrimary.on(Success), Some(S::Success));
        assert_eq!(S::SentPrimary.on(Unauthorized), Some(S::NeedsRetry));
        assert_eq!(S::SentPrimary.on(BadRequest), Some(S::NeedsFallbackA));
        assert_eq!(S::SentPrimary.on(Timeout), Some(S::NeedsFallbackA));
        assert_eq!(S::SentPrimary.on(ConnectionFailed), Some(S::NeedsFallbackA));
        assert_eq!(S::SentPrimary.on(OtherStatus), Some(S::Failed));
    }

    #[test]
    fn timeout_never_leads_to_retry() {
        for state in [S::SentPrimary, S::SentRetry, S::SentFallbackA, S::SentFallbackB] {
            assert_ne!(state.on(Timeout), Some(S::NeedsRetry));
        }
    }

    #[test]
    fn retry_transitions() {
        assert_eq!(S::SentRetry.on(Success), Some(S::Success));
        assert_eq!(S::SentRetry.on(Unauthorized), Some(S::NeedsFallbackA));
        assert_eq!(S::SentRetry.on(BadRequest), Some(S::NeedsFallbackA));
        assert_eq!(S::SentRetry.on(Timeout), Some(S::NeedsFallbackA));
        assert_eq!(S::SentRetry.on(OtherStatus), Some(S::Failed));
    }

    #[test]
    fn fallback_transitions() {
        assert_eq!(S::SentFallbackA.on(Success), Some(S::Success));
        for obs in [Unauthorized, BadRequest, OtherStatus, Timeout, ConnectionFailed] {
            assert_eq!(S::SentFallbackA.on(obs), Some(S::NeedsFallbackB));
            assert_eq!(S::SentFallbackB.on(obs), Some(S::Failed));
        }
        assert_eq!(S::SentFallbackB.on(Success), Some(S::Success));
    }

    #[test]
    fn waiting_states_do_not_accept_observations() {
        for state in [S::Init, S::NeedsRetry, S::NeedsFallbackA, S::NeedsFallbackB, S::Success, S::Failed] {
            assert_eq!(state.on(Success), None);
        }
    }

    #[test]
    fn begin_pairs_attempt_with_sent_state() {
        assert_eq!(S::Init.begin(), Some((AttemptKind::Primary, S::SentPrimary)));
        assert_eq!(S::NeedsRetry.begin(), Some((AttemptKind::Retry, S::SentRetry)));
        assert_eq!(S::NeedsFallbackB.begin(), Some((AttemptKind::FallbackB, S::SentFallbackB)));
        assert_eq!(S::Success.begin(), None);
        assert_eq!(S::SentPrimary.begin(), None);
    }

    #[test]
    fn longest_path_is_four_attempts() {
        let mut state = S::Init;
        let mut attempts = 0;
        let script = [Unauthorized, Unauthorized, BadRequest, BadRequest];
        while let Some((_, sent)) = state.begin() {
            state = sent.on(script[attempts]).unwrap();
            attempts += 1;
        }
        assert_eq!(attempts, 4);
        assert_eq!(state, S::Failed);
    }

    #[test]
    fn attempt_metadata() {
        assert_eq!(AttemptKind::FallbackA.content_type(), "application/x-www-form-urlencoded");
        assert_eq!(AttemptKind::Retry.audit_stage(), AuditStage::RetryAttempt);
        assert_eq!(serde_json::to_value(AttemptKind::FallbackB).unwrap(), "fallbackB");
    }
}
