//! Delivery of sealed claims to the clearinghouse.
//!
//! [`TransportClient`] runs the retry/fallback state machine in [`state`];
//! [`ClaimSubmitter`] wires normalization, sealing, service-type resolution,
//! delivery and the audit trail into one call.

pub mod error;
pub mod outcome;
pub mod pipeline;
pub mod service_type;
pub mod state;
pub mod transport;

pub use error::{SubmissionError, TransportError, TransportFailure};
pub use outcome::{FacilityInfo, SubmissionReceipt};
pub use pipeline::ClaimSubmitter;
pub use service_type::ServiceTypeResolver;
pub use state::{AttemptKind, Observation, TransportState};
pub use transport::{
    AttemptOutcome, AttemptRecord, AttemptRecorder, DEFAULT_CLAIMS_PATH, DEFAULT_TIMEOUT,
    Delivery, NoopRecorder, TransportClient, TransportConfig,
};
