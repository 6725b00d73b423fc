//! Caller-facing result of a submission.

use eclaim_core::{BillingPeriod, ResolvedServiceType};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::state::AttemptKind;

/// Facility identity echoed back in successful submissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityInfo {
    pub name: String,
    /// Insurer-issued facility code
    pub facility_code: String,
    /// Ministry of health registration code
    pub ministry_code: String,
}

/// A delivered claim.
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub episode_number: String,
    pub service_type: ResolvedServiceType,
    pub period: BillingPeriod,
    pub facility: FacilityInfo,
    pub delivered_via: AttemptKind,
    pub status: u16,
    pub clearinghouse_response: Value,
    pub attempts: usize,
}

impl SubmissionReceipt {
    pub fn message(&self) -> String {
        match self.delivered_via {
            AttemptKind::Primary | AttemptKind::Retry => {
                "Medical record delivered to the clearinghouse".to_string()
            }
            AttemptKind::FallbackA => {
                "Medical record delivered to the clearinghouse (form encoding)".to_string()
            }
            AttemptKind::FallbackB => {
                "Medical record delivered to the clearinghouse (JSON encoding)".to_string()
            }
        }
    }

    /// Success body: `{success, message, metadata, deliveredVia, clearinghouseResponse}`.
    pub fn to_json(&self) -> Value {
        json!({
            "success": true,
            "message": self.message(),
            "metadata": {
                "episodeNumber": self.episode_number,
                "serviceType": self.service_type.wire_value(),
                "billingPeriod": {
                    "month": self.period.month,
                    "year": self.period.year,
                },
                "facility": self.facility,
            },
            "deliveredVia": self.delivered_via,
            "attempts": self.attempts,
            "clearinghouseResponse": self.clearinghouse_response,
        })
    }
}
