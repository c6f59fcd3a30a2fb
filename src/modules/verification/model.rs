use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::modules::profile::model::MemberType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    UnderReview,
    Returned,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::UnderReview => "under_review",
            Self::Returned => "returned",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Waiting on a reviewer.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::UnderReview)
    }
}

// =============================================================================
// VERIFICATION REQUEST
// =============================================================================

/// Document-review case for a coach or club (`verification_requests` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub id: String,
    pub user_id: String,
    pub member_type: MemberType,
    pub status: VerificationStatus,
    #[serde(default)]
    pub documents: Vec<String>,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub return_reason: Option<String>,
    #[serde(default)]
    pub return_notes: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub resubmitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resubmit_count: i32,
}

impl VerificationRequest {
    /// Most recent write by either side of the review.
    pub fn last_activity(&self) -> DateTime<Utc> {
        [Some(self.submitted_at), self.resubmitted_at, self.reviewed_at]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(self.submitted_at)
    }

    /// Reviewer feedback shown on the upload form after a return.
    pub fn reviewer_notes(&self) -> Option<&str> {
        if self.status != VerificationStatus::Returned {
            return None;
        }
        self.return_notes
            .as_deref()
            .or(self.return_reason.as_deref())
            .filter(|notes| !notes.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewVerificationRequest {
    pub user_id: String,
    pub member_type: MemberType,
    pub status: VerificationStatus,
    pub documents: Vec<String>,
    pub submitted_at: DateTime<Utc>,
    pub resubmit_count: i32,
}

/// Partial update. `Some(None)` on the nullable fields writes `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerificationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VerificationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resubmitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resubmit_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_notes: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_reason: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl VerificationPatch {
    pub fn apply(&self, request: &mut VerificationRequest) {
        if let Some(documents) = &self.documents {
            request.documents = documents.clone();
        }
        if let Some(status) = self.status {
            request.status = status;
        }
        if let Some(at) = self.resubmitted_at {
            request.resubmitted_at = Some(at);
        }
        if let Some(count) = self.resubmit_count {
            request.resubmit_count = count;
        }
        if let Some(notes) = &self.return_notes {
            request.return_notes = notes.clone();
        }
        if let Some(reason) = &self.return_reason {
            request.return_reason = reason.clone();
        }
        if let Some(reason) = &self.rejection_reason {
            request.rejection_reason = reason.clone();
        }
        if let Some(at) = self.reviewed_at {
            request.reviewed_at = Some(at);
        }
    }
}
