use chrono::{DateTime, Utc};

use super::watcher::current_status;
use super::VerificationError;
use crate::modules::profile::model::AccountStatus;
use crate::services::backend::BackendResult;
use crate::services::session::SessionStore;

pub const EXPECTED_REVIEW_TIME: &str = "24-48 ساعة";

const REJECTION_SUBJECT: &str = "استفسار عن رفض الحساب";
const SUSPENSION_SUBJECT: &str = "استفسار عن إيقاف الحساب";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportContact {
    pub email: String,
}

impl SupportContact {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }

    pub fn mailto(&self, subject: &str) -> String {
        format!("mailto:{}?subject={}", self.email, percent_encode(subject))
    }
}

// RFC 3986 unreserved characters pass through, every other byte is escaped.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Read-only view shown while a reviewer has the request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewProgress {
    pub status: AccountStatus,
    pub account_created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub resubmit_count: i32,
    pub documents: usize,
}

impl ReviewProgress {
    pub async fn load(store: &SessionStore) -> Result<Self, VerificationError> {
        let view = current_status(store).await?;
        let request = view.request.as_ref();
        Ok(Self {
            status: view.status,
            account_created_at: view.profile.created_at,
            submitted_at: request.map(|r| r.resubmitted_at.unwrap_or(r.submitted_at)),
            resubmit_count: request.map(|r| r.resubmit_count).unwrap_or_default(),
            documents: request.map(|r| r.documents.len()).unwrap_or_default(),
        })
    }

    pub fn expected_review_time(&self) -> &'static str {
        EXPECTED_REVIEW_TIME
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectionNotice {
    pub reason: Option<String>,
    pub support: SupportContact,
}

impl RejectionNotice {
    pub async fn load(store: &SessionStore, support: SupportContact) -> Result<Self, VerificationError> {
        let user_id = store
            .identity()
            .map(|i| i.id)
            .ok_or(VerificationError::NotSignedIn)?;
        let reason = store
            .backend()
            .latest_request(&user_id)
            .await?
            .and_then(|r| r.rejection_reason)
            .filter(|r| !r.trim().is_empty());
        Ok(Self { reason, support })
    }

    pub fn contact_link(&self) -> String {
        self.support.mailto(REJECTION_SUBJECT)
    }

    pub async fn sign_out(&self, store: &SessionStore) -> BackendResult<()> {
        store.sign_out().await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuspensionNotice {
    pub support: SupportContact,
}

impl SuspensionNotice {
    pub fn new(support: SupportContact) -> Self {
        Self { support }
    }

    pub fn contact_link(&self) -> String {
        self.support.mailto(SUSPENSION_SUBJECT)
    }

    pub async fn sign_out(&self, store: &SessionStore) -> BackendResult<()> {
        store.sign_out().await
    }
}
