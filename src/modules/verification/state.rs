use chrono::{DateTime, Utc};

use super::model::{
    NewVerificationRequest, VerificationPatch, VerificationRequest, VerificationStatus,
};
use crate::modules::profile::model::{AccountStatus, MemberType, Profile};

// =============================================================================
// TRANSITIONS
// =============================================================================

/// Events that move `account_status`. Only `DocumentsSubmitted` originates
/// in the client; the rest are reviewer actions observed after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    DocumentsSubmitted,
    Approved,
    Returned,
    Rejected,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {trigger:?} to an account that is {from}")]
pub struct TransitionError {
    pub from: AccountStatus,
    pub trigger: Trigger,
}

pub fn transition(from: AccountStatus, trigger: Trigger) -> Result<AccountStatus, TransitionError> {
    use AccountStatus::*;

    let to = match (from, trigger) {
        (Pending | Returned, Trigger::DocumentsSubmitted) => UnderReview,
        (UnderReview, Trigger::Approved) => Active,
        (UnderReview, Trigger::Returned) => Returned,
        (UnderReview, Trigger::Rejected) => Rejected,
        (_, Trigger::Suspended) => Suspended,
        _ => return Err(TransitionError { from, trigger }),
    };
    Ok(to)
}

/// States in which the upload form is shown.
pub fn accepts_documents(status: AccountStatus) -> bool {
    transition(status, Trigger::DocumentsSubmitted).is_ok()
}

/// Only a reviewer can move the account out of these.
pub fn is_final_for_client(status: AccountStatus) -> bool {
    matches!(status, AccountStatus::Rejected | AccountStatus::Suspended)
}

// =============================================================================
// EFFECTIVE STATUS
// =============================================================================

/// Reconciles the profile's stored status with the live request.
///
/// A suspension always wins and players are always active. An open
/// request outranks a profile that still offers the upload form, since
/// only a reviewer closes a request. Otherwise whichever row was written
/// last decides; ties go to the request.
pub fn effective_status(profile: &Profile, request: Option<&VerificationRequest>) -> AccountStatus {
    if profile.account_status == AccountStatus::Suspended {
        return AccountStatus::Suspended;
    }
    match profile.member_type {
        MemberType::Player => return AccountStatus::Active,
        MemberType::Moderator | MemberType::SuperAdmin => return profile.account_status,
        MemberType::Coach | MemberType::Club => {}
    }

    let Some(request) = request else {
        return profile.account_status;
    };
    if request.status.is_open()
        && matches!(
            profile.account_status,
            AccountStatus::Pending | AccountStatus::Returned
        )
    {
        return AccountStatus::UnderReview;
    }
    if request.last_activity() < profile.updated_at {
        return profile.account_status;
    }

    match request.status {
        VerificationStatus::Pending | VerificationStatus::UnderReview => AccountStatus::UnderReview,
        VerificationStatus::Returned => AccountStatus::Returned,
        VerificationStatus::Rejected => AccountStatus::Rejected,
        VerificationStatus::Approved => match profile.account_status {
            AccountStatus::Approved => AccountStatus::Approved,
            _ => AccountStatus::Active,
        },
    }
}

/// A submission whose status write never landed: the request is under
/// review while the profile still offers the upload form.
pub fn needs_repair(profile: &Profile, effective: AccountStatus) -> bool {
    effective == AccountStatus::UnderReview
        && matches!(
            profile.account_status,
            AccountStatus::Pending | AccountStatus::Returned
        )
}

// =============================================================================
// SUBMISSION
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionWrite {
    Insert(NewVerificationRequest),
    Update { id: String, patch: VerificationPatch },
}

/// First write of a submission: a new request, or an update of the live
/// one that bumps `resubmit_count` and clears the reviewer's notes.
pub fn plan_submission(
    profile: &Profile,
    existing: Option<&VerificationRequest>,
    documents: Vec<String>,
    now: DateTime<Utc>,
) -> SubmissionWrite {
    match existing {
        None => SubmissionWrite::Insert(NewVerificationRequest {
            user_id: profile.id.clone(),
            member_type: profile.member_type,
            status: VerificationStatus::UnderReview,
            documents,
            submitted_at: now,
            resubmit_count: 0,
        }),
        Some(request) => SubmissionWrite::Update {
            id: request.id.clone(),
            patch: VerificationPatch {
                documents: Some(documents),
                status: Some(VerificationStatus::UnderReview),
                resubmitted_at: Some(now),
                resubmit_count: Some(request.resubmit_count + 1),
                return_notes: Some(None),
                return_reason: Some(None),
                ..Default::default()
            },
        },
    }
}
