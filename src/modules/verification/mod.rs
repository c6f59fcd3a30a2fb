pub mod controller;
pub mod model;
pub mod review;
pub mod state;
pub mod watcher;

use crate::modules::profile::model::{AccountStatus, MemberType};
use crate::services::backend::BackendError;
use state::TransitionError;

pub use controller::{DocumentUpload, UploadFile, UploadOutcome};
pub use review::{RejectionNotice, ReviewProgress, SupportContact, SuspensionNotice};
pub use watcher::{current_status, StatusUpdate, StatusView, StatusWatcher};

pub const MSG_NO_DOCUMENTS: &str = "يرجى رفع الوثائق المطلوبة";
pub const MSG_UNSUPPORTED_FILE: &str = "نوع الملف غير مدعوم، يرجى رفع صورة أو ملف PDF";
pub const MSG_SUBMIT_FAILED: &str = "حدث خطأ في الإرسال";
pub const MSG_UPLOADED: &str = "تم رفع الملفات بنجاح";

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("No documents attached")]
    NoDocuments,

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Profile row not found")]
    ProfileMissing,

    #[error("Verification does not apply to member type {0}")]
    NotApplicable(MemberType),

    #[error("Documents are not accepted while the account is {0}")]
    NotAccepting(AccountStatus),

    #[error("No document at position {0}")]
    NoSuchDocument(usize),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl VerificationError {
    pub fn user_message(&self) -> String {
        match self {
            Self::NoDocuments => MSG_NO_DOCUMENTS.to_string(),
            Self::UnsupportedFile(_) => MSG_UNSUPPORTED_FILE.to_string(),
            Self::NotSignedIn => crate::services::backend::error::MSG_NOT_AUTHENTICATED.to_string(),
            Self::Backend(BackendError::Storage(_)) => MSG_SUBMIT_FAILED.to_string(),
            Self::Backend(e) => e.user_message().to_string(),
            _ => MSG_SUBMIT_FAILED.to_string(),
        }
    }
}
