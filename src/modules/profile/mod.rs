pub mod controller;
pub mod model;
pub mod schema;

use crate::services::backend::BackendError;
use crate::services::validation::{EmailIssue, FieldErrors, MSG_OTP_FORMAT};

pub use controller::{ProfileEditor, EMAIL_CODE_WINDOW};
pub use model::{AccountStatus, MemberName, MemberType, Profile, ProfilePatch};
pub use schema::ProfileUpdate;

pub const MSG_SAVE_FAILED: &str = "حدث خطأ في حفظ البيانات";
pub const MSG_AVATAR_FAILED: &str = "حدث خطأ في رفع الصورة";
pub const MSG_NEW_EMAIL_REQUIRED: &str = "أدخل البريد الإلكتروني الجديد";
pub const MSG_SAME_EMAIL: &str = "البريد الجديد مطابق للبريد الحالي";
pub const MSG_EMAIL_CHANGE_FAILED: &str = "حدث خطأ في تغيير البريد";
pub const MSG_CODE_EXPIRED: &str = "انتهت صلاحية الرمز، يرجى إعادة الإرسال";

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Not signed in")]
    NotSignedIn,

    #[error("Profile row not found")]
    ProfileMissing,

    #[error("Invalid fields: {0}")]
    Invalid(#[from] FieldErrors),

    #[error("Avatar must be an image: {0}")]
    NotAnImage(String),

    #[error("Invalid email: {0:?}")]
    InvalidEmail(EmailIssue),

    #[error("New email matches the current one")]
    SameEmail,

    #[error("No email change in progress")]
    NoPendingEmailChange,

    #[error("Code must be six digits")]
    InvalidCodeFormat,

    #[error("Code window has closed")]
    CodeExpired,

    #[error("Code rejected")]
    InvalidCode,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ProfileError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid(errors) => errors
                .first_message()
                .unwrap_or(MSG_SAVE_FAILED)
                .to_string(),
            Self::NotAnImage(_) => MSG_AVATAR_FAILED.to_string(),
            Self::InvalidEmail(EmailIssue::Missing) => MSG_NEW_EMAIL_REQUIRED.to_string(),
            Self::InvalidEmail(issue) => issue.message().to_string(),
            Self::SameEmail => MSG_SAME_EMAIL.to_string(),
            Self::InvalidCodeFormat => MSG_OTP_FORMAT.to_string(),
            Self::CodeExpired => MSG_CODE_EXPIRED.to_string(),
            Self::InvalidCode => crate::services::backend::error::MSG_INVALID_OTP.to_string(),
            Self::NoPendingEmailChange => MSG_EMAIL_CHANGE_FAILED.to_string(),
            Self::Backend(BackendError::Api { .. } | BackendError::Network(_)) => {
                MSG_SAVE_FAILED.to_string()
            }
            Self::Backend(e) => e.user_message().to_string(),
            Self::NotSignedIn | Self::ProfileMissing => {
                crate::services::backend::error::MSG_NOT_AUTHENTICATED.to_string()
            }
        }
    }
}
