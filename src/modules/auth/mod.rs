pub mod controller;
pub mod login;
pub mod model;
pub mod schema;

use crate::modules::profile::model::MemberType;
use crate::services::backend::error::{MSG_GENERIC, MSG_INVALID_OTP};
use crate::services::backend::BackendError;
use crate::services::validation::{FieldErrors, MSG_EMAIL_REQUIRED, MSG_OTP_FORMAT};

pub use controller::{RegistrationWizard, Step};
pub use login::{LoginFlow, LoginOutcome};
pub use model::{AuthEvent, Identity, OtpKind, Session};
pub use schema::{ContactDetails, CredentialsForm, DetailsForm, SignupMetadata};

pub const MSG_NOT_REGISTERED: &str = "البريد الإلكتروني غير مسجل. سجل حساب جديد";

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Step {actual:?} is active, expected {expected:?}")]
    OutOfOrder { expected: Step, actual: Step },

    #[error("Member type {0} cannot be chosen at registration")]
    NotSelectable(MemberType),

    #[error("Invalid fields: {0}")]
    Invalid(#[from] FieldErrors),

    #[error("Already registered: {0}")]
    AlreadyRegistered(FieldErrors),

    #[error("Code must be six digits")]
    InvalidCodeFormat,

    #[error("Code rejected")]
    InvalidCode,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl RegistrationError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid(errors) | Self::AlreadyRegistered(errors) => errors
                .first_message()
                .unwrap_or(MSG_GENERIC)
                .to_string(),
            Self::InvalidCodeFormat => MSG_OTP_FORMAT.to_string(),
            Self::InvalidCode => MSG_INVALID_OTP.to_string(),
            Self::Backend(e) => e.user_message().to_string(),
            Self::OutOfOrder { .. } | Self::NotSelectable(_) => MSG_GENERIC.to_string(),
        }
    }

    /// Field-keyed errors, for inline display.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Invalid(errors) | Self::AlreadyRegistered(errors) => Some(errors),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("Email is required")]
    EmailRequired,

    #[error("No member with this email")]
    NotRegistered,

    #[error("No code has been sent")]
    NoCodeSent,

    #[error("Code must be six digits")]
    InvalidCodeFormat,

    #[error("Code rejected")]
    InvalidCode,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl LoginError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmailRequired => MSG_EMAIL_REQUIRED,
            Self::NotRegistered => MSG_NOT_REGISTERED,
            Self::NoCodeSent => MSG_GENERIC,
            Self::InvalidCodeFormat => MSG_OTP_FORMAT,
            Self::InvalidCode => MSG_INVALID_OTP,
            Self::Backend(e) => e.user_message(),
        }
    }
}
