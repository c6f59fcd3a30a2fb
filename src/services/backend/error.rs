/// Failures reported by the hosted auth/data/storage service or the
/// transport in front of it.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Row not found")]
    NotFound,

    #[error("User already registered")]
    AlreadyRegistered,

    #[error("Phone number already registered")]
    DuplicatePhone,

    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Token has expired or is invalid")]
    InvalidOtp,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

pub const MSG_GENERIC: &str = "حدث خطأ غير متوقع";
pub const MSG_EMAIL_TAKEN: &str = "البريد الإلكتروني مسجل مسبقاً";
pub const MSG_PHONE_TAKEN: &str = "رقم الجوال مسجل مسبقاً";
pub const MSG_INVALID_CREDENTIALS: &str = "البريد الإلكتروني أو كلمة المرور غير صحيحة";
pub const MSG_INVALID_OTP: &str = "رمز التحقق غير صحيح";
pub const MSG_NOT_AUTHENTICATED: &str = "يرجى تسجيل الدخول";

impl BackendError {
    /// Localized notice text. Anything without a specific mapping gets the
    /// generic failure message so transport details never reach the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::AlreadyRegistered => MSG_EMAIL_TAKEN,
            Self::DuplicatePhone => MSG_PHONE_TAKEN,
            Self::InvalidCredentials => MSG_INVALID_CREDENTIALS,
            Self::InvalidOtp => MSG_INVALID_OTP,
            Self::NotAuthenticated => MSG_NOT_AUTHENTICATED,
            _ => MSG_GENERIC,
        }
    }

    /// Maps an error payload from the auth endpoints onto the specific
    /// variants the UI distinguishes.
    pub fn from_auth_response(status: u16, message: String) -> Self {
        let lowered = message.to_lowercase();
        let duplicate = lowered.contains("already") || lowered.contains("duplicate");
        if duplicate && lowered.contains("phone") {
            Self::DuplicatePhone
        } else if (duplicate && lowered.contains("email"))
            || lowered.contains("already registered")
            || lowered.contains("already exists")
        {
            Self::AlreadyRegistered
        } else if lowered.contains("invalid login credentials") {
            Self::InvalidCredentials
        } else if lowered.contains("token has expired") || lowered.contains("otp_expired") {
            Self::InvalidOtp
        } else if status == 401 {
            Self::NotAuthenticated
        } else {
            Self::Api { status, message }
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
