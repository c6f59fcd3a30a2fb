use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;
use std::collections::BTreeMap;
use validator::{ValidationError, ValidationErrors};

/// Registration is limited to mainstream mail providers to cut down on
/// disposable and mistyped domains.
pub const ALLOWED_EMAIL_DOMAINS: [&str; 12] = [
    "gmail.com",
    "outlook.com",
    "hotmail.com",
    "live.com",
    "yahoo.com",
    "icloud.com",
    "protonmail.com",
    "aol.com",
    "mail.com",
    "zoho.com",
    "yandex.com",
    "gmx.com",
];

pub const MIN_AGE: i32 = 18;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const OTP_LEN: usize = 6;

pub const MSG_REQUIRED: &str = "هذا الحقل مطلوب";
pub const MSG_EMAIL_REQUIRED: &str = "أدخل البريد الإلكتروني";
pub const MSG_EMAIL_INVALID: &str = "البريد الإلكتروني غير صالح";
pub const MSG_EMAIL_DOMAIN: &str = "يرجى استخدام بريد من مزود معروف (Gmail, Outlook, ...)";
pub const MSG_PHONE_INVALID: &str = "رقم الجوال يجب أن يكون 9 أرقام ويبدأ بـ 5";
pub const MSG_UNDERAGE: &str = "يجب أن يكون عمرك 18 سنة على الأقل";
pub const MSG_BIRTH_DATE_REQUIRED: &str = "تاريخ الميلاد مطلوب";
pub const MSG_PASSWORD_MISMATCH: &str = "كلمتا المرور غير متطابقتين";
pub const MSG_TERMS_REQUIRED: &str = "يجب الموافقة على الشروط والأحكام";
pub const MSG_OTP_FORMAT: &str = "رمز التحقق يجب أن يكون 6 أرقام";

lazy_static! {
    static ref NON_DIGIT: Regex = Regex::new(r"[^0-9]").unwrap();
    static ref SAUDI_MOBILE: Regex = Regex::new(r"^5\d{8}$").unwrap();
    static ref BASIC_EMAIL: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    static ref LOWERCASE: Regex = Regex::new(r"[a-z]").unwrap();
    static ref UPPERCASE: Regex = Regex::new(r"[A-Z]").unwrap();
    static ref DIGIT: Regex = Regex::new(r"[0-9]").unwrap();
    static ref SPECIAL: Regex = Regex::new(r"[^a-zA-Z0-9]").unwrap();
}

// =============================================================================
// FIELD ERRORS
// =============================================================================

/// Inline form errors keyed by field name. First message per field wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, message) in other.0 {
            self.add(&field, message);
        }
    }

    /// First message, used as the notice text.
    pub fn first_message(&self) -> Option<&str> {
        self.0.values().next().map(String::as_str)
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            if let Some(err) = errs.first() {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string());
                out.add(&field.to_string(), message);
            }
        }
        out
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for FieldErrors {}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

// =============================================================================
// EMAIL
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailIssue {
    Missing,
    InvalidFormat,
    DomainNotAllowed,
}

impl EmailIssue {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Missing => MSG_EMAIL_REQUIRED,
            Self::InvalidFormat => MSG_EMAIL_INVALID,
            Self::DomainNotAllowed => MSG_EMAIL_DOMAIN,
        }
    }
}

pub fn is_allowed_email_domain(email: &str) -> bool {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim().to_lowercase())
        .is_some_and(|domain| ALLOWED_EMAIL_DOMAINS.contains(&domain.as_str()))
}

/// Format is checked before the domain so the two failures carry different
/// messages.
pub fn check_email(email: &str) -> Result<(), EmailIssue> {
    let email = email.trim();
    if email.is_empty() {
        return Err(EmailIssue::Missing);
    }
    if !BASIC_EMAIL.is_match(email) {
        return Err(EmailIssue::InvalidFormat);
    }
    if !is_allowed_email_domain(email) {
        return Err(EmailIssue::DomainNotAllowed);
    }
    Ok(())
}

pub fn validate_registration_email(email: &str) -> Result<(), ValidationError> {
    check_email(email).map_err(|issue| {
        let code = match issue {
            EmailIssue::Missing => "required",
            EmailIssue::InvalidFormat => "email",
            EmailIssue::DomainNotAllowed => "email_domain",
        };
        field_error(code, issue.message())
    })
}

// =============================================================================
// PHONE
// =============================================================================

pub fn digits_only(value: &str) -> String {
    NON_DIGIT.replace_all(value, "").into_owned()
}

/// Nine digits starting with 5, after stripping everything that is not a digit.
pub fn is_valid_saudi_phone(phone: &str) -> bool {
    SAUDI_MOBILE.is_match(&digits_only(phone))
}

pub fn validate_saudi_phone(phone: &str) -> Result<(), ValidationError> {
    if is_valid_saudi_phone(phone) {
        Ok(())
    } else {
        Err(field_error("phone", MSG_PHONE_INVALID))
    }
}

/// `512345678` -> `+966 51 234 5678`. Anything else is returned unchanged.
pub fn format_phone_number(phone: &str) -> String {
    let digits = digits_only(phone);
    if digits.len() == 9 {
        format!("+966 {} {} {}", &digits[..2], &digits[2..5], &digits[5..])
    } else {
        phone.to_string()
    }
}

// =============================================================================
// AGE
// =============================================================================

/// Calendar-year difference, minus one if the birthday has not come yet.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age
}

pub fn is_adult_on(birth_date: NaiveDate, today: NaiveDate) -> bool {
    age_on(birth_date, today) >= MIN_AGE
}

// =============================================================================
// PASSWORD
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordIssue {
    TooShort,
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
}

impl PasswordIssue {
    pub fn message(&self) -> &'static str {
        match self {
            Self::TooShort => "يجب أن تكون كلمة المرور 8 أحرف على الأقل",
            Self::MissingUppercase => "يجب أن تحتوي على حرف كبير واحد على الأقل",
            Self::MissingLowercase => "يجب أن تحتوي على حرف صغير واحد على الأقل",
            Self::MissingDigit => "يجب أن تحتوي على رقم واحد على الأقل",
        }
    }
}

/// Special characters are optional; they only raise the strength score.
pub fn password_issues(password: &str) -> Vec<PasswordIssue> {
    let mut issues = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        issues.push(PasswordIssue::TooShort);
    }
    if !UPPERCASE.is_match(password) {
        issues.push(PasswordIssue::MissingUppercase);
    }
    if !LOWERCASE.is_match(password) {
        issues.push(PasswordIssue::MissingLowercase);
    }
    if !DIGIT.is_match(password) {
        issues.push(PasswordIssue::MissingDigit);
    }
    issues
}

pub fn is_valid_password(password: &str) -> bool {
    password_issues(password).is_empty()
}

pub fn validate_password_policy(password: &str) -> Result<(), ValidationError> {
    match password_issues(password).first() {
        None => Ok(()),
        Some(issue) => Err(field_error("password", issue.message())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrengthLevel {
    Weak,
    Medium,
    Strong,
}

impl StrengthLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Weak => "ضعيفة",
            Self::Medium => "متوسطة",
            Self::Strong => "قوية",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordStrength {
    pub score: u8,
    pub level: StrengthLevel,
}

/// Advisory score out of six; never gates submission.
pub fn password_strength(password: &str) -> PasswordStrength {
    let len = password.chars().count();
    let checks = [
        len >= 8,
        len >= 12,
        LOWERCASE.is_match(password),
        UPPERCASE.is_match(password),
        DIGIT.is_match(password),
        SPECIAL.is_match(password),
    ];
    let score = checks.iter().filter(|passed| **passed).count() as u8;
    let level = match score {
        0..=2 => StrengthLevel::Weak,
        3..=4 => StrengthLevel::Medium,
        _ => StrengthLevel::Strong,
    };
    PasswordStrength { score, level }
}

// =============================================================================
// ONE-TIME PASSCODE
// =============================================================================

/// Keeps at most six digits of whatever was typed.
pub fn clean_otp(input: &str) -> String {
    digits_only(input).chars().take(OTP_LEN).collect()
}

pub fn is_valid_otp(code: &str) -> bool {
    code.len() == OTP_LEN && code.chars().all(|c| c.is_ascii_digit())
}
