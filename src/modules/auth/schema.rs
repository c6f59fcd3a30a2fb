use chrono::NaiveDate;
use serde::Serialize;
use validator::Validate;

use crate::modules::profile::model::{MemberName, MemberType};
use crate::modules::profile::schema::check_name;
use crate::services::validation::{
    digits_only, is_adult_on, validate_password_policy, validate_registration_email,
    validate_saudi_phone, FieldErrors, MSG_BIRTH_DATE_REQUIRED, MSG_PASSWORD_MISMATCH,
    MSG_REQUIRED, MSG_TERMS_REQUIRED, MSG_UNDERAGE,
};

// =============================================================================
// STEP 2: DETAILS
// =============================================================================

#[derive(Debug, Clone, Validate)]
pub struct ContactDetails {
    #[validate(custom(function = "validate_registration_email"))]
    pub email: String,
    #[validate(custom(function = "validate_saudi_phone"))]
    pub phone: String,
    pub city: String,
}

#[derive(Debug, Clone)]
pub struct DetailsForm {
    pub name: MemberName,
    pub contact: ContactDetails,
    /// Required for players and coaches.
    pub birth_date: Option<NaiveDate>,
}

impl DetailsForm {
    pub fn check(&self, member_type: MemberType, today: NaiveDate) -> Result<(), FieldErrors> {
        let mut errors = match self.contact.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => FieldErrors::from(e),
        };
        if self.contact.city.trim().is_empty() {
            errors.add("city", MSG_REQUIRED);
        }
        check_name(&self.name, member_type, &mut errors);

        if member_type.is_individual() {
            match self.birth_date {
                None => errors.add("birth_date", MSG_BIRTH_DATE_REQUIRED),
                Some(born) if !is_adult_on(born, today) => errors.add("birth_date", MSG_UNDERAGE),
                Some(_) => {}
            }
        }
        errors.into_result()
    }

    pub fn email(&self) -> String {
        self.contact.email.trim().to_string()
    }

    pub fn phone(&self) -> String {
        digits_only(&self.contact.phone)
    }
}

// =============================================================================
// STEP 3: CREDENTIALS
// =============================================================================

#[derive(Debug, Clone, Validate)]
pub struct CredentialsForm {
    #[validate(custom(function = "validate_password_policy"))]
    pub password: String,
    pub confirm_password: String,
    pub accept_terms: bool,
}

impl CredentialsForm {
    pub fn check(&self) -> Result<(), FieldErrors> {
        let mut errors = match self.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => FieldErrors::from(e),
        };
        // Compared byte for byte, no trimming.
        if self.password != self.confirm_password {
            errors.add("confirm_password", MSG_PASSWORD_MISMATCH);
        }
        if !self.accept_terms {
            errors.add("accept_terms", MSG_TERMS_REQUIRED);
        }
        errors.into_result()
    }
}

// =============================================================================
// SIGNUP METADATA
// =============================================================================

/// Attached to the new identity; the backend builds the profile row from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignupMetadata {
    pub member_type: MemberType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub club_name: Option<String>,
    pub email: String,
    pub phone: String,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
}

impl SignupMetadata {
    pub fn new(member_type: MemberType, details: &DetailsForm) -> Self {
        let (first_name, last_name, club_name) = match &details.name {
            MemberName::Individual {
                first_name,
                last_name,
            } => (
                Some(first_name.trim().to_string()),
                Some(last_name.trim().to_string()),
                None,
            ),
            MemberName::Club { club_name } => (None, None, Some(club_name.trim().to_string())),
        };
        Self {
            member_type,
            first_name,
            last_name,
            club_name,
            email: details.email(),
            phone: details.phone(),
            city: details.contact.city.trim().to_string(),
            birth_date: details.birth_date.filter(|_| member_type.is_individual()),
        }
    }
}
