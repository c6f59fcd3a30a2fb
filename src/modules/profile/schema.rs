use validator::Validate;

use super::model::{MemberName, MemberType, ProfilePatch};
use crate::services::validation::{digits_only, validate_saudi_phone, FieldErrors, MSG_REQUIRED};

// =============================================================================
// PROFILE UPDATE
// =============================================================================

/// Self-service edit. `None` leaves a field unchanged. Member type, status
/// and email are not editable through this form.
#[derive(Debug, Clone, Default, Validate)]
pub struct ProfileUpdate {
    pub name: Option<MemberName>,
    #[validate(custom(function = "validate_saudi_phone"))]
    pub phone: Option<String>,
    #[validate(length(min = 1, message = "هذا الحقل مطلوب"))]
    pub city: Option<String>,
    #[validate(length(max = 500, message = "النبذة طويلة جداً"))]
    pub bio: Option<String>,
    #[validate(length(max = 50))]
    pub social_twitter: Option<String>,
    #[validate(length(max = 50))]
    pub social_instagram: Option<String>,
    #[validate(length(max = 50))]
    pub social_snapchat: Option<String>,
}

impl ProfileUpdate {
    /// Field rules plus the name shape required by `member_type`.
    pub fn check(&self, member_type: MemberType) -> Result<(), FieldErrors> {
        let mut errors = match self.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => FieldErrors::from(e),
        };
        if let Some(name) = &self.name {
            check_name(name, member_type, &mut errors);
        }
        errors.into_result()
    }

    pub fn into_patch(self) -> ProfilePatch {
        let mut patch = ProfilePatch {
            phone: self.phone.as_deref().map(digits_only),
            city: trimmed(self.city),
            bio: trimmed(self.bio),
            social_twitter: trimmed(self.social_twitter),
            social_instagram: trimmed(self.social_instagram),
            social_snapchat: trimmed(self.social_snapchat),
            ..Default::default()
        };
        match self.name {
            Some(MemberName::Individual {
                first_name,
                last_name,
            }) => {
                patch.first_name = Some(first_name.trim().to_string());
                patch.last_name = Some(last_name.trim().to_string());
            }
            Some(MemberName::Club { club_name }) => {
                patch.club_name = Some(club_name.trim().to_string());
            }
            None => {}
        }
        patch
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

/// Name pair for players and coaches, club name for clubs; none blank.
pub fn check_name(name: &MemberName, member_type: MemberType, errors: &mut FieldErrors) {
    if !name.fits(member_type) {
        let field = if member_type.is_individual() {
            "first_name"
        } else {
            "club_name"
        };
        errors.add(field, MSG_REQUIRED);
        return;
    }
    match name {
        MemberName::Individual {
            first_name,
            last_name,
        } => {
            if first_name.trim().is_empty() {
                errors.add("first_name", MSG_REQUIRED);
            }
            if last_name.trim().is_empty() {
                errors.add("last_name", MSG_REQUIRED);
            }
        }
        MemberName::Club { club_name } => {
            if club_name.trim().is_empty() {
                errors.add("club_name", MSG_REQUIRED);
            }
        }
    }
}
