use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// MEMBER TYPE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberType {
    Player,
    Coach,
    Club,
    Moderator,
    SuperAdmin,
}

impl MemberType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Coach => "coach",
            Self::Club => "club",
            Self::Moderator => "moderator",
            Self::SuperAdmin => "super_admin",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Player => "لاعب",
            Self::Coach => "مدرب",
            Self::Club => "نادي/صالة",
            Self::Moderator => "مشرف",
            Self::SuperAdmin => "مشرف عام",
        }
    }

    /// Coaches and clubs must pass document review before activation.
    pub fn requires_verification(&self) -> bool {
        matches!(self, Self::Coach | Self::Club)
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Moderator | Self::SuperAdmin)
    }

    /// Only these types may be chosen on the public registration form.
    pub fn is_self_registerable(&self) -> bool {
        matches!(self, Self::Player | Self::Coach | Self::Club)
    }

    /// Player and coach rows carry a first/last name pair, clubs a club name.
    pub fn is_individual(&self) -> bool {
        !matches!(self, Self::Club)
    }

    pub fn initial_status(&self) -> AccountStatus {
        if self.requires_verification() {
            AccountStatus::Pending
        } else {
            AccountStatus::Active
        }
    }

    /// Parses the `?type=` registration link parameter. Staff types and
    /// unknown values are ignored.
    pub fn from_link_param(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "player" => Some(Self::Player),
            "coach" => Some(Self::Coach),
            "club" => Some(Self::Club),
            _ => None,
        }
    }
}

impl std::fmt::Display for MemberType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ACCOUNT STATUS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Pending,
    UnderReview,
    Returned,
    Approved,
    Active,
    Rejected,
    Suspended,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::UnderReview => "under_review",
            Self::Returned => "returned",
            Self::Approved => "approved",
            Self::Active => "active",
            Self::Rejected => "rejected",
            Self::Suspended => "suspended",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "في انتظار المراجعة",
            Self::UnderReview => "قيد المراجعة",
            Self::Returned => "مُعاد بملاحظات",
            Self::Approved => "مُوافق عليه",
            Self::Active => "فعال",
            Self::Rejected => "مرفوض",
            Self::Suspended => "موقوف",
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// MEMBER NAME
// =============================================================================

/// Name payload, shaped by member type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemberName {
    Individual { first_name: String, last_name: String },
    Club { club_name: String },
}

impl MemberName {
    pub fn display(&self) -> String {
        match self {
            Self::Individual {
                first_name,
                last_name,
            } => format!("{} {}", first_name.trim(), last_name.trim())
                .trim()
                .to_string(),
            Self::Club { club_name } => club_name.trim().to_string(),
        }
    }

    pub fn fits(&self, member_type: MemberType) -> bool {
        match self {
            Self::Individual { .. } => member_type.is_individual(),
            Self::Club { .. } => !member_type.is_individual(),
        }
    }
}

// =============================================================================
// PROFILE
// =============================================================================

/// One application row per identity (`users` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub member_type: MemberType,
    pub account_status: AccountStatus,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub club_name: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    pub phone: String,
    pub email: String,
    pub city: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub social_twitter: Option<String>,
    #[serde(default)]
    pub social_instagram: Option<String>,
    #[serde(default)]
    pub social_snapchat: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn name(&self) -> MemberName {
        if self.member_type.is_individual() {
            MemberName::Individual {
                first_name: self.first_name.clone().unwrap_or_default(),
                last_name: self.last_name.clone().unwrap_or_default(),
            }
        } else {
            MemberName::Club {
                club_name: self.club_name.clone().unwrap_or_default(),
            }
        }
    }

    pub fn display_name(&self) -> String {
        self.name().display()
    }

    /// `+966 5X XXX XXXX` for valid mobile numbers.
    pub fn formatted_phone(&self) -> String {
        crate::services::validation::format_phone_number(&self.phone)
    }
}

/// Partial row update. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub club_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_twitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_instagram: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_snapchat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_status: Option<AccountStatus>,
}

impl ProfilePatch {
    pub fn status(status: AccountStatus) -> Self {
        Self {
            account_status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the patch in place and bumps `updated_at`.
    pub fn apply(&self, profile: &mut Profile, now: DateTime<Utc>) {
        fn set(target: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value {
                *target = Some(v.clone());
            }
        }

        set(&mut profile.first_name, &self.first_name);
        set(&mut profile.last_name, &self.last_name);
        set(&mut profile.club_name, &self.club_name);
        set(&mut profile.avatar_url, &self.avatar_url);
        set(&mut profile.bio, &self.bio);
        set(&mut profile.social_twitter, &self.social_twitter);
        set(&mut profile.social_instagram, &self.social_instagram);
        set(&mut profile.social_snapchat, &self.social_snapchat);
        if let Some(phone) = &self.phone {
            profile.phone = phone.clone();
        }
        if let Some(email) = &self.email {
            profile.email = email.clone();
        }
        if let Some(city) = &self.city {
            profile.city = city.clone();
        }
        if let Some(status) = self.account_status {
            profile.account_status = status;
        }
        profile.updated_at = now;
    }
}
