use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::model::{Profile, ProfilePatch};
use super::schema::ProfileUpdate;
use super::ProfileError;
use crate::modules::auth::model::OtpKind;
use crate::modules::verification::UploadFile;
use crate::services::backend::{BackendError, Bucket};
use crate::services::session::SessionStore;
use crate::services::validation::{check_email, digits_only, is_valid_otp};

/// How long an emailed change code is accepted before a resend is needed.
pub const EMAIL_CODE_WINDOW: Duration = Duration::from_secs(60);

struct PendingEmailChange {
    new_email: String,
    sent_at: Instant,
}

/// Profile page: field edits, avatar, and the two-step email change.
pub struct ProfileEditor {
    store: Arc<SessionStore>,
    email_change: Option<PendingEmailChange>,
}

impl ProfileEditor {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            store,
            email_change: None,
        }
    }

    fn current(&self) -> Result<Profile, ProfileError> {
        if self.store.identity().is_none() {
            return Err(ProfileError::NotSignedIn);
        }
        self.store.profile().ok_or(ProfileError::ProfileMissing)
    }

    async fn reload(&self) -> Result<Profile, ProfileError> {
        self.store
            .refresh_profile()
            .await?
            .ok_or(ProfileError::ProfileMissing)
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Profile, ProfileError> {
        let profile = self.current()?;
        update.check(profile.member_type)?;

        let patch = update.into_patch();
        if patch.is_empty() {
            return Ok(profile);
        }
        self.store
            .backend()
            .update_profile(&profile.id, &patch)
            .await?;
        tracing::info!("Profile {} updated", profile.id);
        self.reload().await
    }

    /// Replaces the avatar at the member's fixed key and stores its URL.
    pub async fn upload_avatar(&self, file: UploadFile) -> Result<String, ProfileError> {
        let profile = self.current()?;
        if !file.content_type.trim().to_ascii_lowercase().starts_with("image/") {
            return Err(ProfileError::NotAnImage(file.name));
        }
        let ext = file
            .name
            .rsplit_once('.')
            .map(|(_, ext)| ext.trim().to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| "png".to_string());
        let key = format!("{}/avatar.{}", profile.id, ext);

        let backend = self.store.backend();
        if let Err(e) = backend.remove(Bucket::Avatars, &[key.clone()]).await {
            tracing::debug!("No previous avatar removed for {}: {}", profile.id, e);
        }
        backend
            .upload(Bucket::Avatars, &key, file.bytes, &file.content_type, true)
            .await?;
        let url = backend.public_url(Bucket::Avatars, &key);

        let patch = ProfilePatch {
            avatar_url: Some(url.clone()),
            ..Default::default()
        };
        backend.update_profile(&profile.id, &patch).await?;
        self.reload().await?;
        tracing::info!("Avatar updated for {}", profile.id);
        Ok(url)
    }

    /// Sends a confirmation code to `new_email` and opens the code window.
    pub async fn request_email_change(&mut self, new_email: &str) -> Result<(), ProfileError> {
        let profile = self.current()?;
        let new_email = new_email.trim();
        check_email(new_email).map_err(ProfileError::InvalidEmail)?;
        if new_email.eq_ignore_ascii_case(profile.email.trim()) {
            return Err(ProfileError::SameEmail);
        }

        self.store.backend().request_email_change(new_email).await?;
        tracing::info!("Email change code sent for {}", profile.id);
        self.email_change = Some(PendingEmailChange {
            new_email: new_email.to_string(),
            sent_at: Instant::now(),
        });
        Ok(())
    }

    /// Seconds left in the code window; zero when no code is pending or the
    /// window has closed.
    pub fn code_seconds_left(&self) -> u64 {
        self.email_change
            .as_ref()
            .map(|pending| {
                EMAIL_CODE_WINDOW
                    .saturating_sub(pending.sent_at.elapsed())
                    .as_secs()
            })
            .unwrap_or(0)
    }

    pub fn pending_email(&self) -> Option<&str> {
        self.email_change.as_ref().map(|p| p.new_email.as_str())
    }

    /// Verifies the code and writes the new address to the profile row.
    pub async fn confirm_email_change(&mut self, code: &str) -> Result<Profile, ProfileError> {
        let profile = self.current()?;
        let (new_email, sent_at) = match &self.email_change {
            Some(pending) => (pending.new_email.clone(), pending.sent_at),
            None => return Err(ProfileError::NoPendingEmailChange),
        };
        let code = digits_only(code);
        if !is_valid_otp(&code) {
            return Err(ProfileError::InvalidCodeFormat);
        }
        if sent_at.elapsed() >= EMAIL_CODE_WINDOW {
            return Err(ProfileError::CodeExpired);
        }

        let backend = self.store.backend();
        match backend
            .verify_otp(&new_email, &code, OtpKind::EmailChange)
            .await
        {
            Ok(_) => {}
            Err(BackendError::InvalidOtp) => return Err(ProfileError::InvalidCode),
            Err(e) => return Err(e.into()),
        }

        let patch = ProfilePatch {
            email: Some(new_email.clone()),
            ..Default::default()
        };
        backend.update_profile(&profile.id, &patch).await?;
        self.email_change = None;
        tracing::info!("Email changed for {}", profile.id);
        self.reload().await
    }

    pub fn cancel_email_change(&mut self) {
        self.email_change = None;
    }
}
