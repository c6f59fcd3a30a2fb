use async_trait::async_trait;
use tokio::sync::broadcast;

use super::error::BackendResult;
use crate::modules::auth::model::{AuthEvent, Identity, OtpKind, Session};
use crate::modules::profile::model::{Profile, ProfilePatch};
use crate::modules::verification::model::{
    NewVerificationRequest, VerificationPatch, VerificationRequest,
};

// =============================================================================
// AUTH PROVIDER
// =============================================================================

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Creates the identity. `metadata` travels with it so the backend can
    /// materialize the profile row out-of-band.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> BackendResult<Identity>;
    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session>;
    async fn send_otp(&self, email: &str) -> BackendResult<()>;
    async fn verify_otp(&self, email: &str, token: &str, kind: OtpKind) -> BackendResult<Session>;
    async fn sign_out(&self) -> BackendResult<()>;
    async fn get_session(&self) -> BackendResult<Option<Session>>;
    async fn request_email_change(&self, new_email: &str) -> BackendResult<()>;
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

// =============================================================================
// DATA STORE
// =============================================================================

/// Identifies the user whose row changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowChange {
    Profile(String),
    Verification(String),
}

impl RowChange {
    pub fn user_id(&self) -> &str {
        match self {
            Self::Profile(id) | Self::Verification(id) => id,
        }
    }
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_profile(&self, id: &str) -> BackendResult<Option<Profile>>;
    async fn email_exists(&self, email: &str) -> BackendResult<bool>;
    async fn phone_exists(&self, phone: &str) -> BackendResult<bool>;
    async fn update_profile(&self, id: &str, patch: &ProfilePatch) -> BackendResult<()>;

    /// Push notifications for row changes, when the backend offers them.
    fn row_changes(&self) -> Option<broadcast::Receiver<RowChange>> {
        None
    }
}

#[async_trait]
pub trait VerificationStore: Send + Sync {
    /// The live request: most recent by `submitted_at`.
    async fn latest_request(&self, user_id: &str) -> BackendResult<Option<VerificationRequest>>;
    async fn insert_request(
        &self,
        request: &NewVerificationRequest,
    ) -> BackendResult<VerificationRequest>;
    async fn update_request(&self, id: &str, patch: &VerificationPatch) -> BackendResult<()>;
}

// =============================================================================
// OBJECT STORAGE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Avatars,
    Documents,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avatars => "avatars",
            Self::Documents => "documents",
        }
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        bucket: Bucket,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> BackendResult<()>;
    async fn remove(&self, bucket: Bucket, keys: &[String]) -> BackendResult<()>;
    fn public_url(&self, bucket: Bucket, key: &str) -> String;
}

/// The single configured handle to the hosted service.
pub trait Backend: AuthProvider + ProfileStore + VerificationStore + ObjectStorage {}

impl<T> Backend for T where T: AuthProvider + ProfileStore + VerificationStore + ObjectStorage {}
