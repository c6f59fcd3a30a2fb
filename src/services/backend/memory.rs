use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::error::{BackendError, BackendResult};
use super::interface::{
    AuthProvider, Bucket, ObjectStorage, ProfileStore, RowChange, VerificationStore,
};
use crate::modules::auth::model::{AuthEvent, Identity, OtpKind, Session};
use crate::modules::profile::model::{AccountStatus, MemberType, Profile, ProfilePatch};
use crate::modules::verification::model::{
    NewVerificationRequest, VerificationPatch, VerificationRequest, VerificationStatus,
};
use crate::services::validation::digits_only;

const EVENT_CAPACITY: usize = 64;
const SESSION_TTL_SECS: i64 = 3600;

/// Backend calls that can be made to misbehave once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SignUp,
    SignOut,
    GetSession,
    FindProfile,
    EmailExists,
    PhoneExists,
    UpdateProfile,
    LatestRequest,
    InsertRequest,
    UpdateRequest,
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Return a network error.
    Fail,
    /// Never respond.
    Stall,
    /// Respond normally after a pause.
    Delay(std::time::Duration),
}

/// Reviewer actions, performed outside the client in production.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewDecision {
    Approve,
    Return { notes: String },
    Reject { reason: String },
    Suspend,
}

struct AuthUser {
    identity: Identity,
    password: String,
}

struct StoredObject {
    body: Vec<u8>,
    content_type: String,
}

#[derive(Default)]
struct State {
    users: HashMap<String, AuthUser>,
    profiles: HashMap<String, Profile>,
    requests: Vec<VerificationRequest>,
    objects: HashMap<(Bucket, String), StoredObject>,
    codes: HashMap<(String, OtpKind), String>,
    pending_email_change: Option<(String, String)>,
    session: Option<Session>,
    faults: HashMap<Operation, Fault>,
    calls: HashMap<Operation, usize>,
}

/// In-process stand-in for the hosted service.
///
/// Materializes the profile row from signup metadata the way the hosted
/// database trigger does, enforces email/phone uniqueness authoritatively,
/// keeps issued passcodes in an inspectable outbox, and pushes row-change
/// notifications.
pub struct MemoryBackend {
    state: Mutex<State>,
    events: broadcast::Sender<AuthEvent>,
    changes: broadcast::Sender<RowChange>,
    public_base: String,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (changes, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(State::default()),
            events,
            changes,
            public_base: "memory://storage/v1/object/public".to_string(),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn inject(&self, op: Operation, fault: Fault) {
        self.state().faults.insert(op, fault);
    }

    pub fn calls(&self, op: Operation) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    /// Last passcode issued for `email`, as it would arrive by mail.
    pub fn issued_code(&self, email: &str, kind: OtpKind) -> Option<String> {
        self.state()
            .codes
            .get(&(email.to_lowercase(), kind))
            .cloned()
    }

    pub fn object(&self, bucket: Bucket, key: &str) -> Option<(Vec<u8>, String)> {
        self.state()
            .objects
            .get(&(bucket, key.to_string()))
            .map(|o| (o.body.clone(), o.content_type.clone()))
    }

    pub fn object_keys(&self, bucket: Bucket) -> Vec<String> {
        let mut keys: Vec<String> = self
            .state()
            .objects
            .keys()
            .filter(|(b, _)| *b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Inserts a confirmed identity and its profile row directly.
    pub fn seed_profile(&self, profile: Profile, password: &str) {
        let identity = Identity {
            id: profile.id.clone(),
            email: Some(profile.email.clone()),
            phone: Some(profile.phone.clone()),
            email_confirmed_at: Some(profile.created_at),
            user_metadata: serde_json::Value::Null,
        };
        let mut state = self.state();
        state.users.insert(
            profile.email.to_lowercase(),
            AuthUser {
                identity,
                password: password.to_string(),
            },
        );
        state.profiles.insert(profile.id.clone(), profile);
    }

    /// Applies a reviewer decision to the live request and the profile row.
    pub fn review(&self, user_id: &str, decision: ReviewDecision) -> BackendResult<()> {
        let now = Utc::now();
        {
            let mut state = self.state();
            let profile_status = match &decision {
                ReviewDecision::Approve => AccountStatus::Active,
                ReviewDecision::Return { .. } => AccountStatus::Returned,
                ReviewDecision::Reject { .. } => AccountStatus::Rejected,
                ReviewDecision::Suspend => AccountStatus::Suspended,
            };

            if decision != ReviewDecision::Suspend {
                let request =
                    latest_mut(&mut state.requests, user_id).ok_or(BackendError::NotFound)?;
                request.reviewed_at = Some(now);
                request.reviewed_by = Some("reviewer".to_string());
                match &decision {
                    ReviewDecision::Approve => request.status = VerificationStatus::Approved,
                    ReviewDecision::Return { notes } => {
                        request.status = VerificationStatus::Returned;
                        request.return_notes = Some(notes.clone());
                    }
                    ReviewDecision::Reject { reason } => {
                        request.status = VerificationStatus::Rejected;
                        request.rejection_reason = Some(reason.clone());
                    }
                    ReviewDecision::Suspend => {}
                }
            }

            let profile = state.profiles.get_mut(user_id).ok_or(BackendError::NotFound)?;
            ProfilePatch::status(profile_status).apply(profile, now);
        }
        let _ = self.changes.send(RowChange::Verification(user_id.to_string()));
        let _ = self.changes.send(RowChange::Profile(user_id.to_string()));
        Ok(())
    }

    async fn enter(&self, op: Operation) -> BackendResult<()> {
        let fault = {
            let mut state = self.state();
            *state.calls.entry(op).or_insert(0) += 1;
            state.faults.remove(&op)
        };
        match fault {
            Some(Fault::Fail) => Err(BackendError::Network(format!("injected failure: {op:?}"))),
            Some(Fault::Stall) => {
                std::future::pending::<()>().await;
                Ok(())
            }
            Some(Fault::Delay(pause)) => {
                tokio::time::sleep(pause).await;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn issue_code(&self, email: &str, kind: OtpKind) {
        // Six digits out of the random half of a v4 uuid.
        let n = Uuid::new_v4().as_u128() % 1_000_000;
        let code = format!("{n:06}");
        tracing::debug!("Issued {} passcode for {}", kind.as_str(), email);
        self.state().codes.insert((email.to_lowercase(), kind), code);
    }

    fn open_session(&self, identity: Identity) -> Session {
        let session = Session {
            access_token: format!("mem-access-{}", Uuid::new_v4()),
            refresh_token: format!("mem-refresh-{}", Uuid::new_v4()),
            expires_at: Utc::now() + Duration::seconds(SESSION_TTL_SECS),
            user: identity,
        };
        self.state().session = Some(session.clone());
        session
    }
}

fn latest_mut<'a>(
    requests: &'a mut [VerificationRequest],
    user_id: &str,
) -> Option<&'a mut VerificationRequest> {
    requests
        .iter_mut()
        .filter(|r| r.user_id == user_id)
        .max_by_key(|r| r.submitted_at)
}

fn metadata_str(metadata: &serde_json::Value, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn profile_from_metadata(
    id: &str,
    email: &str,
    metadata: &serde_json::Value,
    now: DateTime<Utc>,
) -> BackendResult<Profile> {
    let member_type: MemberType = metadata
        .get("member_type")
        .cloned()
        .map(serde_json::from_value)
        .transpose()?
        .unwrap_or(MemberType::Player);

    let birth_date = metadata_str(metadata, "birth_date")
        .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d"))
        .transpose()
        .map_err(|e| BackendError::Parse(e.to_string()))?;

    Ok(Profile {
        id: id.to_string(),
        member_type,
        account_status: member_type.initial_status(),
        first_name: metadata_str(metadata, "first_name"),
        last_name: metadata_str(metadata, "last_name"),
        club_name: metadata_str(metadata, "club_name"),
        birth_date,
        phone: metadata_str(metadata, "phone").unwrap_or_default(),
        email: email.to_string(),
        city: metadata_str(metadata, "city").unwrap_or_default(),
        avatar_url: None,
        bio: None,
        social_twitter: None,
        social_instagram: None,
        social_snapchat: None,
        created_at: now,
        updated_at: now,
    })
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> BackendResult<Identity> {
        self.enter(Operation::SignUp).await?;
        let now = Utc::now();
        let key = email.to_lowercase();
        let identity = {
            let mut state = self.state();
            if state.users.contains_key(&key)
                || state.profiles.values().any(|p| p.email.to_lowercase() == key)
            {
                return Err(BackendError::AlreadyRegistered);
            }

            let id = Uuid::new_v4().to_string();
            let profile = profile_from_metadata(&id, email, &metadata, now)?;
            let phone = digits_only(&profile.phone);
            if !phone.is_empty() && state.profiles.values().any(|p| digits_only(&p.phone) == phone)
            {
                return Err(BackendError::DuplicatePhone);
            }

            let identity = Identity {
                id: id.clone(),
                email: Some(email.to_string()),
                phone: Some(profile.phone.clone()),
                email_confirmed_at: None,
                user_metadata: metadata,
            };
            state.users.insert(
                key,
                AuthUser {
                    identity: identity.clone(),
                    password: password.to_string(),
                },
            );
            state.profiles.insert(id, profile);
            identity
        };
        self.issue_code(email, OtpKind::Signup);
        let _ = self.changes.send(RowChange::Profile(identity.id.clone()));
        Ok(identity)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session> {
        let identity = {
            let state = self.state();
            match state.users.get(&email.to_lowercase()) {
                Some(user) if user.password == password => user.identity.clone(),
                _ => return Err(BackendError::InvalidCredentials),
            }
        };
        let session = self.open_session(identity);
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn send_otp(&self, email: &str) -> BackendResult<()> {
        if !self.state().users.contains_key(&email.to_lowercase()) {
            return Err(BackendError::Api {
                status: 422,
                message: "Signups not allowed for otp".to_string(),
            });
        }
        self.issue_code(email, OtpKind::Email);
        Ok(())
    }

    async fn verify_otp(&self, email: &str, token: &str, kind: OtpKind) -> BackendResult<Session> {
        let key = email.to_lowercase();
        let identity = {
            let mut state = self.state();
            match state.codes.get(&(key.clone(), kind)) {
                Some(code) if code == token => {}
                _ => return Err(BackendError::InvalidOtp),
            }
            state.codes.remove(&(key.clone(), kind));

            match kind {
                OtpKind::Signup | OtpKind::Email => {
                    let user = state.users.get_mut(&key).ok_or(BackendError::InvalidOtp)?;
                    if user.identity.email_confirmed_at.is_none() {
                        user.identity.email_confirmed_at = Some(Utc::now());
                    }
                    user.identity.clone()
                }
                OtpKind::EmailChange => {
                    let (user_id, new_email) = state
                        .pending_email_change
                        .take()
                        .filter(|(_, new_email)| new_email.to_lowercase() == key)
                        .ok_or(BackendError::InvalidOtp)?;
                    let old_key = state
                        .users
                        .iter()
                        .find(|(_, u)| u.identity.id == user_id)
                        .map(|(k, _)| k.clone())
                        .ok_or(BackendError::NotAuthenticated)?;
                    let mut user = state
                        .users
                        .remove(&old_key)
                        .ok_or(BackendError::NotAuthenticated)?;
                    user.identity.email = Some(new_email);
                    let identity = user.identity.clone();
                    state.users.insert(key, user);
                    identity
                }
            }
        };
        let session = self.open_session(identity);
        let event = match kind {
            OtpKind::EmailChange => AuthEvent::UserUpdated(session.clone()),
            OtpKind::Signup | OtpKind::Email => AuthEvent::SignedIn(session.clone()),
        };
        let _ = self.events.send(event);
        Ok(session)
    }

    async fn sign_out(&self) -> BackendResult<()> {
        self.enter(Operation::SignOut).await?;
        self.state().session = None;
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    async fn get_session(&self) -> BackendResult<Option<Session>> {
        self.enter(Operation::GetSession).await?;
        Ok(self.state().session.clone())
    }

    async fn request_email_change(&self, new_email: &str) -> BackendResult<()> {
        {
            let mut state = self.state();
            let user_id = state
                .session
                .as_ref()
                .map(|s| s.user.id.clone())
                .ok_or(BackendError::NotAuthenticated)?;
            if state.users.contains_key(&new_email.to_lowercase()) {
                return Err(BackendError::AlreadyRegistered);
            }
            state.pending_email_change = Some((user_id, new_email.to_string()));
        }
        self.issue_code(new_email, OtpKind::EmailChange);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl ProfileStore for MemoryBackend {
    async fn find_profile(&self, id: &str) -> BackendResult<Option<Profile>> {
        self.enter(Operation::FindProfile).await?;
        Ok(self.state().profiles.get(id).cloned())
    }

    async fn email_exists(&self, email: &str) -> BackendResult<bool> {
        self.enter(Operation::EmailExists).await?;
        let email = email.trim().to_lowercase();
        Ok(self
            .state()
            .profiles
            .values()
            .any(|p| p.email.to_lowercase() == email))
    }

    async fn phone_exists(&self, phone: &str) -> BackendResult<bool> {
        self.enter(Operation::PhoneExists).await?;
        let phone = digits_only(phone);
        Ok(self
            .state()
            .profiles
            .values()
            .any(|p| digits_only(&p.phone) == phone))
    }

    async fn update_profile(&self, id: &str, patch: &ProfilePatch) -> BackendResult<()> {
        self.enter(Operation::UpdateProfile).await?;
        {
            let mut state = self.state();
            if let Some(phone) = &patch.phone {
                let phone = digits_only(phone);
                if state
                    .profiles
                    .values()
                    .any(|p| p.id != id && digits_only(&p.phone) == phone)
                {
                    return Err(BackendError::DuplicatePhone);
                }
            }
            let profile = state.profiles.get_mut(id).ok_or(BackendError::NotFound)?;
            patch.apply(profile, Utc::now());
        }
        let _ = self.changes.send(RowChange::Profile(id.to_string()));
        Ok(())
    }

    fn row_changes(&self) -> Option<broadcast::Receiver<RowChange>> {
        Some(self.changes.subscribe())
    }
}

#[async_trait]
impl VerificationStore for MemoryBackend {
    async fn latest_request(&self, user_id: &str) -> BackendResult<Option<VerificationRequest>> {
        self.enter(Operation::LatestRequest).await?;
        Ok(self
            .state()
            .requests
            .iter()
            .filter(|r| r.user_id == user_id)
            .max_by_key(|r| r.submitted_at)
            .cloned())
    }

    async fn insert_request(
        &self,
        request: &NewVerificationRequest,
    ) -> BackendResult<VerificationRequest> {
        self.enter(Operation::InsertRequest).await?;
        let row = VerificationRequest {
            id: Uuid::new_v4().to_string(),
            user_id: request.user_id.clone(),
            member_type: request.member_type,
            status: request.status,
            documents: request.documents.clone(),
            submitted_at: request.submitted_at,
            reviewed_by: None,
            reviewed_at: None,
            return_reason: None,
            return_notes: None,
            rejection_reason: None,
            resubmitted_at: None,
            resubmit_count: request.resubmit_count,
        };
        self.state().requests.push(row.clone());
        let _ = self
            .changes
            .send(RowChange::Verification(request.user_id.clone()));
        Ok(row)
    }

    async fn update_request(&self, id: &str, patch: &VerificationPatch) -> BackendResult<()> {
        self.enter(Operation::UpdateRequest).await?;
        let user_id = {
            let mut state = self.state();
            let request = state
                .requests
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or(BackendError::NotFound)?;
            patch.apply(request);
            request.user_id.clone()
        };
        let _ = self.changes.send(RowChange::Verification(user_id));
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MemoryBackend {
    async fn upload(
        &self,
        bucket: Bucket,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> BackendResult<()> {
        self.enter(Operation::Upload).await?;
        let mut state = self.state();
        let slot = (bucket, key.to_string());
        if !upsert && state.objects.contains_key(&slot) {
            return Err(BackendError::Storage("The resource already exists".to_string()));
        }
        state.objects.insert(
            slot,
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn remove(&self, bucket: Bucket, keys: &[String]) -> BackendResult<()> {
        let mut state = self.state();
        for key in keys {
            state.objects.remove(&(bucket, key.clone()));
        }
        Ok(())
    }

    fn public_url(&self, bucket: Bucket, key: &str) -> String {
        format!("{}/{}/{}", self.public_base, bucket.as_str(), key)
    }
}
