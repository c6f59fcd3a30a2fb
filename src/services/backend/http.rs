use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use tokio::sync::{broadcast, RwLock};

use super::error::{BackendError, BackendResult};
use super::interface::{AuthProvider, Bucket, ObjectStorage, ProfileStore, VerificationStore};
use crate::config::Config;
use crate::modules::auth::model::{AuthEvent, Identity, OtpKind, Session};
use crate::modules::profile::model::{Profile, ProfilePatch};
use crate::modules::verification::model::{
    NewVerificationRequest, VerificationPatch, VerificationRequest,
};
use crate::services::validation::digits_only;

const EVENT_CAPACITY: usize = 64;
/// Tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

const PROFILES: &str = "users";
const REQUESTS: &str = "verification_requests";

#[derive(Default)]
struct SessionSlot {
    session: Option<Session>,
    restored: bool,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: Identity,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: Utc::now() + Duration::seconds(self.expires_in),
            user: self.user,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    error_code: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        let text = self
            .msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)?;
        Some(match self.error_code {
            Some(code) => format!("{text} [{code}]"),
            None => text,
        })
    }
}

/// Client for the hosted auth/data/storage service.
///
/// Speaks the service's REST dialect: `/auth/v1` for identities and
/// sessions, `/rest/v1` for table rows, `/storage/v1` for objects. The
/// current session lives in memory and, when `SESSION_FILE` is set, on disk
/// between runs. Row-change push is not offered; callers fall back to
/// polling.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    anon_key: String,
    session_file: Option<PathBuf>,
    slot: RwLock<SessionSlot>,
    events: broadcast::Sender<AuthEvent>,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client: build_client(config.http_timeout),
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            session_file: config.session_file.clone(),
            slot: RwLock::new(SessionSlot::default()),
            events,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attaches the project key and the caller's bearer token, falling back
    /// to the anon key when nobody is signed in.
    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .slot
            .read()
            .await
            .session
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.anon_key.clone());
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn current_session(&self) -> Option<Session> {
        self.slot.read().await.session.clone()
    }

    async fn store_session(&self, session: Option<Session>) {
        {
            let mut slot = self.slot.write().await;
            slot.session = session.clone();
            slot.restored = true;
        }
        self.persist(session.as_ref()).await;
    }

    async fn persist(&self, session: Option<&Session>) {
        let Some(path) = &self.session_file else {
            return;
        };
        let result = match session {
            Some(session) => match serde_json::to_vec(session) {
                Ok(bytes) => tokio::fs::write(path, bytes).await,
                Err(e) => {
                    tracing::warn!("Failed to encode session: {}", e);
                    return;
                }
            },
            None => match tokio::fs::remove_file(path).await {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(e) = result {
            tracing::warn!("Failed to persist session to {}: {}", path.display(), e);
        }
    }

    async fn restore(&self) {
        let mut slot = self.slot.write().await;
        if slot.restored {
            return;
        }
        slot.restored = true;
        let Some(path) = &self.session_file else {
            return;
        };
        match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice::<Session>(&bytes) {
                Ok(session) => {
                    tracing::debug!("Restored session for {}", session.user.id);
                    slot.session = Some(session);
                }
                Err(e) => tracing::warn!("Ignoring unreadable session file: {}", e),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to read session file: {}", e),
        }
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> BackendResult<Session> {
        let request = self
            .client
            .post(self.url("/auth/v1/token"))
            .query(&[("grant_type", grant_type)])
            .json(&body);
        let response = self.authorized(request).await.send().await?;
        let token: TokenResponse = read_json(response).await?;
        Ok(token.into_session())
    }

    async fn refresh(&self, session: &Session) -> BackendResult<Option<Session>> {
        tracing::debug!("Refreshing access token for {}", session.user.id);
        match self
            .token_grant(
                "refresh_token",
                json!({ "refresh_token": session.refresh_token }),
            )
            .await
        {
            Ok(fresh) => {
                self.store_session(Some(fresh.clone())).await;
                let _ = self.events.send(AuthEvent::TokenRefreshed(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(e @ (BackendError::Network(_) | BackendError::Timeout)) => Err(e),
            // A rejected refresh token means the session is gone for good.
            Err(e) => {
                tracing::warn!("Refresh token rejected, dropping session: {}", e);
                self.store_session(None).await;
                let _ = self.events.send(AuthEvent::SignedOut);
                Ok(None)
            }
        }
    }

    async fn select_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> BackendResult<Vec<T>> {
        let request = self
            .client
            .get(self.url(&format!("/rest/v1/{table}")))
            .query(query);
        let response = self.authorized(request).await.send().await?;
        read_json(response).await
    }

    async fn patch_rows(&self, table: &str, id: &str, body: Value) -> BackendResult<()> {
        let request = self
            .client
            .patch(self.url(&format!("/rest/v1/{table}")))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(&body);
        let response = self.authorized(request).await.send().await?;
        let rows: Vec<Value> = read_json(response).await?;
        if rows.is_empty() {
            return Err(BackendError::NotFound);
        }
        Ok(())
    }
}

/// Falls back to an untimed client only if TLS setup fails, and says so.
fn build_client(timeout: std::time::Duration) -> Client {
    match Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(
                "HTTP client setup failed, {}s timeout not applied: {}",
                timeout.as_secs(),
                e
            );
            Client::new()
        }
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
    if !response.status().is_success() {
        return Err(error_from(response).await);
    }
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

async fn expect_success(response: Response) -> BackendResult<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(error_from(response).await)
    }
}

async fn error_from(response: Response) -> BackendError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or(body);
    tracing::debug!("Backend responded {}: {}", status, message);
    BackendError::from_auth_response(status, message)
}

async fn storage_error(response: Response) -> BackendError {
    match error_from(response).await {
        BackendError::Api { message, .. } => BackendError::Storage(message),
        other => other,
    }
}

#[async_trait]
impl AuthProvider for HttpBackend {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Value,
    ) -> BackendResult<Identity> {
        let request = self.client.post(self.url("/auth/v1/signup")).json(&json!({
            "email": email,
            "password": password,
            "data": metadata,
        }));
        let response = self.authorized(request).await.send().await?;
        let body: Value = read_json(response).await?;

        // With email confirmation on, the bare user comes back; otherwise a
        // full session wrapping it.
        let user = match body.get("user") {
            Some(user) if body.get("access_token").is_some() => user.clone(),
            _ => body,
        };
        Ok(serde_json::from_value(user)?)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session> {
        let session = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;
        self.store_session(Some(session.clone())).await;
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn send_otp(&self, email: &str) -> BackendResult<()> {
        let request = self
            .client
            .post(self.url("/auth/v1/otp"))
            .json(&json!({ "email": email, "create_user": false }));
        let response = self.authorized(request).await.send().await?;
        expect_success(response).await
    }

    async fn verify_otp(&self, email: &str, token: &str, kind: OtpKind) -> BackendResult<Session> {
        let request = self.client.post(self.url("/auth/v1/verify")).json(&json!({
            "email": email,
            "token": token,
            "type": kind.as_str(),
        }));
        let response = self.authorized(request).await.send().await?;
        let session = read_json::<TokenResponse>(response).await?.into_session();
        self.store_session(Some(session.clone())).await;
        let event = match kind {
            OtpKind::EmailChange => AuthEvent::UserUpdated(session.clone()),
            OtpKind::Signup | OtpKind::Email => AuthEvent::SignedIn(session.clone()),
        };
        let _ = self.events.send(event);
        Ok(session)
    }

    async fn sign_out(&self) -> BackendResult<()> {
        let result = match self.current_session().await {
            Some(_) => {
                let request = self.client.post(self.url("/auth/v1/logout"));
                match self.authorized(request).await.send().await {
                    Ok(response) => expect_success(response).await,
                    Err(e) => Err(e.into()),
                }
            }
            None => Ok(()),
        };
        // The local session is discarded whatever the server said.
        self.store_session(None).await;
        let _ = self.events.send(AuthEvent::SignedOut);
        result
    }

    async fn get_session(&self) -> BackendResult<Option<Session>> {
        self.restore().await;
        let Some(session) = self.current_session().await else {
            return Ok(None);
        };
        if session.expires_within(Utc::now(), Duration::seconds(REFRESH_MARGIN_SECS)) {
            return self.refresh(&session).await;
        }
        Ok(Some(session))
    }

    async fn request_email_change(&self, new_email: &str) -> BackendResult<()> {
        if self.current_session().await.is_none() {
            return Err(BackendError::NotAuthenticated);
        }
        let request = self
            .client
            .put(self.url("/auth/v1/user"))
            .json(&json!({ "email": new_email }));
        let response = self.authorized(request).await.send().await?;
        expect_success(response).await
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl ProfileStore for HttpBackend {
    async fn find_profile(&self, id: &str) -> BackendResult<Option<Profile>> {
        let rows: Vec<Profile> = self
            .select_rows(
                PROFILES,
                &[("select", "*".to_string()), ("id", format!("eq.{id}"))],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn email_exists(&self, email: &str) -> BackendResult<bool> {
        let rows: Vec<Value> = self
            .select_rows(
                PROFILES,
                &[
                    ("select", "id".to_string()),
                    ("email", format!("eq.{}", email.trim().to_lowercase())),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn phone_exists(&self, phone: &str) -> BackendResult<bool> {
        let rows: Vec<Value> = self
            .select_rows(
                PROFILES,
                &[
                    ("select", "id".to_string()),
                    ("phone", format!("eq.{}", digits_only(phone))),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn update_profile(&self, id: &str, patch: &ProfilePatch) -> BackendResult<()> {
        let mut body = serde_json::to_value(patch)?;
        if let Value::Object(fields) = &mut body {
            fields.insert("updated_at".to_string(), json!(Utc::now()));
        }
        self.patch_rows(PROFILES, id, body).await
    }
}

#[async_trait]
impl VerificationStore for HttpBackend {
    async fn latest_request(&self, user_id: &str) -> BackendResult<Option<VerificationRequest>> {
        let rows: Vec<VerificationRequest> = self
            .select_rows(
                REQUESTS,
                &[
                    ("select", "*".to_string()),
                    ("user_id", format!("eq.{user_id}")),
                    ("order", "submitted_at.desc".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_request(
        &self,
        request: &NewVerificationRequest,
    ) -> BackendResult<VerificationRequest> {
        let builder = self
            .client
            .post(self.url(&format!("/rest/v1/{REQUESTS}")))
            .header("Prefer", "return=representation")
            .json(request);
        let response = self.authorized(builder).await.send().await?;
        let rows: Vec<VerificationRequest> = read_json(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::Parse("insert returned no row".to_string()))
    }

    async fn update_request(&self, id: &str, patch: &VerificationPatch) -> BackendResult<()> {
        self.patch_rows(REQUESTS, id, serde_json::to_value(patch)?)
            .await
    }
}

#[async_trait]
impl ObjectStorage for HttpBackend {
    async fn upload(
        &self,
        bucket: Bucket,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> BackendResult<()> {
        let request = self
            .client
            .post(self.url(&format!("/storage/v1/object/{}/{}", bucket.as_str(), key)))
            .header("Content-Type", content_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(body);
        let response = self.authorized(request).await.send().await?;
        if !response.status().is_success() {
            return Err(storage_error(response).await);
        }
        Ok(())
    }

    async fn remove(&self, bucket: Bucket, keys: &[String]) -> BackendResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let request = self
            .client
            .delete(self.url(&format!("/storage/v1/object/{}", bucket.as_str())))
            .json(&json!({ "prefixes": keys }));
        let response = self.authorized(request).await.send().await?;
        if !response.status().is_success() {
            return Err(storage_error(response).await);
        }
        Ok(())
    }

    fn public_url(&self, bucket: Bucket, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            bucket.as_str(),
            key
        )
    }
}
