use std::sync::Arc;

use super::model::{AuthEvent, OtpKind, Session};
use super::LoginError;
use crate::modules::navigation::{landing_route, Route};
use crate::modules::verification::current_status;
use crate::services::backend::BackendError;
use crate::services::session::SessionStore;
use crate::services::validation::{digits_only, is_valid_otp};

#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub session: Session,
    pub route: Route,
}

/// Email passcode login, with password sign-in as an alternative.
pub struct LoginFlow {
    store: Arc<SessionStore>,
    code_sent_to: Option<String>,
}

impl LoginFlow {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            store,
            code_sent_to: None,
        }
    }

    pub fn code_sent_to(&self) -> Option<&str> {
        self.code_sent_to.as_deref()
    }

    /// Emails a passcode to a registered member.
    pub async fn send_code(&mut self, email: &str) -> Result<(), LoginError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(LoginError::EmailRequired);
        }
        let backend = self.store.backend();
        if !backend.email_exists(email).await? {
            return Err(LoginError::NotRegistered);
        }
        backend.send_otp(email).await?;
        tracing::info!("Login code sent");
        self.code_sent_to = Some(email.to_string());
        Ok(())
    }

    pub async fn verify_code(&mut self, code: &str) -> Result<LoginOutcome, LoginError> {
        let email = self.code_sent_to.clone().ok_or(LoginError::NoCodeSent)?;
        let code = digits_only(code);
        if !is_valid_otp(&code) {
            return Err(LoginError::InvalidCodeFormat);
        }
        let session = match self
            .store
            .backend()
            .verify_otp(&email, &code, OtpKind::Email)
            .await
        {
            Ok(session) => session,
            Err(BackendError::InvalidOtp) => return Err(LoginError::InvalidCode),
            Err(e) => return Err(e.into()),
        };
        self.code_sent_to = None;
        self.finish(session).await
    }

    pub async fn sign_in_with_password(&mut self, email: &str, password: &str) -> Result<LoginOutcome, LoginError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(LoginError::EmailRequired);
        }
        let session = self
            .store
            .backend()
            .sign_in_with_password(email, password)
            .await?;
        self.finish(session).await
    }

    async fn finish(&self, session: Session) -> Result<LoginOutcome, LoginError> {
        self.store
            .handle_event(AuthEvent::SignedIn(session.clone()))
            .await;
        tracing::info!("Signed in {}", session.user.id);
        let route = resolve_landing(&self.store).await;
        Ok(LoginOutcome { session, route })
    }
}

/// Landing route for whoever the store holds: login for anonymous
/// visitors, otherwise by member type and derived account status.
pub async fn resolve_landing(store: &SessionStore) -> Route {
    if store.identity().is_none() {
        return Route::Login;
    }
    let Some(profile) = store.profile() else {
        return Route::Home;
    };
    if !profile.member_type.requires_verification() {
        return Route::Home;
    }
    let status = match current_status(store).await {
        Ok(view) => view.status,
        Err(e) => {
            tracing::warn!("Falling back to stored status for landing: {}", e);
            profile.account_status
        }
    };
    landing_route(profile.member_type, status)
}
