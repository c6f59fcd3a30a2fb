use chrono::NaiveDate;
use std::sync::Arc;

use super::model::{AuthEvent, Identity, OtpKind};
use super::schema::{CredentialsForm, DetailsForm, SignupMetadata};
use super::RegistrationError;
use crate::modules::navigation::{landing_route, Route};
use crate::modules::profile::model::MemberType;
use crate::services::backend::error::{MSG_EMAIL_TAKEN, MSG_PHONE_TAKEN};
use crate::services::backend::BackendError;
use crate::services::session::SessionStore;
use crate::services::validation::{digits_only, is_valid_otp, FieldErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    MemberType,
    Details,
    Credentials,
    VerifyEmail,
    Complete,
}

/// Three-step registration followed by email confirmation.
///
/// Each step gates the next. Nothing is written to the backend until
/// `submit_credentials`, and the profile row is created by the backend
/// from the signup metadata.
pub struct RegistrationWizard {
    store: Arc<SessionStore>,
    step: Step,
    member_type: Option<MemberType>,
    details: Option<DetailsForm>,
    identity: Option<Identity>,
}

impl RegistrationWizard {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            store,
            step: Step::MemberType,
            member_type: None,
            details: None,
            identity: None,
        }
    }

    /// Opens the wizard from a `?type=` link. A recognized type skips the
    /// first step; anything else is ignored.
    pub fn with_link_param(store: Arc<SessionStore>, param: Option<&str>) -> Self {
        let mut wizard = Self::new(store);
        if let Some(member_type) = param.and_then(MemberType::from_link_param) {
            wizard.member_type = Some(member_type);
            wizard.step = Step::Details;
        }
        wizard
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn member_type(&self) -> Option<MemberType> {
        self.member_type
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    fn expect_step(&self, expected: Step) -> Result<(), RegistrationError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(RegistrationError::OutOfOrder {
                expected,
                actual: self.step,
            })
        }
    }

    pub fn select_member_type(&mut self, member_type: MemberType) -> Result<(), RegistrationError> {
        self.expect_step(Step::MemberType)?;
        if !member_type.is_self_registerable() {
            return Err(RegistrationError::NotSelectable(member_type));
        }
        self.member_type = Some(member_type);
        self.step = Step::Details;
        Ok(())
    }

    /// Validates step two locally, then checks email and phone against
    /// existing profiles. The two lookups run concurrently and both must
    /// come back clear. This is advisory; signup itself is authoritative.
    pub async fn submit_details(&mut self, form: DetailsForm, today: NaiveDate) -> Result<(), RegistrationError> {
        self.expect_step(Step::Details)?;
        let member_type = self
            .member_type
            .ok_or(RegistrationError::OutOfOrder {
                expected: Step::MemberType,
                actual: self.step,
            })?;
        form.check(member_type, today)?;

        let email = form.email();
        let phone = form.phone();
        let backend = self.store.backend();
        let (email_taken, phone_taken) =
            tokio::join!(backend.email_exists(&email), backend.phone_exists(&phone));

        let mut taken = FieldErrors::new();
        if email_taken? {
            taken.add("email", MSG_EMAIL_TAKEN);
        }
        if phone_taken? {
            taken.add("phone", MSG_PHONE_TAKEN);
        }
        if !taken.is_empty() {
            tracing::info!("Registration pre-check found an existing member");
            return Err(RegistrationError::AlreadyRegistered(taken));
        }

        self.details = Some(form);
        self.step = Step::Credentials;
        Ok(())
    }

    pub fn back(&mut self) {
        self.step = match self.step {
            Step::Details => Step::MemberType,
            Step::Credentials => Step::Details,
            other => other,
        };
    }

    /// Creates the identity. A duplicate reported by the backend is shown
    /// with the same field message as the pre-check.
    pub async fn submit_credentials(&mut self, form: CredentialsForm) -> Result<Identity, RegistrationError> {
        self.expect_step(Step::Credentials)?;
        form.check()?;
        let (member_type, details) = match (self.member_type, &self.details) {
            (Some(member_type), Some(details)) => (member_type, details),
            _ => {
                return Err(RegistrationError::OutOfOrder {
                    expected: Step::Details,
                    actual: self.step,
                })
            }
        };

        let metadata = serde_json::to_value(SignupMetadata::new(member_type, details))
            .map_err(BackendError::from)?;
        let identity = match self
            .store
            .backend()
            .sign_up(&details.email(), &form.password, metadata)
            .await
        {
            Ok(identity) => identity,
            Err(BackendError::AlreadyRegistered) => {
                let mut taken = FieldErrors::new();
                taken.add("email", MSG_EMAIL_TAKEN);
                return Err(RegistrationError::AlreadyRegistered(taken));
            }
            Err(BackendError::DuplicatePhone) => {
                let mut taken = FieldErrors::new();
                taken.add("phone", MSG_PHONE_TAKEN);
                return Err(RegistrationError::AlreadyRegistered(taken));
            }
            Err(e) => {
                tracing::error!("Signup failed: {}", e);
                return Err(e.into());
            }
        };

        tracing::info!("Registered {} as {}", identity.id, member_type);
        self.identity = Some(identity.clone());
        self.step = Step::VerifyEmail;
        Ok(identity)
    }

    /// Confirms the signup code, adopts the new session and returns the
    /// route the member lands on.
    pub async fn verify_email(&mut self, code: &str) -> Result<Route, RegistrationError> {
        self.expect_step(Step::VerifyEmail)?;
        let code = digits_only(code);
        if !is_valid_otp(&code) {
            return Err(RegistrationError::InvalidCodeFormat);
        }
        let (Some(member_type), Some(details)) = (self.member_type, &self.details) else {
            return Err(RegistrationError::OutOfOrder {
                expected: Step::Details,
                actual: self.step,
            });
        };

        let session = match self
            .store
            .backend()
            .verify_otp(&details.email(), &code, OtpKind::Signup)
            .await
        {
            Ok(session) => session,
            Err(BackendError::InvalidOtp) => return Err(RegistrationError::InvalidCode),
            Err(e) => return Err(e.into()),
        };
        self.store.handle_event(AuthEvent::SignedIn(session)).await;

        self.step = Step::Complete;
        let status = self
            .store
            .profile()
            .map(|p| p.account_status)
            .unwrap_or_else(|| member_type.initial_status());
        Ok(landing_route(member_type, status))
    }
}
