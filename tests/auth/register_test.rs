use chrono::{NaiveDate, Utc};
use serde_json::json;

use billiards_hub::modules::auth::{
    ContactDetails, CredentialsForm, DetailsForm, OtpKind, RegistrationError, Step,
};
use billiards_hub::modules::navigation::Route;
use billiards_hub::modules::profile::{AccountStatus, MemberName, MemberType};
use billiards_hub::services::backend::error::{MSG_EMAIL_TAKEN, MSG_PHONE_TAKEN};
use billiards_hub::services::backend::{AuthProvider, Fault, Operation, ProfileStore};
use billiards_hub::services::validation::{MSG_PASSWORD_MISMATCH, MSG_UNDERAGE};

use crate::common::{test_email, test_password, test_phone, TestContext};

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn individual_details(email: &str, phone: &str) -> DetailsForm {
    DetailsForm {
        name: MemberName::Individual {
            first_name: "Sami".to_string(),
            last_name: "Ali".to_string(),
        },
        contact: ContactDetails {
            email: email.to_string(),
            phone: phone.to_string(),
            city: "الرياض".to_string(),
        },
        birth_date: NaiveDate::from_ymd_opt(1995, 5, 1),
    }
}

fn club_details(email: &str, phone: &str) -> DetailsForm {
    DetailsForm {
        name: MemberName::Club {
            club_name: "Cue Corner".to_string(),
        },
        contact: ContactDetails {
            email: email.to_string(),
            phone: phone.to_string(),
            city: "جدة".to_string(),
        },
        birth_date: None,
    }
}

fn credentials() -> CredentialsForm {
    CredentialsForm {
        password: test_password().to_string(),
        confirm_password: test_password().to_string(),
        accept_terms: true,
    }
}

// =============================================================================
// HAPPY PATH
// =============================================================================

#[tokio::test]
async fn coach_registration_lands_on_document_upload() {
    let ctx = TestContext::new().await;
    let email = test_email();
    let phone = test_phone();
    let mut wizard = ctx.app.registration(None);

    wizard.select_member_type(MemberType::Coach).unwrap();
    wizard
        .submit_details(individual_details(&email, &phone), today())
        .await
        .unwrap();
    let identity = wizard.submit_credentials(credentials()).await.unwrap();
    assert_eq!(wizard.step(), Step::VerifyEmail);

    let code = ctx.backend.issued_code(&email, OtpKind::Signup).unwrap();
    let route = wizard.verify_email(&code).await.unwrap();

    assert_eq!(route, Route::UploadDocuments);
    assert_eq!(wizard.step(), Step::Complete);

    let profile = ctx.app.session.profile().unwrap();
    assert_eq!(profile.id, identity.id);
    assert_eq!(profile.member_type, MemberType::Coach);
    assert_eq!(profile.account_status, AccountStatus::Pending);
    assert_eq!(profile.phone, phone);
    assert_eq!(profile.display_name(), "Sami Ali");
}

#[tokio::test]
async fn player_registration_is_active_immediately() {
    let ctx = TestContext::new().await;
    let email = test_email();
    let mut wizard = ctx.app.registration(Some("player"));
    assert_eq!(wizard.step(), Step::Details);

    wizard
        .submit_details(individual_details(&email, &test_phone()), today())
        .await
        .unwrap();
    wizard.submit_credentials(credentials()).await.unwrap();
    let code = ctx.backend.issued_code(&email, OtpKind::Signup).unwrap();

    assert_eq!(wizard.verify_email(&code).await.unwrap(), Route::Home);
    assert_eq!(
        ctx.app.session.profile().map(|p| p.account_status),
        Some(AccountStatus::Active)
    );
}

#[tokio::test]
async fn club_registration_stores_club_name() {
    let ctx = TestContext::new().await;
    let email = test_email();
    let mut wizard = ctx.app.registration(Some("CLUB"));

    wizard
        .submit_details(club_details(&email, &test_phone()), today())
        .await
        .unwrap();
    let identity = wizard.submit_credentials(credentials()).await.unwrap();

    let profile = ctx.backend.find_profile(&identity.id).await.unwrap().unwrap();
    assert_eq!(profile.club_name.as_deref(), Some("Cue Corner"));
    assert!(profile.first_name.is_none());
    assert!(profile.birth_date.is_none());
}

// =============================================================================
// STEP GATING
// =============================================================================

#[tokio::test]
async fn unknown_link_param_starts_at_member_type() {
    let ctx = TestContext::new().await;

    let wizard = ctx.app.registration(Some("super_admin"));

    assert_eq!(wizard.step(), Step::MemberType);
    assert_eq!(wizard.member_type(), None);
}

#[tokio::test]
async fn staff_types_cannot_be_selected() {
    let ctx = TestContext::new().await;
    let mut wizard = ctx.app.registration(None);

    let err = wizard.select_member_type(MemberType::Moderator).unwrap_err();

    assert!(matches!(err, RegistrationError::NotSelectable(MemberType::Moderator)));
    assert_eq!(wizard.step(), Step::MemberType);
}

#[tokio::test]
async fn credentials_before_details_is_out_of_order() {
    let ctx = TestContext::new().await;
    let mut wizard = ctx.app.registration(Some("coach"));

    let err = wizard.submit_credentials(credentials()).await.unwrap_err();

    assert!(matches!(
        err,
        RegistrationError::OutOfOrder {
            expected: Step::Credentials,
            actual: Step::Details
        }
    ));
    assert_eq!(ctx.backend.calls(Operation::SignUp), 0);
}

#[tokio::test]
async fn back_returns_to_previous_step() {
    let ctx = TestContext::new().await;
    let mut wizard = ctx.app.registration(Some("coach"));
    wizard
        .submit_details(individual_details(&test_email(), &test_phone()), today())
        .await
        .unwrap();

    wizard.back();
    assert_eq!(wizard.step(), Step::Details);
    wizard.back();
    assert_eq!(wizard.step(), Step::MemberType);
}

// =============================================================================
// VALIDATION
// =============================================================================

#[tokio::test]
async fn underage_member_is_rejected_without_backend_calls() {
    let ctx = TestContext::new().await;
    let mut wizard = ctx.app.registration(Some("player"));
    let mut details = individual_details(&test_email(), &test_phone());
    details.birth_date = today().checked_sub_signed(chrono::Duration::days(365 * 10));

    let err = wizard.submit_details(details, today()).await.unwrap_err();

    assert_eq!(
        err.field_errors().and_then(|e| e.get("birth_date")),
        Some(MSG_UNDERAGE)
    );
    assert_eq!(ctx.backend.calls(Operation::EmailExists), 0);
    assert_eq!(ctx.backend.calls(Operation::PhoneExists), 0);
    assert_eq!(wizard.step(), Step::Details);
}

#[tokio::test]
async fn password_mismatch_is_reported_on_confirm_field() {
    let ctx = TestContext::new().await;
    let mut wizard = ctx.app.registration(Some("player"));
    wizard
        .submit_details(individual_details(&test_email(), &test_phone()), today())
        .await
        .unwrap();

    let mut form = credentials();
    form.confirm_password = format!("{} ", test_password());
    let err = wizard.submit_credentials(form).await.unwrap_err();

    assert_eq!(
        err.field_errors().and_then(|e| e.get("confirm_password")),
        Some(MSG_PASSWORD_MISMATCH)
    );
    assert_eq!(ctx.backend.calls(Operation::SignUp), 0);
}

#[tokio::test]
async fn terms_must_be_accepted() {
    let ctx = TestContext::new().await;
    let mut wizard = ctx.app.registration(Some("player"));
    wizard
        .submit_details(individual_details(&test_email(), &test_phone()), today())
        .await
        .unwrap();

    let mut form = credentials();
    form.accept_terms = false;
    let err = wizard.submit_credentials(form).await.unwrap_err();

    assert!(err.field_errors().is_some_and(|e| e.contains("accept_terms")));
}

// =============================================================================
// DUPLICATES
// =============================================================================

#[tokio::test]
async fn existing_email_is_caught_before_signup() {
    let ctx = TestContext::new().await;
    let existing = ctx.seed(MemberType::Player, AccountStatus::Active);
    let mut wizard = ctx.app.registration(Some("coach"));

    let err = wizard
        .submit_details(individual_details(&existing.email, &test_phone()), today())
        .await
        .unwrap_err();

    assert!(matches!(err, RegistrationError::AlreadyRegistered(_)));
    assert_eq!(err.user_message(), MSG_EMAIL_TAKEN);
    assert_eq!(ctx.backend.calls(Operation::SignUp), 0);
    assert_eq!(wizard.step(), Step::Details);
}

#[tokio::test]
async fn existing_phone_is_caught_before_signup() {
    let ctx = TestContext::new().await;
    let existing = ctx.seed(MemberType::Player, AccountStatus::Active);
    let mut wizard = ctx.app.registration(Some("player"));

    let err = wizard
        .submit_details(individual_details(&test_email(), &existing.phone), today())
        .await
        .unwrap_err();

    assert_eq!(
        err.field_errors().and_then(|e| e.get("phone")),
        Some(MSG_PHONE_TAKEN)
    );
    assert_eq!(ctx.backend.calls(Operation::SignUp), 0);
}

#[tokio::test]
async fn email_taken_after_precheck_shows_same_message() {
    let ctx = TestContext::new().await;
    let email = test_email();
    let mut wizard = ctx.app.registration(Some("coach"));
    wizard
        .submit_details(individual_details(&email, &test_phone()), today())
        .await
        .unwrap();

    // Someone else claims the address between the two steps.
    ctx.backend
        .sign_up(
            &email,
            test_password(),
            json!({ "member_type": "player", "phone": test_phone(), "city": "جدة" }),
        )
        .await
        .unwrap();

    let err = wizard.submit_credentials(credentials()).await.unwrap_err();

    assert_eq!(
        err.field_errors().and_then(|e| e.get("email")),
        Some(MSG_EMAIL_TAKEN)
    );
    assert_eq!(err.user_message(), MSG_EMAIL_TAKEN);
    assert_eq!(wizard.step(), Step::Credentials);
}

#[tokio::test]
async fn precheck_failure_surfaces_backend_error() {
    let ctx = TestContext::new().await;
    ctx.backend.inject(Operation::PhoneExists, Fault::Fail);
    let mut wizard = ctx.app.registration(Some("player"));

    let err = wizard
        .submit_details(individual_details(&test_email(), &test_phone()), today())
        .await
        .unwrap_err();

    assert!(matches!(err, RegistrationError::Backend(_)));
    assert_eq!(wizard.step(), Step::Details);
}

// =============================================================================
// EMAIL VERIFICATION
// =============================================================================

#[tokio::test]
async fn wrong_signup_code_is_rejected() {
    let ctx = TestContext::new().await;
    let email = test_email();
    let mut wizard = ctx.app.registration(Some("player"));
    wizard
        .submit_details(individual_details(&email, &test_phone()), today())
        .await
        .unwrap();
    wizard.submit_credentials(credentials()).await.unwrap();

    let err = wizard.verify_email("12a4").await.unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidCodeFormat));

    let issued = ctx.backend.issued_code(&email, OtpKind::Signup).unwrap();
    let wrong = if issued == "000000" { "111111" } else { "000000" };
    let err = wizard.verify_email(wrong).await.unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidCode));
    assert_eq!(wizard.step(), Step::VerifyEmail);
    assert!(ctx.app.session.identity().is_none());
}
