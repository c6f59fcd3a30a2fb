use std::time::Duration;

use billiards_hub::modules::auth::OtpKind;
use billiards_hub::modules::profile::{AccountStatus, MemberType, ProfileError};
use billiards_hub::services::backend::error::MSG_EMAIL_TAKEN;
use billiards_hub::services::backend::{AuthProvider, ProfileStore};
use billiards_hub::services::validation::EmailIssue;

use crate::common::{test_email, test_password, TestContext};

#[tokio::test(start_paused = true)]
async fn email_change_round_trip() {
    let (ctx, profile) = TestContext::signed_in(MemberType::Coach, AccountStatus::Active).await;
    let mut editor = ctx.app.profile_editor();
    let new_email = test_email();

    editor.request_email_change(&new_email).await.unwrap();
    assert_eq!(editor.pending_email(), Some(new_email.as_str()));
    assert_eq!(editor.code_seconds_left(), 60);

    let code = ctx
        .backend
        .issued_code(&new_email, OtpKind::EmailChange)
        .unwrap();
    let updated = editor.confirm_email_change(&code).await.unwrap();

    assert_eq!(updated.email, new_email);
    assert_eq!(editor.pending_email(), None);
    assert_eq!(editor.code_seconds_left(), 0);
    let stored = ctx.backend.find_profile(&profile.id).await.unwrap().unwrap();
    assert_eq!(stored.email, new_email);

    // The old address no longer signs in, the new one does.
    assert!(ctx
        .backend
        .sign_in_with_password(&profile.email, test_password())
        .await
        .is_err());
    assert!(ctx
        .backend
        .sign_in_with_password(&new_email, test_password())
        .await
        .is_ok());
}

#[tokio::test(start_paused = true)]
async fn code_window_counts_down_and_expires() {
    let (ctx, _) = TestContext::signed_in(MemberType::Player, AccountStatus::Active).await;
    let mut editor = ctx.app.profile_editor();
    let new_email = test_email();
    editor.request_email_change(&new_email).await.unwrap();

    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(editor.code_seconds_left(), 30);

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(editor.code_seconds_left(), 0);

    let code = ctx
        .backend
        .issued_code(&new_email, OtpKind::EmailChange)
        .unwrap();
    let err = editor.confirm_email_change(&code).await.unwrap_err();
    assert!(matches!(err, ProfileError::CodeExpired));

    // A resend opens a fresh window.
    editor.request_email_change(&new_email).await.unwrap();
    let code = ctx
        .backend
        .issued_code(&new_email, OtpKind::EmailChange)
        .unwrap();
    assert!(editor.confirm_email_change(&code).await.is_ok());
}

#[tokio::test]
async fn new_email_is_validated() {
    let (ctx, profile) = TestContext::signed_in(MemberType::Player, AccountStatus::Active).await;
    let mut editor = ctx.app.profile_editor();

    let err = editor.request_email_change("").await.unwrap_err();
    assert!(matches!(err, ProfileError::InvalidEmail(EmailIssue::Missing)));

    let err = editor
        .request_email_change("player@tempmail.xyz")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProfileError::InvalidEmail(EmailIssue::DomainNotAllowed)
    ));

    let err = editor
        .request_email_change(&profile.email.to_uppercase())
        .await
        .unwrap_err();
    assert!(matches!(err, ProfileError::SameEmail));
    assert!(editor.pending_email().is_none());
}

#[tokio::test]
async fn email_of_another_member_is_refused() {
    let (ctx, _) = TestContext::signed_in(MemberType::Player, AccountStatus::Active).await;
    let other = ctx.seed(MemberType::Player, AccountStatus::Active);
    let mut editor = ctx.app.profile_editor();

    let err = editor.request_email_change(&other.email).await.unwrap_err();

    assert_eq!(err.user_message(), MSG_EMAIL_TAKEN);
    assert!(editor.pending_email().is_none());
}

#[tokio::test]
async fn wrong_or_missing_code_is_rejected() {
    let (ctx, profile) = TestContext::signed_in(MemberType::Club, AccountStatus::Active).await;
    let mut editor = ctx.app.profile_editor();

    let err = editor.confirm_email_change("123456").await.unwrap_err();
    assert!(matches!(err, ProfileError::NoPendingEmailChange));

    let new_email = test_email();
    editor.request_email_change(&new_email).await.unwrap();

    let err = editor.confirm_email_change("12").await.unwrap_err();
    assert!(matches!(err, ProfileError::InvalidCodeFormat));

    let issued = ctx
        .backend
        .issued_code(&new_email, OtpKind::EmailChange)
        .unwrap();
    let wrong = if issued == "424242" { "242424" } else { "424242" };
    let err = editor.confirm_email_change(wrong).await.unwrap_err();
    assert!(matches!(err, ProfileError::InvalidCode));

    editor.cancel_email_change();
    assert!(editor.pending_email().is_none());
    let stored = ctx.backend.find_profile(&profile.id).await.unwrap().unwrap();
    assert_eq!(stored.email, profile.email);
}
