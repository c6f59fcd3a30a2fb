use std::sync::Arc;
use std::time::Duration;

use billiards_hub::config::Config;
use billiards_hub::modules::auth::AuthEvent;
use billiards_hub::modules::navigation::Route;
use billiards_hub::modules::profile::{AccountStatus, MemberType, ProfilePatch};
use billiards_hub::services::backend::{
    AuthProvider, Fault, MemoryBackend, Operation, ProfileStore,
};
use billiards_hub::services::session::SessionStore;
use billiards_hub::AppContext;

use crate::common::{test_password, test_profile, TestContext};

// =============================================================================
// INITIALIZE
// =============================================================================

#[tokio::test]
async fn initialize_restores_persisted_session_and_profile() {
    let backend = Arc::new(MemoryBackend::new());
    let profile = test_profile(MemberType::Player, AccountStatus::Active);
    backend.seed_profile(profile.clone(), test_password());
    backend
        .sign_in_with_password(&profile.email, test_password())
        .await
        .unwrap();

    let app = AppContext::init(Config::default(), backend.clone()).await;
    let snapshot = app.session.snapshot();

    assert!(!snapshot.loading);
    assert_eq!(snapshot.identity.map(|i| i.id), Some(profile.id.clone()));
    assert_eq!(snapshot.profile, Some(profile));
    assert_eq!(app.landing().await, Route::Home);
}

#[tokio::test]
async fn loading_flips_once_without_a_session() {
    let backend = Arc::new(MemoryBackend::new());
    let store = SessionStore::new(backend.clone());
    let rx = store.subscribe();
    assert!(rx.borrow().loading);

    store.initialize().await;
    assert!(!rx.borrow().loading);
    assert!(!rx.borrow().is_authenticated());

    store.initialize().await;
    assert_eq!(backend.calls(Operation::GetSession), 1);
}

#[tokio::test]
async fn missing_profile_row_is_not_an_error() {
    let backend = Arc::new(MemoryBackend::new());
    let profile = test_profile(MemberType::Coach, AccountStatus::Pending);
    backend.seed_profile(profile.clone(), test_password());
    backend
        .sign_in_with_password(&profile.email, test_password())
        .await
        .unwrap();
    backend.inject(Operation::FindProfile, Fault::Fail);

    let store = SessionStore::new(backend.clone());
    store.initialize().await;

    let snapshot = store.snapshot();
    assert!(snapshot.is_authenticated());
    assert!(snapshot.profile.is_none());
    assert!(!snapshot.loading);
}

// =============================================================================
// EVENTS
// =============================================================================

#[tokio::test]
async fn events_before_initialize_are_ignored() {
    let backend = Arc::new(MemoryBackend::new());
    let profile = test_profile(MemberType::Player, AccountStatus::Active);
    backend.seed_profile(profile.clone(), test_password());
    let session = backend
        .sign_in_with_password(&profile.email, test_password())
        .await
        .unwrap();

    let store = SessionStore::new(backend.clone());
    store.handle_event(AuthEvent::SignedIn(session)).await;

    let snapshot = store.snapshot();
    assert!(snapshot.loading);
    assert!(snapshot.identity.is_none());
    assert_eq!(backend.calls(Operation::FindProfile), 0);
}

#[tokio::test]
async fn listener_adopts_sign_in_from_backend() {
    let ctx = TestContext::new().await;
    let profile = ctx.seed(MemberType::Player, AccountStatus::Active);
    let mut rx = ctx.app.session.subscribe();

    ctx.backend
        .sign_in_with_password(&profile.email, test_password())
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while rx.borrow_and_update().profile.is_none() {
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("store never picked up the sign-in");

    assert_eq!(ctx.app.session.profile().map(|p| p.id), Some(profile.id));
}

#[tokio::test]
async fn teardown_stops_the_listener() {
    let ctx = TestContext::new().await;
    let profile = ctx.seed(MemberType::Player, AccountStatus::Active);
    ctx.app.teardown();

    ctx.backend
        .sign_in_with_password(&profile.email, test_password())
        .await
        .unwrap();
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert!(ctx.app.session.identity().is_none());
}

#[tokio::test]
async fn sign_in_for_another_user_drops_previous_profile() {
    let (ctx, first) = TestContext::signed_in(MemberType::Player, AccountStatus::Active).await;
    assert_eq!(ctx.app.session.profile().map(|p| p.id), Some(first.id));

    let second = ctx.seed(MemberType::Coach, AccountStatus::Pending);
    ctx.app
        .login()
        .sign_in_with_password(&second.email, test_password())
        .await
        .unwrap();

    let snapshot = ctx.app.session.snapshot();
    assert_eq!(snapshot.identity.map(|i| i.id), Some(second.id.clone()));
    assert_eq!(snapshot.profile.map(|p| p.id), Some(second.id));
}

// =============================================================================
// REFRESH PROFILE
// =============================================================================

#[tokio::test]
async fn refresh_profile_is_idempotent() {
    let (ctx, profile) = TestContext::signed_in(MemberType::Player, AccountStatus::Active).await;

    let first = ctx.app.session.refresh_profile().await.unwrap();
    let second = ctx.app.session.refresh_profile().await.unwrap();

    assert_eq!(first, Some(profile));
    assert_eq!(first, second);
    assert_eq!(ctx.app.session.profile(), second);
}

#[tokio::test]
async fn concurrent_refreshes_agree() {
    let (ctx, profile) = TestContext::signed_in(MemberType::Coach, AccountStatus::Active).await;

    let results =
        futures::future::join_all((0..4).map(|_| ctx.app.session.refresh_profile())).await;

    for result in results {
        assert_eq!(result.unwrap(), Some(profile.clone()));
    }
    assert_eq!(ctx.app.session.profile(), Some(profile));
}

#[tokio::test]
async fn refresh_profile_picks_up_backend_changes() {
    let (ctx, profile) = TestContext::signed_in(MemberType::Player, AccountStatus::Active).await;
    let patch = ProfilePatch {
        city: Some("جدة".to_string()),
        ..Default::default()
    };
    ctx.backend.update_profile(&profile.id, &patch).await.unwrap();

    let refreshed = ctx.app.session.refresh_profile().await.unwrap().unwrap();

    assert_eq!(refreshed.city, "جدة");
    assert_eq!(ctx.app.session.profile().map(|p| p.city), Some("جدة".to_string()));
}

#[tokio::test]
async fn refresh_profile_failure_keeps_current_profile() {
    let (ctx, profile) = TestContext::signed_in(MemberType::Player, AccountStatus::Active).await;
    ctx.backend
        .inject(Operation::FindProfile, Fault::Fail);

    assert!(ctx.app.session.refresh_profile().await.is_err());
    assert_eq!(ctx.app.session.profile(), Some(profile));
}
