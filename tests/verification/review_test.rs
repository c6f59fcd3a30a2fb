use billiards_hub::modules::navigation::Route;
use billiards_hub::modules::profile::{AccountStatus, MemberType};
use billiards_hub::modules::verification::model::VerificationStatus;
use billiards_hub::modules::verification::{
    current_status, RejectionNotice, ReviewProgress, SuspensionNotice,
};
use billiards_hub::services::backend::{ReviewDecision, VerificationStore};

use crate::common::{test_image, TestContext};

#[tokio::test]
async fn progress_reflects_the_live_request() {
    let (ctx, profile) = TestContext::signed_in(MemberType::Club, AccountStatus::Pending).await;
    ctx.submit_documents(2).await;

    let progress = ReviewProgress::load(&ctx.app.session).await.unwrap();

    assert_eq!(progress.status, AccountStatus::UnderReview);
    assert_eq!(progress.documents, 2);
    assert_eq!(progress.resubmit_count, 0);
    assert_eq!(progress.account_created_at, profile.created_at);
    assert!(progress.submitted_at.is_some());
    assert_eq!(progress.expected_review_time(), "24-48 ساعة");
}

#[tokio::test]
async fn returned_request_prefills_form_and_resubmits() {
    let (ctx, profile) = TestContext::signed_in(MemberType::Coach, AccountStatus::Pending).await;
    ctx.submit_documents(1).await;
    ctx.backend
        .review(
            &profile.id,
            ReviewDecision::Return {
                notes: "الصورة غير واضحة".to_string(),
            },
        )
        .unwrap();

    assert_eq!(ctx.app.landing().await, Route::UploadDocuments);

    let mut form = ctx.app.document_upload();
    assert_eq!(form.load().await.unwrap(), AccountStatus::Returned);
    assert_eq!(form.documents().len(), 1);
    assert_eq!(form.return_notes(), Some("الصورة غير واضحة"));

    let outcomes = form.upload(vec![test_image("clear.png")]).await.unwrap();
    assert!(outcomes.iter().all(|o| o.is_ok()));
    let status = form.submit().await.unwrap();

    assert_eq!(status, AccountStatus::UnderReview);
    assert_eq!(form.return_notes(), None);
    let request = ctx
        .backend
        .latest_request(&profile.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.status, VerificationStatus::UnderReview);
    assert_eq!(request.resubmit_count, 1);
    assert_eq!(request.documents.len(), 2);
    assert!(request.return_notes.is_none());
    assert!(request.resubmitted_at.is_some());
    assert_eq!(ctx.app.landing().await, Route::PendingReview);
}

#[tokio::test]
async fn approval_activates_the_account() {
    let (ctx, profile) = TestContext::signed_in(MemberType::Club, AccountStatus::Pending).await;
    ctx.submit_documents(1).await;

    ctx.backend.review(&profile.id, ReviewDecision::Approve).unwrap();
    let view = current_status(&ctx.app.session).await.unwrap();

    assert_eq!(view.status, AccountStatus::Active);
    assert_eq!(ctx.app.landing().await, Route::Home);
}

#[tokio::test]
async fn rejection_notice_shows_reason_and_contact() {
    let (ctx, profile) = TestContext::signed_in(MemberType::Coach, AccountStatus::Pending).await;
    ctx.submit_documents(1).await;
    ctx.backend
        .review(
            &profile.id,
            ReviewDecision::Reject {
                reason: "الوثائق غير مطابقة".to_string(),
            },
        )
        .unwrap();

    assert_eq!(ctx.app.landing().await, Route::AccountRejected);

    let notice = RejectionNotice::load(&ctx.app.session, ctx.app.support())
        .await
        .unwrap();
    assert_eq!(notice.reason.as_deref(), Some("الوثائق غير مطابقة"));
    assert!(notice
        .contact_link()
        .starts_with("mailto:support@saudibilliards.com?subject="));

    notice.sign_out(&ctx.app.session).await.unwrap();
    assert!(!ctx.app.session.snapshot().is_authenticated());
    assert_eq!(ctx.app.landing().await, Route::Login);
}

#[tokio::test]
async fn suspension_wins_over_the_request() {
    let (ctx, profile) = TestContext::signed_in(MemberType::Coach, AccountStatus::Pending).await;
    ctx.submit_documents(1).await;

    ctx.backend.review(&profile.id, ReviewDecision::Suspend).unwrap();

    assert_eq!(ctx.app.landing().await, Route::AccountSuspended);
    let notice = SuspensionNotice::new(ctx.app.support());
    assert!(notice.contact_link().contains("?subject=%D8"));
    notice.sign_out(&ctx.app.session).await.unwrap();
    assert!(ctx.app.session.identity().is_none());
}
