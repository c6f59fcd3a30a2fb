use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::model::{VerificationRequest, VerificationStatus};
use super::state::{effective_status, needs_repair};
use super::VerificationError;
use crate::modules::navigation::{route_after_review, Route};
use crate::modules::profile::model::{AccountStatus, Profile, ProfilePatch};
use crate::services::backend::RowChange;
use crate::services::session::SessionStore;

/// Profile, live request and the status derived from both.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusView {
    pub profile: Profile,
    pub request: Option<VerificationRequest>,
    pub status: AccountStatus,
}

/// Re-reads both rows and derives the account status. An interrupted
/// submission (request under review, profile still pending or returned)
/// gets its profile write finished here.
pub async fn current_status(store: &SessionStore) -> Result<StatusView, VerificationError> {
    if store.identity().is_none() {
        return Err(VerificationError::NotSignedIn);
    }
    let mut profile = store
        .refresh_profile()
        .await?
        .ok_or(VerificationError::ProfileMissing)?;
    let request = store.backend().latest_request(&profile.id).await?;
    let status = effective_status(&profile, request.as_ref());

    if needs_repair(&profile, status) {
        tracing::warn!(
            "Profile {} is {} but its request is under review, repairing",
            profile.id,
            profile.account_status
        );
        match store
            .backend()
            .update_profile(&profile.id, &ProfilePatch::status(AccountStatus::UnderReview))
            .await
        {
            Ok(()) => match store.refresh_profile().await {
                Ok(Some(repaired)) => profile = repaired,
                Ok(None) => {}
                Err(e) => tracing::warn!("Failed to reload repaired profile: {}", e),
            },
            Err(e) => tracing::warn!("Status repair for {} failed: {}", profile.id, e),
        }
    }

    Ok(StatusView {
        profile,
        request,
        status,
    })
}

/// A settled review outcome and where to go next.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: AccountStatus,
    pub route: Route,
    pub return_notes: Option<String>,
    pub rejection_reason: Option<String>,
}

impl StatusUpdate {
    fn from_view(view: &StatusView, route: Route) -> Self {
        let request = view.request.as_ref();
        Self {
            status: view.status,
            route,
            return_notes: request.and_then(|r| r.reviewer_notes()).map(str::to_string),
            rejection_reason: request
                .filter(|r| r.status == VerificationStatus::Rejected)
                .and_then(|r| r.rejection_reason.clone()),
        }
    }
}

enum Wake {
    Check,
    Skip,
    PushClosed,
}

/// Watches an account under review until the reviewer settles it.
///
/// Re-checks on a fixed period and, when the backend pushes row changes,
/// on every change to the member's rows. Emits one [`StatusUpdate`] and
/// stops. Dropping the watcher cancels it.
pub struct StatusWatcher {
    handle: JoinHandle<()>,
}

impl StatusWatcher {
    pub fn spawn(store: Arc<SessionStore>, period: Duration) -> (Self, mpsc::Receiver<StatusUpdate>) {
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(watch(store, period, tx));
        (Self { handle }, rx)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for StatusWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn watch(store: Arc<SessionStore>, period: Duration, tx: mpsc::Sender<StatusUpdate>) {
    let Some(user_id) = store.identity().map(|i| i.id) else {
        tracing::debug!("Status watcher started without an identity");
        return;
    };
    let mut changes = store.backend().row_changes();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::debug!(
        "Watching review status of {} (push: {})",
        user_id,
        changes.is_some()
    );

    loop {
        let wake = tokio::select! {
            _ = ticker.tick() => Wake::Check,
            wake = next_change(&mut changes, &user_id) => wake,
        };
        match wake {
            Wake::Check => {}
            Wake::Skip => continue,
            Wake::PushClosed => {
                tracing::debug!("Row-change feed closed, polling only");
                changes = None;
                continue;
            }
        }

        let view = match current_status(&store).await {
            Ok(view) => view,
            Err(e) => {
                tracing::warn!("Status check for {} failed: {}", user_id, e);
                continue;
            }
        };
        if let Some(route) = route_after_review(view.status) {
            tracing::info!("Review of {} settled as {}", user_id, view.status);
            let _ = tx.send(StatusUpdate::from_view(&view, route)).await;
            return;
        }
    }
}

async fn next_change(changes: &mut Option<broadcast::Receiver<RowChange>>, user_id: &str) -> Wake {
    let Some(rx) = changes else {
        return std::future::pending().await;
    };
    match rx.recv().await {
        Ok(change) if change.user_id() == user_id => Wake::Check,
        Ok(_) => Wake::Skip,
        Err(broadcast::error::RecvError::Lagged(_)) => Wake::Check,
        Err(broadcast::error::RecvError::Closed) => Wake::PushClosed,
    }
}
