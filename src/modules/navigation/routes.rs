use crate::modules::profile::model::{AccountStatus, MemberType};
use crate::services::session::SessionSnapshot;

// =============================================================================
// ROUTE SURFACE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Register,
    Login,
    UploadDocuments,
    PendingReview,
    AccountRejected,
    AccountSuspended,
    Profile,
}

impl Route {
    pub const ALL: [Route; 8] = [
        Route::Home,
        Route::Register,
        Route::Login,
        Route::UploadDocuments,
        Route::PendingReview,
        Route::AccountRejected,
        Route::AccountSuspended,
        Route::Profile,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Register => "/register",
            Self::Login => "/login",
            Self::UploadDocuments => "/upload-documents",
            Self::PendingReview => "/pending-review",
            Self::AccountRejected => "/account-rejected",
            Self::AccountSuspended => "/account-suspended",
            Self::Profile => "/profile",
        }
    }

    /// Matches a path, ignoring any query string and trailing slash.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split('?').next().unwrap_or_default();
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        Self::ALL.into_iter().find(|route| route.path() == path)
    }

    pub fn requires_identity(&self) -> bool {
        !matches!(self, Self::Home | Self::Register | Self::Login)
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

// =============================================================================
// LANDING
// =============================================================================

/// Where a member lands after login or on load.
pub fn landing_route(member_type: MemberType, status: AccountStatus) -> Route {
    if !member_type.requires_verification() {
        return Route::Home;
    }
    match status {
        AccountStatus::Pending | AccountStatus::Returned => Route::UploadDocuments,
        AccountStatus::UnderReview => Route::PendingReview,
        AccountStatus::Approved | AccountStatus::Active => Route::Home,
        AccountStatus::Rejected => Route::AccountRejected,
        AccountStatus::Suspended => Route::AccountSuspended,
    }
}

/// Where the review-progress view moves to once the review settles.
/// `None` while the request is still waiting on a reviewer.
pub fn route_after_review(status: AccountStatus) -> Option<Route> {
    match status {
        AccountStatus::Approved | AccountStatus::Active => Some(Route::Profile),
        AccountStatus::Returned => Some(Route::UploadDocuments),
        AccountStatus::Rejected => Some(Route::AccountRejected),
        AccountStatus::Suspended => Some(Route::AccountSuspended),
        AccountStatus::Pending | AccountStatus::UnderReview => None,
    }
}

// =============================================================================
// GUARDS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// The store is still loading; render a pending state.
    Wait,
    Redirect(Route),
}

pub fn guard(route: Route, snapshot: &SessionSnapshot) -> GuardDecision {
    if !route.requires_identity() {
        return GuardDecision::Allow;
    }
    if snapshot.loading {
        return GuardDecision::Wait;
    }
    if snapshot.is_authenticated() {
        GuardDecision::Allow
    } else {
        GuardDecision::Redirect(Route::Login)
    }
}
