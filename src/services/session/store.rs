use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use crate::modules::auth::model::{AuthEvent, Identity, Session};
use crate::modules::profile::model::Profile;
use crate::services::backend::{Backend, BackendError, BackendResult};

const SIGN_OUT_TIMEOUT: Duration = Duration::from_secs(10);

/// What the rest of the application observes about the signed-in member.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session: Option<Session>,
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
    pub loading: bool,
}

impl SessionSnapshot {
    fn loading() -> Self {
        Self {
            session: None,
            identity: None,
            profile: None,
            loading: true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

struct Inner {
    snapshot: SessionSnapshot,
    // Bumped by every identity change. A profile fetch started under an
    // older generation is discarded on completion.
    generation: u64,
    initialized: bool,
    // Access tokens of sessions ended by `sign_out`. Events still queued
    // for them are dropped.
    revoked: HashSet<String>,
}

/// Single source of truth for the current session, identity and profile.
///
/// Mutations from `initialize`, the auth-event stream, `refresh_profile` and
/// `sign_out` are serialized behind one lock. The lock is never held across
/// a backend call, so a stalled fetch cannot delay sign-out.
pub struct SessionStore {
    backend: Arc<dyn Backend>,
    inner: Mutex<Inner>,
    tx: watch::Sender<SessionSnapshot>,
    listener: StdMutex<Option<JoinHandle<()>>>,
    sign_out_timeout: Duration,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (tx, _) = watch::channel(SessionSnapshot::loading());
        Self {
            backend,
            inner: Mutex::new(Inner {
                snapshot: SessionSnapshot::loading(),
                generation: 0,
                initialized: false,
                revoked: HashSet::new(),
            }),
            tx,
            listener: StdMutex::new(None),
            sign_out_timeout: SIGN_OUT_TIMEOUT,
        }
    }

    pub fn with_sign_out_timeout(mut self, timeout: Duration) -> Self {
        self.sign_out_timeout = timeout;
        self
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.tx.borrow().identity.clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.tx.borrow().profile.clone()
    }

    fn publish(&self, inner: &Inner) {
        self.tx.send_replace(inner.snapshot.clone());
    }

    /// Loads the persisted session and its profile. A missing profile is not
    /// an error: the row may not exist yet right after signup.
    pub async fn initialize(&self) {
        let generation = {
            let inner = self.inner.lock().await;
            if inner.initialized {
                tracing::debug!("Session store already initialized");
                return;
            }
            inner.generation
        };

        let session = match self.backend.get_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Failed to load persisted session: {}", e);
                None
            }
        };
        let profile = match &session {
            Some(session) => self.fetch_profile(&session.user.id).await,
            None => None,
        };

        let mut inner = self.inner.lock().await;
        if inner.generation == generation {
            inner.snapshot.identity = session.as_ref().map(|s| s.user.clone());
            inner.snapshot.session = session;
            inner.snapshot.profile = profile;
        }
        inner.snapshot.loading = false;
        inner.initialized = true;
        tracing::info!(
            "Session store initialized (signed in: {})",
            inner.snapshot.is_authenticated()
        );
        self.publish(&inner);
    }

    /// Applies a session-change notification. Ignored until `initialize`
    /// has completed.
    pub async fn handle_event(&self, event: AuthEvent) {
        let mut inner = self.inner.lock().await;
        if !inner.initialized {
            tracing::debug!("Ignoring {} received before initialization", event.name());
            return;
        }
        tracing::debug!("Auth event {}", event.name());

        if let AuthEvent::SignedIn(session)
        | AuthEvent::UserUpdated(session)
        | AuthEvent::TokenRefreshed(session) = &event
        {
            if inner.revoked.contains(&session.access_token) {
                tracing::debug!("Ignoring {} for a signed-out session", event.name());
                return;
            }
            if let Some(current) = &inner.snapshot.session {
                if session.access_token == current.access_token {
                    // Delivered both directly and through the listener.
                    if !matches!(event, AuthEvent::UserUpdated(_)) {
                        tracing::debug!("Session already adopted, {} skipped", event.name());
                        return;
                    }
                } else if session.expires_at < current.expires_at {
                    // Expiring before the held session means issued before it.
                    tracing::debug!("Ignoring {} for a superseded session", event.name());
                    return;
                }
            }
        }

        match event {
            AuthEvent::SignedIn(session) | AuthEvent::UserUpdated(session) => {
                let user_id = session.user.id.clone();
                let same_user = inner
                    .snapshot
                    .identity
                    .as_ref()
                    .is_some_and(|i| i.id == user_id);
                if !same_user {
                    inner.snapshot.profile = None;
                }
                inner.snapshot.identity = Some(session.user.clone());
                inner.snapshot.session = Some(session);
                inner.generation += 1;
                let generation = inner.generation;
                self.publish(&inner);
                drop(inner);

                let profile = self.fetch_profile(&user_id).await;

                let mut inner = self.inner.lock().await;
                if inner.generation == generation {
                    inner.snapshot.profile = profile;
                    self.publish(&inner);
                } else {
                    tracing::debug!("Discarding stale profile fetch for {}", user_id);
                }
            }
            AuthEvent::TokenRefreshed(session) => {
                inner.snapshot.identity = Some(session.user.clone());
                inner.snapshot.session = Some(session);
                self.publish(&inner);
            }
            AuthEvent::SignedOut => {
                Self::clear(&mut inner);
                self.publish(&inner);
            }
        }
    }

    /// Re-reads the profile of the current identity. Without an identity
    /// this does nothing and returns `Ok(None)`.
    pub async fn refresh_profile(&self) -> BackendResult<Option<Profile>> {
        let (user_id, generation) = {
            let inner = self.inner.lock().await;
            match &inner.snapshot.identity {
                Some(identity) => (identity.id.clone(), inner.generation),
                None => return Ok(None),
            }
        };

        let profile = self.backend.find_profile(&user_id).await?;

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            tracing::debug!("Identity changed during profile refresh, result dropped");
            return Ok(inner.snapshot.profile.clone());
        }
        inner.snapshot.profile = profile.clone();
        self.publish(&inner);
        Ok(profile)
    }

    /// Signs out with the backend and clears local state. Local state is
    /// cleared even when the backend call fails or times out; that failure
    /// is still returned.
    pub async fn sign_out(&self) -> BackendResult<()> {
        {
            let mut inner = self.inner.lock().await;
            inner.generation += 1;
            if let Some(token) = inner.snapshot.session.as_ref().map(|s| s.access_token.clone()) {
                inner.revoked.insert(token);
            }
        }

        let result = match tokio::time::timeout(self.sign_out_timeout, self.backend.sign_out()).await
        {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout),
        };
        if let Err(e) = &result {
            tracing::warn!("Backend sign-out failed, clearing local session anyway: {}", e);
        }

        let mut inner = self.inner.lock().await;
        Self::clear(&mut inner);
        self.publish(&inner);
        tracing::info!("Signed out");
        result
    }

    fn clear(inner: &mut Inner) {
        inner.snapshot.session = None;
        inner.snapshot.identity = None;
        inner.snapshot.profile = None;
        inner.generation += 1;
    }

    async fn fetch_profile(&self, user_id: &str) -> Option<Profile> {
        match self.backend.find_profile(user_id).await {
            Ok(Some(profile)) => Some(profile),
            Ok(None) => {
                tracing::debug!("No profile row yet for {}", user_id);
                None
            }
            Err(e) => {
                tracing::warn!("Failed to fetch profile for {}: {}", user_id, e);
                None
            }
        }
    }

    /// Feeds backend auth events into the store until `teardown`.
    pub fn spawn_listener(self: &Arc<Self>) {
        let mut events = self.backend.subscribe();
        let store: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => match store.upgrade() {
                        Some(store) => store.handle_event(event).await,
                        None => break,
                    },
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!("Auth listener lagged, {} events missed", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let mut slot = self
            .listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    pub fn teardown(&self) {
        let handle = self
            .listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!("Auth listener stopped");
        }
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.teardown();
    }
}
