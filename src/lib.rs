pub mod config;
pub mod modules;
pub mod services;

use std::sync::Arc;
use tokio::sync::mpsc;

use config::Config;
use modules::auth::login::resolve_landing;
use modules::auth::{LoginFlow, RegistrationWizard};
use modules::navigation::Route;
use modules::profile::ProfileEditor;
use modules::verification::{DocumentUpload, StatusUpdate, StatusWatcher, SupportContact};
use services::backend::Backend;
use services::session::SessionStore;

/// Application root: configuration, the backend handle and the session
/// store, with an explicit `init`/`teardown` lifecycle.
pub struct AppContext {
    pub config: Config,
    pub backend: Arc<dyn Backend>,
    pub session: Arc<SessionStore>,
}

impl AppContext {
    /// Starts listening for auth events, then loads the persisted session.
    pub async fn init(config: Config, backend: Arc<dyn Backend>) -> Self {
        let session = Arc::new(SessionStore::new(backend.clone()));
        session.spawn_listener();
        session.initialize().await;
        Self {
            config,
            backend,
            session,
        }
    }

    pub fn teardown(&self) {
        self.session.teardown();
    }

    pub fn support(&self) -> SupportContact {
        SupportContact::new(self.config.support_email.clone())
    }

    pub fn login(&self) -> LoginFlow {
        LoginFlow::new(self.session.clone())
    }

    pub fn registration(&self, link_param: Option<&str>) -> RegistrationWizard {
        RegistrationWizard::with_link_param(self.session.clone(), link_param)
    }

    pub fn document_upload(&self) -> DocumentUpload {
        DocumentUpload::new(self.session.clone())
    }

    pub fn profile_editor(&self) -> ProfileEditor {
        ProfileEditor::new(self.session.clone())
    }

    pub fn watch_status(&self) -> (StatusWatcher, mpsc::Receiver<StatusUpdate>) {
        StatusWatcher::spawn(self.session.clone(), self.config.poll_interval)
    }

    /// Where the current member belongs right now.
    pub async fn landing(&self) -> Route {
        resolve_landing(&self.session).await
    }
}
