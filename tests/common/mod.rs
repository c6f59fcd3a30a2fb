use std::sync::Arc;

use billiards_hub::config::Config;
use billiards_hub::modules::profile::{AccountStatus, MemberType, Profile};
use billiards_hub::modules::verification::UploadFile;
use billiards_hub::services::backend::MemoryBackend;
use billiards_hub::AppContext;
use chrono::{Duration, Utc};

// Allow dead_code for utilities used by other test files
#[allow(dead_code)]
pub struct TestContext {
    pub backend: Arc<MemoryBackend>,
    pub app: AppContext,
}

#[allow(dead_code)]
impl TestContext {
    pub async fn new() -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let app = AppContext::init(Config::default(), backend.clone()).await;
        Self { backend, app }
    }

    /// Seeds a confirmed member and signs them in with their password.
    pub async fn signed_in(member_type: MemberType, status: AccountStatus) -> (Self, Profile) {
        let ctx = Self::new().await;
        let profile = ctx.seed(member_type, status);
        ctx.app
            .login()
            .sign_in_with_password(&profile.email, test_password())
            .await
            .expect("Failed to sign in seeded member");
        (ctx, profile)
    }

    /// Uploads `count` images for the signed-in member and submits them.
    pub async fn submit_documents(&self, count: usize) -> AccountStatus {
        let mut form = self.app.document_upload();
        form.load().await.expect("Failed to load upload form");
        let files = (0..count).map(|i| test_image(&format!("doc-{i}.png"))).collect();
        let outcomes = form.upload(files).await.expect("Failed to upload documents");
        assert!(outcomes.iter().all(|o| o.is_ok()));
        form.submit().await.expect("Failed to submit documents")
    }

    pub fn seed(&self, member_type: MemberType, status: AccountStatus) -> Profile {
        let profile = test_profile(member_type, status);
        self.backend.seed_profile(profile.clone(), test_password());
        profile
    }
}

// Helper to generate unique test email
#[allow(dead_code)]
pub fn test_email() -> String {
    format!("test_{}@gmail.com", uuid::Uuid::new_v4().simple())
}

// Helper to generate test password
#[allow(dead_code)]
pub fn test_password() -> &'static str {
    "TestPassword123!"
}

// Nine digits starting with 5, unique per call
#[allow(dead_code)]
pub fn test_phone() -> String {
    format!("5{:08}", uuid::Uuid::new_v4().as_u128() % 100_000_000)
}

#[allow(dead_code)]
pub fn test_profile(member_type: MemberType, status: AccountStatus) -> Profile {
    // Created a while ago so any later write is strictly newer.
    let created_at = Utc::now() - Duration::days(1);
    let (first_name, last_name, club_name) = if member_type.is_individual() {
        (Some("Sami".to_string()), Some("Ali".to_string()), None)
    } else {
        (None, None, Some("Cue Corner".to_string()))
    };
    Profile {
        id: uuid::Uuid::new_v4().to_string(),
        member_type,
        account_status: status,
        first_name,
        last_name,
        club_name,
        birth_date: None,
        phone: test_phone(),
        email: test_email(),
        city: "الرياض".to_string(),
        avatar_url: None,
        bio: None,
        social_twitter: None,
        social_instagram: None,
        social_snapchat: None,
        created_at,
        updated_at: created_at,
    }
}

#[allow(dead_code)]
pub fn test_image(name: &str) -> UploadFile {
    UploadFile::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
}
