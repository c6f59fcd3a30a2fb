use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::state::{accepts_documents, plan_submission, transition, SubmissionWrite, Trigger};
use super::watcher::current_status;
use super::VerificationError;
use crate::modules::profile::model::{AccountStatus, MemberType, ProfilePatch};
use crate::services::backend::Bucket;
use crate::services::session::SessionStore;

const DOCUMENT_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "pdf"];

/// What the upload form asks each member type to provide.
pub fn required_documents(member_type: MemberType) -> &'static [&'static str] {
    match member_type {
        MemberType::Coach => &[
            "صورة الهوية الوطنية أو الإقامة",
            "شهادات التدريب (إن وجدت)",
            "صورة شخصية واضحة",
        ],
        MemberType::Club => &[
            "السجل التجاري أو رخصة العمل",
            "صور للنادي/الصالة",
            "هوية المسؤول",
        ],
        _ => &[],
    }
}

/// A file picked by the member.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    fn extension(&self) -> Option<String> {
        let (_, ext) = self.name.rsplit_once('.')?;
        let ext = ext.trim().to_ascii_lowercase();
        (!ext.is_empty()).then_some(ext)
    }

    /// Images of any kind, or PDF.
    pub fn is_accepted(&self) -> bool {
        let content_type = self.content_type.trim().to_ascii_lowercase();
        if content_type.starts_with("image/") || content_type == "application/pdf" {
            return true;
        }
        content_type.is_empty()
            && self
                .extension()
                .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext.as_str()))
    }
}

/// Result for one file of a batch.
#[derive(Debug)]
pub struct UploadOutcome {
    pub file_name: String,
    pub result: Result<String, VerificationError>,
}

impl UploadOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Per-file notice text.
    pub fn message(&self) -> String {
        match &self.result {
            Ok(_) => super::MSG_UPLOADED.to_string(),
            Err(VerificationError::UnsupportedFile(_)) => {
                format!("{} ({})", super::MSG_UNSUPPORTED_FILE, self.file_name)
            }
            Err(_) => format!("خطأ في رفع {}", self.file_name),
        }
    }
}

/// Upload form for coach and club verification documents.
///
/// Uploaded files go to storage immediately; the document list itself is
/// only written to the verification request on `submit`.
pub struct DocumentUpload {
    store: Arc<SessionStore>,
    documents: Vec<String>,
    return_notes: Option<String>,
}

impl DocumentUpload {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            store,
            documents: Vec::new(),
            return_notes: None,
        }
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    /// Reviewer feedback from the last return, if any.
    pub fn return_notes(&self) -> Option<&str> {
        self.return_notes.as_deref()
    }

    /// Prefills the form from the live request. Returns the derived status
    /// so callers can redirect when the form does not apply.
    pub async fn load(&mut self) -> Result<AccountStatus, VerificationError> {
        let view = current_status(&self.store).await?;
        if let Some(request) = &view.request {
            self.documents = request.documents.clone();
            self.return_notes = request.reviewer_notes().map(str::to_string);
        }
        tracing::debug!(
            "Loaded upload form for {} ({} documents, status {})",
            view.profile.id,
            self.documents.len(),
            view.status
        );
        Ok(view.status)
    }

    /// Uploads each file independently. A failed file is reported in its
    /// outcome and does not stop the rest of the batch.
    pub async fn upload(&mut self, files: Vec<UploadFile>) -> Result<Vec<UploadOutcome>, VerificationError> {
        let user_id = self
            .store
            .identity()
            .map(|i| i.id)
            .ok_or(VerificationError::NotSignedIn)?;

        let mut outcomes = Vec::with_capacity(files.len());
        for file in files {
            let result = self.upload_one(&user_id, &file).await;
            match &result {
                Ok(url) => self.documents.push(url.clone()),
                Err(e) => tracing::warn!("Upload of {} failed: {}", file.name, e),
            }
            outcomes.push(UploadOutcome {
                file_name: file.name,
                result,
            });
        }
        Ok(outcomes)
    }

    async fn upload_one(&self, user_id: &str, file: &UploadFile) -> Result<String, VerificationError> {
        if !file.is_accepted() {
            return Err(VerificationError::UnsupportedFile(file.name.clone()));
        }
        let ext = file.extension().unwrap_or_else(|| {
            if file.content_type.eq_ignore_ascii_case("application/pdf") {
                "pdf".to_string()
            } else {
                "bin".to_string()
            }
        });
        // Unique across forms and processes; re-uploads always append.
        let key = format!(
            "{user_id}/{}-{}.{ext}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple()
        );

        let backend = self.store.backend();
        backend
            .upload(Bucket::Documents, &key, file.bytes.clone(), &file.content_type, false)
            .await?;
        Ok(backend.public_url(Bucket::Documents, &key))
    }

    /// Drops a document from the pending list. Nothing is written until
    /// `submit`.
    pub fn remove(&mut self, index: usize) -> Result<String, VerificationError> {
        if index >= self.documents.len() {
            return Err(VerificationError::NoSuchDocument(index));
        }
        Ok(self.documents.remove(index))
    }

    /// Writes the document list to the verification request and moves the
    /// account to `under_review`.
    ///
    /// The two writes are not atomic. If the profile write fails after the
    /// request write succeeded, the submission still counts: the next
    /// status read derives `under_review` from the request and finishes
    /// the profile write.
    pub async fn submit(&mut self) -> Result<AccountStatus, VerificationError> {
        if self.documents.is_empty() {
            return Err(VerificationError::NoDocuments);
        }

        let view = current_status(&self.store).await?;
        let profile = &view.profile;
        if !profile.member_type.requires_verification() {
            return Err(VerificationError::NotApplicable(profile.member_type));
        }
        if !accepts_documents(view.status) {
            return Err(VerificationError::NotAccepting(view.status));
        }
        let next = transition(view.status, Trigger::DocumentsSubmitted)?;

        let backend = self.store.backend();
        match plan_submission(profile, view.request.as_ref(), self.documents.clone(), Utc::now()) {
            SubmissionWrite::Insert(request) => {
                let created = backend.insert_request(&request).await?;
                tracing::info!("Created verification request {} for {}", created.id, profile.id);
            }
            SubmissionWrite::Update { id, patch } => {
                backend.update_request(&id, &patch).await?;
                tracing::info!(
                    "Resubmitted verification request {} (count {})",
                    id,
                    patch.resubmit_count.unwrap_or_default()
                );
            }
        }

        if let Err(e) = backend
            .update_profile(&profile.id, &ProfilePatch::status(next))
            .await
        {
            tracing::warn!(
                "Request saved but status write for {} failed, left for repair: {}",
                profile.id,
                e
            );
        }
        if let Err(e) = self.store.refresh_profile().await {
            tracing::warn!("Failed to refresh profile after submission: {}", e);
        }

        self.return_notes = None;
        Ok(next)
    }
}
