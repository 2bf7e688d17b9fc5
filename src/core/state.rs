use std::sync::Arc;

use crate::core::config::Settings;
use crate::repositories::submissions::SubmissionStore;
use crate::services::queue::JobQueue;
use crate::services::scorer::Scorer;
use crate::services::storage::BlobStore;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    submissions: Arc<dyn SubmissionStore>,
    blobs: Arc<dyn BlobStore>,
    scorer: Arc<dyn Scorer>,
    queue: Arc<dyn JobQueue>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        submissions: Arc<dyn SubmissionStore>,
        blobs: Arc<dyn BlobStore>,
        scorer: Arc<dyn Scorer>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, submissions, blobs, scorer, queue }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn submissions(&self) -> &dyn SubmissionStore {
        self.inner.submissions.as_ref()
    }

    pub(crate) fn blobs(&self) -> &dyn BlobStore {
        self.inner.blobs.as_ref()
    }

    pub(crate) fn scorer(&self) -> &dyn Scorer {
        self.inner.scorer.as_ref()
    }

    pub(crate) fn queue(&self) -> &dyn JobQueue {
        self.inner.queue.as_ref()
    }
}
