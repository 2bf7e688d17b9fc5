use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use sqlx::types::Json as SqlJson;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::core::config::Settings;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Submission, SubmissionImage};
use crate::db::types::SubmissionStatus;
use crate::repositories::submissions::SubmissionStore;
use crate::services::queue::{JobEnvelope, JobQueue};
use crate::services::scorer::{GradingResult, Scorer};
use crate::services::storage::BlobStore;

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<AsyncMutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(AsyncMutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    dotenvy::dotenv().ok();

    std::env::set_var("REDINK_ENV", "test");
    std::env::set_var("REDINK_STRICT_CONFIG", "0");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::remove_var("WORKER_CONCURRENCY");
    std::env::remove_var("GRADING_QUEUE");
    std::env::remove_var("OCR_TIMEOUT_MS");
    std::env::remove_var("OCR_SERVICE_URL");
    std::env::remove_var("MINIO_ACCESS_KEY");
    std::env::remove_var("MINIO_SECRET_KEY");
}

pub(crate) async fn make_state(
    submissions: Arc<InMemorySubmissionStore>,
    blobs: Arc<InMemoryBlobStore>,
    scorer: Arc<dyn Scorer>,
) -> AppState {
    make_state_with_queue(submissions, blobs, scorer, Arc::new(InMemoryJobQueue::default())).await
}

pub(crate) async fn make_state_with_queue(
    submissions: Arc<InMemorySubmissionStore>,
    blobs: Arc<InMemoryBlobStore>,
    scorer: Arc<dyn Scorer>,
    queue: Arc<InMemoryJobQueue>,
) -> AppState {
    let settings = {
        let _guard = env_lock().await;
        set_test_env();
        Settings::load().expect("settings")
    };

    AppState::new(settings, submissions, blobs, scorer, queue)
}

#[derive(Default)]
pub(crate) struct InMemorySubmissionStore {
    submissions: Mutex<HashMap<String, Submission>>,
    images: Mutex<HashMap<String, Vec<SubmissionImage>>>,
    calls: Mutex<Vec<&'static str>>,
}

impl InMemorySubmissionStore {
    pub(crate) fn insert_submission(&self, id: &str, status: SubmissionStatus) {
        let now = primitive_now_utc();
        self.submissions.lock().unwrap().insert(
            id.to_string(),
            Submission {
                id: id.to_string(),
                status,
                ocr_text: None,
                grading_json: None,
                total_score: None,
                error_code: None,
                error_msg: None,
                created_at: now,
                updated_at: now,
            },
        );
    }

    pub(crate) fn insert_image(
        &self,
        submission_id: &str,
        image_id: &str,
        object_key: &str,
        created_offset_seconds: i64,
    ) {
        let created_at = primitive_now_utc() + time::Duration::seconds(created_offset_seconds);
        self.images.lock().unwrap().entry(submission_id.to_string()).or_default().push(
            SubmissionImage {
                id: image_id.to_string(),
                submission_id: submission_id.to_string(),
                object_key: object_key.to_string(),
                created_at,
            },
        );
    }

    pub(crate) fn get(&self, id: &str) -> Option<Submission> {
        self.submissions.lock().unwrap().get(id).cloned()
    }

    pub(crate) fn was_touched(&self) -> bool {
        !self.calls.lock().unwrap().is_empty()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SubmissionStore for InMemorySubmissionStore {
    async fn find_with_images(
        &self,
        submission_id: &str,
    ) -> anyhow::Result<Option<(Submission, Vec<SubmissionImage>)>> {
        self.record("find_with_images");
        let Some(submission) = self.get(submission_id) else {
            return Ok(None);
        };
        // Insertion order on purpose: the processor owns the created_at sort.
        let images =
            self.images.lock().unwrap().get(submission_id).cloned().unwrap_or_default();
        Ok(Some((submission, images)))
    }

    async fn mark_processing(&self, submission_id: &str) -> anyhow::Result<()> {
        self.record("mark_processing");
        if let Some(submission) = self.submissions.lock().unwrap().get_mut(submission_id) {
            submission.status = SubmissionStatus::Processing;
            submission.updated_at = primitive_now_utc();
        }
        Ok(())
    }

    async fn mark_done(
        &self,
        submission_id: &str,
        ocr_text: &str,
        result: &GradingResult,
    ) -> anyhow::Result<()> {
        self.record("mark_done");
        if let Some(submission) = self.submissions.lock().unwrap().get_mut(submission_id) {
            submission.status = SubmissionStatus::Done;
            submission.ocr_text = Some(ocr_text.to_string());
            submission.grading_json = Some(SqlJson(result.clone()));
            submission.total_score = Some(result.total_score);
            submission.error_code = None;
            submission.error_msg = None;
            submission.updated_at = primitive_now_utc();
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        submission_id: &str,
        error_code: &str,
        error_msg: &str,
    ) -> anyhow::Result<()> {
        self.record("mark_failed");
        if let Some(submission) = self.submissions.lock().unwrap().get_mut(submission_id) {
            submission.status = SubmissionStatus::Failed;
            submission.error_code = Some(error_code.to_string());
            submission.error_msg = Some(error_msg.to_string());
            submission.updated_at = primitive_now_utc();
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub(crate) fn insert(&self, object_key: &str, bytes: &[u8]) {
        self.objects.lock().unwrap().insert(object_key.to_string(), bytes.to_vec());
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn fetch(&self, object_key: &str) -> anyhow::Result<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(object_key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("object {object_key} not found"))
    }
}

#[derive(Default)]
pub(crate) struct InMemoryJobQueue {
    jobs: Mutex<VecDeque<JobEnvelope>>,
    failures: Mutex<Vec<(String, String)>>,
}

impl InMemoryJobQueue {
    pub(crate) fn push(&self, job: JobEnvelope) {
        self.jobs.lock().unwrap().push_back(job);
    }

    pub(crate) fn failures(&self) -> Vec<(String, String)> {
        self.failures.lock().unwrap().clone()
    }

    pub(crate) async fn drained(&self) {
        loop {
            if self.jobs.lock().unwrap().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn pull(&self) -> anyhow::Result<Option<JobEnvelope>> {
        Ok(self.jobs.lock().unwrap().pop_front())
    }

    async fn report_failure(&self, job: &JobEnvelope, error: &str) -> anyhow::Result<()> {
        self.failures
            .lock()
            .unwrap()
            .push((job.display_id().to_string(), error.to_string()));
        Ok(())
    }
}

pub(crate) struct FailingScorer;

#[async_trait]
impl Scorer for FailingScorer {
    async fn score(&self, _merged_text: &str) -> anyhow::Result<GradingResult> {
        Err(anyhow::anyhow!("scorer backend unavailable"))
    }
}

/// Scripted replies for the OCR stub, consumed in request order; the last
/// entry repeats once the script runs out.
#[derive(Debug, Clone)]
pub(crate) enum StubReply {
    Text(String),
    Status(u16, String),
    Delay(Duration),
    /// Replies with the decoded image bytes as the extracted text.
    Echo,
}

pub(crate) struct OcrStub {
    pub(crate) base_url: String,
    pub(crate) hits: Arc<AtomicUsize>,
}

struct StubState {
    replies: Vec<StubReply>,
    hits: Arc<AtomicUsize>,
}

pub(crate) async fn spawn_ocr_stub(replies: Vec<StubReply>) -> OcrStub {
    let hits = Arc::new(AtomicUsize::new(0));
    let state = Arc::new(StubState { replies, hits: hits.clone() });

    let app = Router::new().route("/ocr", post(ocr_handler)).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind OCR stub");
    let addr = listener.local_addr().expect("OCR stub addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve OCR stub");
    });

    OcrStub { base_url: format!("http://{addr}"), hits }
}

async fn ocr_handler(
    State(stub): State<Arc<StubState>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let index = stub.hits.fetch_add(1, Ordering::SeqCst);

    let Some(image_base64) = body.get("image_base64").and_then(|value| value.as_str()) else {
        return (StatusCode::UNPROCESSABLE_ENTITY, "missing image_base64").into_response();
    };
    if body.get("preprocess").and_then(|value| value.as_bool()).is_none() {
        return (StatusCode::UNPROCESSABLE_ENTITY, "missing preprocess").into_response();
    }

    let reply = stub.replies.get(index.min(stub.replies.len().saturating_sub(1))).cloned();
    match reply {
        Some(StubReply::Text(text)) => {
            Json(json!({ "text": text, "confidence": 0.92 })).into_response()
        }
        Some(StubReply::Echo) => {
            let decoded = BASE64.decode(image_base64).unwrap_or_default();
            let text = String::from_utf8_lossy(&decoded).to_string();
            Json(json!({ "text": text, "confidence": 0.92 })).into_response()
        }
        Some(StubReply::Status(code, message)) => {
            let status =
                StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, message).into_response()
        }
        Some(StubReply::Delay(duration)) => {
            tokio::time::sleep(duration).await;
            Json(json!({ "text": "late", "confidence": 0.1 })).into_response()
        }
        None => (StatusCode::INTERNAL_SERVER_ERROR, "no stub reply configured").into_response(),
    }
}
