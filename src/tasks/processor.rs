use std::time::Instant;

use anyhow::Context;
use thiserror::Error;
use tokio::time::{sleep, Duration};

use crate::core::state::AppState;
use crate::services::ocr::{OcrClient, OcrError, RetryPolicy};
use crate::services::queue::{DemoJob, JobEnvelope, JobKind};

const DEMO_DELAY: Duration = Duration::from_millis(250);

/// Everything that can abort a grading job, mapped onto the error codes
/// persisted on the submission record.
#[derive(Debug, Error)]
pub(crate) enum ProcessError {
    #[error("Submission not found")]
    SubmissionNotFound,
    #[error(transparent)]
    Ocr(#[from] OcrError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProcessError {
    pub(crate) fn code(&self) -> &'static str {
        match self {
            Self::SubmissionNotFound => "SUBMISSION_NOT_FOUND",
            Self::Ocr(err) => err.code(),
            Self::Other(_) => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum JobOutcome {
    Completed { duration_ms: u64 },
    Ignored,
}

/// Drives one dequeued job to completion. A returned error means the job
/// should be reported failed to the queue boundary; redelivery is then the
/// broker's decision.
pub(crate) async fn process(
    state: &AppState,
    ocr: &OcrClient,
    envelope: &JobEnvelope,
) -> anyhow::Result<JobOutcome> {
    match envelope.kind() {
        JobKind::Grading(job) => handle_grading(state, ocr, envelope, &job.submission_id).await,
        JobKind::Demo(job) => Ok(handle_demo(envelope, &job).await),
        JobKind::Unknown(name) => {
            tracing::warn!(job_id = envelope.display_id(), name, "Unhandled job");
            Ok(JobOutcome::Ignored)
        }
    }
}

async fn handle_demo(envelope: &JobEnvelope, job: &DemoJob) -> JobOutcome {
    let started = Instant::now();
    tracing::info!(
        job_id = envelope.display_id(),
        message = job.message.as_deref().unwrap_or(""),
        requested_at = job.requested_at.as_deref().unwrap_or(""),
        "Processing demo job"
    );

    sleep(DEMO_DELAY).await;

    let duration_ms = started.elapsed().as_millis() as u64;
    tracing::info!(job_id = envelope.display_id(), duration_ms, "Completed demo job");
    JobOutcome::Completed { duration_ms }
}

async fn handle_grading(
    state: &AppState,
    ocr: &OcrClient,
    envelope: &JobEnvelope,
    submission_id: &str,
) -> anyhow::Result<JobOutcome> {
    let started = Instant::now();

    match grade_submission(state, ocr, submission_id).await {
        Ok(()) => {
            let duration = started.elapsed();
            metrics::counter!("grading_jobs_total", "status" => "success").increment(1);
            metrics::histogram!("grading_duration_seconds").record(duration.as_secs_f64());
            tracing::info!(
                job_id = envelope.display_id(),
                submission_id,
                duration_ms = duration.as_millis() as u64,
                "Grading job done"
            );
            Ok(JobOutcome::Completed { duration_ms: duration.as_millis() as u64 })
        }
        Err(err) => {
            let code = err.code();
            let message = err.to_string();

            if let Err(update_err) =
                state.submissions().mark_failed(submission_id, code, &message).await
            {
                tracing::error!(
                    submission_id,
                    error = %update_err,
                    "Failed to update submission after grading error"
                );
            }

            metrics::counter!("grading_jobs_total", "status" => "failed").increment(1);
            tracing::error!(
                job_id = envelope.display_id(),
                submission_id,
                error_code = code,
                error = %message,
                "Grading job failed"
            );
            Err(err.into())
        }
    }
}

/// The per-submission state machine: `QUEUED -> PROCESSING -> DONE | FAILED`.
/// Image OCR runs strictly sequentially in `created_at` order so the merged
/// text is deterministic; the first unrecoverable error aborts the whole
/// submission.
async fn grade_submission(
    state: &AppState,
    ocr: &OcrClient,
    submission_id: &str,
) -> Result<(), ProcessError> {
    let (submission, mut images) = state
        .submissions()
        .find_with_images(submission_id)
        .await
        .context("Failed to fetch submission")?
        .ok_or(ProcessError::SubmissionNotFound)?;

    if submission.status.is_terminal() {
        tracing::info!(submission_id, status = ?submission.status, "Skipping graded submission");
        return Ok(());
    }

    state
        .submissions()
        .mark_processing(submission_id)
        .await
        .context("Failed to mark submission processing")?;

    images.sort_by_key(|image| image.created_at);

    let retry = RetryPolicy::timeout_once();
    let mut texts = Vec::with_capacity(images.len());

    for image in &images {
        let bytes = state
            .blobs()
            .fetch(&image.object_key)
            .await
            .with_context(|| format!("Failed to fetch image {}", image.id))?;

        let extracted = ocr.extract_text_with_retry(&bytes, retry).await?;
        let text = extracted.text.trim();
        if !text.is_empty() {
            texts.push(text.to_string());
        }
    }

    let merged = texts.join("\n\n").trim().to_string();
    if merged.is_empty() {
        return Err(ProcessError::Ocr(OcrError::Empty));
    }

    let result = state.scorer().score(&merged).await.context("Scorer failed")?;

    state
        .submissions()
        .mark_done(submission_id, &merged, &result)
        .await
        .context("Failed to persist grading result")?;

    Ok(())
}
