use anyhow::Context;
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::core::time::primitive_now_utc;
use crate::db::models::{Submission, SubmissionImage};
use crate::db::types::SubmissionStatus;
use crate::services::scorer::GradingResult;

/// Single owner of a submission's mutable state while a job is in flight.
/// The schema itself belongs to the upload/CRUD service; the worker only
/// reads one submission and writes its terminal fields.
#[async_trait]
pub(crate) trait SubmissionStore: Send + Sync {
    /// Returns the submission with its images in ascending `created_at` order.
    async fn find_with_images(
        &self,
        submission_id: &str,
    ) -> anyhow::Result<Option<(Submission, Vec<SubmissionImage>)>>;

    async fn mark_processing(&self, submission_id: &str) -> anyhow::Result<()>;

    async fn mark_done(
        &self,
        submission_id: &str,
        ocr_text: &str,
        result: &GradingResult,
    ) -> anyhow::Result<()>;

    async fn mark_failed(
        &self,
        submission_id: &str,
        error_code: &str,
        error_msg: &str,
    ) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub(crate) struct PgSubmissionStore {
    pool: PgPool,
}

impl PgSubmissionStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionStore for PgSubmissionStore {
    async fn find_with_images(
        &self,
        submission_id: &str,
    ) -> anyhow::Result<Option<(Submission, Vec<SubmissionImage>)>> {
        let submission = sqlx::query_as::<_, Submission>(
            "SELECT id, status, ocr_text, grading_json, total_score, error_code, error_msg, \
             created_at, updated_at
             FROM submissions
             WHERE id = $1",
        )
        .bind(submission_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch submission")?;

        let Some(submission) = submission else {
            return Ok(None);
        };

        let images = sqlx::query_as::<_, SubmissionImage>(
            "SELECT id, submission_id, object_key, created_at
             FROM submission_images
             WHERE submission_id = $1
             ORDER BY created_at ASC",
        )
        .bind(submission_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch submission images")?;

        Ok(Some((submission, images)))
    }

    async fn mark_processing(&self, submission_id: &str) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE submissions
             SET status = $1,
                 updated_at = $2
             WHERE id = $3",
        )
        .bind(SubmissionStatus::Processing)
        .bind(primitive_now_utc())
        .bind(submission_id)
        .execute(&self.pool)
        .await
        .context("Failed to mark submission processing")?;

        Ok(())
    }

    async fn mark_done(
        &self,
        submission_id: &str,
        ocr_text: &str,
        result: &GradingResult,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE submissions
             SET status = $1,
                 ocr_text = $2,
                 grading_json = $3,
                 total_score = $4,
                 error_code = NULL,
                 error_msg = NULL,
                 updated_at = $5
             WHERE id = $6",
        )
        .bind(SubmissionStatus::Done)
        .bind(ocr_text)
        .bind(Json(result))
        .bind(result.total_score)
        .bind(primitive_now_utc())
        .bind(submission_id)
        .execute(&self.pool)
        .await
        .context("Failed to mark submission done")?;

        Ok(())
    }

    async fn mark_failed(
        &self,
        submission_id: &str,
        error_code: &str,
        error_msg: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE submissions
             SET status = $1,
                 error_code = $2,
                 error_msg = $3,
                 updated_at = $4
             WHERE id = $5",
        )
        .bind(SubmissionStatus::Failed)
        .bind(error_code)
        .bind(error_msg)
        .bind(primitive_now_utc())
        .bind(submission_id)
        .execute(&self.pool)
        .await
        .context("Failed to mark submission failed")?;

        Ok(())
    }
}
