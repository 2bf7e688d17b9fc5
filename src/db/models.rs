use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::SubmissionStatus;
use crate::services::scorer::GradingResult;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Submission {
    pub(crate) id: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) ocr_text: Option<String>,
    pub(crate) grading_json: Option<Json<GradingResult>>,
    pub(crate) total_score: Option<f64>,
    pub(crate) error_code: Option<String>,
    pub(crate) error_msg: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// One photographed page. `created_at` defines the OCR concatenation order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct SubmissionImage {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) object_key: String,
    pub(crate) created_at: PrimitiveDateTime,
}
