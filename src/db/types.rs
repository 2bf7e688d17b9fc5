use serde::{Deserialize, Serialize};
use sqlx::Type;

/// Submission lifecycle. `Done` and `Failed` are terminal; the upload flow
/// creates rows as `Queued` and only the worker moves them afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "submissionstatus", rename_all = "UPPERCASE")]
pub(crate) enum SubmissionStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl SubmissionStatus {
    pub(crate) fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::SubmissionStatus;

    #[test]
    fn terminal_states() {
        assert!(SubmissionStatus::Done.is_terminal());
        assert!(SubmissionStatus::Failed.is_terminal());
        assert!(!SubmissionStatus::Queued.is_terminal());
        assert!(!SubmissionStatus::Processing.is_terminal());
    }

    #[test]
    fn serializes_as_uppercase() {
        let json = serde_json::to_string(&SubmissionStatus::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");
    }
}
