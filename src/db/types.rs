use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "submissionstatus", rename_all = "snake_case")]
pub(crate) enum SubmissionStatus {
    Pending,
    OcrProcessing,
    OcrComplete,
    Grading,
    Graded,
    Error,
}

impl SubmissionStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::OcrProcessing => "ocr_processing",
            Self::OcrComplete => "ocr_complete",
            Self::Grading => "grading",
            Self::Graded => "graded",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "ocrimagestatus", rename_all = "lowercase")]
pub(crate) enum OcrImageStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "gradingmethod", rename_all = "snake_case")]
pub(crate) enum GradingMethod {
    Ai,
    Manual,
    AiOverride,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "gradingmode", rename_all = "lowercase")]
pub(crate) enum GradingMode {
    Ai,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "teachingsessionstatus", rename_all = "snake_case")]
pub(crate) enum TeachingSessionStatus {
    Pending,
    PhotoSubmitted,
    Approved,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "slotstatus", rename_all = "snake_case")]
pub(crate) enum SlotStatus {
    Open,
    PartiallyFilled,
    Full,
    Cancelled,
    Completed,
}

impl SlotStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::PartiallyFilled => "partially_filled",
            Self::Full => "full",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "enrollmentstatus", rename_all = "lowercase")]
pub(crate) enum EnrollmentStatus {
    Active,
    Cancelled,
}

/// Verdict tiers ordered by severity; `Ord` drives "worst finding wins".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "verdicttier", rename_all = "snake_case")]
pub(crate) enum VerdictTier {
    Valid,
    Warning,
    ManualReview,
    Reject,
}

impl VerdictTier {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Warning => "warning",
            Self::ManualReview => "manual_review",
            Self::Reject => "reject",
        }
    }
}
