use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::{Date, PrimitiveDateTime, Time};

use crate::db::types::{
    EnrollmentStatus, GradingMethod, GradingMode, OcrImageStatus, SlotStatus, SubmissionStatus,
    TeachingSessionStatus, VerdictTier,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) grading_mode: GradingMode,
    /// Exam-level free-text key, parsed per question when a question has none.
    pub(crate) answer_key: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) question_number: i32,
    pub(crate) question_text: String,
    pub(crate) max_marks: f64,
    pub(crate) answer_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Submission {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) ocr_completed_at: Option<PrimitiveDateTime>,
    pub(crate) graded_at: Option<PrimitiveDateTime>,
    pub(crate) total_score: Option<f64>,
    pub(crate) error_message: Option<String>,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AnswerImage {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) page_order: i32,
    pub(crate) file_path: String,
    pub(crate) ocr_status: OcrImageStatus,
    pub(crate) extracted_text: Option<String>,
    pub(crate) confidence_score: Option<f64>,
    pub(crate) error_message: Option<String>,
    pub(crate) ocr_attempts: i32,
    pub(crate) uploaded_at: PrimitiveDateTime,
    pub(crate) processing_started_at: Option<PrimitiveDateTime>,
    pub(crate) processed_at: Option<PrimitiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Grade {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) question_id: String,
    pub(crate) awarded_marks: f64,
    pub(crate) feedback: String,
    pub(crate) confidence: f64,
    pub(crate) method: GradingMethod,
    pub(crate) graded_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct SchoolLocation {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) latitude: f64,
    pub(crate) longitude: f64,
    /// Falls back to the configured default radius when unset.
    pub(crate) radius_meters: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Slot {
    pub(crate) id: String,
    pub(crate) school_id: String,
    pub(crate) slot_date: Date,
    pub(crate) start_time: Time,
    pub(crate) end_time: Time,
    pub(crate) teachers_required: i32,
    pub(crate) teachers_enrolled: i32,
    pub(crate) status: SlotStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct SlotEnrollment {
    pub(crate) id: String,
    pub(crate) slot_id: String,
    pub(crate) teacher_id: String,
    pub(crate) status: EnrollmentStatus,
    pub(crate) enrolled_at: PrimitiveDateTime,
    pub(crate) cancelled_at: Option<PrimitiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct TeachingSession {
    pub(crate) id: String,
    pub(crate) slot_id: String,
    pub(crate) teacher_id: String,
    pub(crate) start_photo_path: Option<String>,
    pub(crate) end_photo_path: Option<String>,
    pub(crate) start_latitude: Option<f64>,
    pub(crate) start_longitude: Option<f64>,
    pub(crate) start_distance_meters: Option<f64>,
    pub(crate) start_taken_at: Option<PrimitiveDateTime>,
    pub(crate) end_latitude: Option<f64>,
    pub(crate) end_longitude: Option<f64>,
    pub(crate) end_distance_meters: Option<f64>,
    pub(crate) end_taken_at: Option<PrimitiveDateTime>,
    pub(crate) actual_duration_minutes: Option<f64>,
    pub(crate) expected_duration_minutes: Option<f64>,
    pub(crate) status: TeachingSessionStatus,
    pub(crate) verdict: Option<VerdictTier>,
    pub(crate) verdict_reasons: Json<Vec<String>>,
    pub(crate) validated_at: Option<PrimitiveDateTime>,
}
