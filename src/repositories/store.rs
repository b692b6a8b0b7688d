use async_trait::async_trait;
use time::PrimitiveDateTime;

use crate::db::models::{
    AnswerImage, Exam, Grade, Question, SchoolLocation, Slot, SlotEnrollment, Submission,
    TeachingSession,
};
use crate::repositories::grades::GradeUpsert;
use crate::repositories::teaching_sessions::SessionVerdictUpdate;
use crate::services::slot_booking::{BookingError, CancelledEnrollment};

/// Storage seam of the OCR queue and the grading orchestrator.
///
/// Every method returning `bool` is a conditional update: `true` means this
/// caller won the transition, `false` means the row was not in the expected
/// state and the caller must skip it.
#[async_trait]
pub(crate) trait GradingStore: Send + Sync {
    async fn ping(&self) -> anyhow::Result<()>;

    async fn find_submission(&self, id: &str) -> anyhow::Result<Option<Submission>>;

    async fn find_exam(&self, id: &str) -> anyhow::Result<Option<Exam>>;

    async fn list_questions(&self, exam_id: &str) -> anyhow::Result<Vec<Question>>;

    /// Pages of a submission in page order.
    async fn list_images(&self, submission_id: &str) -> anyhow::Result<Vec<AnswerImage>>;

    async fn list_claimable_images(
        &self,
        limit: i64,
        max_attempts: i32,
    ) -> anyhow::Result<Vec<AnswerImage>>;

    async fn claim_image(
        &self,
        id: &str,
        max_attempts: i32,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<bool>;

    async fn complete_image(
        &self,
        id: &str,
        text: &str,
        confidence: f64,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<()>;

    async fn fail_image(&self, id: &str, error: &str, now: PrimitiveDateTime) -> anyhow::Result<()>;

    async fn start_submission_ocr(&self, id: &str, now: PrimitiveDateTime) -> anyhow::Result<bool>;

    async fn complete_submission_ocr(
        &self,
        id: &str,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<bool>;

    async fn list_gradable_submissions(&self, limit: i64) -> anyhow::Result<Vec<Submission>>;

    async fn claim_submission_for_grading(
        &self,
        id: &str,
        force: bool,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<bool>;

    async fn upsert_grade(&self, grade: &GradeUpsert) -> anyhow::Result<Grade>;

    async fn delete_grade(&self, submission_id: &str, question_id: &str) -> anyhow::Result<bool>;

    async fn finalize_submission(
        &self,
        id: &str,
        total_score: f64,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<bool>;

    async fn fail_submission(
        &self,
        id: &str,
        message: &str,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<bool>;

    async fn release_grading_claim(&self, id: &str, now: PrimitiveDateTime)
        -> anyhow::Result<bool>;

    async fn fail_stale_images(
        &self,
        cutoff: PrimitiveDateTime,
        error: &str,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<u64>;

    async fn release_stale_grading(
        &self,
        cutoff: PrimitiveDateTime,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<u64>;

    /// Submissions in `pending`/`ocr_processing` whose pages are all completed
    /// or failed with `max_attempts` spent.
    async fn list_stalled_ocr_submissions(&self, max_attempts: i32)
        -> anyhow::Result<Vec<String>>;
}

/// Storage seam of the teaching-session verification and slot booking.
#[async_trait]
pub(crate) trait AttendanceStore: Send + Sync {
    async fn find_teaching_session(&self, id: &str) -> anyhow::Result<Option<TeachingSession>>;

    async fn find_slot(&self, id: &str) -> anyhow::Result<Option<Slot>>;

    async fn find_school(&self, id: &str) -> anyhow::Result<Option<SchoolLocation>>;

    async fn record_session_verdict(
        &self,
        id: &str,
        update: &SessionVerdictUpdate,
    ) -> anyhow::Result<()>;

    /// Read-check-write under an exclusive lock on the slot.
    async fn enroll_teacher(
        &self,
        slot_id: &str,
        teacher_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<SlotEnrollment, BookingError>;

    /// Cancels the enrollment and its undecided sessions atomically.
    async fn cancel_enrollment(
        &self,
        slot_id: &str,
        teacher_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<CancelledEnrollment, BookingError>;
}
