use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{
    AnswerImage, Exam, Grade, Question, SchoolLocation, Slot, SlotEnrollment, Submission,
    TeachingSession,
};
use crate::repositories::grades::GradeUpsert;
use crate::repositories::store::{AttendanceStore, GradingStore};
use crate::repositories::teaching_sessions::SessionVerdictUpdate;
use crate::repositories::{
    enrollments, exams, grades, health, images, questions, schools, slots, submissions,
    teaching_sessions,
};
use crate::services::slot_booking::{self, BookingError, CancelledEnrollment};

#[derive(Clone)]
pub(crate) struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GradingStore for PgStore {
    async fn ping(&self) -> anyhow::Result<()> {
        health::ping(&self.pool).await.context("Database ping failed")
    }

    async fn find_submission(&self, id: &str) -> anyhow::Result<Option<Submission>> {
        submissions::find_by_id(&self.pool, id).await.context("Failed to load submission")
    }

    async fn find_exam(&self, id: &str) -> anyhow::Result<Option<Exam>> {
        exams::find_by_id(&self.pool, id).await.context("Failed to load exam")
    }

    async fn list_questions(&self, exam_id: &str) -> anyhow::Result<Vec<Question>> {
        questions::list_by_exam(&self.pool, exam_id).await.context("Failed to load questions")
    }

    async fn list_images(&self, submission_id: &str) -> anyhow::Result<Vec<AnswerImage>> {
        images::list_by_submission(&self.pool, submission_id)
            .await
            .context("Failed to load answer images")
    }

    async fn list_claimable_images(
        &self,
        limit: i64,
        max_attempts: i32,
    ) -> anyhow::Result<Vec<AnswerImage>> {
        images::list_claimable(&self.pool, limit, max_attempts)
            .await
            .context("Failed to list pending answer images")
    }

    async fn claim_image(
        &self,
        id: &str,
        max_attempts: i32,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<bool> {
        images::claim_for_processing(&self.pool, id, max_attempts, now)
            .await
            .context("Failed to claim answer image")
    }

    async fn complete_image(
        &self,
        id: &str,
        text: &str,
        confidence: f64,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<()> {
        images::mark_completed(&self.pool, id, text, confidence, now)
            .await
            .context("Failed to store OCR result")
    }

    async fn fail_image(&self, id: &str, error: &str, now: PrimitiveDateTime) -> anyhow::Result<()> {
        images::mark_failed(&self.pool, id, error, now).await.context("Failed to store OCR failure")
    }

    async fn start_submission_ocr(&self, id: &str, now: PrimitiveDateTime) -> anyhow::Result<bool> {
        submissions::mark_ocr_processing(&self.pool, id, now)
            .await
            .context("Failed to mark submission ocr_processing")
    }

    async fn complete_submission_ocr(
        &self,
        id: &str,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<bool> {
        submissions::mark_ocr_complete(&self.pool, id, now)
            .await
            .context("Failed to mark submission ocr_complete")
    }

    async fn list_gradable_submissions(&self, limit: i64) -> anyhow::Result<Vec<Submission>> {
        submissions::list_gradable(&self.pool, limit)
            .await
            .context("Failed to list gradable submissions")
    }

    async fn claim_submission_for_grading(
        &self,
        id: &str,
        force: bool,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<bool> {
        submissions::claim_for_grading(&self.pool, id, force, now)
            .await
            .context("Failed to claim submission for grading")
    }

    async fn upsert_grade(&self, grade: &GradeUpsert) -> anyhow::Result<Grade> {
        let id = uuid::Uuid::new_v4().to_string();
        grades::upsert(&self.pool, &id, grade).await.context("Failed to store grade")
    }

    async fn delete_grade(&self, submission_id: &str, question_id: &str) -> anyhow::Result<bool> {
        grades::delete(&self.pool, submission_id, question_id)
            .await
            .context("Failed to delete grade")
    }

    async fn finalize_submission(
        &self,
        id: &str,
        total_score: f64,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<bool> {
        submissions::mark_graded(&self.pool, id, total_score, now)
            .await
            .context("Failed to finalize submission")
    }

    async fn fail_submission(
        &self,
        id: &str,
        message: &str,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<bool> {
        submissions::mark_error(&self.pool, id, message, now)
            .await
            .context("Failed to mark submission error")
    }

    async fn release_grading_claim(
        &self,
        id: &str,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<bool> {
        submissions::release_grading_claim(&self.pool, id, now)
            .await
            .context("Failed to release grading claim")
    }

    async fn fail_stale_images(
        &self,
        cutoff: PrimitiveDateTime,
        error: &str,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<u64> {
        images::fail_stale_processing(&self.pool, cutoff, error, now)
            .await
            .context("Failed to recover stale OCR pages")
    }

    async fn release_stale_grading(
        &self,
        cutoff: PrimitiveDateTime,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<u64> {
        submissions::release_stale_grading(&self.pool, cutoff, now)
            .await
            .context("Failed to recover stale grading claims")
    }

    async fn list_stalled_ocr_submissions(
        &self,
        max_attempts: i32,
    ) -> anyhow::Result<Vec<String>> {
        submissions::list_stalled_ocr(&self.pool, max_attempts)
            .await
            .context("Failed to list stalled OCR submissions")
    }
}

#[async_trait]
impl AttendanceStore for PgStore {
    async fn find_teaching_session(&self, id: &str) -> anyhow::Result<Option<TeachingSession>> {
        teaching_sessions::find_by_id(&self.pool, id)
            .await
            .context("Failed to load teaching session")
    }

    async fn find_slot(&self, id: &str) -> anyhow::Result<Option<Slot>> {
        slots::find_by_id(&self.pool, id).await.context("Failed to load slot")
    }

    async fn find_school(&self, id: &str) -> anyhow::Result<Option<SchoolLocation>> {
        schools::find_by_id(&self.pool, id).await.context("Failed to load school location")
    }

    async fn record_session_verdict(
        &self,
        id: &str,
        update: &SessionVerdictUpdate,
    ) -> anyhow::Result<()> {
        teaching_sessions::record_verdict(&self.pool, id, update)
            .await
            .context("Failed to store session verdict")
    }

    async fn enroll_teacher(
        &self,
        slot_id: &str,
        teacher_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<SlotEnrollment, BookingError> {
        let mut tx = self.pool.begin().await.context("Failed to start enrollment transaction")?;

        let slot = slots::lock_by_id(&mut *tx, slot_id)
            .await
            .context("Failed to lock slot")?
            .ok_or(BookingError::SlotNotFound)?;

        let existing = enrollments::find_active(&mut *tx, slot_id, teacher_id)
            .await
            .context("Failed to check existing enrollment")?;
        slot_booking::ensure_can_enroll(&slot, existing.is_some())?;

        let enrollment_id = uuid::Uuid::new_v4().to_string();
        let enrollment = enrollments::insert(&mut *tx, &enrollment_id, slot_id, teacher_id, now)
            .await
            .context("Failed to insert enrollment")?;

        let enrolled = slot.teachers_enrolled + 1;
        let status = slot_booking::occupancy_status(slot.status, slot.teachers_required, enrolled);
        slots::update_occupancy(&mut *tx, slot_id, enrolled, status)
            .await
            .context("Failed to update slot occupancy")?;

        tx.commit().await.context("Failed to commit enrollment transaction")?;
        Ok(enrollment)
    }

    async fn cancel_enrollment(
        &self,
        slot_id: &str,
        teacher_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<CancelledEnrollment, BookingError> {
        let mut tx = self.pool.begin().await.context("Failed to start cancellation transaction")?;

        let slot = slots::lock_by_id(&mut *tx, slot_id)
            .await
            .context("Failed to lock slot")?
            .ok_or(BookingError::SlotNotFound)?;
        slot_booking::ensure_open(&slot)?;

        let existing = enrollments::find_active(&mut *tx, slot_id, teacher_id)
            .await
            .context("Failed to load enrollment")?
            .ok_or(BookingError::EnrollmentNotFound)?;

        let enrollment = enrollments::cancel(&mut *tx, &existing.id, now)
            .await
            .context("Failed to cancel enrollment")?;
        let sessions_cancelled = teaching_sessions::cancel_undecided(&mut *tx, slot_id, teacher_id)
            .await
            .context("Failed to cancel teaching sessions")?;

        let enrolled = (slot.teachers_enrolled - 1).max(0);
        let status = slot_booking::occupancy_status(slot.status, slot.teachers_required, enrolled);
        slots::update_occupancy(&mut *tx, slot_id, enrolled, status)
            .await
            .context("Failed to update slot occupancy")?;

        tx.commit().await.context("Failed to commit cancellation transaction")?;
        Ok(CancelledEnrollment { enrollment, sessions_cancelled })
    }
}
