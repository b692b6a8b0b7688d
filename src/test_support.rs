use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use time::{Date, PrimitiveDateTime, Time};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::core::{config::Settings, state::AppState, time::primitive_now_utc};
use crate::db::models::{
    AnswerImage, Exam, Grade, Question, SchoolLocation, Slot, SlotEnrollment, Submission,
    TeachingSession,
};
use crate::db::types::{
    EnrollmentStatus, GradingMode, OcrImageStatus, SlotStatus, SubmissionStatus,
    TeachingSessionStatus,
};
use crate::repositories::grades::GradeUpsert;
use crate::repositories::teaching_sessions::SessionVerdictUpdate;
use crate::repositories::{AttendanceStore, GradingStore};
use crate::services::ai_grading::{
    AiGradingError, Insights, QuestionGrade, QuestionGradeRequest, QuestionGrader,
};
use crate::services::slot_booking::{self, BookingError, CancelledEnrollment};
use crate::services::text_extraction::{ExtractOptions, Extraction, OcrError, TextExtractor};

pub(crate) type EnvGuard = OwnedMutexGuard<()>;

pub(crate) async fn env_lock() -> EnvGuard {
    static LOCK: OnceLock<Arc<AsyncMutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(AsyncMutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("MARKWISE_ENV", "test");
    std::env::set_var("MARKWISE_STRICT_CONFIG", "0");
    std::env::set_var("AI_INTER_CALL_DELAY_MS", "0");
    std::env::set_var("AI_RETRY_BASE_DELAY_MS", "0");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::remove_var("PROJECT_NAME");
    std::env::remove_var("API_V1_STR");
    std::env::remove_var("JOB_TRIGGER_TOKEN");
    std::env::remove_var("GROQ_API_KEY");
    std::env::remove_var("AUTO_APPROVE_START_DISTANCE_METERS");
    std::env::remove_var("ATTENDANCE_UTC_OFFSET");
    std::env::remove_var("OCR_MAX_ATTEMPTS");
}

pub(crate) fn test_settings() -> Settings {
    set_test_env();
    Settings::load().expect("settings")
}

pub(crate) fn state_with(
    store: Arc<MemoryStore>,
    extractor: FakeExtractor,
    grader: Option<FakeGrader>,
) -> AppState {
    state_from_settings(test_settings(), store, extractor, grader)
}

pub(crate) fn state_from_settings(
    settings: Settings,
    store: Arc<MemoryStore>,
    extractor: FakeExtractor,
    grader: Option<FakeGrader>,
) -> AppState {
    let grader = grader.map(|grader| Arc::new(grader) as Arc<dyn QuestionGrader>);
    AppState::new(settings, store.clone(), store, Arc::new(extractor), grader)
}

#[derive(Default)]
struct Tables {
    exams: HashMap<String, Exam>,
    questions: HashMap<String, Question>,
    submissions: HashMap<String, Submission>,
    images: HashMap<String, AnswerImage>,
    grades: HashMap<(String, String), Grade>,
    schools: HashMap<String, SchoolLocation>,
    slots: HashMap<String, Slot>,
    enrollments: HashMap<String, SlotEnrollment>,
    sessions: HashMap<String, TeachingSession>,
}

/// In-memory store with the same conditional-update rules as the Postgres
/// queries. Every transition happens under one lock.
#[derive(Default)]
pub(crate) struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory store lock")
    }

    pub(crate) fn insert_exam(&self, exam: Exam) {
        self.lock().exams.insert(exam.id.clone(), exam);
    }

    pub(crate) fn insert_question(&self, question: Question) {
        self.lock().questions.insert(question.id.clone(), question);
    }

    pub(crate) fn insert_submission(&self, submission: Submission) {
        self.lock().submissions.insert(submission.id.clone(), submission);
    }

    pub(crate) fn insert_image(&self, image: AnswerImage) {
        self.lock().images.insert(image.id.clone(), image);
    }

    pub(crate) fn insert_school(&self, school: SchoolLocation) {
        self.lock().schools.insert(school.id.clone(), school);
    }

    pub(crate) fn insert_slot(&self, slot: Slot) {
        self.lock().slots.insert(slot.id.clone(), slot);
    }

    pub(crate) fn insert_teaching_session(&self, session: TeachingSession) {
        self.lock().sessions.insert(session.id.clone(), session);
    }

    pub(crate) fn submission(&self, id: &str) -> Option<Submission> {
        self.lock().submissions.get(id).cloned()
    }

    pub(crate) fn image(&self, id: &str) -> Option<AnswerImage> {
        self.lock().images.get(id).cloned()
    }

    pub(crate) fn grades_for(&self, submission_id: &str) -> Vec<Grade> {
        self.lock()
            .grades
            .values()
            .filter(|grade| grade.submission_id == submission_id)
            .cloned()
            .collect()
    }

    pub(crate) fn teaching_session(&self, id: &str) -> Option<TeachingSession> {
        self.lock().sessions.get(id).cloned()
    }

    pub(crate) fn set_teaching_session_status(&self, id: &str, status: TeachingSessionStatus) {
        if let Some(session) = self.lock().sessions.get_mut(id) {
            session.status = status;
        }
    }
}

fn claimable(tables: &Tables, image: &AnswerImage, max_attempts: i32) -> bool {
    matches!(image.ocr_status, OcrImageStatus::Pending | OcrImageStatus::Failed)
        && image.ocr_attempts < max_attempts
        && tables.submissions.get(&image.submission_id).is_some_and(|submission| {
            matches!(submission.status, SubmissionStatus::Pending | SubmissionStatus::OcrProcessing)
        })
}

/// Applies `update` when the submission is in one of `from`.
fn transition_submission(
    tables: &mut Tables,
    id: &str,
    from: &[SubmissionStatus],
    update: impl FnOnce(&mut Submission),
) -> bool {
    match tables.submissions.get_mut(id) {
        Some(submission) if from.contains(&submission.status) => {
            update(submission);
            true
        }
        _ => false,
    }
}

#[async_trait]
impl GradingStore for MemoryStore {
    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn find_submission(&self, id: &str) -> anyhow::Result<Option<Submission>> {
        Ok(self.submission(id))
    }

    async fn find_exam(&self, id: &str) -> anyhow::Result<Option<Exam>> {
        Ok(self.lock().exams.get(id).cloned())
    }

    async fn list_questions(&self, exam_id: &str) -> anyhow::Result<Vec<Question>> {
        let mut questions: Vec<Question> = self
            .lock()
            .questions
            .values()
            .filter(|question| question.exam_id == exam_id)
            .cloned()
            .collect();
        questions.sort_by_key(|question| question.question_number);
        Ok(questions)
    }

    async fn list_images(&self, submission_id: &str) -> anyhow::Result<Vec<AnswerImage>> {
        let mut images: Vec<AnswerImage> = self
            .lock()
            .images
            .values()
            .filter(|image| image.submission_id == submission_id)
            .cloned()
            .collect();
        images.sort_by_key(|image| image.page_order);
        Ok(images)
    }

    async fn list_claimable_images(
        &self,
        limit: i64,
        max_attempts: i32,
    ) -> anyhow::Result<Vec<AnswerImage>> {
        let tables = self.lock();
        let mut images: Vec<AnswerImage> = tables
            .images
            .values()
            .filter(|image| claimable(&tables, image, max_attempts))
            .cloned()
            .collect();
        images.sort_by(|a, b| {
            (a.uploaded_at, a.page_order, &a.id).cmp(&(b.uploaded_at, b.page_order, &b.id))
        });
        images.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(images)
    }

    async fn claim_image(
        &self,
        id: &str,
        max_attempts: i32,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<bool> {
        let mut tables = self.lock();
        let won =
            tables.images.get(id).is_some_and(|image| claimable(&tables, image, max_attempts));
        match tables.images.get_mut(id) {
            Some(image) if won => {
                image.ocr_status = OcrImageStatus::Processing;
                image.ocr_attempts += 1;
                image.processing_started_at = Some(now);
                image.error_message = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_image(
        &self,
        id: &str,
        text: &str,
        confidence: f64,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<()> {
        if let Some(image) = self.lock().images.get_mut(id) {
            image.ocr_status = OcrImageStatus::Completed;
            image.extracted_text = Some(text.to_string());
            image.confidence_score = Some(confidence);
            image.error_message = None;
            image.processed_at = Some(now);
        }
        Ok(())
    }

    async fn fail_image(&self, id: &str, error: &str, now: PrimitiveDateTime) -> anyhow::Result<()> {
        if let Some(image) = self.lock().images.get_mut(id) {
            image.ocr_status = OcrImageStatus::Failed;
            image.error_message = Some(error.to_string());
            image.processed_at = Some(now);
        }
        Ok(())
    }

    async fn start_submission_ocr(&self, id: &str, now: PrimitiveDateTime) -> anyhow::Result<bool> {
        let mut tables = self.lock();
        Ok(transition_submission(&mut tables, id, &[SubmissionStatus::Pending], |submission| {
            submission.status = SubmissionStatus::OcrProcessing;
            submission.updated_at = now;
        }))
    }

    async fn complete_submission_ocr(
        &self,
        id: &str,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<bool> {
        let mut tables = self.lock();
        Ok(transition_submission(
            &mut tables,
            id,
            &[SubmissionStatus::Pending, SubmissionStatus::OcrProcessing],
            |submission| {
                submission.status = SubmissionStatus::OcrComplete;
                submission.ocr_completed_at = Some(now);
                submission.error_message = None;
                submission.updated_at = now;
            },
        ))
    }

    async fn list_gradable_submissions(&self, limit: i64) -> anyhow::Result<Vec<Submission>> {
        let tables = self.lock();
        let mut submissions: Vec<Submission> = tables
            .submissions
            .values()
            .filter(|submission| submission.status == SubmissionStatus::OcrComplete)
            .filter(|submission| {
                tables
                    .exams
                    .get(&submission.exam_id)
                    .is_some_and(|exam| exam.grading_mode == GradingMode::Ai)
            })
            .cloned()
            .collect();
        submissions.sort_by(|a, b| (a.submitted_at, &a.id).cmp(&(b.submitted_at, &b.id)));
        submissions.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(submissions)
    }

    async fn claim_submission_for_grading(
        &self,
        id: &str,
        force: bool,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<bool> {
        let from: &[SubmissionStatus] = if force {
            &[SubmissionStatus::OcrComplete, SubmissionStatus::Graded, SubmissionStatus::Error]
        } else {
            &[SubmissionStatus::OcrComplete]
        };
        let mut tables = self.lock();
        Ok(transition_submission(&mut tables, id, from, |submission| {
            submission.status = SubmissionStatus::Grading;
            submission.error_message = None;
            submission.updated_at = now;
        }))
    }

    async fn upsert_grade(&self, grade: &GradeUpsert) -> anyhow::Result<Grade> {
        let mut tables = self.lock();
        let key = (grade.submission_id.clone(), grade.question_id.clone());
        let id = tables
            .grades
            .get(&key)
            .map(|existing| existing.id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let stored = Grade {
            id,
            submission_id: grade.submission_id.clone(),
            question_id: grade.question_id.clone(),
            awarded_marks: grade.awarded_marks,
            feedback: grade.feedback.clone(),
            confidence: grade.confidence,
            method: grade.method,
            graded_at: grade.graded_at,
        };
        tables.grades.insert(key, stored.clone());
        Ok(stored)
    }

    async fn delete_grade(&self, submission_id: &str, question_id: &str) -> anyhow::Result<bool> {
        let key = (submission_id.to_string(), question_id.to_string());
        Ok(self.lock().grades.remove(&key).is_some())
    }

    async fn finalize_submission(
        &self,
        id: &str,
        total_score: f64,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<bool> {
        let mut tables = self.lock();
        Ok(transition_submission(&mut tables, id, &[SubmissionStatus::Grading], |submission| {
            submission.status = SubmissionStatus::Graded;
            submission.total_score = Some(total_score);
            submission.graded_at = Some(now);
            submission.error_message = None;
            submission.updated_at = now;
        }))
    }

    async fn fail_submission(
        &self,
        id: &str,
        message: &str,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<bool> {
        let mut tables = self.lock();
        let from = [
            SubmissionStatus::Pending,
            SubmissionStatus::OcrProcessing,
            SubmissionStatus::OcrComplete,
            SubmissionStatus::Grading,
            SubmissionStatus::Error,
        ];
        Ok(transition_submission(&mut tables, id, &from, |submission| {
            submission.status = SubmissionStatus::Error;
            submission.error_message = Some(message.to_string());
            submission.updated_at = now;
        }))
    }

    async fn release_grading_claim(
        &self,
        id: &str,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<bool> {
        let mut tables = self.lock();
        Ok(transition_submission(&mut tables, id, &[SubmissionStatus::Grading], |submission| {
            submission.status = SubmissionStatus::OcrComplete;
            submission.updated_at = now;
        }))
    }

    async fn fail_stale_images(
        &self,
        cutoff: PrimitiveDateTime,
        error: &str,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<u64> {
        let mut released = 0;
        for image in self.lock().images.values_mut() {
            let stale = image.ocr_status == OcrImageStatus::Processing
                && image.processing_started_at.is_some_and(|started| started < cutoff);
            if stale {
                image.ocr_status = OcrImageStatus::Failed;
                image.error_message = Some(error.to_string());
                image.processed_at = Some(now);
                released += 1;
            }
        }
        Ok(released)
    }

    async fn release_stale_grading(
        &self,
        cutoff: PrimitiveDateTime,
        now: PrimitiveDateTime,
    ) -> anyhow::Result<u64> {
        let mut released = 0;
        for submission in self.lock().submissions.values_mut() {
            if submission.status == SubmissionStatus::Grading && submission.updated_at < cutoff {
                submission.status = SubmissionStatus::OcrComplete;
                submission.updated_at = now;
                released += 1;
            }
        }
        Ok(released)
    }

    async fn list_stalled_ocr_submissions(
        &self,
        max_attempts: i32,
    ) -> anyhow::Result<Vec<String>> {
        let tables = self.lock();
        let mut stalled: Vec<&Submission> = tables
            .submissions
            .values()
            .filter(|submission| {
                matches!(
                    submission.status,
                    SubmissionStatus::Pending | SubmissionStatus::OcrProcessing
                )
            })
            .filter(|submission| {
                let mut pages = tables
                    .images
                    .values()
                    .filter(|image| image.submission_id == submission.id)
                    .peekable();
                pages.peek().is_some()
                    && pages.all(|image| match image.ocr_status {
                        OcrImageStatus::Completed => true,
                        OcrImageStatus::Failed => image.ocr_attempts >= max_attempts,
                        _ => false,
                    })
            })
            .collect();
        stalled.sort_by(|a, b| (a.submitted_at, &a.id).cmp(&(b.submitted_at, &b.id)));
        Ok(stalled.into_iter().map(|submission| submission.id.clone()).collect())
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn find_teaching_session(&self, id: &str) -> anyhow::Result<Option<TeachingSession>> {
        Ok(self.teaching_session(id))
    }

    async fn find_slot(&self, id: &str) -> anyhow::Result<Option<Slot>> {
        Ok(self.lock().slots.get(id).cloned())
    }

    async fn find_school(&self, id: &str) -> anyhow::Result<Option<SchoolLocation>> {
        Ok(self.lock().schools.get(id).cloned())
    }

    async fn record_session_verdict(
        &self,
        id: &str,
        update: &SessionVerdictUpdate,
    ) -> anyhow::Result<()> {
        if let Some(session) = self.lock().sessions.get_mut(id) {
            session.start_latitude = update.start_latitude;
            session.start_longitude = update.start_longitude;
            session.start_distance_meters = update.start_distance_meters;
            session.start_taken_at = update.start_taken_at;
            session.end_latitude = update.end_latitude;
            session.end_longitude = update.end_longitude;
            session.end_distance_meters = update.end_distance_meters;
            session.end_taken_at = update.end_taken_at;
            session.actual_duration_minutes = update.actual_duration_minutes;
            session.expected_duration_minutes = update.expected_duration_minutes;
            session.status = update.status;
            session.verdict = Some(update.verdict);
            session.verdict_reasons = Json(update.reasons.clone());
            session.validated_at = Some(update.validated_at);
        }
        Ok(())
    }

    async fn enroll_teacher(
        &self,
        slot_id: &str,
        teacher_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<SlotEnrollment, BookingError> {
        let mut tables = self.lock();
        let slot = tables.slots.get(slot_id).cloned().ok_or(BookingError::SlotNotFound)?;
        let already_enrolled = tables.enrollments.values().any(|enrollment| {
            enrollment.slot_id == slot_id
                && enrollment.teacher_id == teacher_id
                && enrollment.status == EnrollmentStatus::Active
        });
        slot_booking::ensure_can_enroll(&slot, already_enrolled)?;

        let enrollment = SlotEnrollment {
            id: Uuid::new_v4().to_string(),
            slot_id: slot_id.to_string(),
            teacher_id: teacher_id.to_string(),
            status: EnrollmentStatus::Active,
            enrolled_at: now,
            cancelled_at: None,
        };
        tables.enrollments.insert(enrollment.id.clone(), enrollment.clone());

        let enrolled = slot.teachers_enrolled + 1;
        if let Some(stored) = tables.slots.get_mut(slot_id) {
            stored.teachers_enrolled = enrolled;
            stored.status =
                slot_booking::occupancy_status(slot.status, slot.teachers_required, enrolled);
        }
        Ok(enrollment)
    }

    async fn cancel_enrollment(
        &self,
        slot_id: &str,
        teacher_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<CancelledEnrollment, BookingError> {
        let mut tables = self.lock();
        let slot = tables.slots.get(slot_id).cloned().ok_or(BookingError::SlotNotFound)?;
        slot_booking::ensure_open(&slot)?;

        let enrollment = tables
            .enrollments
            .values_mut()
            .find(|enrollment| {
                enrollment.slot_id == slot_id
                    && enrollment.teacher_id == teacher_id
                    && enrollment.status == EnrollmentStatus::Active
            })
            .ok_or(BookingError::EnrollmentNotFound)?;
        enrollment.status = EnrollmentStatus::Cancelled;
        enrollment.cancelled_at = Some(now);
        let enrollment = enrollment.clone();

        let mut sessions_cancelled = 0;
        for session in tables.sessions.values_mut() {
            let undecided = matches!(
                session.status,
                TeachingSessionStatus::Pending | TeachingSessionStatus::PhotoSubmitted
            );
            if session.slot_id == slot_id && session.teacher_id == teacher_id && undecided {
                session.status = TeachingSessionStatus::Cancelled;
                sessions_cancelled += 1;
            }
        }

        let enrolled = (slot.teachers_enrolled - 1).max(0);
        if let Some(stored) = tables.slots.get_mut(slot_id) {
            stored.teachers_enrolled = enrolled;
            stored.status =
                slot_booking::occupancy_status(slot.status, slot.teachers_required, enrolled);
        }
        Ok(CancelledEnrollment { enrollment, sessions_cancelled })
    }
}

/// Scripted OCR engine keyed by file path. Unknown paths fail.
pub(crate) struct FakeExtractor {
    available: bool,
    pages: HashMap<String, Result<Extraction, String>>,
}

impl FakeExtractor {
    pub(crate) fn new() -> Self {
        Self { available: true, pages: HashMap::new() }
    }

    pub(crate) fn unavailable() -> Self {
        Self { available: false, pages: HashMap::new() }
    }

    pub(crate) fn with_page(mut self, path: &str, text: &str, confidence: f64) -> Self {
        self.pages
            .insert(path.to_string(), Ok(Extraction { text: text.to_string(), confidence }));
        self
    }

    pub(crate) fn with_failure(mut self, path: &str, message: &str) -> Self {
        self.pages.insert(path.to_string(), Err(message.to_string()));
        self
    }
}

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn extract(
        &self,
        image_path: &Path,
        _options: &ExtractOptions,
    ) -> Result<Extraction, OcrError> {
        if !self.available {
            return Err(OcrError::NotAvailable("fake".to_string()));
        }
        match self.pages.get(image_path.to_string_lossy().as_ref()) {
            Some(Ok(extraction)) => Ok(extraction.clone()),
            Some(Err(message)) => Err(OcrError::Extraction(message.clone())),
            None => Err(OcrError::Extraction(format!("no such page: {}", image_path.display()))),
        }
    }
}

/// Deterministic grader: full marks when the answer contains the key.
pub(crate) struct FakeGrader {
    fail: bool,
    failing_questions: Vec<i32>,
}

impl FakeGrader {
    pub(crate) fn exact_match() -> Self {
        Self { fail: false, failing_questions: Vec::new() }
    }

    pub(crate) fn failing() -> Self {
        Self { fail: true, failing_questions: Vec::new() }
    }

    /// Fails only the listed question numbers.
    pub(crate) fn failing_on(questions: &[i32]) -> Self {
        Self { fail: false, failing_questions: questions.to_vec() }
    }
}

#[async_trait]
impl QuestionGrader for FakeGrader {
    async fn grade_one(
        &self,
        request: &QuestionGradeRequest,
    ) -> Result<QuestionGrade, AiGradingError> {
        if self.fail || self.failing_questions.contains(&request.question_number) {
            return Err(AiGradingError::Transport("connection refused".to_string()));
        }
        let answer = request.student_answer.to_lowercase();
        let key = request.answer_key.trim().to_lowercase();
        let correct = !key.is_empty() && answer.contains(&key);
        Ok(QuestionGrade {
            marks: if correct { request.max_marks } else { 0.0 },
            feedback: if correct { "Correct".to_string() } else { "Incorrect".to_string() },
            confidence: 95.0,
        })
    }

    async fn summarize(&self, _analytics: &Value) -> Result<Insights, AiGradingError> {
        if self.fail {
            return Err(AiGradingError::Transport("connection refused".to_string()));
        }
        Ok(Insights {
            summary: "Students performed well overall".to_string(),
            insights: vec!["Most answers matched the key".to_string()],
            recommendations: vec!["Review question 2 in class".to_string()],
        })
    }
}

fn fixed_upload_time() -> PrimitiveDateTime {
    time::macros::datetime!(2026-10-15 08:00)
}

pub(crate) fn exam(id: &str, mode: GradingMode, answer_key: Option<&str>) -> Exam {
    Exam {
        id: id.to_string(),
        title: format!("Exam {id}"),
        grading_mode: mode,
        answer_key: answer_key.map(str::to_string),
        created_at: primitive_now_utc(),
    }
}

pub(crate) fn question(
    id: &str,
    exam_id: &str,
    number: i32,
    max_marks: f64,
    answer_key: Option<&str>,
) -> Question {
    Question {
        id: id.to_string(),
        exam_id: exam_id.to_string(),
        question_number: number,
        question_text: format!("Question {number}"),
        max_marks,
        answer_key: answer_key.map(str::to_string),
    }
}

pub(crate) fn submission(id: &str, exam_id: &str, status: SubmissionStatus) -> Submission {
    let now = primitive_now_utc();
    Submission {
        id: id.to_string(),
        exam_id: exam_id.to_string(),
        student_id: "student-1".to_string(),
        status,
        submitted_at: now,
        ocr_completed_at: None,
        graded_at: None,
        total_score: None,
        error_message: None,
        updated_at: now,
    }
}

pub(crate) fn pending_image(id: &str, submission_id: &str, page: i32, path: &str) -> AnswerImage {
    AnswerImage {
        id: id.to_string(),
        submission_id: submission_id.to_string(),
        page_order: page,
        file_path: path.to_string(),
        ocr_status: OcrImageStatus::Pending,
        extracted_text: None,
        confidence_score: None,
        error_message: None,
        ocr_attempts: 0,
        uploaded_at: fixed_upload_time(),
        processing_started_at: None,
        processed_at: None,
    }
}

pub(crate) fn completed_image(
    id: &str,
    submission_id: &str,
    page: i32,
    text: &str,
) -> AnswerImage {
    let mut image = pending_image(id, submission_id, page, &format!("{id}.png"));
    image.ocr_status = OcrImageStatus::Completed;
    image.extracted_text = Some(text.to_string());
    image.confidence_score = Some(90.0);
    image.ocr_attempts = 1;
    image.processed_at = Some(fixed_upload_time());
    image
}

pub(crate) fn school(id: &str, latitude: f64, longitude: f64) -> SchoolLocation {
    SchoolLocation {
        id: id.to_string(),
        name: format!("School {id}"),
        latitude,
        longitude,
        radius_meters: None,
    }
}

pub(crate) fn slot(id: &str, school_id: &str, date: Date, start: Time, end: Time) -> Slot {
    Slot {
        id: id.to_string(),
        school_id: school_id.to_string(),
        slot_date: date,
        start_time: start,
        end_time: end,
        teachers_required: 2,
        teachers_enrolled: 0,
        status: SlotStatus::Open,
    }
}

pub(crate) fn teaching_session(
    id: &str,
    slot_id: &str,
    teacher_id: &str,
    start_photo: Option<String>,
    end_photo: Option<String>,
) -> TeachingSession {
    let status = if start_photo.is_some() {
        TeachingSessionStatus::PhotoSubmitted
    } else {
        TeachingSessionStatus::Pending
    };
    TeachingSession {
        id: id.to_string(),
        slot_id: slot_id.to_string(),
        teacher_id: teacher_id.to_string(),
        start_photo_path: start_photo,
        end_photo_path: end_photo,
        start_latitude: None,
        start_longitude: None,
        start_distance_meters: None,
        start_taken_at: None,
        end_latitude: None,
        end_longitude: None,
        end_distance_meters: None,
        end_taken_at: None,
        actual_duration_minutes: None,
        expected_duration_minutes: None,
        status,
        verdict: None,
        verdict_reasons: Json(Vec::new()),
        validated_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelling_an_enrollment_frees_the_seat_and_cancels_sessions() {
        let store = MemoryStore::default();
        store.insert_slot(slot(
            "slot-1",
            "school-1",
            time::macros::date!(2026 - 10 - 20),
            time::macros::time!(09:00),
            time::macros::time!(11:00),
        ));
        store.insert_teaching_session(teaching_session(
            "session-1",
            "slot-1",
            "teacher-1",
            Some("start.jpg".to_string()),
            None,
        ));
        let now = primitive_now_utc();

        store.enroll_teacher("slot-1", "teacher-1", now).await.expect("enroll");
        assert_eq!(
            store.find_slot("slot-1").await.expect("slot").map(|s| s.status),
            Some(SlotStatus::PartiallyFilled)
        );
        assert!(matches!(
            store.enroll_teacher("slot-1", "teacher-1", now).await,
            Err(BookingError::AlreadyEnrolled)
        ));

        let cancelled = store.cancel_enrollment("slot-1", "teacher-1", now).await.expect("cancel");
        assert_eq!(cancelled.sessions_cancelled, 1);
        assert_eq!(cancelled.enrollment.status, EnrollmentStatus::Cancelled);
        assert_eq!(
            store.teaching_session("session-1").map(|s| s.status),
            Some(TeachingSessionStatus::Cancelled)
        );
        let slot = store.find_slot("slot-1").await.expect("slot").expect("slot row");
        assert_eq!(slot.teachers_enrolled, 0);
        assert_eq!(slot.status, SlotStatus::Open);
    }
}
