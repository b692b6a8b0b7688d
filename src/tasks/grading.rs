use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc as now_primitive;
use crate::db::models::{AnswerImage, Exam, Question, Submission};
use crate::db::types::{GradingMethod, GradingMode, OcrImageStatus, SubmissionStatus};
use crate::repositories::grades::GradeUpsert;
use crate::repositories::GradingStore;
use crate::services::ai_grading::{QuestionGradeRequest, QuestionGrader};
use crate::services::{answer_key, answer_segmenter};
use crate::tasks::batch::{BatchRecorder, BatchSummary, ItemOutcome};

#[derive(Debug, Error)]
pub(crate) enum GradingError {
    #[error("AI grading is not configured: GROQ_API_KEY is not set")]
    NotConfigured,
    #[error("submission not found")]
    SubmissionNotFound,
    #[error("submission is {0} and cannot be graded")]
    NotGradable(&'static str),
    #[error("exam not found")]
    ExamNotFound,
    #[error("exam is not in AI grading mode")]
    NotAiMode,
    #[error("no OCR text is available for this submission")]
    NoOcrText,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct QuestionResult {
    pub(crate) question_id: String,
    pub(crate) question_number: i32,
    pub(crate) max_marks: f64,
    pub(crate) awarded_marks: Option<f64>,
    pub(crate) confidence: Option<f64>,
    pub(crate) error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SubmissionGrading {
    pub(crate) submission_id: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) total_marks: f64,
    pub(crate) max_marks: f64,
    pub(crate) questions_graded: usize,
    pub(crate) errors: Vec<String>,
    pub(crate) questions: Vec<QuestionResult>,
}

/// Grades every question of one submission and finalizes it.
///
/// The submission is claimed with a conditional update first, so concurrent
/// callers grade it at most once. `force` also accepts `graded` and `error`
/// submissions and overwrites their grades; nothing re-grades automatically.
pub(crate) async fn grade_submission(
    state: &AppState,
    submission_id: &str,
    force: bool,
) -> Result<SubmissionGrading, GradingError> {
    let grader = state.grader().ok_or(GradingError::NotConfigured)?;
    let store = state.grading_store();

    let submission =
        store.find_submission(submission_id).await?.ok_or(GradingError::SubmissionNotFound)?;
    if !store.claim_submission_for_grading(&submission.id, force, now_primitive()).await? {
        return Err(GradingError::NotGradable(submission.status.as_str()));
    }

    tracing::info!(submission_id, force, "Grading submission");

    let result = grade_claimed(state, grader, &submission).await;
    if let Err(GradingError::Store(err)) = &result {
        tracing::error!(submission_id, error = %err, "Grading aborted by storage error");
        if let Err(release_err) = store.release_grading_claim(submission_id, now_primitive()).await
        {
            tracing::error!(
                submission_id,
                error = %release_err,
                "Failed to release grading claim"
            );
        }
    }

    let status = match &result {
        Ok(grading) if grading.status == SubmissionStatus::Graded => "graded",
        Ok(_) => "error",
        Err(GradingError::Store(_)) => "aborted",
        Err(_) => "error",
    };
    metrics::counter!("grading_submissions_total", "status" => status).increment(1);

    result
}

async fn grade_claimed(
    state: &AppState,
    grader: &dyn QuestionGrader,
    submission: &Submission,
) -> Result<SubmissionGrading, GradingError> {
    let store = state.grading_store();

    let Some(exam) = store.find_exam(&submission.exam_id).await? else {
        return fail(store, submission, GradingError::ExamNotFound).await;
    };
    if exam.grading_mode != GradingMode::Ai {
        return fail(store, submission, GradingError::NotAiMode).await;
    }

    let images = store.list_images(&submission.id).await?;
    let ocr_text = combined_ocr_text(&images);
    if ocr_text.is_empty() {
        return fail(store, submission, GradingError::NoOcrText).await;
    }

    let questions = store.list_questions(&exam.id).await?;
    let inter_call_delay = Duration::from_millis(state.settings().ai().inter_call_delay_ms);

    let mut keys = AnswerKeys::new(&exam);
    let mut results = Vec::with_capacity(questions.len());
    let mut errors = Vec::new();
    let mut total_marks = 0.0;
    let mut max_marks = 0.0;
    let mut called = false;

    for question in &questions {
        max_marks += question.max_marks;
        let number = question.question_number;
        let mut result = QuestionResult {
            question_id: question.id.clone(),
            question_number: number,
            max_marks: question.max_marks,
            awarded_marks: None,
            confidence: None,
            error: None,
        };

        let Some(key) = keys.resolve(question) else {
            let message = format!("Question {number}: no answer key available");
            tracing::warn!(submission_id = %submission.id, question_number = number, "No answer key");
            metrics::counter!("grading_questions_total", "status" => "skipped").increment(1);
            store.delete_grade(&submission.id, &question.id).await?;
            errors.push(message.clone());
            result.error = Some(message);
            results.push(result);
            continue;
        };

        if called && !inter_call_delay.is_zero() {
            tokio::time::sleep(inter_call_delay).await;
        }
        called = true;

        let request = QuestionGradeRequest {
            question_number: number,
            question_text: question.question_text.clone(),
            student_answer: answer_segmenter::segment(&ocr_text, number, questions.len()),
            answer_key: key,
            max_marks: question.max_marks,
        };

        match grader.grade_one(&request).await {
            Ok(grade) => {
                store
                    .upsert_grade(&GradeUpsert {
                        submission_id: submission.id.clone(),
                        question_id: question.id.clone(),
                        awarded_marks: grade.marks,
                        feedback: grade.feedback,
                        confidence: grade.confidence,
                        method: GradingMethod::Ai,
                        graded_at: now_primitive(),
                    })
                    .await?;

                metrics::counter!("grading_questions_total", "status" => "graded").increment(1);
                total_marks += grade.marks;
                result.awarded_marks = Some(grade.marks);
                result.confidence = Some(grade.confidence);
            }
            Err(err) => {
                let message = format!("Question {number}: {err}");
                tracing::warn!(
                    submission_id = %submission.id,
                    question_number = number,
                    error = %err,
                    "Question grading failed"
                );
                metrics::counter!("grading_questions_total", "status" => "failed").increment(1);
                // a grade left from an earlier run would no longer match the total
                store.delete_grade(&submission.id, &question.id).await?;
                errors.push(message.clone());
                result.error = Some(message);
            }
        }
        results.push(result);
    }

    let questions_graded = results.iter().filter(|result| result.awarded_marks.is_some()).count();
    let now = now_primitive();

    let status = if questions_graded == 0 {
        let message = if errors.is_empty() {
            "No questions could be graded".to_string()
        } else {
            format!("No questions could be graded: {}", errors.join("; "))
        };
        store.fail_submission(&submission.id, &message, now).await?;
        SubmissionStatus::Error
    } else {
        if !store.finalize_submission(&submission.id, total_marks, now).await? {
            return Err(GradingError::Store(anyhow::anyhow!(
                "submission {} left the grading state before it was finalized",
                submission.id
            )));
        }
        SubmissionStatus::Graded
    };

    tracing::info!(
        submission_id = %submission.id,
        status = status.as_str(),
        total_marks,
        max_marks,
        questions_graded,
        errors = errors.len(),
        "Submission grading finished"
    );

    Ok(SubmissionGrading {
        submission_id: submission.id.clone(),
        status,
        total_marks,
        max_marks,
        questions_graded,
        errors,
        questions: results,
    })
}

async fn fail(
    store: &dyn GradingStore,
    submission: &Submission,
    error: GradingError,
) -> Result<SubmissionGrading, GradingError> {
    store.fail_submission(&submission.id, &error.to_string(), now_primitive()).await?;
    tracing::warn!(submission_id = %submission.id, error = %error, "Submission cannot be graded");
    Err(error)
}

/// Text of the completed pages in page order. Failed pages are left out.
pub(crate) fn combined_ocr_text(images: &[AnswerImage]) -> String {
    let mut pages: Vec<&AnswerImage> = images
        .iter()
        .filter(|image| image.ocr_status == OcrImageStatus::Completed)
        .collect();
    pages.sort_by_key(|image| image.page_order);

    pages
        .iter()
        .filter_map(|image| image.extracted_text.as_deref())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Per-question keys win; the exam-level key is parsed once, on first need.
struct AnswerKeys<'a> {
    exam: &'a Exam,
    parsed: Option<BTreeMap<i32, String>>,
}

impl<'a> AnswerKeys<'a> {
    fn new(exam: &'a Exam) -> Self {
        Self { exam, parsed: None }
    }

    fn resolve(&mut self, question: &Question) -> Option<String> {
        if let Some(key) = question.answer_key.as_deref().map(str::trim).filter(|key| !key.is_empty())
        {
            return Some(key.to_string());
        }

        let exam_key = self.exam.answer_key.as_deref().unwrap_or_default();
        self.parsed
            .get_or_insert_with(|| answer_key::parse(exam_key))
            .get(&question.question_number)
            .cloned()
    }
}

/// Grades up to `limit` OCR-complete submissions of AI-mode exams, oldest
/// submission first.
pub(crate) async fn process_pending_submissions(state: &AppState, limit: i64) -> BatchSummary {
    let mut recorder = BatchRecorder::new("grading");
    if state.grader().is_none() {
        return recorder.abort(GradingError::NotConfigured.to_string());
    }

    let submissions = match state.grading_store().list_gradable_submissions(limit).await {
        Ok(submissions) => submissions,
        Err(err) => return recorder.abort(format!("Failed to list gradable submissions: {err:#}")),
    };

    if submissions.is_empty() {
        recorder.info("No submissions waiting for grading");
        return recorder.finish();
    }
    recorder.info(format!("Found {} submission(s) to grade", submissions.len()));

    for submission in submissions {
        let result = grade_submission(state, &submission.id, false).await;
        record_grading(&mut recorder, &submission.id, result);
    }

    recorder.finish()
}

/// Grades one submission on demand. `force` re-grades `graded` or `error`
/// submissions.
pub(crate) async fn process_submission(
    state: &AppState,
    submission_id: &str,
    force: bool,
) -> BatchSummary {
    let mut recorder = BatchRecorder::new("grading_single");
    if state.grader().is_none() {
        return recorder.abort(GradingError::NotConfigured.to_string());
    }

    let result = grade_submission(state, submission_id, force).await;
    record_grading(&mut recorder, submission_id, result);
    recorder.finish()
}

fn record_grading(
    recorder: &mut BatchRecorder,
    submission_id: &str,
    result: Result<SubmissionGrading, GradingError>,
) {
    match result {
        Ok(grading) if grading.status == SubmissionStatus::Graded => {
            let detail = format!(
                "scored {:.1}/{:.1} on {} question(s)",
                grading.total_marks, grading.max_marks, grading.questions_graded
            );
            recorder.success(format!("Submission {submission_id} {detail}"));
            for error in &grading.errors {
                recorder.warning(format!("Submission {submission_id}: {error}"));
            }
            recorder.record(submission_id, ItemOutcome::Succeeded { detail });
        }
        Ok(grading) => {
            let error = if grading.errors.is_empty() {
                "No questions could be graded".to_string()
            } else {
                grading.errors.join("; ")
            };
            recorder.error(format!("Submission {submission_id} not graded: {error}"));
            recorder.record(submission_id, ItemOutcome::Failed { error });
        }
        Err(GradingError::NotGradable(status)) => {
            let reason = format!("submission is {status}");
            recorder.info(format!("Skipping submission {submission_id}: {reason}"));
            recorder.record(submission_id, ItemOutcome::Skipped { reason });
        }
        Err(err) => {
            let error = format!("{err:#}");
            recorder.error(format!("Submission {submission_id} failed: {error}"));
            recorder.record(submission_id, ItemOutcome::Failed { error });
        }
    }
}
