use std::path::Path;
use std::time::Instant;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc as now_primitive;
use crate::db::models::AnswerImage;
use crate::db::types::{GradingMode, OcrImageStatus, SubmissionStatus};
use crate::services::text_extraction::ExtractOptions;
use crate::tasks::batch::{BatchRecorder, BatchSummary, ItemOutcome};
use crate::tasks::grading;

/// Runs OCR over up to `limit` pending or retryable images, oldest upload
/// first. Each image is claimed with a conditional update; an image claimed
/// by a concurrent run is skipped.
pub(crate) async fn process_pending_images(state: &AppState, limit: i64) -> BatchSummary {
    let mut recorder = BatchRecorder::new("ocr");
    if !state.extractor().is_available().await {
        return recorder.abort(format!(
            "Tesseract OCR is not available at '{}'",
            state.settings().ocr().tesseract_path
        ));
    }

    let max_attempts = state.settings().ocr().max_attempts;
    let images = match state.grading_store().list_claimable_images(limit, max_attempts).await {
        Ok(images) => images,
        Err(err) => return recorder.abort(format!("Failed to list pending images: {err:#}")),
    };

    if images.is_empty() {
        recorder.info("No images waiting for OCR");
        return recorder.finish();
    }
    recorder.info(format!("Found {} image(s) to process", images.len()));

    let options = ExtractOptions::from_settings(state.settings().ocr());
    for image in &images {
        let outcome = match process_image(state, image, &options, &mut recorder).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let error = format!("{err:#}");
                recorder.error(format!("Image {} failed: {error}", image.id));
                ItemOutcome::Failed { error }
            }
        };
        recorder.record(&image.id, outcome);
    }

    recorder.finish()
}

async fn process_image(
    state: &AppState,
    image: &AnswerImage,
    options: &ExtractOptions,
    recorder: &mut BatchRecorder,
) -> anyhow::Result<ItemOutcome> {
    let store = state.grading_store();
    let max_attempts = state.settings().ocr().max_attempts;

    if !store.claim_image(&image.id, max_attempts, now_primitive()).await? {
        recorder.info(format!("Image {} already claimed, skipping", image.id));
        return Ok(ItemOutcome::Skipped { reason: "already claimed".to_string() });
    }
    store.start_submission_ocr(&image.submission_id, now_primitive()).await?;

    let started = Instant::now();
    let extraction = state.extractor().extract(Path::new(&image.file_path), options).await;
    metrics::histogram!("ocr_image_duration_seconds").record(started.elapsed().as_secs_f64());

    let outcome = match extraction {
        Ok(extraction) => {
            store
                .complete_image(&image.id, &extraction.text, extraction.confidence, now_primitive())
                .await?;
            metrics::counter!("ocr_images_total", "status" => "completed").increment(1);
            tracing::info!(
                image_id = %image.id,
                submission_id = %image.submission_id,
                page = image.page_order,
                confidence = extraction.confidence,
                chars = extraction.text.len(),
                "Image OCR completed"
            );
            recorder.success(format!(
                "Image {} (page {}) extracted, confidence {:.0}",
                image.id, image.page_order, extraction.confidence
            ));
            ItemOutcome::Succeeded { detail: format!("confidence {:.0}", extraction.confidence) }
        }
        Err(err) => {
            let error = err.to_string();
            store.fail_image(&image.id, &error, now_primitive()).await?;
            metrics::counter!("ocr_images_total", "status" => "failed").increment(1);
            tracing::warn!(
                image_id = %image.id,
                submission_id = %image.submission_id,
                error = %err,
                "Image OCR failed"
            );
            recorder.warning(format!("Image {} (page {}) failed: {error}", image.id, image.page_order));
            ItemOutcome::Failed { error }
        }
    };

    settle_submission(state, &image.submission_id, recorder).await?;
    Ok(outcome)
}

/// Advances the submission to `ocr_complete` once every page has either
/// completed or failed, then grades it straight away for AI-mode exams.
/// Only the caller that wins the transition grades. A grading failure leaves
/// the submission in `ocr_complete` for the grading job to pick up.
pub(crate) async fn settle_submission(
    state: &AppState,
    submission_id: &str,
    recorder: &mut BatchRecorder,
) -> anyhow::Result<()> {
    let store = state.grading_store();
    let images = store.list_images(submission_id).await?;
    let settled = images
        .iter()
        .filter(|image| {
            matches!(image.ocr_status, OcrImageStatus::Completed | OcrImageStatus::Failed)
        })
        .count();
    if settled < images.len() {
        return Ok(());
    }

    if !store.complete_submission_ocr(submission_id, now_primitive()).await? {
        return Ok(());
    }

    let failed_pages =
        images.iter().filter(|image| image.ocr_status == OcrImageStatus::Failed).count();
    if failed_pages > 0 {
        recorder.warning(format!(
            "Submission {submission_id} OCR complete with {failed_pages} of {} page(s) failed",
            images.len()
        ));
    } else {
        recorder.info(format!("Submission {submission_id} OCR complete"));
    }

    let Some(submission) = store.find_submission(submission_id).await? else {
        return Ok(());
    };
    let ai_mode = store
        .find_exam(&submission.exam_id)
        .await?
        .is_some_and(|exam| exam.grading_mode == GradingMode::Ai);
    if !ai_mode {
        return Ok(());
    }

    match grading::grade_submission(state, submission_id, false).await {
        Ok(result) if result.status == SubmissionStatus::Graded => recorder.success(format!(
            "Submission {submission_id} graded: {:.1}/{:.1}",
            result.total_marks, result.max_marks
        )),
        Ok(result) => recorder.warning(format!(
            "Submission {submission_id} could not be graded: {}",
            result.errors.join("; ")
        )),
        Err(err) => {
            tracing::error!(submission_id, error = %err, "Grading after OCR failed");
            recorder.warning(format!("Grading submission {submission_id} failed: {err}"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::repositories::GradingStore;
    use crate::test_support::{self, FakeExtractor, FakeGrader, MemoryStore};

    fn seed_exam(store: &MemoryStore, mode: GradingMode) {
        store.insert_exam(test_support::exam("exam-1", mode, Some("Q1.A1. Paris\nQ2.A2. Berlin")));
        store.insert_question(test_support::question("q-1", "exam-1", 1, 5.0, None));
        store.insert_question(test_support::question("q-2", "exam-1", 2, 5.0, None));
        store.insert_submission(test_support::submission("sub-1", "exam-1", SubmissionStatus::Pending));
    }

    #[tokio::test]
    async fn partial_page_failure_still_completes_submission() {
        let _guard = test_support::env_lock().await;
        let store = Arc::new(MemoryStore::default());
        seed_exam(&store, GradingMode::Manual);
        store.insert_image(test_support::pending_image("img-1", "sub-1", 1, "p1.png"));
        store.insert_image(test_support::pending_image("img-2", "sub-1", 2, "p2.png"));
        store.insert_image(test_support::pending_image("img-3", "sub-1", 3, "p3.png"));
        let extractor = FakeExtractor::new()
            .with_page("p1.png", "1. Paris is the capital", 90.0)
            .with_page("p2.png", "2. Berlin is the capital", 85.0)
            .with_failure("p3.png", "blurred");
        let state = test_support::state_with(store.clone(), extractor, None);

        let summary = process_pending_images(&state, 10).await;

        assert!(summary.success);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(
            store.submission("sub-1").map(|s| s.status),
            Some(SubmissionStatus::OcrComplete)
        );
        let failed = store.image("img-3").expect("image");
        assert_eq!(failed.ocr_status, OcrImageStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("OCR extraction failed: blurred"));
        assert_eq!(failed.ocr_attempts, 1);
    }

    #[tokio::test]
    async fn completing_ocr_grades_ai_mode_submissions() {
        let _guard = test_support::env_lock().await;
        let store = Arc::new(MemoryStore::default());
        seed_exam(&store, GradingMode::Ai);
        store.insert_image(test_support::pending_image("img-1", "sub-1", 1, "p1.png"));
        let extractor = FakeExtractor::new().with_page("p1.png", "1. Paris 2. Berlin", 90.0);
        let state =
            test_support::state_with(store.clone(), extractor, Some(FakeGrader::exact_match()));

        let summary = process_pending_images(&state, 10).await;

        assert_eq!(summary.succeeded, 1);
        let submission = store.submission("sub-1").expect("submission");
        assert_eq!(submission.status, SubmissionStatus::Graded);
        assert_eq!(submission.total_score, Some(10.0));
    }

    #[tokio::test]
    async fn grading_failure_leaves_submission_ocr_complete() {
        let _guard = test_support::env_lock().await;
        let store = Arc::new(MemoryStore::default());
        seed_exam(&store, GradingMode::Ai);
        store.insert_image(test_support::pending_image("img-1", "sub-1", 1, "p1.png"));
        let extractor = FakeExtractor::new().with_page("p1.png", "1. Paris 2. Berlin", 90.0);
        // no grader configured
        let state = test_support::state_with(store.clone(), extractor, None);

        let summary = process_pending_images(&state, 10).await;

        assert_eq!(summary.succeeded, 1);
        assert_eq!(
            store.submission("sub-1").map(|s| s.status),
            Some(SubmissionStatus::OcrComplete)
        );
        assert!(summary.logs.iter().any(|log| log.message.contains("Grading submission sub-1 failed")));
    }

    #[tokio::test]
    async fn submission_waits_for_remaining_pages() {
        let _guard = test_support::env_lock().await;
        let store = Arc::new(MemoryStore::default());
        seed_exam(&store, GradingMode::Manual);
        store.insert_image(test_support::pending_image("img-1", "sub-1", 1, "p1.png"));
        store.insert_image(test_support::pending_image("img-2", "sub-1", 2, "p2.png"));
        let extractor = FakeExtractor::new().with_page("p1.png", "first page", 90.0);
        let state = test_support::state_with(store.clone(), extractor, None);

        // only the oldest image fits into this batch
        let summary = process_pending_images(&state, 1).await;

        assert_eq!(summary.processed, 1);
        assert_eq!(
            store.submission("sub-1").map(|s| s.status),
            Some(SubmissionStatus::OcrProcessing)
        );
    }

    #[tokio::test]
    async fn unavailable_engine_aborts_before_touching_images() {
        let _guard = test_support::env_lock().await;
        let store = Arc::new(MemoryStore::default());
        seed_exam(&store, GradingMode::Manual);
        store.insert_image(test_support::pending_image("img-1", "sub-1", 1, "p1.png"));
        let state = test_support::state_with(store.clone(), FakeExtractor::unavailable(), None);

        let summary = process_pending_images(&state, 10).await;

        assert!(!summary.success);
        assert!(summary.items.is_empty());
        assert_eq!(store.image("img-1").map(|i| i.ocr_status), Some(OcrImageStatus::Pending));
    }

    #[tokio::test]
    async fn concurrent_claims_have_exactly_one_winner() {
        let store = MemoryStore::default();
        store.insert_submission(test_support::submission("sub-1", "exam-1", SubmissionStatus::Pending));
        store.insert_image(test_support::pending_image("img-1", "sub-1", 1, "p1.png"));
        let now = now_primitive();

        let (first, second) =
            tokio::join!(store.claim_image("img-1", 3, now), store.claim_image("img-1", 3, now));

        let wins = [first.expect("claim"), second.expect("claim")];
        assert_eq!(wins.iter().filter(|won| **won).count(), 1);
        assert_eq!(store.image("img-1").map(|i| i.ocr_attempts), Some(1));
    }

    #[tokio::test]
    async fn exhausted_images_are_not_claimable() {
        let store = MemoryStore::default();
        store.insert_submission(test_support::submission(
            "sub-1",
            "exam-1",
            SubmissionStatus::OcrProcessing,
        ));
        let mut image = test_support::pending_image("img-1", "sub-1", 1, "p1.png");
        image.ocr_status = OcrImageStatus::Failed;
        image.ocr_attempts = 3;
        store.insert_image(image);

        assert!(store.list_claimable_images(10, 3).await.expect("list").is_empty());
        assert!(!store.claim_image("img-1", 3, now_primitive()).await.expect("claim"));
    }

    #[tokio::test]
    async fn failed_pages_of_settled_submissions_are_not_retried() {
        let _guard = test_support::env_lock().await;
        let store = Arc::new(MemoryStore::default());
        seed_exam(&store, GradingMode::Ai);
        store.insert_image(test_support::pending_image("img-1", "sub-1", 1, "p1.png"));
        store.insert_image(test_support::pending_image("img-2", "sub-1", 2, "p2.png"));
        let first_run = FakeExtractor::new()
            .with_page("p1.png", "1. Paris", 90.0)
            .with_failure("p2.png", "blurred");
        let state =
            test_support::state_with(store.clone(), first_run, Some(FakeGrader::exact_match()));
        process_pending_images(&state, 10).await;

        let graded = store.submission("sub-1").expect("submission");
        assert_eq!(graded.status, SubmissionStatus::Graded);
        assert_eq!(store.image("img-2").map(|i| i.ocr_attempts), Some(1));

        let second_run = FakeExtractor::new().with_page("p2.png", "2. Berlin", 90.0);
        let state =
            test_support::state_with(store.clone(), second_run, Some(FakeGrader::exact_match()));
        let summary = process_pending_images(&state, 10).await;

        assert_eq!(summary.processed, 0);
        assert_eq!(store.image("img-2").map(|i| i.ocr_status), Some(OcrImageStatus::Failed));
        assert!(!store.claim_image("img-2", 3, now_primitive()).await.expect("claim"));
        assert_eq!(store.submission("sub-1").and_then(|s| s.total_score), graded.total_score);
    }
}
