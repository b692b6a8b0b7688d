use time::Duration;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc as now_primitive;
use crate::tasks::batch::{BatchRecorder, BatchSummary};
use crate::tasks::ocr_queue;

pub(crate) const STALE_IMAGE_ERROR: &str = "OCR processing timed out";

/// Frees work abandoned by crashed runs. Images stuck in `processing` become
/// `failed` and stay claimable while attempts remain. Submissions whose pages
/// can no longer change are settled and graded. Submissions stuck in
/// `grading` go back to `ocr_complete`.
pub(crate) async fn recover_stale_work(state: &AppState) -> BatchSummary {
    let mut recorder = BatchRecorder::new("recovery");
    let store = state.grading_store();
    let now = now_primitive();
    let cutoff = now - Duration::minutes(state.settings().ocr().stale_processing_minutes);

    match store.fail_stale_images(cutoff, STALE_IMAGE_ERROR, now).await {
        Ok(0) => {}
        Ok(count) => {
            metrics::counter!("ocr_images_total", "status" => "stale").increment(count);
            recorder.warning(format!("Marked {count} stale image(s) as failed"));
        }
        Err(err) => recorder.error(format!("Failed to recover stale images: {err:#}")),
    }

    let max_attempts = state.settings().ocr().max_attempts;
    match store.list_stalled_ocr_submissions(max_attempts).await {
        Ok(stalled) => {
            for submission_id in stalled {
                if let Err(err) =
                    ocr_queue::settle_submission(state, &submission_id, &mut recorder).await
                {
                    recorder.error(format!("Failed to settle submission {submission_id}: {err:#}"));
                }
            }
        }
        Err(err) => recorder.error(format!("Failed to list stalled submissions: {err:#}")),
    }

    match store.release_stale_grading(cutoff, now).await {
        Ok(0) => {}
        Ok(count) => {
            metrics::counter!("grading_submissions_total", "status" => "stale").increment(count);
            recorder.warning(format!("Returned {count} stale grading claim(s) to ocr_complete"));
        }
        Err(err) => recorder.error(format!("Failed to release stale grading claims: {err:#}")),
    }

    recorder.finish()
}
