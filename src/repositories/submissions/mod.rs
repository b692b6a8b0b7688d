mod commands;
mod queries;
mod types;

pub(crate) use commands::{
    claim_for_grading, mark_error, mark_graded, mark_ocr_complete, mark_ocr_processing,
    release_grading_claim, release_stale_grading,
};
pub(crate) use queries::{find_by_id, list_gradable, list_stalled_ocr};
