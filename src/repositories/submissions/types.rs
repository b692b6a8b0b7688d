pub(crate) const COLUMNS: &str = "\
    id, exam_id, student_id, status, submitted_at, ocr_completed_at, graded_at, \
    total_score, error_message, updated_at";
