use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::SlotEnrollment;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct EnrollRequest {
    #[validate(length(min = 1, max = 64, message = "teacher_id must be 1..64 characters"))]
    pub(crate) teacher_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CancelEnrollmentResponse {
    pub(crate) enrollment: SlotEnrollment,
    pub(crate) sessions_cancelled: u64,
}
