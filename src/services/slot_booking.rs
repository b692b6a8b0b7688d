use thiserror::Error;

use crate::db::models::{Slot, SlotEnrollment};
use crate::db::types::SlotStatus;

#[derive(Debug, Error)]
pub(crate) enum BookingError {
    #[error("slot not found")]
    SlotNotFound,
    #[error("slot is {0} and does not accept enrollment changes")]
    SlotClosed(&'static str),
    #[error("slot is full")]
    SlotFull,
    #[error("teacher is already enrolled in this slot")]
    AlreadyEnrolled,
    #[error("teacher has no active enrollment in this slot")]
    EnrollmentNotFound,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub(crate) struct CancelledEnrollment {
    pub(crate) enrollment: SlotEnrollment,
    pub(crate) sessions_cancelled: u64,
}

/// Checks a locked slot row before adding one more teacher.
pub(crate) fn ensure_can_enroll(slot: &Slot, already_enrolled: bool) -> Result<(), BookingError> {
    ensure_open(slot)?;
    if already_enrolled {
        return Err(BookingError::AlreadyEnrolled);
    }
    if slot.status == SlotStatus::Full || slot.teachers_enrolled >= slot.teachers_required {
        return Err(BookingError::SlotFull);
    }
    Ok(())
}

pub(crate) fn ensure_open(slot: &Slot) -> Result<(), BookingError> {
    match slot.status {
        SlotStatus::Cancelled | SlotStatus::Completed => {
            Err(BookingError::SlotClosed(slot.status.as_str()))
        }
        _ => Ok(()),
    }
}

/// Occupancy-derived status. Cancelled and completed slots keep their status.
pub(crate) fn occupancy_status(current: SlotStatus, required: i32, enrolled: i32) -> SlotStatus {
    match current {
        SlotStatus::Cancelled | SlotStatus::Completed => current,
        _ if enrolled <= 0 => SlotStatus::Open,
        _ if enrolled >= required => SlotStatus::Full,
        _ => SlotStatus::PartiallyFilled,
    }
}
