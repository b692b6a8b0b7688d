use serde::Serialize;
use time::{Date, PrimitiveDateTime, Time};

use crate::core::config::AttendanceSettings;
use crate::core::time::{minutes_between, slot_bounds};

const MINUTES_PER_DAY: f64 = 1440.0;

/// Sessions at or below this share of the expected duration are rejected.
pub(crate) const REJECT_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum DurationStatus {
    Verified,
    Extended,
    Short,
    Warning,
    Rejected,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum PhotoKind {
    Start,
    End,
}

impl PhotoKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::End => "End",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct TimingCheck {
    pub(crate) valid: bool,
    pub(crate) warnings: Vec<String>,
    pub(crate) errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct DurationRules {
    pub(crate) tolerance_minutes: f64,
    pub(crate) min_duration_percent: f64,
    pub(crate) max_minutes_before_slot: f64,
    pub(crate) max_minutes_after_slot: f64,
}

impl DurationRules {
    pub(crate) fn from_settings(settings: &AttendanceSettings) -> Self {
        Self {
            tolerance_minutes: settings.tolerance_minutes as f64,
            min_duration_percent: settings.min_duration_percent,
            max_minutes_before_slot: settings.max_minutes_before_slot as f64,
            max_minutes_after_slot: settings.max_minutes_after_slot as f64,
        }
    }

    pub(crate) fn status(&self, actual: f64, expected: f64) -> DurationStatus {
        if actual < 0.0 || expected <= 0.0 {
            return DurationStatus::Invalid;
        }

        let ratio = actual / expected;
        if ratio <= REJECT_RATIO {
            return DurationStatus::Rejected;
        }
        if ratio * 100.0 < self.min_duration_percent {
            return DurationStatus::Warning;
        }

        let difference = actual - expected;
        if difference.abs() <= self.tolerance_minutes {
            DurationStatus::Verified
        } else if difference > self.tolerance_minutes {
            DurationStatus::Extended
        } else {
            DurationStatus::Short
        }
    }

    /// Checks one photo's capture time against its slot. Lateness and
    /// earliness beyond the configured margins are warnings; a start photo
    /// after the slot ended or an end photo before it started is an error.
    pub(crate) fn validate_photo_timing(
        &self,
        taken_at: PrimitiveDateTime,
        slot_date: Date,
        slot_start: Time,
        slot_end: Time,
        kind: PhotoKind,
    ) -> TimingCheck {
        let (start, end) = slot_bounds(slot_date, slot_start, slot_end);
        let mut check = TimingCheck::default();

        let photo_date = taken_at.date();
        let overnight_date = (slot_end < slot_start).then(|| slot_date.next_day()).flatten();
        if photo_date != slot_date && Some(photo_date) != overnight_date {
            check.warnings.push(format!(
                "{} photo was taken on {photo_date}, but the slot is on {slot_date}",
                kind.label()
            ));
        }

        match kind {
            PhotoKind::Start => {
                let early = minutes_between(taken_at, start);
                if early > self.max_minutes_before_slot {
                    check.warnings.push(format!(
                        "Start photo was taken {early:.0} minutes before the slot started (allowed {:.0})",
                        self.max_minutes_before_slot
                    ));
                }
                if taken_at > end {
                    check.errors.push("Start photo was taken after the slot ended".to_string());
                }
            }
            PhotoKind::End => {
                let late = minutes_between(end, taken_at);
                if late > self.max_minutes_after_slot {
                    check.warnings.push(format!(
                        "End photo was taken {late:.0} minutes after the slot ended (allowed {:.0})",
                        self.max_minutes_after_slot
                    ));
                }
                if taken_at < start {
                    check.errors.push("End photo was taken before the slot started".to_string());
                }
            }
        }

        check.valid = check.errors.is_empty();
        check
    }
}

/// Scheduled length of a slot; an end earlier than the start wraps past midnight.
pub(crate) fn expected_minutes(slot_start: Time, slot_end: Time) -> f64 {
    let minutes = (slot_end - slot_start).as_seconds_f64() / 60.0;
    if slot_end < slot_start {
        minutes + MINUTES_PER_DAY
    } else {
        minutes
    }
}

/// Negative when the end photo predates the start photo.
pub(crate) fn actual_minutes(start: PrimitiveDateTime, end: PrimitiveDateTime) -> f64 {
    minutes_between(start, end)
}
