use serde::Serialize;
use time::{Date, PrimitiveDateTime, Time};

use crate::core::config::AttendanceSettings;
use crate::db::types::VerdictTier;
use crate::services::duration_rules::{
    actual_minutes, expected_minutes, DurationRules, DurationStatus, PhotoKind,
};
use crate::services::geo::{distance_meters, GeoPoint};

/// Start and end photos further apart than this many radii are flagged.
const DRIFT_RADIUS_FACTOR: f64 = 2.0;

/// What could be read off one uploaded photo.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PhotoEvidence {
    pub(crate) gps: Option<GeoPoint>,
    pub(crate) taken_at: Option<PrimitiveDateTime>,
    /// Set when the photo failed the age check or could not be read.
    pub(crate) age_issue: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SessionEvidence {
    pub(crate) start: Option<PhotoEvidence>,
    pub(crate) end: Option<PhotoEvidence>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SlotContext {
    pub(crate) slot_date: Date,
    pub(crate) start_time: Time,
    pub(crate) end_time: Time,
    pub(crate) school: GeoPoint,
    pub(crate) radius_meters: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct ValidationPolicy {
    pub(crate) gps_required: bool,
    pub(crate) auto_approve_start_distance_meters: f64,
    pub(crate) duration: DurationRules,
}

impl ValidationPolicy {
    pub(crate) fn from_settings(settings: &AttendanceSettings) -> Self {
        Self {
            gps_required: settings.gps_required,
            auto_approve_start_distance_meters: settings.auto_approve_start_distance_meters,
            duration: DurationRules::from_settings(settings),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Finding {
    pub(crate) tier: VerdictTier,
    pub(crate) message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct SessionVerdict {
    pub(crate) tier: VerdictTier,
    pub(crate) findings: Vec<Finding>,
    pub(crate) start_distance_meters: Option<f64>,
    pub(crate) end_distance_meters: Option<f64>,
    pub(crate) drift_meters: Option<f64>,
    pub(crate) actual_minutes: Option<f64>,
    pub(crate) expected_minutes: f64,
    pub(crate) duration_percent: Option<f64>,
    pub(crate) duration_status: Option<DurationStatus>,
    pub(crate) auto_approve: bool,
    pub(crate) auto_reject: bool,
}

impl SessionVerdict {
    pub(crate) fn reasons(&self) -> Vec<String> {
        self.findings.iter().map(|finding| finding.message.clone()).collect()
    }
}

#[derive(Default)]
struct Findings(Vec<Finding>);

impl Findings {
    fn push(&mut self, tier: VerdictTier, message: impl Into<String>) {
        self.0.push(Finding { tier, message: message.into() });
    }

    fn worst(&self) -> VerdictTier {
        self.0.iter().map(|finding| finding.tier).max().unwrap_or(VerdictTier::Valid)
    }
}

/// Folds distance, timing and duration checks into one verdict. The worst
/// finding decides the tier, so a single reject outweighs everything else.
pub(crate) fn evaluate(
    evidence: &SessionEvidence,
    slot: &SlotContext,
    policy: &ValidationPolicy,
) -> SessionVerdict {
    let mut findings = Findings::default();
    let expected = expected_minutes(slot.start_time, slot.end_time);

    if evidence.start.is_none() {
        findings.push(VerdictTier::Reject, "Start photo is missing");
    }

    let start_distance = evidence
        .start
        .as_ref()
        .and_then(|photo| check_photo(photo, PhotoKind::Start, slot, policy, &mut findings));
    let end_distance = evidence
        .end
        .as_ref()
        .and_then(|photo| check_photo(photo, PhotoKind::End, slot, policy, &mut findings));

    let start_gps = evidence.start.as_ref().and_then(|photo| photo.gps);
    let end_gps = evidence.end.as_ref().and_then(|photo| photo.gps);
    let drift = start_gps.zip(end_gps).map(|(start, end)| distance_meters(start, end));
    if let Some(drift) = drift {
        if drift > DRIFT_RADIUS_FACTOR * slot.radius_meters {
            findings.push(
                VerdictTier::Warning,
                format!("Start and end photos are {drift:.0} m apart"),
            );
        }
    }

    let start_at = evidence.start.as_ref().and_then(|photo| photo.taken_at);
    let end_at = evidence.end.as_ref().and_then(|photo| photo.taken_at);
    let mut actual = None;
    let mut duration_percent = None;
    let mut duration_status = None;

    if let (Some(start_at), Some(end_at)) = (start_at, end_at) {
        let minutes = actual_minutes(start_at, end_at);
        actual = Some(minutes);

        if end_at <= start_at {
            findings.push(
                VerdictTier::Reject,
                "End photo timestamp must be after the start photo timestamp",
            );
        } else {
            let status = policy.duration.status(minutes, expected);
            duration_status = Some(status);
            if expected > 0.0 {
                duration_percent = Some(minutes / expected * 100.0);
            }

            match status {
                DurationStatus::Rejected => findings.push(
                    VerdictTier::Reject,
                    format!(
                        "Session lasted {minutes:.0} of {expected:.0} expected minutes, below half"
                    ),
                ),
                DurationStatus::Warning => findings.push(
                    VerdictTier::Warning,
                    format!(
                        "Session lasted {minutes:.0} of {expected:.0} expected minutes, below {:.0}%",
                        policy.duration.min_duration_percent
                    ),
                ),
                DurationStatus::Invalid => findings
                    .push(VerdictTier::ManualReview, "Slot has no positive scheduled duration"),
                DurationStatus::Verified | DurationStatus::Extended | DurationStatus::Short => {}
            }
        }
    }

    let tier = findings.worst();
    let gps_complete = start_gps.is_some() && end_gps.is_some();
    let auto_approve = tier == VerdictTier::Valid
        && evidence.start.is_some()
        && evidence.end.is_some()
        && (gps_complete || !policy.gps_required)
        && start_distance.is_some_and(|d| d <= policy.auto_approve_start_distance_meters)
        && end_distance.is_some_and(|d| d <= slot.radius_meters)
        && duration_percent.is_some_and(|p| p >= policy.duration.min_duration_percent);

    SessionVerdict {
        tier,
        findings: findings.0,
        start_distance_meters: start_distance,
        end_distance_meters: end_distance,
        drift_meters: drift,
        actual_minutes: actual,
        expected_minutes: expected,
        duration_percent,
        duration_status,
        auto_approve,
        auto_reject: tier == VerdictTier::Reject,
    }
}

/// Records the photo's own findings and returns its distance from the school
/// when it carried GPS.
fn check_photo(
    photo: &PhotoEvidence,
    kind: PhotoKind,
    slot: &SlotContext,
    policy: &ValidationPolicy,
    findings: &mut Findings,
) -> Option<f64> {
    let label = kind.label();

    let distance = photo.gps.map(|gps| distance_meters(slot.school, gps));
    match distance {
        Some(distance) if distance > slot.radius_meters => findings.push(
            VerdictTier::Reject,
            format!(
                "{label} photo is {distance:.0} m from the school (allowed {:.0} m)",
                slot.radius_meters
            ),
        ),
        Some(_) => {}
        None if policy.gps_required => {
            findings.push(VerdictTier::ManualReview, format!("{label} photo has no GPS location"))
        }
        None => {}
    }

    match photo.taken_at {
        Some(taken_at) => {
            let timing = policy.duration.validate_photo_timing(
                taken_at,
                slot.slot_date,
                slot.start_time,
                slot.end_time,
                kind,
            );
            for warning in timing.warnings {
                findings.push(VerdictTier::Warning, warning);
            }
            for error in timing.errors {
                findings.push(VerdictTier::ManualReview, error);
            }
        }
        None => findings.push(VerdictTier::Warning, format!("{label} photo has no capture time")),
    }

    if let Some(issue) = &photo.age_issue {
        findings.push(VerdictTier::Warning, format!("{label} photo: {issue}"));
    }

    distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime, time};

    const SCHOOL: GeoPoint = GeoPoint { latitude: 28.6139, longitude: 77.2090 };

    fn slot() -> SlotContext {
        SlotContext {
            slot_date: date!(2026 - 10 - 15),
            start_time: time!(09:00),
            end_time: time!(11:00),
            school: SCHOOL,
            radius_meters: 500.0,
        }
    }

    fn policy() -> ValidationPolicy {
        ValidationPolicy {
            gps_required: true,
            auto_approve_start_distance_meters: 100.0,
            duration: DurationRules {
                tolerance_minutes: 10.0,
                min_duration_percent: 80.0,
                max_minutes_before_slot: 15.0,
                max_minutes_after_slot: 30.0,
            },
        }
    }

    /// Roughly `meters` north of the school.
    fn north_of_school(meters: f64) -> GeoPoint {
        GeoPoint::new(SCHOOL.latitude + meters / 111_195.0, SCHOOL.longitude)
    }

    fn photo(meters: f64, taken_at: PrimitiveDateTime) -> PhotoEvidence {
        PhotoEvidence { gps: Some(north_of_school(meters)), taken_at: Some(taken_at), age_issue: None }
    }

    fn clean_session() -> SessionEvidence {
        SessionEvidence {
            start: Some(photo(20.0, datetime!(2026-10-15 08:58))),
            end: Some(photo(30.0, datetime!(2026-10-15 11:02))),
        }
    }

    #[test]
    fn clean_session_is_valid_and_auto_approved() {
        let verdict = evaluate(&clean_session(), &slot(), &policy());
        assert_eq!(verdict.tier, VerdictTier::Valid);
        assert!(verdict.findings.is_empty());
        assert!(verdict.auto_approve);
        assert!(!verdict.auto_reject);
        assert_eq!(verdict.expected_minutes, 120.0);
        assert_eq!(verdict.actual_minutes, Some(124.0));
        assert_eq!(verdict.duration_status, Some(DurationStatus::Verified));
    }

    #[test]
    fn missing_start_photo_is_rejected() {
        let evidence = SessionEvidence { start: None, ..clean_session() };
        let verdict = evaluate(&evidence, &slot(), &policy());
        assert_eq!(verdict.tier, VerdictTier::Reject);
        assert!(verdict.auto_reject);
        assert!(!verdict.auto_approve);
        assert_eq!(verdict.reasons(), vec!["Start photo is missing"]);
    }

    #[test]
    fn photo_outside_radius_rejects_even_when_everything_else_is_fine() {
        let mut evidence = clean_session();
        evidence.end = Some(photo(800.0, datetime!(2026-10-15 11:02)));

        let verdict = evaluate(&evidence, &slot(), &policy());
        assert_eq!(verdict.tier, VerdictTier::Reject);
        assert!(verdict.auto_reject);
        assert!(verdict.reasons().iter().any(|r| r.starts_with("End photo is")));
    }

    #[test]
    fn reject_dominates_manual_review_and_warnings() {
        let evidence = SessionEvidence {
            start: Some(PhotoEvidence {
                gps: None,
                taken_at: Some(datetime!(2026-10-15 08:30)),
                age_issue: Some("Photo is 9 days old (maximum 7)".to_string()),
            }),
            end: Some(photo(30.0, datetime!(2026-10-15 09:20))),
        };

        let verdict = evaluate(&evidence, &slot(), &policy());
        let tiers: Vec<VerdictTier> = verdict.findings.iter().map(|f| f.tier).collect();
        assert!(tiers.contains(&VerdictTier::ManualReview));
        assert!(tiers.contains(&VerdictTier::Warning));
        assert_eq!(verdict.tier, VerdictTier::Reject);
    }

    #[test]
    fn end_before_start_is_rejected() {
        let evidence = SessionEvidence {
            start: Some(photo(20.0, datetime!(2026-10-15 10:00))),
            end: Some(photo(20.0, datetime!(2026-10-15 09:30))),
        };

        let verdict = evaluate(&evidence, &slot(), &policy());
        assert_eq!(verdict.tier, VerdictTier::Reject);
        assert_eq!(verdict.actual_minutes, Some(-30.0));
        assert!(verdict
            .reasons()
            .contains(&"End photo timestamp must be after the start photo timestamp".to_string()));
    }

    #[test]
    fn missing_gps_when_required_needs_manual_review() {
        let mut evidence = clean_session();
        if let Some(end) = evidence.end.as_mut() {
            end.gps = None;
        }

        let verdict = evaluate(&evidence, &slot(), &policy());
        assert_eq!(verdict.tier, VerdictTier::ManualReview);
        assert!(!verdict.auto_approve);
        assert!(!verdict.auto_reject);
    }

    #[test]
    fn missing_gps_is_ignored_when_not_required() {
        let mut evidence = clean_session();
        if let Some(end) = evidence.end.as_mut() {
            end.gps = None;
        }
        let policy = ValidationPolicy { gps_required: false, ..policy() };

        let verdict = evaluate(&evidence, &slot(), &policy);
        assert_eq!(verdict.tier, VerdictTier::Valid);
        // end distance unknown, so no auto-approve
        assert!(!verdict.auto_approve);
    }

    #[test]
    fn short_but_above_half_is_a_warning() {
        let evidence = SessionEvidence {
            start: Some(photo(20.0, datetime!(2026-10-15 09:00))),
            end: Some(photo(20.0, datetime!(2026-10-15 10:30))),
        };

        let verdict = evaluate(&evidence, &slot(), &policy());
        assert_eq!(verdict.tier, VerdictTier::Warning);
        assert_eq!(verdict.duration_status, Some(DurationStatus::Warning));
        assert_eq!(verdict.duration_percent, Some(75.0));
    }

    #[test]
    fn exactly_half_duration_is_rejected() {
        let evidence = SessionEvidence {
            start: Some(photo(20.0, datetime!(2026-10-15 09:00))),
            end: Some(photo(20.0, datetime!(2026-10-15 10:00))),
        };

        let verdict = evaluate(&evidence, &slot(), &policy());
        assert_eq!(verdict.tier, VerdictTier::Reject);
        assert_eq!(verdict.duration_status, Some(DurationStatus::Rejected));
    }

    #[test]
    fn start_outside_auto_approve_distance_is_valid_but_not_auto_approved() {
        let mut evidence = clean_session();
        evidence.start = Some(photo(250.0, datetime!(2026-10-15 08:58)));

        let verdict = evaluate(&evidence, &slot(), &policy());
        assert_eq!(verdict.tier, VerdictTier::Valid);
        assert!(!verdict.auto_approve);
    }

    #[test]
    fn missing_end_photo_blocks_auto_approve() {
        let evidence = SessionEvidence { end: None, ..clean_session() };
        let verdict = evaluate(&evidence, &slot(), &policy());
        assert_eq!(verdict.tier, VerdictTier::Valid);
        assert!(!verdict.auto_approve);
        assert_eq!(verdict.actual_minutes, None);
    }

    #[test]
    fn missing_capture_time_is_a_warning() {
        let mut evidence = clean_session();
        if let Some(start) = evidence.start.as_mut() {
            start.taken_at = None;
        }

        let verdict = evaluate(&evidence, &slot(), &policy());
        assert_eq!(verdict.tier, VerdictTier::Warning);
        assert_eq!(verdict.actual_minutes, None);
        assert_eq!(verdict.reasons(), vec!["Start photo has no capture time"]);
        assert!(!verdict.auto_approve);
    }

    #[test]
    fn large_drift_between_photos_is_reported() {
        let evidence = SessionEvidence {
            start: Some(PhotoEvidence {
                gps: Some(GeoPoint::new(SCHOOL.latitude, SCHOOL.longitude - 0.004)),
                taken_at: Some(datetime!(2026-10-15 09:00)),
                age_issue: None,
            }),
            end: Some(PhotoEvidence {
                gps: Some(GeoPoint::new(SCHOOL.latitude, SCHOOL.longitude + 0.008)),
                taken_at: Some(datetime!(2026-10-15 11:00)),
                age_issue: None,
            }),
        };

        let verdict = evaluate(&evidence, &slot(), &policy());
        assert!(verdict.drift_meters.is_some_and(|d| d > 1000.0));
        assert!(verdict
            .findings
            .iter()
            .any(|f| f.tier == VerdictTier::Warning && f.message.contains("apart")));
        assert_eq!(verdict.tier, VerdictTier::Reject);
    }

    #[test]
    fn start_photo_after_slot_end_needs_manual_review() {
        let evidence = SessionEvidence {
            start: Some(photo(20.0, datetime!(2026-10-15 10:45))),
            end: Some(photo(20.0, datetime!(2026-10-15 12:00))),
        };
        let slot = SlotContext { end_time: time!(10:30), ..slot() };

        let verdict = evaluate(&evidence, &slot, &policy());
        assert_eq!(verdict.tier, VerdictTier::ManualReview);
        assert!(verdict.findings.iter().any(|f| f.tier == VerdictTier::ManualReview
            && f.message == "Start photo was taken after the slot ended"));
        assert!(!verdict.auto_reject);
    }
}
