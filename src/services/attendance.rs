use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::core::config::AttendanceSettings;
use crate::core::time::wall_clock;
use crate::db::types::TeachingSessionStatus;
use crate::repositories::store::AttendanceStore;
use crate::repositories::teaching_sessions::SessionVerdictUpdate;
use crate::services::geo::GeoPoint;
use crate::services::photo_metadata;
use crate::services::session_validation::{
    evaluate, PhotoEvidence, SessionEvidence, SessionVerdict, SlotContext, ValidationPolicy,
};

#[derive(Debug, Error)]
pub(crate) enum AttendanceError {
    #[error("teaching session not found")]
    SessionNotFound,
    #[error("slot not found")]
    SlotNotFound,
    #[error("school location not found")]
    SchoolNotFound,
    #[error("teaching session is cancelled")]
    SessionCancelled,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SessionValidationOutcome {
    pub(crate) session_id: String,
    pub(crate) status: TeachingSessionStatus,
    pub(crate) verdict: SessionVerdict,
}

/// Reads both photos of a teaching session, runs the verdict engine and
/// writes the result back. Auto-approved sessions become `approved`,
/// auto-rejected ones `rejected`; everything else waits for a reviewer.
///
/// Photo times are compared in the schools' wall clock
/// (`settings.utc_offset`); `validated_at` is stored in UTC.
pub(crate) async fn validate_teaching_session(
    store: &dyn AttendanceStore,
    settings: &AttendanceSettings,
    session_id: &str,
    now: OffsetDateTime,
) -> Result<SessionValidationOutcome, AttendanceError> {
    let local_now = wall_clock(now, settings.utc_offset);
    let session =
        store.find_teaching_session(session_id).await?.ok_or(AttendanceError::SessionNotFound)?;
    if session.status == TeachingSessionStatus::Cancelled {
        return Err(AttendanceError::SessionCancelled);
    }

    let slot = store.find_slot(&session.slot_id).await?.ok_or(AttendanceError::SlotNotFound)?;
    let school = store.find_school(&slot.school_id).await?.ok_or(AttendanceError::SchoolNotFound)?;

    let evidence = SessionEvidence {
        start: photo_evidence(session.start_photo_path.as_deref(), settings, local_now).await,
        end: photo_evidence(session.end_photo_path.as_deref(), settings, local_now).await,
    };
    let context = SlotContext {
        slot_date: slot.slot_date,
        start_time: slot.start_time,
        end_time: slot.end_time,
        school: GeoPoint::new(school.latitude, school.longitude),
        radius_meters: school.radius_meters.unwrap_or(settings.default_radius_meters),
    };

    let verdict = evaluate(&evidence, &context, &ValidationPolicy::from_settings(settings));
    let status = if verdict.auto_approve {
        TeachingSessionStatus::Approved
    } else if verdict.auto_reject {
        TeachingSessionStatus::Rejected
    } else {
        TeachingSessionStatus::PhotoSubmitted
    };

    let start_gps = evidence.start.as_ref().and_then(|photo| photo.gps);
    let end_gps = evidence.end.as_ref().and_then(|photo| photo.gps);
    let update = SessionVerdictUpdate {
        start_latitude: start_gps.map(|gps| gps.latitude),
        start_longitude: start_gps.map(|gps| gps.longitude),
        start_distance_meters: verdict.start_distance_meters,
        start_taken_at: evidence.start.as_ref().and_then(|photo| photo.taken_at),
        end_latitude: end_gps.map(|gps| gps.latitude),
        end_longitude: end_gps.map(|gps| gps.longitude),
        end_distance_meters: verdict.end_distance_meters,
        end_taken_at: evidence.end.as_ref().and_then(|photo| photo.taken_at),
        actual_duration_minutes: verdict.actual_minutes,
        expected_duration_minutes: Some(verdict.expected_minutes),
        status,
        verdict: verdict.tier,
        reasons: verdict.reasons(),
        validated_at: wall_clock(now, UtcOffset::UTC),
    };
    store.record_session_verdict(&session.id, &update).await?;

    metrics::counter!("session_verdicts_total", "tier" => verdict.tier.as_str()).increment(1);
    tracing::info!(
        session_id = %session.id,
        slot_id = %slot.id,
        tier = verdict.tier.as_str(),
        auto_approve = verdict.auto_approve,
        auto_reject = verdict.auto_reject,
        findings = verdict.findings.len(),
        "Teaching session validated"
    );

    Ok(SessionValidationOutcome { session_id: session.id, status, verdict })
}

/// Unreadable photos still count as submitted; the read error is reported as
/// a finding instead of failing the whole validation.
async fn photo_evidence(
    path: Option<&str>,
    settings: &AttendanceSettings,
    now: PrimitiveDateTime,
) -> Option<PhotoEvidence> {
    let path = path.filter(|value| !value.trim().is_empty())?;

    match photo_metadata::load(Path::new(path), settings.utc_offset).await {
        Ok(metadata) => {
            let age = photo_metadata::validate_age(&metadata, settings.max_photo_age_days, now);
            Some(PhotoEvidence {
                gps: metadata.gps.map(|gps| GeoPoint::new(gps.latitude, gps.longitude)),
                taken_at: metadata.taken_at,
                age_issue: if age.valid { None } else { age.error },
            })
        }
        Err(err) => {
            tracing::warn!(path, error = %err, "Failed to read teaching session photo");
            Some(PhotoEvidence { age_issue: Some(err.to_string()), ..PhotoEvidence::default() })
        }
    }
}
