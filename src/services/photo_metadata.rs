use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use exif::{Exif, In, Tag, Value};
use serde::Serialize;
use thiserror::Error;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::core::time::wall_clock;

#[derive(Debug, Error)]
pub(crate) enum MetadataError {
    #[error("photo metadata not found: {0}")]
    NotFound(String),
    #[error("photo could not be read: {0}")]
    Unreadable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct GpsCoordinates {
    pub(crate) latitude: f64,
    pub(crate) longitude: f64,
    pub(crate) altitude: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum TimestampSource {
    Original,
    Modified,
    FileSystem,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct PhotoMetadata {
    pub(crate) gps: Option<GpsCoordinates>,
    pub(crate) taken_at: Option<PrimitiveDateTime>,
    pub(crate) timestamp_source: Option<TimestampSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct AgeCheck {
    pub(crate) valid: bool,
    pub(crate) days_diff: Option<i64>,
    pub(crate) error: Option<String>,
}

/// Reads GPS and capture time from a photo on disk. Runs on the blocking pool.
pub(crate) async fn load(path: &Path, offset: UtcOffset) -> Result<PhotoMetadata, MetadataError> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_metadata(&path, offset))
        .await
        .map_err(|err| MetadataError::Unreadable(format!("metadata task failed: {err}")))?
}

/// GPS position and capture time. The capture time prefers the EXIF original
/// timestamp, then the EXIF modification timestamp, then the file's mtime,
/// and is returned as wall time at `offset`. A photo without EXIF data still
/// yields a result; only an unreadable file is an error.
pub(crate) fn read_metadata(
    path: &Path,
    offset: UtcOffset,
) -> Result<PhotoMetadata, MetadataError> {
    let exif = match read_exif(path) {
        Ok(exif) => Some(exif),
        Err(MetadataError::NotFound(_)) => None,
        Err(err) => return Err(err),
    };

    let gps = exif.as_ref().and_then(gps_from_exif);
    let exif_timestamp = exif.as_ref().and_then(|exif| timestamp_from_exif(exif, offset));
    let (taken_at, timestamp_source) = match exif_timestamp {
        Some((taken_at, source)) => (Some(taken_at), Some(source)),
        None => match file_modified(path, offset) {
            Some(modified) => (Some(modified), Some(TimestampSource::FileSystem)),
            None => (None, None),
        },
    };

    Ok(PhotoMetadata { gps, taken_at, timestamp_source })
}

/// Fails when the capture time is unknown, in the future, or older than
/// `max_age_days`.
pub(crate) fn validate_age(
    metadata: &PhotoMetadata,
    max_age_days: i64,
    now: PrimitiveDateTime,
) -> AgeCheck {
    match metadata.taken_at {
        Some(taken_at) => check_age(taken_at, now, max_age_days),
        None => AgeCheck {
            valid: false,
            days_diff: None,
            error: Some("Could not determine when the photo was taken".to_string()),
        },
    }
}

pub(crate) fn check_age(
    taken_at: PrimitiveDateTime,
    now: PrimitiveDateTime,
    max_age_days: i64,
) -> AgeCheck {
    if taken_at > now {
        return AgeCheck {
            valid: false,
            days_diff: None,
            error: Some("Photo timestamp is in the future".to_string()),
        };
    }

    let days = (now - taken_at).whole_days();
    if days > max_age_days {
        return AgeCheck {
            valid: false,
            days_diff: Some(days),
            error: Some(format!("Photo is {days} days old (maximum {max_age_days})")),
        };
    }

    AgeCheck { valid: true, days_diff: Some(days), error: None }
}

fn read_exif(path: &Path) -> Result<Exif, MetadataError> {
    let file = File::open(path)
        .map_err(|err| MetadataError::Unreadable(format!("{}: {err}", path.display())))?;
    let mut reader = BufReader::new(file);
    exif::Reader::new()
        .read_from_container(&mut reader)
        .map_err(|err| MetadataError::NotFound(format!("no EXIF data in {}: {err}", path.display())))
}

fn gps_from_exif(exif: &Exif) -> Option<GpsCoordinates> {
    let latitude = coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef)?;
    let longitude = coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef)?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }

    let below_sea_level = exif
        .get_field(Tag::GPSAltitudeRef, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .is_some_and(|value| value == 1);
    let altitude = field_numbers(exif, Tag::GPSAltitude)
        .and_then(|values| values.first().copied())
        .map(|altitude| if below_sea_level { -altitude } else { altitude });

    Some(GpsCoordinates { latitude, longitude, altitude })
}

fn coordinate(exif: &Exif, tag: Tag, reference_tag: Tag) -> Option<f64> {
    let parts = field_numbers(exif, tag)?;
    let reference = field_text(exif, reference_tag).unwrap_or_default();
    dms_to_decimal(&parts, &reference)
}

fn timestamp_from_exif(
    exif: &Exif,
    offset: UtcOffset,
) -> Option<(PrimitiveDateTime, TimestampSource)> {
    [
        (Tag::DateTimeOriginal, Tag::OffsetTimeOriginal, TimestampSource::Original),
        (Tag::DateTime, Tag::OffsetTime, TimestampSource::Modified),
    ]
    .into_iter()
    .find_map(|(tag, offset_tag, source)| {
        let taken_at = field_text(exif, tag).and_then(|raw| parse_exif_datetime(&raw))?;
        let camera = field_text(exif, offset_tag).and_then(|raw| parse_exif_offset(&raw));
        Some((to_local_time(taken_at, camera, offset), source))
    })
}

fn file_modified(path: &Path, offset: UtcOffset) -> Option<PrimitiveDateTime> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(wall_clock(OffsetDateTime::from(modified), offset))
}

/// Moves a camera reading recorded at `camera` offset to wall time at
/// `offset`. Without a recorded offset the camera clock is taken to be
/// already set to `offset`.
pub(crate) fn to_local_time(
    taken_at: PrimitiveDateTime,
    camera: Option<UtcOffset>,
    offset: UtcOffset,
) -> PrimitiveDateTime {
    match camera {
        Some(camera) => wall_clock(taken_at.assume_offset(camera), offset),
        None => taken_at,
    }
}

fn field_numbers(exif: &Exif, tag: Tag) -> Option<Vec<f64>> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let numbers: Vec<f64> = match &field.value {
        Value::Rational(items) => items.iter().map(|item| item.to_f64()).collect(),
        Value::SRational(items) => items.iter().map(|item| item.to_f64()).collect(),
        Value::Ascii(items) => items
            .iter()
            .flat_map(|item| {
                String::from_utf8_lossy(item)
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|part| !part.is_empty())
                    .map(parse_rational)
                    .collect::<Vec<_>>()
            })
            .collect::<Option<Vec<f64>>>()?,
        other => (0..).map_while(|index| other.get_uint(index)).map(f64::from).collect(),
    };

    (!numbers.is_empty() && numbers.iter().all(|value| value.is_finite())).then_some(numbers)
}

fn field_text(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(items) => items
            .first()
            .map(|item| String::from_utf8_lossy(item).trim_matches(char::from(0)).trim().to_string())
            .filter(|text| !text.is_empty()),
        _ => None,
    }
}

/// `"num/den"` or a plain number. A zero denominator is rejected.
pub(crate) fn parse_rational(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let value = match raw.split_once('/') {
        Some((numerator, denominator)) => {
            let numerator = numerator.trim().parse::<f64>().ok()?;
            let denominator = denominator.trim().parse::<f64>().ok()?;
            if denominator == 0.0 {
                return None;
            }
            numerator / denominator
        }
        None => raw.parse::<f64>().ok()?,
    };
    value.is_finite().then_some(value)
}

/// Degrees, minutes, seconds to signed decimal degrees; `S` and `W` are negative.
pub(crate) fn dms_to_decimal(parts: &[f64], reference: &str) -> Option<f64> {
    let degrees = *parts.first()?;
    let minutes = parts.get(1).copied().unwrap_or(0.0);
    let seconds = parts.get(2).copied().unwrap_or(0.0);
    let value = degrees + minutes / 60.0 + seconds / 3600.0;
    if !value.is_finite() {
        return None;
    }

    match reference.trim().to_ascii_uppercase().as_str() {
        "S" | "W" => Some(-value),
        _ => Some(value),
    }
}

pub(crate) fn parse_exif_datetime(raw: &str) -> Option<PrimitiveDateTime> {
    let format = format_description!("[year]:[month]:[day] [hour]:[minute]:[second]");
    PrimitiveDateTime::parse(raw.trim(), &format).ok()
}

/// EXIF `OffsetTime*` values look like `+05:30`; blank ones are `"   :  "`.
pub(crate) fn parse_exif_offset(raw: &str) -> Option<UtcOffset> {
    let format = format_description!("[offset_hour sign:mandatory]:[offset_minute]");
    UtcOffset::parse(raw.trim(), &format).ok()
}
