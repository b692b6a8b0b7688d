use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    wall_clock(OffsetDateTime::now_utc(), UtcOffset::UTC)
}

/// Wall-clock reading of `instant` at `offset`.
pub(crate) fn wall_clock(instant: OffsetDateTime, offset: UtcOffset) -> PrimitiveDateTime {
    let local = instant.to_offset(offset);
    PrimitiveDateTime::new(local.date(), local.time())
}

/// Start and end instants of a slot on `date`. An end time earlier than the
/// start time belongs to the following day.
pub(crate) fn slot_bounds(
    date: Date,
    start: Time,
    end: Time,
) -> (PrimitiveDateTime, PrimitiveDateTime) {
    let slot_start = PrimitiveDateTime::new(date, start);
    let mut slot_end = PrimitiveDateTime::new(date, end);
    if end < start {
        slot_end += Duration::days(1);
    }
    (slot_start, slot_end)
}

/// Signed fractional minutes from `from` to `to`.
pub(crate) fn minutes_between(from: PrimitiveDateTime, to: PrimitiveDateTime) -> f64 {
    (to - from).as_seconds_f64() / 60.0
}
