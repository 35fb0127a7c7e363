//! Lenient parsing of the stored date/time columns.
//!
//! Tasks keep their scheduling fields in the wire format the store hands out
//! (`YYYY-MM-DD`, `HH:MM[:SS]`, RFC 3339). Everything here returns `Option` so a
//! malformed value degrades to "rule does not apply" instead of an error.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time};

use crate::clock::Zone;

/// Parse a calendar date in `YYYY-MM-DD` form.
#[must_use]
pub fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).ok()
}

/// Parse a time of day in `HH:MM` or `HH:MM:SS` form.
#[must_use]
pub fn parse_time_of_day(raw: &str) -> Option<Time> {
    let raw = raw.trim();
    Time::parse(raw, format_description!("[hour]:[minute]:[second]"))
        .or_else(|_| Time::parse(raw, format_description!("[hour]:[minute]")))
        .ok()
}

/// Parse a completion timestamp.
///
/// RFC 3339 values carry their own offset. Offset-less values
/// (`YYYY-MM-DDTHH:MM[:SS]`) are read as local wall-clock time in `zone`.
#[must_use]
pub fn parse_instant<Z: Zone + ?Sized>(raw: &str, zone: &Z) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(instant) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(instant);
    }
    let local = PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    )
    .or_else(|_| {
        PrimitiveDateTime::parse(raw, format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    })
    .ok()?;
    Some(assume_local(local, zone))
}

/// Render an instant the way completion timestamps are stored.
///
/// # Errors
/// Fails only for instants outside the RFC 3339 year range.
pub fn format_instant(instant: OffsetDateTime) -> Result<String, time::error::Format> {
    instant.format(&Rfc3339)
}

/// Build the local instant for a wall-clock `date` + `time`.
#[must_use]
pub fn combine<Z: Zone + ?Sized>(date: Date, time: Time, zone: &Z) -> OffsetDateTime {
    assume_local(PrimitiveDateTime::new(date, time), zone)
}

fn assume_local<Z: Zone + ?Sized>(local: PrimitiveDateTime, zone: &Z) -> OffsetDateTime {
    // Probe with the wall-clock reading as if it were UTC, then correct once the
    // real offset is known so DST boundaries resolve to the right side.
    let guess = zone.offset_at(local.assume_utc());
    let probe = local.assume_offset(guess);
    local.assume_offset(zone.offset_at(probe))
}

/// Whether a task is past due at `now`.
///
/// Without a due date a task is never overdue. With a due time the combined
/// local instant must be in the past; otherwise the due date must be before
/// today's local date. Unparsable values are not overdue.
#[must_use]
pub fn is_overdue<Z: Zone + ?Sized>(
    due_date: Option<&str>,
    due_time: Option<&str>,
    now: OffsetDateTime,
    zone: &Z,
) -> bool {
    let Some(date) = due_date.and_then(parse_date) else {
        return false;
    };
    match due_time {
        Some(raw) => parse_time_of_day(raw).is_some_and(|time| combine(date, time, zone) < now),
        None => zone.local_date(now).is_some_and(|today| date < today),
    }
}

/// Local weekday of `instant` numbered from Sunday (`0`) to Saturday (`6`).
#[must_use]
pub fn weekday_index<Z: Zone + ?Sized>(instant: OffsetDateTime, zone: &Z) -> Option<u8> {
    zone.to_local(instant)
        .map(|local| local.weekday().number_days_from_sunday())
}

/// Elapsed duration after which a completed one-off task is purged.
pub const AUTO_DELETE_AFTER: Duration = Duration::hours(24);

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use time::UtcOffset;
    use time::macros::{date, datetime, offset, time};

    #[test]
    fn parses_wire_formats() {
        assert_eq!(parse_date("2024-01-31"), Some(date!(2024-01-31)));
        assert_eq!(parse_date("2024-02-30"), None);
        assert_eq!(parse_date("tomorrow"), None);
        assert_eq!(parse_time_of_day("09:30"), Some(time!(09:30)));
        assert_eq!(parse_time_of_day("09:30:15"), Some(time!(09:30:15)));
        assert_eq!(parse_time_of_day("25:00"), None);
    }

    #[test]
    fn instants_with_offsets_are_taken_verbatim() {
        let zone = offset!(+9);
        assert_eq!(
            parse_instant("2024-01-01T23:00:00.123+00:00", &zone),
            Some(datetime!(2024-01-01 23:00:00.123 UTC))
        );
        assert_eq!(
            parse_instant("2024-01-01T23:00:00Z", &zone),
            Some(datetime!(2024-01-01 23:00 UTC))
        );
    }

    #[test]
    fn offsetless_instants_are_local() {
        let zone = offset!(-5);
        assert_eq!(
            parse_instant("2024-01-01T23:00", &zone),
            Some(datetime!(2024-01-01 23:00 -5))
        );
        assert_eq!(parse_instant("not a date", &zone), None);
    }

    #[test]
    fn formatted_instants_parse_back() {
        let instant = datetime!(2024-06-01 08:15:00 +2);
        let raw = format_instant(instant).expect("format");
        assert_eq!(parse_instant(&raw, &UtcOffset::UTC), Some(instant));
    }

    #[test]
    fn overdue_with_and_without_time() {
        let zone = offset!(+1);
        let now = datetime!(2024-05-10 12:00 +1);
        assert!(!is_overdue(None, Some("08:00"), now, &zone));
        assert!(is_overdue(Some("2024-05-10"), Some("11:59"), now, &zone));
        assert!(!is_overdue(Some("2024-05-10"), Some("12:01"), now, &zone));
        assert!(!is_overdue(Some("2024-05-10"), None, now, &zone));
        assert!(is_overdue(Some("2024-05-09"), None, now, &zone));
        assert!(!is_overdue(Some("garbage"), None, now, &zone));
    }

    #[test]
    fn weekday_is_local() {
        // Tuesday 23:30 UTC is Wednesday in UTC+2.
        let instant = datetime!(2024-01-02 23:30 UTC);
        assert_eq!(weekday_index(instant, &UtcOffset::UTC), Some(2));
        assert_eq!(weekday_index(instant, &offset!(+2)), Some(3));
    }
}
