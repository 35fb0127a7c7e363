//! Injectable time source and local calendar boundaries.

use std::sync::{Arc, Mutex, PoisonError};

use time::{Date, Duration, OffsetDateTime, UtcOffset};

/// Maps an instant to the UTC offset of the user's local time at that instant.
///
/// Calendar-day rules (daily reset, weekday visibility, overdue dates) are
/// evaluated in this zone, never in UTC.
pub trait Zone {
    /// Offset in effect at `instant`.
    fn offset_at(&self, instant: OffsetDateTime) -> UtcOffset;

    /// Convert `instant` to local wall-clock time.
    ///
    /// `None` when the local reading falls outside the representable years.
    fn to_local(&self, instant: OffsetDateTime) -> Option<OffsetDateTime> {
        instant.checked_to_offset(self.offset_at(instant))
    }

    /// Local calendar date containing `instant`.
    fn local_date(&self, instant: OffsetDateTime) -> Option<Date> {
        self.to_local(instant).map(OffsetDateTime::date)
    }
}

impl Zone for UtcOffset {
    fn offset_at(&self, _instant: OffsetDateTime) -> UtcOffset {
        *self
    }
}

/// Supplies the current instant together with the local zone.
pub trait Clock: Zone + Send + Sync {
    /// Current instant.
    fn now(&self) -> OffsetDateTime;

    /// Today's local calendar date.
    fn today(&self) -> Date {
        let now = self.now();
        self.local_date(now).unwrap_or_else(|| now.date())
    }
}

impl<C: Clock + ?Sized> Zone for Arc<C> {
    fn offset_at(&self, instant: OffsetDateTime) -> UtcOffset {
        (**self).offset_at(instant)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> OffsetDateTime {
        (**self).now()
    }
}

/// Wall clock of the running process.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    fixed: Option<UtcOffset>,
    fallback: UtcOffset,
}

impl SystemClock {
    /// Clock evaluating calendar rules in the process's local time zone.
    ///
    /// The offset is looked up per instant so DST transitions are honoured. When
    /// the platform refuses to report it, the offset observed at construction
    /// (or UTC) is used instead; construct this before spawning threads.
    #[must_use]
    pub fn local() -> Self {
        Self {
            fixed: None,
            fallback: UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        }
    }

    /// Clock evaluating calendar rules in a fixed offset.
    #[must_use]
    pub const fn fixed(offset: UtcOffset) -> Self {
        Self {
            fixed: Some(offset),
            fallback: offset,
        }
    }
}

impl Zone for SystemClock {
    fn offset_at(&self, instant: OffsetDateTime) -> UtcOffset {
        self.fixed.unwrap_or_else(|| {
            UtcOffset::local_offset_at(instant).unwrap_or(self.fallback)
        })
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<OffsetDateTime>,
    offset: UtcOffset,
}

impl FixedClock {
    /// Clock frozen at `now`, reporting local time in `offset`.
    #[must_use]
    pub const fn new(now: OffsetDateTime, offset: UtcOffset) -> Self {
        Self {
            now: Mutex::new(now),
            offset,
        }
    }

    /// Move the clock to `now`.
    pub fn set(&self, now: OffsetDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += by;
    }
}

impl Zone for FixedClock {
    fn offset_at(&self, _instant: OffsetDateTime) -> UtcOffset {
        self.offset
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
