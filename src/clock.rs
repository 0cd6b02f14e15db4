use std::sync::RwLock;

use time::{Duration, OffsetDateTime};

/// Provides the current time to the allocation and quota subsystems
/// so that schedules can be driven deterministically in tests.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> OffsetDateTime;
}

/// A [`Clock`] backed by the system time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A [`Clock`] that only moves when told to.
pub struct ManualClock {
    now: RwLock<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(now: OffsetDateTime) -> Self {
        ManualClock {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: OffsetDateTime) {
        *self.now.write().expect("set time") = now;
    }

    pub fn advance(&self, duration: Duration) {
        *self.now.write().expect("advance time") += duration;
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> OffsetDateTime {
        *self.now.read().expect("read time")
    }
}

/// Milliseconds since the Unix epoch.
pub fn epoch_ms(instant: &OffsetDateTime) -> i64 {
    instant.unix_timestamp() * 1000 + i64::from(instant.millisecond())
}

/// The two-digit year used in generated codes.
pub fn two_digit_year(instant: &OffsetDateTime) -> String {
    format!("{:02}", instant.year() % 100)
}

/// Formats an instant as an RFC 3339 UTC timestamp with millisecond
/// precision, e.g. `2021-06-01T09:30:00.000Z`.
pub fn iso_timestamp(instant: &OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        instant.year(),
        instant.month(),
        instant.day(),
        instant.hour(),
        instant.minute(),
        instant.second(),
        instant.millisecond(),
    )
}
