//! Message timestamp value object.

use crate::{DomainError, Primitive, ValueObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;

/// The instant a chat message was sent, always in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SentAt(DateTime<Utc>);

impl SentAt {
    /// Creates a timestamp for the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Wraps an instant.
    #[must_use]
    pub const fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Returns the wrapped instant.
    #[must_use]
    pub const fn value(&self) -> DateTime<Utc> {
        self.0
    }

    /// Relative description such as "5 minutes ago", measured against `now`.
    #[must_use]
    pub fn display_time(&self, now: DateTime<Utc>) -> String {
        let seconds = (now - self.0).num_seconds();
        if seconds < MINUTE {
            return "just now".to_string();
        }

        let (count, unit) = if seconds < HOUR {
            (seconds / MINUTE, "minute")
        } else if seconds < DAY {
            (seconds / HOUR, "hour")
        } else if seconds < WEEK {
            (seconds / DAY, "day")
        } else {
            (seconds / WEEK, "week")
        };
        let plural = if count == 1 { "" } else { "s" };
        format!("{count} {unit}{plural} ago")
    }
}

impl fmt::Display for SentAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for SentAt {
    fn from(at: DateTime<Utc>) -> Self {
        Self(at)
    }
}

impl ValueObject for SentAt {
    fn to_primitive(&self) -> Result<Primitive, DomainError> {
        Ok(Primitive::Timestamp(self.0))
    }

    fn from_primitive(value: Primitive) -> Result<Self, DomainError> {
        DateTime::<Utc>::from_primitive(value).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_display_time_buckets() {
        let sent = SentAt::new(base());
        assert_eq!(sent.display_time(base() + Duration::seconds(30)), "just now");
        assert_eq!(sent.display_time(base() + Duration::minutes(1)), "1 minute ago");
        assert_eq!(sent.display_time(base() + Duration::minutes(5)), "5 minutes ago");
        assert_eq!(sent.display_time(base() + Duration::hours(3)), "3 hours ago");
        assert_eq!(sent.display_time(base() + Duration::days(1)), "1 day ago");
        assert_eq!(sent.display_time(base() + Duration::days(15)), "2 weeks ago");
    }

    #[test]
    fn test_naive_text_is_read_as_utc() {
        let sent = SentAt::from_primitive(Primitive::Text("2024-01-15T12:00:00".into())).unwrap();
        assert_eq!(sent.value(), base());
    }

    #[test]
    fn test_round_trip() {
        let sent = SentAt::new(base());
        assert_eq!(SentAt::from_primitive(sent.to_primitive().unwrap()).unwrap(), sent);
    }
}
