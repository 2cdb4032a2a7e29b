//! Lenient parsing of requested release times.
//!
//! Requested times arrive as free-form strings from clients. Anything that
//! cannot be parsed, or that lies in the past, resolves to `now + default_delay`
//! instead of being rejected.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Naive formats accepted in addition to RFC 3339. Interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// How a requested release time was turned into a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineSource {
    /// The requested time parsed and lies in the future.
    Requested,
    /// The requested time parsed but is not in the future.
    PastFallback,
    /// The requested time did not parse.
    UnparseableFallback,
}

/// Result of resolving a requested release time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDeadline {
    pub deadline: DateTime<Utc>,
    pub source: DeadlineSource,
}

impl ResolvedDeadline {
    /// Whether the default delay was used instead of the requested time.
    pub fn is_fallback(&self) -> bool {
        self.source != DeadlineSource::Requested
    }
}

/// Parses a release time in RFC 3339 or one of the naive minute/second formats.
pub fn parse_release_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Resolves a requested release time against `now`.
pub fn resolve_deadline(raw: &str, now: DateTime<Utc>, default_delay: Duration) -> ResolvedDeadline {
    match parse_release_time(raw) {
        Some(requested) if requested > now => ResolvedDeadline {
            deadline: requested,
            source: DeadlineSource::Requested,
        },
        Some(_) => ResolvedDeadline {
            deadline: now + default_delay,
            source: DeadlineSource::PastFallback,
        },
        None => ResolvedDeadline {
            deadline: now + default_delay,
            source: DeadlineSource::UnparseableFallback,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 5, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_rfc3339() {
        let parsed = parse_release_time("2030-05-01T12:30:00Z").unwrap();
        assert_eq!(parsed, at(12, 30));
    }

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let parsed = parse_release_time("2030-05-01T14:30:00+02:00").unwrap();
        assert_eq!(parsed, at(12, 30));
    }

    #[test]
    fn test_parse_datetime_local_format() {
        // Shape produced by <input type="datetime-local">
        let parsed = parse_release_time("2030-05-01T12:30").unwrap();
        assert_eq!(parsed, at(12, 30));
    }

    #[test]
    fn test_parse_storage_format() {
        let parsed = parse_release_time("2030-05-01 12:30:00").unwrap();
        assert_eq!(parsed, at(12, 30));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_release_time("not-a-date").is_none());
        assert!(parse_release_time("").is_none());
        assert!(parse_release_time("   ").is_none());
        assert!(parse_release_time("2030-13-45T99:99").is_none());
    }

    #[test]
    fn test_resolve_future_time_is_kept() {
        let now = at(12, 0);
        let resolved = resolve_deadline("2030-05-01T12:30", now, Duration::minutes(1));
        assert_eq!(resolved.deadline, at(12, 30));
        assert_eq!(resolved.source, DeadlineSource::Requested);
        assert!(!resolved.is_fallback());
    }

    #[test]
    fn test_resolve_past_time_falls_back() {
        let now = at(12, 0);
        let resolved = resolve_deadline("2030-05-01T11:00", now, Duration::minutes(1));
        assert_eq!(resolved.deadline, at(12, 1));
        assert_eq!(resolved.source, DeadlineSource::PastFallback);
    }

    #[test]
    fn test_resolve_now_is_not_future() {
        let now = at(12, 0);
        let resolved = resolve_deadline("2030-05-01T12:00", now, Duration::minutes(1));
        assert!(resolved.is_fallback());
    }

    #[test]
    fn test_resolve_malformed_falls_back() {
        let now = at(12, 0);
        let resolved = resolve_deadline("not-a-date", now, Duration::minutes(1));
        assert_eq!(resolved.deadline, at(12, 1));
        assert_eq!(resolved.source, DeadlineSource::UnparseableFallback);
    }
}
