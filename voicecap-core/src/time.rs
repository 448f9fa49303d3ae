//! A single instant type used everywhere: timezone-aware UTC.
//!
//! Spec §9 design note 1 flags the source's mixed Unix-number /
//! ISO-string timestamp storage as a defect to fix. We store and compare
//! everything as `chrono::DateTime<Utc>`; anything read from an external
//! boundary (wire JSON, a legacy column) is normalized here before it
//! touches any comparison.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Normalize a timestamp that may be naive (no zone info) to UTC.
///
/// Per spec §4.L rule 5: "Implementations MUST normalize any stored
/// timestamp lacking zone information to UTC before subtraction."
pub fn normalize_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    naive.and_utc()
}

/// Current instant, as the single type used for every comparison in the
/// processor and scheduler.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_attaches_utc_zone() {
        let naive = NaiveDateTime::parse_from_str("2026-01-01 00:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let dt = normalize_utc(naive);
        assert_eq!(dt.timezone(), Utc);
    }
}
