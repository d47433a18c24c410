//! Core types shared across the coupler workflow engine.

/// JobId: Integer identity of a result within one results database
pub type JobId = u64;

/// Timestamp: Nanoseconds since the Unix epoch
pub type Timestamp = i64;

/// Name of the per-result index file stored inside every result directory
pub const RESULT_INDEX_FILE: &str = ".result_info.json";

/// Default run name when the caller does not supply one
pub const DEFAULT_RUN_NAME: &str = "Workflow";

/// Current wall-clock time as nanoseconds since the Unix epoch
pub fn now_ns() -> Timestamp {
    timestamp_ns(chrono::Utc::now())
}

/// Nanoseconds since the Unix epoch, saturating outside the representable range
/// (years before 1677 or after 2262)
pub fn timestamp_ns(time: chrono::DateTime<chrono::Utc>) -> Timestamp {
    time.timestamp_nanos_opt().unwrap_or(if time.timestamp() < 0 {
        Timestamp::MIN
    } else {
        Timestamp::MAX
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_timestamp_ns_in_range() {
        let time = Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(timestamp_ns(time), 1_646_092_800_000_000_000);
        assert!(now_ns() > 1_646_092_800_000_000_000);
    }

    #[test]
    fn test_timestamp_ns_saturates() {
        let far_future = Utc.with_ymd_and_hms(2300, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(timestamp_ns(far_future), Timestamp::MAX);
        let far_past = Utc.with_ymd_and_hms(1600, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(timestamp_ns(far_past), Timestamp::MIN);
    }
}
