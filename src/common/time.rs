//! Time utilities with a clock abstraction for testability.

use chrono::{DateTime, Utc};

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Current Unix timestamp in milliseconds (UTC)
    fn now_millis(&self) -> i64;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        epoch_millis()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: i64,
}

impl FixedClock {
    /// Create a new fixed clock with the given timestamp
    pub fn new(fixed_time_millis: i64) -> Self {
        Self {
            fixed_time: fixed_time_millis,
        }
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.fixed_time
    }
}

/// Current Unix timestamp in milliseconds (UTC)
pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert a Unix timestamp (milliseconds) to RFC 3339 format
pub fn millis_to_rfc3339(timestamp_millis: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(timestamp_millis) {
        Some(dt) => dt.to_rfc3339(),
        None => "invalid-timestamp".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_returns_non_zero_timestamp() {
        let clock = SystemClock;

        let timestamp = clock.now_millis();

        assert!(timestamp > 0);
    }

    #[test]
    fn fixed_clock_returns_fixed_timestamp() {
        let fixed_time = 1234567890123;
        let clock = FixedClock::new(fixed_time);

        assert_eq!(clock.now_millis(), fixed_time);
        assert_eq!(clock.now_millis(), fixed_time);
    }

    #[test]
    fn millis_to_rfc3339_formats_utc() {
        // 2023-01-01 00:00:00 UTC in milliseconds
        let timestamp = 1672531200000;

        let result = millis_to_rfc3339(timestamp);

        assert!(result.starts_with("2023-01-01T00:00:00"));
        assert!(result.ends_with("+00:00"));
    }

    #[test]
    fn millis_to_rfc3339_rejects_out_of_range() {
        let result = millis_to_rfc3339(i64::MAX);

        assert_eq!(result, "invalid-timestamp");
    }
}
