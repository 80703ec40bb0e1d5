/// Clock and epoch helpers
///
/// Token timestamps are whole seconds since the Unix epoch (RFC 7519 NumericDate).
/// Every "now" read in the crate goes through a `Clock` so tests can pin time.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use std::fmt;
use std::sync::RwLock;

/// Source of the current UTC time
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by `chrono::Utc::now`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        aware_utcnow()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Start at the given epoch second
    pub fn at_epoch(seconds: i64) -> Self {
        Self::new(datetime_from_epoch(seconds).unwrap_or_else(aware_utcnow))
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        match self.now.write() {
            Ok(mut guard) => *guard = instant,
            Err(poisoned) => *poisoned.into_inner() = instant,
        }
    }

    pub fn advance(&self, by: Duration) {
        let current = self.now();
        self.set(current + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Timezone-aware current time in UTC
pub fn aware_utcnow() -> DateTime<Utc> {
    Utc::now()
}

/// Truncates to whole seconds since the epoch
pub fn datetime_to_epoch(instant: DateTime<Utc>) -> i64 {
    instant.timestamp()
}

pub fn datetime_from_epoch(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0).single()
}

/// Interprets a claim value as a NumericDate.
///
/// Integers and floats are accepted; fractional seconds are kept.
pub fn datetime_from_claim(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(seconds) = value.as_i64() {
        return datetime_from_epoch(seconds);
    }

    let seconds = value.as_f64()?;
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1_000_000_000.0) as u32;
    Utc.timestamp_opt(whole as i64, nanos).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_epoch_round_trip() {
        let instant = datetime_from_epoch(1_700_000_000).unwrap();
        assert_eq!(datetime_to_epoch(instant), 1_700_000_000);
    }

    #[test]
    fn test_epoch_truncates_subseconds() {
        let instant = Utc.timestamp_opt(1_700_000_000, 999_000_000).unwrap();
        assert_eq!(datetime_to_epoch(instant), 1_700_000_000);
    }

    #[test]
    fn test_claim_accepts_integers_and_floats() {
        assert_eq!(
            datetime_from_claim(&json!(1_700_000_000)),
            datetime_from_epoch(1_700_000_000)
        );

        let fractional = datetime_from_claim(&json!(1_700_000_000.5)).unwrap();
        assert_eq!(fractional.timestamp(), 1_700_000_000);
        assert_eq!(fractional.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_claim_rejects_non_numbers() {
        assert!(datetime_from_claim(&json!("1700000000")).is_none());
        assert!(datetime_from_claim(&json!(null)).is_none());
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::at_epoch(1_000);
        clock.advance(Duration::seconds(30));
        assert_eq!(datetime_to_epoch(clock.now()), 1_030);

        clock.set(datetime_from_epoch(5).unwrap());
        assert_eq!(datetime_to_epoch(clock.now()), 5);
    }
}
