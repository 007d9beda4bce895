//! Virtual Time
//!
//! Logical simulation time with date + minute granularity, independent of
//! wall time. Timestamps serialize as human-readable strings like
//! `"day_3 14:05"`.
//!
//! # Example
//!
//! ```
//! use feed_events::FeedTimestamp;
//!
//! let ts = FeedTimestamp::from_parts(3, 14, 5);
//! assert_eq!(ts.to_string(), "day_3 14:05");
//! ```

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Minutes in a simulated day.
pub const MINUTES_PER_DAY: u64 = 24 * 60;

/// Smallest random clock step, in minutes.
const MIN_CLOCK_STEP: u64 = 3;
/// Largest random clock step, in minutes.
const MAX_CLOCK_STEP: u64 = 5;

/// A point in simulation time, stored as minutes since the scenario epoch.
///
/// Ordering follows the underlying minute counter, so timestamps compare
/// chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeedTimestamp {
    minutes: u64,
}

impl FeedTimestamp {
    /// Creates a timestamp from a raw minute counter.
    pub fn from_minutes(minutes: u64) -> Self {
        Self { minutes }
    }

    /// Creates a timestamp from day (1-based), hour and minute.
    pub fn from_parts(day: u64, hour: u64, minute: u64) -> Self {
        Self {
            minutes: day.saturating_sub(1) * MINUTES_PER_DAY + hour * 60 + minute,
        }
    }

    /// Returns the raw minute counter.
    pub fn minutes(&self) -> u64 {
        self.minutes
    }

    /// Returns the 1-based simulation day.
    pub fn day(&self) -> u64 {
        self.minutes / MINUTES_PER_DAY + 1
    }

    /// Returns the hour of day (0-23).
    pub fn hour(&self) -> u64 {
        (self.minutes % MINUTES_PER_DAY) / 60
    }

    /// Returns the minute of hour (0-59).
    pub fn minute(&self) -> u64 {
        self.minutes % 60
    }

    /// Fractional hours elapsed between `earlier` and this timestamp.
    ///
    /// Saturates at zero when `earlier` is in the future.
    pub fn hours_since(&self, earlier: FeedTimestamp) -> f32 {
        self.minutes.saturating_sub(earlier.minutes) as f32 / 60.0
    }
}

impl fmt::Display for FeedTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day_{} {:02}:{:02}", self.day(), self.hour(), self.minute())
    }
}

/// Error type for parsing a [`FeedTimestamp`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseTimestampError {
    #[error("invalid timestamp format: '{0}', expected 'day_N hh:mm'")]
    InvalidFormat(String),
    #[error("invalid day: '{0}'")]
    InvalidDay(String),
    #[error("invalid time of day: '{0}'")]
    InvalidTime(String),
}

impl FromStr for FeedTimestamp {
    type Err = ParseTimestampError;

    /// Parses a timestamp from a string like `"day_3 14:05"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (day_part, time_part) = s
            .split_once(' ')
            .ok_or_else(|| ParseTimestampError::InvalidFormat(s.to_string()))?;

        let day = day_part
            .strip_prefix("day_")
            .ok_or_else(|| ParseTimestampError::InvalidFormat(s.to_string()))?
            .parse::<u64>()
            .map_err(|_| ParseTimestampError::InvalidDay(day_part.to_string()))?;
        if day == 0 {
            return Err(ParseTimestampError::InvalidDay(day_part.to_string()));
        }

        let (hour_str, minute_str) = time_part
            .split_once(':')
            .ok_or_else(|| ParseTimestampError::InvalidFormat(s.to_string()))?;
        let hour = hour_str
            .parse::<u64>()
            .map_err(|_| ParseTimestampError::InvalidTime(time_part.to_string()))?;
        let minute = minute_str
            .parse::<u64>()
            .map_err(|_| ParseTimestampError::InvalidTime(time_part.to_string()))?;
        if hour >= 24 || minute >= 60 {
            return Err(ParseTimestampError::InvalidTime(time_part.to_string()));
        }

        Ok(FeedTimestamp::from_parts(day, hour, minute))
    }
}

// Serialize as a plain string, not an object.
impl Serialize for FeedTimestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FeedTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Monotonically advancing logical clock.
///
/// Created once per scenario and persisted with it. Advances by a random
/// 3-5 minute increment per call, or by an explicit amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualClock {
    now: FeedTimestamp,
}

impl VirtualClock {
    /// Creates a clock at the scenario start (day 1, 09:00).
    pub fn start() -> Self {
        Self {
            now: FeedTimestamp::from_parts(1, 9, 0),
        }
    }

    /// Creates a clock at an arbitrary timestamp.
    pub fn at(now: FeedTimestamp) -> Self {
        Self { now }
    }

    /// Returns the current logical time without advancing.
    pub fn current(&self) -> FeedTimestamp {
        self.now
    }

    /// Advances by a random 3-5 minute step and returns the new time.
    pub fn advance(&mut self, rng: &mut impl Rng) -> FeedTimestamp {
        let step = rng.gen_range(MIN_CLOCK_STEP..=MAX_CLOCK_STEP);
        self.advance_by(step)
    }

    /// Advances by an explicit number of minutes and returns the new time.
    pub fn advance_by(&mut self, minutes: u64) -> FeedTimestamp {
        self.now = FeedTimestamp::from_minutes(self.now.minutes() + minutes);
        self.now
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_timestamp_display() {
        assert_eq!(FeedTimestamp::from_parts(1, 9, 0).to_string(), "day_1 09:00");
        assert_eq!(FeedTimestamp::from_parts(3, 14, 5).to_string(), "day_3 14:05");
        assert_eq!(FeedTimestamp::from_parts(12, 0, 59).to_string(), "day_12 00:59");
    }

    #[test]
    fn test_timestamp_parse() {
        let ts: FeedTimestamp = "day_3 14:05".parse().unwrap();
        assert_eq!(ts.day(), 3);
        assert_eq!(ts.hour(), 14);
        assert_eq!(ts.minute(), 5);
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let original = FeedTimestamp::from_parts(7, 23, 41);
        let parsed: FeedTimestamp = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_timestamp_parse_errors() {
        assert!("invalid".parse::<FeedTimestamp>().is_err());
        assert!("day_x 09:00".parse::<FeedTimestamp>().is_err());
        assert!("day_0 09:00".parse::<FeedTimestamp>().is_err());
        assert!("day_1 25:00".parse::<FeedTimestamp>().is_err());
        assert!("day_1 09:75".parse::<FeedTimestamp>().is_err());
        assert!("day_1".parse::<FeedTimestamp>().is_err());
    }

    #[test]
    fn test_timestamp_serializes_as_string() {
        let ts = FeedTimestamp::from_parts(3, 14, 5);
        assert_eq!(serde_json::to_string(&ts).unwrap(), r#""day_3 14:05""#);

        let parsed: FeedTimestamp = serde_json::from_str(r#""day_3 14:05""#).unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn test_timestamp_ordering() {
        let a = FeedTimestamp::from_parts(1, 9, 0);
        let b = FeedTimestamp::from_parts(1, 9, 5);
        let c = FeedTimestamp::from_parts(2, 0, 0);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_hours_since() {
        let earlier = FeedTimestamp::from_parts(1, 9, 0);
        let later = FeedTimestamp::from_parts(1, 10, 30);
        assert!((later.hours_since(earlier) - 1.5).abs() < 1e-6);
        // Saturates instead of going negative.
        assert_eq!(earlier.hours_since(later), 0.0);
    }

    #[test]
    fn test_clock_random_step_bounds() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut clock = VirtualClock::start();
        let mut previous = clock.current();
        for _ in 0..200 {
            let now = clock.advance(&mut rng);
            let step = now.minutes() - previous.minutes();
            assert!((3..=5).contains(&step), "step {} out of bounds", step);
            previous = now;
        }
    }

    #[test]
    fn test_clock_explicit_advance() {
        let mut clock = VirtualClock::start();
        let now = clock.advance_by(91);
        assert_eq!(now, FeedTimestamp::from_parts(1, 10, 31));
        assert_eq!(clock.current(), now);
    }

    #[test]
    fn test_clock_serde_roundtrip() {
        let mut clock = VirtualClock::start();
        clock.advance_by(1234);
        let json = serde_json::to_string(&clock).unwrap();
        let restored: VirtualClock = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, clock);
    }
}
