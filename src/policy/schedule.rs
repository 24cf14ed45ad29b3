//! Time/day window during which filtering is in effect.

use chrono::{DateTime, Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Day of week as stored in the configuration surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Mon,
            chrono::Weekday::Tue => Weekday::Tue,
            chrono::Weekday::Wed => Weekday::Wed,
            chrono::Weekday::Thu => Weekday::Thu,
            chrono::Weekday::Fri => Weekday::Fri,
            chrono::Weekday::Sat => Weekday::Sat,
            chrono::Weekday::Sun => Weekday::Sun,
        }
    }
}

/// Active window bounds as `"HH:MM"` strings, kept verbatim as the
/// configuration surface produces them and parsed at evaluation time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
}

/// Schedule restricting filtering to configured days and hours.
///
/// A disabled schedule never restricts. A window whose `start` is later
/// than its `end` spans midnight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub days: Vec<Weekday>,
    #[serde(default)]
    pub time: TimeWindow,
}

impl Schedule {
    /// Whether the filtering window is active at `now`.
    ///
    /// Disabled schedules always report active (no restriction). Malformed
    /// start/end strings report inactive, which leaves navigation
    /// unrestricted: a schedule misconfiguration must never lock the user
    /// out in a way that is hard to recover from.
    pub fn is_active_at(&self, now: DateTime<Local>) -> bool {
        if !self.enabled {
            return true;
        }
        if !self.days.contains(&Weekday::from(now.weekday())) {
            return false;
        }
        let (start, end) = match (
            parse_minute_of_day(&self.time.start),
            parse_minute_of_day(&self.time.end),
        ) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                debug!(
                    start = %self.time.start,
                    end = %self.time.end,
                    "unparseable schedule window, leaving navigation unrestricted"
                );
                return false;
            }
        };
        let now_minutes = now.hour() * 60 + now.minute();
        if start <= end {
            start <= now_minutes && now_minutes < end
        } else {
            // Window spans midnight.
            now_minutes >= start || now_minutes < end
        }
    }
}

/// Parse `"HH:MM"` into a minute-of-day in `[0, 1440)`.
fn parse_minute_of_day(value: &str) -> Option<u32> {
    let (hour, minute) = value.split_once(':')?;
    let hour: u32 = hour.trim().parse().ok()?;
    let minute: u32 = minute.trim().parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(hour * 60 + minute)
}
