//! Rolling time windows for "recent" activity.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Window selected by the user to bound recent activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    #[default]
    Week,
    Month,
    Year,
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeRange::Week => write!(f, "week"),
            TimeRange::Month => write!(f, "month"),
            TimeRange::Year => write!(f, "year"),
        }
    }
}

/// Unrecognized selectors resolve to `Week`.
impl From<&str> for TimeRange {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "month" => TimeRange::Month,
            "year" => TimeRange::Year,
            _ => TimeRange::Week,
        }
    }
}

impl TimeRange {
    /// Human label used by the range picker.
    pub fn label(&self) -> &'static str {
        match self {
            TimeRange::Week => "Last 7 days",
            TimeRange::Month => "Last 30 days",
            TimeRange::Year => "Last year",
        }
    }

    /// Whether `s` names a range exactly (used to warn on fallback).
    pub fn is_known(s: &str) -> bool {
        matches!(s.trim().to_lowercase().as_str(), "week" | "month" | "year")
    }
}

/// Compute the cutoff for `range`; a timestamp is recent iff it is `> cutoff`.
///
/// Calendar subtraction clamps to the last day of the target month, so
/// March 31 minus one month is the last day of February.
pub fn resolve_cutoff(range: TimeRange, now: DateTime<Utc>) -> DateTime<Utc> {
    let cutoff = match range {
        TimeRange::Week => now.checked_sub_signed(Duration::days(7)),
        TimeRange::Month => now.checked_sub_months(Months::new(1)),
        TimeRange::Year => now.checked_sub_months(Months::new(12)),
    };
    cutoff.unwrap_or(DateTime::<Utc>::MIN_UTC)
}
