//! Time points and time-shift modifiers.
//!
//! A time point is the partition-granularity timestamp of a KPI value:
//! `YYYYMMDD` for daily data, `YYYYMM` for monthly data. Time points are
//! carried as validated strings because that is the partition naming scheme
//! of the source data; all arithmetic goes through [`chrono::NaiveDate`].

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised by time-point parsing and arithmetic.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimePointError {
    #[error("invalid time point '{0}': expected YYYYMMDD or YYYYMM")]
    Invalid(String),

    #[error("time shift out of range for '{0}'")]
    OutOfRange(String),
}

/// A time-shift modifier on a metric reference.
///
/// Appears in expression text as the suffix of a `${ID.modifier}` token.
/// `current` is the default when the suffix is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeModifier {
    #[default]
    Current,
    LastYear,
    LastCycle,
    LastMonth,
}

impl TimeModifier {
    /// Parse the expression-syntax spelling of a modifier.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "current" => Some(TimeModifier::Current),
            "lastYear" => Some(TimeModifier::LastYear),
            "lastCycle" => Some(TimeModifier::LastCycle),
            "lastMonth" => Some(TimeModifier::LastMonth),
            _ => None,
        }
    }

    /// Expression-syntax spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeModifier::Current => "current",
            TimeModifier::LastYear => "lastYear",
            TimeModifier::LastCycle => "lastCycle",
            TimeModifier::LastMonth => "lastMonth",
        }
    }

    /// Column-alias suffix for synthesized historical siblings
    /// (`KD1008_lastYear` etc.). `current` has no suffix.
    pub fn alias_suffix(&self) -> Option<&'static str> {
        match self {
            TimeModifier::Current => None,
            TimeModifier::LastYear => Some("_lastYear"),
            TimeModifier::LastCycle => Some("_lastCycle"),
            TimeModifier::LastMonth => Some("_lastMonth"),
        }
    }
}

impl fmt::Display for TimeModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated time point: `YYYYMMDD` (daily) or `YYYYMM` (monthly).
///
/// Ordering is lexicographic on the underlying string, which matches
/// chronological order within one granularity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimePoint(String);

impl TimePoint {
    /// Validate and wrap a raw time-point string.
    pub fn new(s: impl Into<String>) -> Result<Self, TimePointError> {
        let s = s.into();
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TimePointError::Invalid(s));
        }
        match s.len() {
            8 => {
                NaiveDate::parse_from_str(&s, "%Y%m%d")
                    .map_err(|_| TimePointError::Invalid(s.clone()))?;
            }
            6 => {
                // Month validity is checked by parsing the first of the month.
                NaiveDate::parse_from_str(&format!("{s}01"), "%Y%m%d")
                    .map_err(|_| TimePointError::Invalid(s.clone()))?;
            }
            _ => return Err(TimePointError::Invalid(s)),
        }
        Ok(TimePoint(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Daily points are 8 digits; monthly points are 6.
    pub fn is_daily(&self) -> bool {
        self.0.len() == 8
    }

    fn to_date(&self) -> NaiveDate {
        // The constructor guarantees parseability.
        let padded;
        let s = if self.is_daily() {
            self.0.as_str()
        } else {
            padded = format!("{}01", self.0);
            padded.as_str()
        };
        NaiveDate::parse_from_str(s, "%Y%m%d").unwrap_or_default()
    }

    fn from_date(&self, date: NaiveDate) -> TimePoint {
        let fmt = if self.is_daily() { "%Y%m%d" } else { "%Y%m" };
        TimePoint(date.format(fmt).to_string())
    }

    /// Apply a time-shift modifier to this point.
    ///
    /// `lastCycle` means minus one day for daily points and minus one month
    /// for monthly points. Month arithmetic clamps to the end of the target
    /// month (`20250331` minus one month is `20250228`).
    pub fn shift(&self, modifier: TimeModifier) -> Result<TimePoint, TimePointError> {
        let date = self.to_date();
        let shifted = match modifier {
            TimeModifier::Current => Some(date),
            TimeModifier::LastYear => date.checked_sub_months(Months::new(12)),
            TimeModifier::LastMonth => date.checked_sub_months(Months::new(1)),
            TimeModifier::LastCycle => {
                if self.is_daily() {
                    date.pred_opt()
                } else {
                    date.checked_sub_months(Months::new(1))
                }
            }
        };
        shifted
            .map(|d| self.from_date(d))
            .ok_or_else(|| TimePointError::OutOfRange(self.0.clone()))
    }

    /// Inclusive list of points from the first day of this point's month
    /// through the point itself, in ascending order.
    ///
    /// Used for month-to-date cumulative expansion. A monthly point is its
    /// own degenerate single-element range. Pure and idempotent.
    pub fn month_to_date(&self) -> Vec<TimePoint> {
        if !self.is_daily() {
            return vec![self.clone()];
        }
        let end = self.to_date();
        let mut day = end.with_day(1).unwrap_or(end);
        let mut points = Vec::with_capacity(end.day() as usize);
        while day <= end {
            points.push(self.from_date(day));
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        points
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TimePoint {
    type Error = TimePointError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TimePoint::new(value)
    }
}

impl From<TimePoint> for String {
    fn from(value: TimePoint) -> Self {
        value.0
    }
}
