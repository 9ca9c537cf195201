//! Requested history window: a provider-style named period or an explicit
//! date range.

use crate::domain::error::StonksError;
use chrono::{Datelike, Days, Months, NaiveDate};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedPeriod {
    OneDay,
    FiveDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    TwoYears,
    FiveYears,
    TenYears,
    YearToDate,
    Max,
}

impl NamedPeriod {
    pub const ALL: [NamedPeriod; 11] = [
        NamedPeriod::OneDay,
        NamedPeriod::FiveDays,
        NamedPeriod::OneMonth,
        NamedPeriod::ThreeMonths,
        NamedPeriod::SixMonths,
        NamedPeriod::OneYear,
        NamedPeriod::TwoYears,
        NamedPeriod::FiveYears,
        NamedPeriod::TenYears,
        NamedPeriod::YearToDate,
        NamedPeriod::Max,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NamedPeriod::OneDay => "1d",
            NamedPeriod::FiveDays => "5d",
            NamedPeriod::OneMonth => "1mo",
            NamedPeriod::ThreeMonths => "3mo",
            NamedPeriod::SixMonths => "6mo",
            NamedPeriod::OneYear => "1y",
            NamedPeriod::TwoYears => "2y",
            NamedPeriod::FiveYears => "5y",
            NamedPeriod::TenYears => "10y",
            NamedPeriod::YearToDate => "ytd",
            NamedPeriod::Max => "max",
        }
    }

    fn months(&self) -> Option<u32> {
        match self {
            NamedPeriod::OneMonth => Some(1),
            NamedPeriod::ThreeMonths => Some(3),
            NamedPeriod::SixMonths => Some(6),
            NamedPeriod::OneYear => Some(12),
            NamedPeriod::TwoYears => Some(24),
            NamedPeriod::FiveYears => Some(60),
            NamedPeriod::TenYears => Some(120),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Named(NamedPeriod),
    /// Inclusive on both ends.
    Range { start: NaiveDate, end: NaiveDate },
}

impl Default for Period {
    fn default() -> Self {
        Period::Named(NamedPeriod::TwoYears)
    }
}

impl Period {
    /// Parses `2y`, `ytd`, `max`, ... or `YYYY-MM-DD:YYYY-MM-DD`.
    pub fn parse(input: &str) -> Result<Self, StonksError> {
        let trimmed = input.trim();
        let invalid = |reason: &str| StonksError::InvalidRange {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid("period is empty"));
        }

        if let Some((start_str, end_str)) = trimmed.split_once(':') {
            let start = NaiveDate::parse_from_str(start_str.trim(), "%Y-%m-%d")
                .map_err(|_| invalid("invalid start date (expected YYYY-MM-DD)"))?;
            let end = NaiveDate::parse_from_str(end_str.trim(), "%Y-%m-%d")
                .map_err(|_| invalid("invalid end date (expected YYYY-MM-DD)"))?;
            if start >= end {
                return Err(invalid("start date must be before end date"));
            }
            return Ok(Period::Range { start, end });
        }

        let lowered = trimmed.to_lowercase();
        NamedPeriod::ALL
            .iter()
            .find(|p| p.as_str() == lowered)
            .map(|p| Period::Named(*p))
            .ok_or_else(|| {
                invalid("unknown period (expected 1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max or a date range)")
            })
    }

    /// File-name safe key identifying this period in the cache.
    pub fn cache_key(&self) -> String {
        match self {
            Period::Named(p) => p.as_str().to_string(),
            Period::Range { start, end } => {
                format!("{}_{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
            }
        }
    }

    /// First date included when a series ends at `anchor`. `None` means no
    /// lower bound.
    pub fn start_date(&self, anchor: NaiveDate) -> Option<NaiveDate> {
        match self {
            Period::Range { start, .. } => Some(*start),
            Period::Named(NamedPeriod::Max) => None,
            Period::Named(NamedPeriod::OneDay) => Some(anchor),
            Period::Named(NamedPeriod::FiveDays) => anchor.checked_sub_days(Days::new(4)),
            Period::Named(NamedPeriod::YearToDate) => NaiveDate::from_ymd_opt(anchor.year(), 1, 1),
            Period::Named(named) => named
                .months()
                .and_then(|m| anchor.checked_sub_months(Months::new(m)))
                .and_then(|d| d.checked_add_days(Days::new(1))),
        }
    }

    /// Last date included, for explicit ranges.
    pub fn end_date(&self) -> Option<NaiveDate> {
        match self {
            Period::Range { end, .. } => Some(*end),
            Period::Named(_) => None,
        }
    }

    pub fn contains(&self, date: NaiveDate, anchor: NaiveDate) -> bool {
        let after_start = self.start_date(anchor).is_none_or(|s| date >= s);
        let before_end = self.end_date().is_none_or(|e| date <= e);
        after_start && before_end
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Named(p) => write!(f, "{}", p.as_str()),
            Period::Range { start, end } => {
                write!(f, "{}:{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
            }
        }
    }
}
