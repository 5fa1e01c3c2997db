//! Period Resolver - symbolic period tokens to inclusive calendar ranges

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::store::types::DATE_FORMAT;

/// Separator between the two dates of a custom range ("2024-01-01 - 2024-01-31")
pub const CUSTOM_RANGE_SEPARATOR: &str = " - ";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeriodError {
    #[error("invalid date range: {0}")]
    InvalidRange(String),
}

/// Inclusive calendar range, `start <= end` by construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PeriodError> {
        if start > end {
            return Err(PeriodError::InvalidRange(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered, both ends included
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.start.format(DATE_FORMAT),
            CUSTOM_RANGE_SEPARATOR,
            self.end.format(DATE_FORMAT)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeriodToken {
    Day,
    Week,
    Month,
    Year,
    Custom,
    /// Anything else. Resolves with the month rule.
    Unknown(String),
}

impl PeriodToken {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "day" => PeriodToken::Day,
            "week" => PeriodToken::Week,
            "month" => PeriodToken::Month,
            "year" => PeriodToken::Year,
            "custom" => PeriodToken::Custom,
            other => PeriodToken::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PeriodToken::Day => "day",
            PeriodToken::Week => "week",
            PeriodToken::Month => "month",
            PeriodToken::Year => "year",
            PeriodToken::Custom => "custom",
            PeriodToken::Unknown(s) => s,
        }
    }

    pub fn all_fixed() -> [PeriodToken; 4] {
        [
            PeriodToken::Day,
            PeriodToken::Week,
            PeriodToken::Month,
            PeriodToken::Year,
        ]
    }
}

/// How the requester picked the period: a token, or free text for a custom range
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodSelection {
    Token(PeriodToken),
    Custom(String),
}

impl PeriodSelection {
    pub fn resolve(&self, today: NaiveDate) -> Result<DateRange, PeriodError> {
        match self {
            PeriodSelection::Token(token) => resolve(token, today),
            PeriodSelection::Custom(text) => parse_custom_range(text),
        }
    }

    /// Human label used in titles, captions and notices
    pub fn label(&self, range: &DateRange) -> String {
        match self {
            PeriodSelection::Token(PeriodToken::Day) => "today".to_string(),
            PeriodSelection::Token(PeriodToken::Week) => "this week".to_string(),
            PeriodSelection::Token(PeriodToken::Year) => "this year".to_string(),
            PeriodSelection::Token(PeriodToken::Month | PeriodToken::Unknown(_)) => {
                "this month".to_string()
            }
            PeriodSelection::Token(PeriodToken::Custom) | PeriodSelection::Custom(_) => {
                format!("period {}", range)
            }
        }
    }
}

/// Resolve a period token relative to `today`
///
/// `Custom` has no implicit range and fails; use [`parse_custom_range`].
/// Unknown tokens fall back to the current month.
pub fn resolve(token: &PeriodToken, today: NaiveDate) -> Result<DateRange, PeriodError> {
    match token {
        PeriodToken::Day => Ok(DateRange::single(today)),
        PeriodToken::Week => {
            let start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
            DateRange::new(start, start + Duration::days(6))
        }
        PeriodToken::Month => month_of(today),
        PeriodToken::Year => {
            let start = ymd(today.year(), 1, 1)?;
            let end = ymd(today.year(), 12, 31)?;
            DateRange::new(start, end)
        }
        PeriodToken::Custom => Err(PeriodError::InvalidRange(
            "custom period requires an explicit range".to_string(),
        )),
        PeriodToken::Unknown(raw) => {
            log::warn!("⚠️  Unknown period token '{}', falling back to month", raw);
            month_of(today)
        }
    }
}

/// Parse "YYYY-MM-DD - YYYY-MM-DD" into a range
pub fn parse_custom_range(text: &str) -> Result<DateRange, PeriodError> {
    let (start_raw, end_raw) = text
        .trim()
        .split_once(CUSTOM_RANGE_SEPARATOR)
        .ok_or_else(|| {
            PeriodError::InvalidRange(format!(
                "expected YYYY-MM-DD{}YYYY-MM-DD, got '{}'",
                CUSTOM_RANGE_SEPARATOR,
                text.trim()
            ))
        })?;

    let start = parse_strict_date(start_raw.trim())?;
    let end = parse_strict_date(end_raw.trim())?;
    DateRange::new(start, end)
}

/// Strict YYYY-MM-DD: four-digit year, two-digit month and day
pub fn parse_strict_date(raw: &str) -> Result<NaiveDate, PeriodError> {
    let well_formed = raw.len() == 10
        && raw.char_indices().all(|(i, c)| match i {
            4 | 7 => c == '-',
            _ => c.is_ascii_digit(),
        });

    if !well_formed {
        return Err(PeriodError::InvalidRange(format!(
            "'{}' is not a YYYY-MM-DD date",
            raw
        )));
    }

    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| PeriodError::InvalidRange(format!("'{}': {}", raw, e)))
}

fn month_of(today: NaiveDate) -> Result<DateRange, PeriodError> {
    let start = ymd(today.year(), today.month(), 1)?;
    let next_month = if today.month() == 12 {
        ymd(today.year() + 1, 1, 1)?
    } else {
        ymd(today.year(), today.month() + 1, 1)?
    };
    DateRange::new(start, next_month - Duration::days(1))
}

fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate, PeriodError> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        PeriodError::InvalidRange(format!("{:04}-{:02}-{:02} does not exist", year, month, day))
    })
}
