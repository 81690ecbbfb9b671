use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::Month;

/// A calendar billing month.
///
/// Ordering is chronological. The canonical text form is `YYYY-MM`; the
/// `YYYY/MM` form used by spreadsheet column headers is accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u8,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodParseError {
    #[error("period '{0}' is not in YYYY-MM or YYYY/MM form")]
    Format(String),
    #[error("period '{0}' has a month outside 1..=12")]
    Month(String),
}

/// Heating-relevant season of a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Period {
    pub fn new(year: i32, month: Month) -> Self {
        Self {
            year,
            month: u8::from(month),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> Month {
        // `month` is only ever built from a valid `Month`.
        Month::try_from(self.month).unwrap_or(Month::January)
    }

    pub fn season(&self) -> Season {
        match self.month() {
            Month::December | Month::January | Month::February => Season::Winter,
            Month::March | Month::April | Month::May => Season::Spring,
            Month::June | Month::July | Month::August => Season::Summer,
            Month::September | Month::October | Month::November => Season::Autumn,
        }
    }

    /// The month immediately after this one.
    pub fn succ(&self) -> Self {
        let month = self.month();
        let year = if month == Month::December {
            self.year + 1
        } else {
            self.year
        };
        Self::new(year, month.next())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = PeriodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (year, month) = trimmed
            .split_once(['-', '/'])
            .ok_or_else(|| PeriodParseError::Format(trimmed.to_string()))?;

        let digits = |part: &str, width: usize| part.len() == width && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(year, 4) || !digits(month, 2) {
            return Err(PeriodParseError::Format(trimmed.to_string()));
        }
        let year: i32 = year
            .parse()
            .map_err(|_| PeriodParseError::Format(trimmed.to_string()))?;
        let month: u8 = month
            .parse()
            .map_err(|_| PeriodParseError::Format(trimmed.to_string()))?;
        let month =
            Month::try_from(month).map_err(|_| PeriodParseError::Month(trimmed.to_string()))?;

        Ok(Self::new(year, month))
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
