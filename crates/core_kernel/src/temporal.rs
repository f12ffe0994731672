//! Company timezone handling
//!
//! Business dates (invoice dates, due dates, schedule fire dates) are
//! calendar dates in the company's timezone, while timestamps are stored
//! in UTC. This module provides the conversion between the two.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// The timezone a company keeps its books in
///
/// Wraps chrono_tz::Tz with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompanyTimezone(pub Tz);

impl Serialize for CompanyTimezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for CompanyTimezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s)
            .map(CompanyTimezone)
            .map_err(|_| serde::de::Error::custom(format!("Invalid timezone: {}", s)))
    }
}

impl CompanyTimezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Returns the calendar date of the given instant in this timezone
    ///
    /// A scheduler firing at 01:00 UTC must not generate tomorrow's
    /// invoices for a company still on yesterday's date.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.0).date_naive()
    }

    /// Returns today's date in this timezone
    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }
}

impl Default for CompanyTimezone {
    fn default() -> Self {
        Self(chrono_tz::UTC)
    }
}
