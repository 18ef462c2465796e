//! Revision dates.
//!
//! A revision is a calendar date in `YYYY-MM-DD` form. Revisions order
//! chronologically; an absent revision sorts before every present one, so
//! `Option<Revision>` can be used directly as a "latest wins" sort key.

use crate::error::{CoreError, CoreResult};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const REVISION_FORMAT: &str = "%Y-%m-%d";

/// A `YYYY-MM-DD` revision date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Revision(NaiveDate);

impl Revision {
    /// Parse a revision from its canonical string form
    ///
    /// # Errors
    ///
    /// Returns error if the string is not a valid `YYYY-MM-DD` date
    pub fn parse(s: &str) -> CoreResult<Self> {
        // chrono accepts single-digit fields; the canonical form does not
        if s.len() != 10 {
            return Err(CoreError::InvalidRevision {
                value: s.to_string(),
            });
        }
        NaiveDate::parse_from_str(s, REVISION_FORMAT)
            .map(Self)
            .map_err(|_| CoreError::InvalidRevision {
                value: s.to_string(),
            })
    }

    /// Create from calendar components
    ///
    /// # Errors
    ///
    /// Returns error if the components do not form a valid date
    pub fn from_ymd(year: i32, month: u32, day: u32) -> CoreResult<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| CoreError::InvalidRevision {
                value: format!("{:04}-{:02}-{:02}", year, month, day),
            })
    }

    /// Get the underlying date
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.0
    }

    /// Pick the most recent of a set of optional revisions
    pub fn latest<'a, I>(revisions: I) -> Option<Revision>
    where
        I: IntoIterator<Item = &'a Option<Revision>>,
    {
        revisions.into_iter().flatten().max().copied()
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(REVISION_FORMAT))
    }
}

impl FromStr for Revision {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Revision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Revision {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
