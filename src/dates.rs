// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Date window filtering.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use snafu::prelude::*;

/// The format used for per-message timestamps in rendered headings.
///
/// Dates in this format are accepted back by [`parse_date_input`], so a
/// timestamp copied from an export can be used as a filter bound.
pub const HEADING_TIMESTAMP_FORMAT: &str = "%B %d, %Y at %I:%M:%S %p";

/// Error type for date parsing failures.
#[derive(Debug, Snafu)]
pub enum DateError {
    /// The input matched none of the accepted formats.
    #[snafu(display(
        "Invalid {which} date format: {input} (use YYYY-MM-DD or \"Month DD, YYYY at HH:MM:SS AM\")"
    ))]
    InvalidDate {
        /// Which bound was being parsed ("from" or "to").
        which: String,
        /// The rejected input.
        input: String,
    },
}

/// An inclusive time window; a missing bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    /// Earliest accepted instant.
    pub from: Option<DateTime<Utc>>,
    /// Latest accepted instant.
    pub to: Option<DateTime<Utc>>,
}

impl DateWindow {
    /// Builds a window from user-supplied bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if either bound cannot be parsed.
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self, DateError> {
        Ok(Self {
            from: from
                .map(|s| parse_date_input(s, "from", true))
                .transpose()?,
            to: to.map(|s| parse_date_input(s, "to", false)).transpose()?,
        })
    }

    /// A window covering the local calendar day containing `now`.
    #[must_use]
    pub fn day_of(now: DateTime<Local>) -> Self {
        let day = now.date_naive();
        Self {
            from: local_to_utc(day.and_time(NaiveTime::MIN)),
            to: local_to_utc(day.and_time(end_of_day())),
        }
    }

    /// Returns `true` if neither bound is set.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Checks a raw timestamp against the window.
    ///
    /// Both bounds are inclusive. A missing or unparseable timestamp is
    /// treated as in range.
    #[must_use]
    pub fn contains(&self, timestamp: Option<&str>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(time) = timestamp.and_then(parse_timestamp) else {
            return true;
        };

        self.from.is_none_or(|from| from <= time) && self.to.is_none_or(|to| time <= to)
    }
}

/// Parses an ISO-8601 timestamp as found in session logs.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parses a user-supplied date bound, interpreted in local time.
///
/// Accepts `YYYY-MM-DD` (start or end of that day, depending on
/// `start_of_day`) or the heading timestamp format.
///
/// # Errors
///
/// Returns [`DateError::InvalidDate`] if neither format matches.
pub fn parse_date_input(
    input: &str,
    which: &str,
    start_of_day: bool,
) -> Result<DateTime<Utc>, DateError> {
    let trimmed = input.trim();

    let naive = if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let time = if start_of_day {
            NaiveTime::MIN
        } else {
            end_of_day()
        };
        Some(date.and_time(time))
    } else {
        NaiveDateTime::parse_from_str(trimmed, HEADING_TIMESTAMP_FORMAT).ok()
    };

    naive
        .and_then(local_to_utc)
        .context(InvalidDateSnafu { which, input })
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
