//! Splits an inclusive date range into query windows.

use crate::error::{Error, Result};
use crate::types::{PublicationId, QueryWindow};
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Granularity of the windows a date range is cut into
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WindowSpan {
    /// One window per calendar day
    Day,
    /// One window per ISO week (Monday to Sunday)
    Week,
    /// One window per calendar month
    #[default]
    Month,
}

/// Cut `[start, end]` into consecutive, non-overlapping windows aligned to `span`
///
/// The first and last windows are clipped to the requested range, so the union
/// of all windows is exactly `[start, end]`.
pub fn plan_windows(
    publication: &PublicationId,
    start: NaiveDate,
    end: NaiveDate,
    span: WindowSpan,
) -> Result<Vec<QueryWindow>> {
    if start > end {
        return Err(Error::InvalidWindow(format!(
            "start date {start} is after end date {end}"
        )));
    }

    let mut windows = Vec::new();
    let mut cursor = start;
    loop {
        let period_end = last_day_of_period(cursor, span)?;
        let window_end = period_end.min(end);
        windows.push(QueryWindow::new(publication.clone(), cursor, window_end));

        if window_end >= end {
            break;
        }
        cursor = window_end
            .checked_add_days(Days::new(1))
            .ok_or_else(|| Error::InvalidWindow(format!("date overflow after {window_end}")))?;
    }

    Ok(windows)
}

fn last_day_of_period(day: NaiveDate, span: WindowSpan) -> Result<NaiveDate> {
    let overflow = || Error::InvalidWindow(format!("date overflow near {day}"));
    match span {
        WindowSpan::Day => Ok(day),
        WindowSpan::Week => {
            let remaining = 6 - u64::from(day.weekday().num_days_from_monday());
            day.checked_add_days(Days::new(remaining)).ok_or_else(overflow)
        }
        WindowSpan::Month => {
            let first = day.with_day(1).ok_or_else(overflow)?;
            first
                .checked_add_months(Months::new(1))
                .and_then(|next| next.checked_sub_days(Days::new(1)))
                .ok_or_else(overflow)
        }
    }
}
