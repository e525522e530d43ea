//! Clock helpers.

use chrono::{Local, NaiveDate};

/// Today's date in the local timezone.
#[must_use]
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
