//! Fiscal period labels for periodic filings.
//!
//! Maps a filing's form and filing date to a short label such as `FY23` or
//! `2Q24`. Filings arrive roughly one quarter after the period they cover, so
//! the label is derived from the filing month relative to the registrant's
//! fiscal-year-end month. This is a heuristic, not a reporting calendar.

use chrono::{Datelike, NaiveDate};
use std::fmt;

use crate::models::{FiscalBasis, FormType};
use crate::status::StatusReporter;

/// Period a filing reports on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodLabel {
    /// `FY{yy}`
    Annual { year: i32 },
    /// `{q}Q{yy}`
    Quarterly { quarter: u32, year: i32 },
    /// `Form{form}-{yy}` for forms without a period convention
    Other { form: String, year: i32 },
    /// `ERR{yy}`: the quarter could not be resolved
    Error { year: i32 },
}

fn two_digit(year: i32) -> i32 {
    year.rem_euclid(100)
}

impl fmt::Display for PeriodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodLabel::Annual { year } => write!(f, "FY{:02}", two_digit(*year)),
            PeriodLabel::Quarterly { quarter, year } => {
                write!(f, "{}Q{:02}", quarter, two_digit(*year))
            }
            PeriodLabel::Other { form, year } => write!(f, "Form{}-{:02}", form, two_digit(*year)),
            PeriodLabel::Error { year } => write!(f, "ERR{:02}", two_digit(*year)),
        }
    }
}

impl PeriodLabel {
    pub fn is_error(&self) -> bool {
        matches!(self, PeriodLabel::Error { .. })
    }

    /// Two-digit year read back from the last two characters of the label.
    pub fn year_suffix(&self) -> Option<i32> {
        let label = self.to_string();
        let tail = label.get(label.len().saturating_sub(2)..)?;
        if tail.len() == 2 && tail.chars().all(|c| c.is_ascii_digit()) {
            tail.parse().ok()
        } else {
            None
        }
    }
}

/// Fiscal year a filing is attributed to before any quarter adjustment
pub fn reported_year(filing_date: NaiveDate, fiscal_year_end_month: u32, basis: FiscalBasis) -> i32 {
    let mut year = if filing_date.month() > fiscal_year_end_month {
        filing_date.year()
    } else {
        filing_date.year() - 1
    };
    if basis == FiscalBasis::PreviousYear {
        year -= 1;
    }
    year
}

/// Quarter and fiscal year covered by a quarterly report filed in `filing_month`.
///
/// Fiscal years ending in December and March use fixed month tables. Every
/// other fiscal-year end goes through a generic offset computation that has
/// not been checked against real filers.
fn quarter_for(filing_month: u32, fiscal_year_end_month: u32, reported_year: i32) -> Option<(u32, i32)> {
    match fiscal_year_end_month {
        12 => match filing_month {
            1..=3 => Some((3, reported_year)),
            4..=6 => Some((4, reported_year)),
            7..=9 => Some((1, reported_year + 1)),
            10..=12 => Some((2, reported_year + 1)),
            _ => None,
        },
        3 => match filing_month {
            4..=6 => Some((4, reported_year)),
            7..=9 => Some((1, reported_year + 1)),
            10..=12 => Some((2, reported_year + 1)),
            1..=3 => Some((3, reported_year + 1)),
            _ => None,
        },
        _ => {
            let months_past_fy_end =
                (filing_month as i32 - fiscal_year_end_month as i32 - 1).rem_euclid(12);
            let quarter = (months_past_fy_end / 3 + 1) as u32;
            let year = if filing_month > fiscal_year_end_month {
                reported_year + 1
            } else {
                reported_year
            };
            Some((quarter, year))
        }
    }
}

/// Labels the period a filing covers.
///
/// Never fails: a quarterly report that resolves to the fourth quarter is
/// labelled as annual with a warning, and an unresolvable quarter yields
/// [`PeriodLabel::Error`] with an error report. Callers check
/// [`PeriodLabel::is_error`].
pub fn classify(
    form: &str,
    filing_date: NaiveDate,
    fiscal_year_end_month: u32,
    basis: FiscalBasis,
    reporter: &dyn StatusReporter,
) -> PeriodLabel {
    let reported_year = reported_year(filing_date, fiscal_year_end_month, basis);

    match FormType::from_form(form) {
        Some(FormType::TenK) => PeriodLabel::Annual { year: reported_year },
        Some(FormType::TenQ) => {
            match quarter_for(filing_date.month(), fiscal_year_end_month, reported_year) {
                Some((4, year)) => {
                    reporter.warning(&format!(
                        "Warning: Calculated Q4 for a 10-Q filing ({}). Using FY label.",
                        filing_date.format("%Y-%m-%d")
                    ));
                    PeriodLabel::Annual { year }
                }
                Some((quarter, year)) if quarter > 0 => PeriodLabel::Quarterly { quarter, year },
                _ => {
                    reporter.error(&format!(
                        "Error calculating period for 10-Q filed {}, FYEnd: {}",
                        filing_date.format("%Y-%m-%d"),
                        fiscal_year_end_month
                    ));
                    PeriodLabel::Error { year: reported_year }
                }
            }
        }
        None => PeriodLabel::Other {
            form: form.to_string(),
            year: reported_year,
        },
    }
}
