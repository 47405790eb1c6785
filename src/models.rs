use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ConfigError;

/// The two periodic report forms the pipeline converts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormType {
    TenK,
    TenQ,
}

impl FormType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormType::TenK => "10-K",
            FormType::TenQ => "10-Q",
        }
    }

    /// Exact match on the EDGAR form code. Amendments such as `10-K/A` are not periodic reports here.
    pub fn from_form(form: &str) -> Option<Self> {
        match form {
            "10-K" => Some(FormType::TenK),
            "10-Q" => Some(FormType::TenQ),
            _ => None,
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a registrant's recent-filings index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilingRecord {
    pub form: FormType,
    pub filing_date: NaiveDate,
    pub accession_number: String,
    pub primary_document: String,
}

impl FilingRecord {
    /// Accession number as used in archive paths, e.g. `000032019323000106`
    pub fn accession_path(&self) -> String {
        self.accession_number.replace('-', "")
    }

    pub fn filing_date_str(&self) -> String {
        self.filing_date.format("%Y-%m-%d").to_string()
    }
}

/// Rejects primary document names that could escape the filing directory.
pub fn is_safe_document_name(name: &str) -> bool {
    !name.is_empty() && !name.contains("..") && !name.contains('/') && !name.contains('\\')
}

/// Whether the reported year is the natural one or shifted a year back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FiscalBasis {
    #[default]
    SameYear,
    PreviousYear,
}

impl FromStr for FiscalBasis {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_'], " ").as_str() {
            "same" | "same year" => Ok(FiscalBasis::SameYear),
            "previous" | "previous year" | "prev" => Ok(FiscalBasis::PreviousYear),
            other => Err(ConfigError::InvalidBasis(other.to_string())),
        }
    }
}

/// Fiscal-year convention of the registrant, fixed for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiscalConfig {
    fiscal_year_end_month: u32,
    basis: FiscalBasis,
}

impl FiscalConfig {
    pub fn new(fiscal_year_end_month: u32, basis: FiscalBasis) -> Result<Self, ConfigError> {
        if !(1..=12).contains(&fiscal_year_end_month) {
            return Err(ConfigError::InvalidMonth(fiscal_year_end_month));
        }
        Ok(Self {
            fiscal_year_end_month,
            basis,
        })
    }

    pub fn fiscal_year_end_month(&self) -> u32 {
        self.fiscal_year_end_month
    }

    pub fn basis(&self) -> FiscalBasis {
        self.basis
    }
}

impl Default for FiscalConfig {
    fn default() -> Self {
        Self {
            fiscal_year_end_month: 12,
            basis: FiscalBasis::SameYear,
        }
    }
}

/// Validates a CIK supplied on the command line and pads it to ten digits.
pub fn normalize_cik(cik: &str) -> Result<String, ConfigError> {
    let trimmed = cik.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::InvalidCik(cik.to_string()));
    }
    Ok(format!("{:0>10}", trimmed))
}
