use clap::{Parser, Subcommand};
use chrono::NaiveDate;
use crate::models::{FiscalBasis, FiscalConfig};

#[derive(Parser)]
#[command(name = "secpdf")]
#[command(about = "Fetch a company's recent 10-K and 10-Q filings from SEC EDGAR, label their fiscal periods and convert them to PDF")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a registrant's recent 10-K/10-Q filings to PDF
    Fetch {
        /// Company CIK (digits, leading zeros optional). Looked up from --ticker when omitted
        #[arg(short, long)]
        cik: Option<String>,

        /// Ticker used to name the PDFs
        #[arg(short, long)]
        ticker: Option<String>,

        /// Month the fiscal year ends in (1-12)
        #[arg(long, default_value = "12")]
        fy_end_month: u32,

        /// Fiscal year basis (same, previous)
        #[arg(long, default_value = "same")]
        fy_basis: String,

        /// Keep each filing's downloaded HTML and assets
        #[arg(long)]
        keep_intermediate: bool,

        /// Output directory
        #[arg(short, long, default_value = "./pdfs")]
        output: String,

        /// Also bundle the PDFs into a ZIP archive in the output directory
        #[arg(long)]
        zip: bool,
    },

    /// Print the period label for a single filing
    Period {
        /// Form type (10-K, 10-Q, ...)
        #[arg(short, long)]
        form: String,

        /// Filing date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// Month the fiscal year ends in (1-12)
        #[arg(long, default_value = "12")]
        fy_end_month: u32,

        /// Fiscal year basis (same, previous)
        #[arg(long, default_value = "same")]
        fy_basis: String,
    },
}

impl Commands {
    pub fn parse_fiscal_basis(basis: &str) -> Result<FiscalBasis, anyhow::Error> {
        basis.parse::<FiscalBasis>().map_err(|e| {
            anyhow::anyhow!("{}. Supported bases: same, previous", e)
        })
    }

    pub fn parse_fiscal_config(fy_end_month: u32, basis: &str) -> Result<FiscalConfig, anyhow::Error> {
        let basis = Self::parse_fiscal_basis(basis)?;
        Ok(FiscalConfig::new(fy_end_month, basis)?)
    }
}
