//! Turns one filing's primary document into a PDF

use std::path::PathBuf;
use tracing::{debug, info};

use crate::downloader::assets::{resolve_assets, AssetReference};
use crate::downloader::edgar::EdgarClient;
use crate::errors::{ClientError, ProcessError};
use crate::html::{decode_bytes, repair_punctuation, CharsetFix, FilingDocument, TextEncoding};
use crate::models::FormType;
use crate::period::PeriodLabel;
use crate::render::Renderer;
use crate::status::StatusReporter;
use crate::workspace::{sanitize_filename, WorkingArea};

/// Everything needed to convert one filing
#[derive(Debug, Clone)]
pub struct FilingJob {
    pub document_url: String,
    /// Zero-padded CIK
    pub cik: String,
    pub form: FormType,
    /// Filing date as written in the index
    pub filing_date: String,
    /// Accession number without dashes
    pub accession: String,
    pub period: PeriodLabel,
    pub ticker: Option<String>,
}

impl FilingJob {
    /// `{cik}_{form}_{date}_{accession}.html`
    pub fn html_filename(&self) -> String {
        sanitize_filename(&format!(
            "{}_{}_{}_{}.html",
            self.cik, self.form, self.filing_date, self.accession
        ))
    }

    /// `{ticker}_{period}`, or `{cik}_{period}` without a ticker
    pub fn pdf_base_name(&self) -> String {
        let owner = self
            .ticker
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(self.cik.as_str());
        sanitize_filename(&format!("{}_{}", owner, self.period))
    }
}

/// A rendered filing. The working area holds the PDF until the caller moves it out.
#[derive(Debug)]
pub struct ProcessedFiling {
    pub output_path: PathBuf,
    pub html_path: PathBuf,
    pub assets: Vec<AssetReference>,
    pub working_area: WorkingArea,
}

/// Downloads, repairs and renders single filings
pub struct FilingProcessor<'a> {
    client: &'a EdgarClient,
    renderer: &'a dyn Renderer,
    reporter: &'a dyn StatusReporter,
}

impl<'a> FilingProcessor<'a> {
    pub fn new(client: &'a EdgarClient, renderer: &'a dyn Renderer, reporter: &'a dyn StatusReporter) -> Self {
        Self {
            client,
            renderer,
            reporter,
        }
    }

    /// Converts one filing, reporting any failure before returning it.
    ///
    /// On failure the filing's working area has already been removed.
    pub async fn process(&self, job: &FilingJob) -> Result<ProcessedFiling, ProcessError> {
        self.reporter.info(&format!(
            "Processing {} ({}) from {}...",
            job.form, job.period, job.filing_date
        ));

        match self.try_process(job).await {
            Ok(processed) => {
                let name = processed
                    .output_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.reporter.success(&format!("PDF created: {}", name));
                Ok(processed)
            }
            Err(e) => {
                match &e {
                    ProcessError::Timeout { .. } | ProcessError::Network { .. } | ProcessError::Render(_) => {
                        self.reporter.error(&e.to_string())
                    }
                    _ => self
                        .reporter
                        .error(&format!("Error processing filing {}: {}", job.accession, e)),
                }
                Err(e)
            }
        }
    }

    async fn try_process(&self, job: &FilingJob) -> Result<ProcessedFiling, ProcessError> {
        let area = WorkingArea::create(&format!("sec_{}_{}_", job.cik, job.accession))
            .map_err(ProcessError::WorkingArea)?;

        let body = self.client.fetch_document(&job.document_url).await.map_err(|e| match e {
            ClientError::Timeout { url } => ProcessError::Timeout { url },
            other if other.is_timeout() => ProcessError::Timeout {
                url: job.document_url.clone(),
            },
            other => ProcessError::Network {
                url: job.document_url.clone(),
                source: other,
            },
        })?;

        let decoded = decode_bytes(&body.bytes);
        match decoded.encoding {
            TextEncoding::Utf8 => {}
            TextEncoding::Latin1 => self
                .reporter
                .info(&format!("Decoded {} using {}", job.document_url, decoded.encoding.as_str())),
            TextEncoding::Windows1252 => self.reporter.warning(&format!(
                "Decoded {} using {} (replacements)",
                job.document_url,
                decoded.encoding.as_str()
            )),
        }

        let mut document = FilingDocument::parse(repair_punctuation(&decoded.text));
        if document.ensure_utf8_charset() != CharsetFix::Unchanged {
            debug!("Declared UTF-8 charset in {}", job.document_url);
        }

        let assets = resolve_assets(
            &mut document,
            &job.document_url,
            area.path(),
            self.client,
            self.reporter,
        )
        .await;
        debug!("Resolved {} asset(s) for {}", assets.len(), job.accession);

        let html_path = area.path().join(job.html_filename());
        tokio::fs::write(&html_path, document.as_str()).await?;

        let output_path = self
            .renderer
            .render(&html_path, &job.pdf_base_name(), area.path())
            .await?;

        info!("Rendered {} to {}", job.accession, output_path.display());
        Ok(ProcessedFiling {
            output_path,
            html_path,
            assets,
            working_area: area,
        })
    }
}
