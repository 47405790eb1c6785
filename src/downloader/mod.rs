//! Batch retrieval: index → classify → convert → collect.
//!
//! Filings are processed one at a time in index order. Each filing gets its
//! own working area; successful PDFs are moved into a run-level working area
//! that the caller owns once the batch returns.

use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::BatchLimits;
use crate::errors::ClientError;
use crate::models::{is_safe_document_name, FilingRecord, FiscalConfig, FormType};
use crate::period::classify;
use crate::render::Renderer;
use crate::status::StatusReporter;
use crate::workspace::{move_into, WorkingArea};

pub mod assets;
pub mod edgar;
pub mod filing;

use edgar::{EdgarClient, IndexEntry};
use filing::{FilingJob, FilingProcessor};

/// Parameters of one run
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// CIK, with or without leading zeros
    pub cik: String,
    /// Prefix for PDF names; taken from the index when absent
    pub ticker: Option<String>,
    pub fiscal: FiscalConfig,
    /// Remove each filing's intermediate HTML and assets once its PDF is collected
    pub cleanup: bool,
}

/// Outcome of a run
#[derive(Debug, Default)]
pub struct BatchResult {
    /// Generated PDFs in index order
    pub outputs: Vec<PathBuf>,
    /// Directory holding `outputs`; `None` when nothing was produced
    pub working_area: Option<WorkingArea>,
    pub company_name: Option<String>,
    pub ticker: Option<String>,
}

/// Collaborators shared by every filing of a run
pub struct BatchContext<'a> {
    pub client: &'a EdgarClient,
    pub renderer: &'a dyn Renderer,
    pub reporter: &'a dyn StatusReporter,
    pub limits: &'a BatchLimits,
}

/// Fetches the registrant's recent filings and converts the eligible 10-K and 10-Q filings.
///
/// Index-level failures abort the run with an error report and an empty
/// result; failures of individual filings are reported and skipped.
pub async fn run_batch(request: &BatchRequest, ctx: &BatchContext<'_>) -> BatchResult {
    let result = collect_filings(request, ctx).await;
    if result.outputs.is_empty() {
        ctx.reporter.warning("No PDF files generated or error occurred.");
    } else {
        ctx.reporter
            .success(&format!("Generated {} PDF file(s).", result.outputs.len()));
    }
    result
}

async fn collect_filings(request: &BatchRequest, ctx: &BatchContext<'_>) -> BatchResult {
    let reporter = ctx.reporter;
    let cik_padded = format!("{:0>10}", request.cik.trim());

    let run_area = match WorkingArea::create("sec_pdfs_run_") {
        Ok(area) => area,
        Err(e) => {
            reporter.error(&format!("Could not create working area: {}", e));
            return BatchResult::default();
        }
    };

    reporter.info(&format!("Fetching filing list for CIK {}...", cik_padded));
    let submissions = match ctx.client.fetch_submissions(&cik_padded).await {
        Ok(submissions) => submissions,
        Err(e) => {
            report_index_error(reporter, &cik_padded, &e);
            return BatchResult::default();
        }
    };

    let entries = match submissions.recent_entries() {
        Ok(entries) => entries,
        Err(e) => {
            report_index_error(reporter, &cik_padded, &e);
            return BatchResult::default();
        }
    };

    let company_name = submissions
        .name
        .clone()
        .unwrap_or_else(|| format!("CIK {}", cik_padded));
    reporter.info(&format!("Processing filings for: {}", company_name));

    let ticker = match request.ticker.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(ticker) => Some(ticker.to_uppercase()),
        None => submissions.first_ticker().map(|t| {
            reporter.info(&format!("Using ticker '{}' from SEC data.", t));
            t.to_string()
        }),
    };

    let processor = FilingProcessor::new(ctx.client, ctx.renderer, reporter);
    let mut outputs = Vec::new();

    for entry in &entries {
        if outputs.len() >= ctx.limits.max_filings {
            reporter.warning(&format!("Reached processing limit ({}).", ctx.limits.max_filings));
            break;
        }

        let Some(record) = eligible_record(entry, reporter) else {
            continue;
        };

        let period = classify(
            &entry.form,
            record.filing_date,
            request.fiscal.fiscal_year_end_month(),
            request.fiscal.basis(),
            reporter,
        );
        if period.is_error() {
            reporter.warning(&format!(
                "Skipping {} from {} (period error).",
                entry.form, entry.filing_date
            ));
            continue;
        }

        match period.year_suffix() {
            Some(yy) if yy + 2000 < ctx.limits.min_reported_year => {
                reporter.info(&format!(
                    "Skipping {} ({}) - Older than FY{:02}.",
                    entry.form,
                    period,
                    ctx.limits.min_reported_year % 100
                ));
                continue;
            }
            Some(_) => {}
            None => reporter.warning(&format!("Could not parse year from period '{}'.", period)),
        }

        if !is_safe_document_name(&record.primary_document) {
            reporter.warning(&format!(
                "Invalid doc name '{}' for {}.",
                record.primary_document,
                record.accession_path()
            ));
            continue;
        }

        let job = FilingJob {
            document_url: ctx.client.document_url(&cik_padded, &record),
            cik: cik_padded.clone(),
            form: record.form,
            filing_date: entry.filing_date.clone(),
            accession: record.accession_path(),
            period,
            ticker: ticker.clone(),
        };

        let Ok(processed) = processor.process(&job).await else {
            continue;
        };

        match move_into(&processed.output_path, run_area.path()) {
            Ok(final_path) => {
                debug!("Collected {}", final_path.display());
                outputs.push(final_path);
            }
            Err(e) => {
                let name = processed
                    .output_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                reporter.error(&format!("Error moving PDF {}: {}", name, e));
            }
        }

        if request.cleanup {
            if let Err(e) = processed.working_area.release() {
                reporter.warning(&format!("Error during cleanup for {}: {}", job.accession, e));
            }
        } else {
            let kept = processed.working_area.persist();
            info!("Kept intermediate files for {} in {}", job.accession, kept.display());
        }
    }

    let working_area = if outputs.is_empty() {
        if let Err(e) = run_area.release() {
            debug!("Could not remove empty run directory: {}", e);
        }
        None
    } else {
        Some(run_area)
    };

    BatchResult {
        outputs,
        working_area,
        company_name: Some(company_name),
        ticker,
    }
}

/// Applies the form and date filters, reporting malformed dates.
fn eligible_record(entry: &IndexEntry, reporter: &dyn StatusReporter) -> Option<FilingRecord> {
    let form = FormType::from_form(&entry.form)?;

    let filing_date = match NaiveDate::parse_from_str(&entry.filing_date, "%Y-%m-%d") {
        Ok(date) => date,
        Err(_) => {
            reporter.warning(&format!("Invalid date format: {}", entry.filing_date));
            return None;
        }
    };

    Some(FilingRecord {
        form,
        filing_date,
        accession_number: entry.accession_number.clone(),
        primary_document: entry.primary_document.clone(),
    })
}

fn report_index_error(reporter: &dyn StatusReporter, cik: &str, error: &ClientError) {
    let message = match error {
        e if e.is_timeout() => format!("Timeout fetching submission data for CIK {}", cik),
        ClientError::Json(e) => format!("Data parsing error: {}.", e),
        ClientError::Shape(reason) => format!("Filing index for CIK {} rejected: {}.", cik, reason),
        e => format!("Network error fetching submission data: {}", e),
    };
    reporter.error(&message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, EdgarUrls};
    use crate::downloader::filing::tests::StubRenderer;
    use crate::models::FiscalBasis;
    use crate::status::{Severity, StatusLog};
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// (form, filingDate, accessionNumber, primaryDocument)
    type Row<'a> = (&'a str, &'a str, &'a str, &'a str);

    async fn edgar_server(cik: &str, tickers: &[&str], rows: &[Row<'_>]) -> MockServer {
        let server = MockServer::start().await;
        let body = json!({
            "name": "Test Corp",
            "tickers": tickers,
            "filings": {
                "recent": {
                    "form": rows.iter().map(|r| r.0).collect::<Vec<_>>(),
                    "filingDate": rows.iter().map(|r| r.1).collect::<Vec<_>>(),
                    "accessionNumber": rows.iter().map(|r| r.2).collect::<Vec<_>>(),
                    "primaryDocument": rows.iter().map(|r| r.3).collect::<Vec<_>>(),
                }
            }
        });
        Mock::given(method("GET"))
            .and(path(format!("/submissions/CIK{}.json", cik)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/Archives/edgar/data/\d{10}/\d+/ok[^/]*\.htm$"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body><p>Filing</p></body></html>"))
            .mount(&server)
            .await;
        server
    }

    fn client_for(server: &MockServer) -> EdgarClient {
        let mut config = Config::default();
        config.edgar = EdgarUrls {
            data: server.uri(),
            archives: format!("{}/Archives/edgar", server.uri()),
            files: server.uri(),
        };
        config.http.index_timeout_seconds = 5;
        config.http.document_timeout_seconds = 5;
        config.http.asset_timeout_seconds = 1;
        EdgarClient::new(&config).unwrap()
    }

    fn request(cik: &str, cleanup: bool) -> BatchRequest {
        BatchRequest {
            cik: cik.to_string(),
            ticker: None,
            fiscal: FiscalConfig::new(12, FiscalBasis::SameYear).unwrap(),
            cleanup,
        }
    }

    fn filing_areas(prefix: &str) -> Vec<std::path::PathBuf> {
        std::fs::read_dir(std::env::temp_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(prefix))
            .map(|e| e.path())
            .collect()
    }

    fn file_names(result: &BatchResult) -> Vec<String> {
        result
            .outputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_annual_and_quarterly_filings_end_to_end() {
        let server = edgar_server(
            "0000000101",
            &["test"],
            &[
                ("10-K", "2023-03-15", "0000000101-23-000001", "ok-10k.htm"),
                ("10-Q", "2023-08-10", "0000000101-23-000002", "ok-10q.htm"),
            ],
        )
        .await;
        let client = client_for(&server);
        let renderer = StubRenderer::default();
        let log = StatusLog::new();
        let limits = BatchLimits::default();
        let ctx = BatchContext { client: &client, renderer: &renderer, reporter: &log, limits: &limits };

        let result = run_batch(&request("101", true), &ctx).await;

        assert_eq!(file_names(&result), vec!["test_FY22.pdf", "test_1Q23.pdf"]);
        let area = result.working_area.as_ref().unwrap();
        assert!(result.outputs.iter().all(|p| p.starts_with(area.path()) && p.exists()));
        assert_eq!(result.company_name.as_deref(), Some("Test Corp"));
        assert_eq!(log.count(Severity::Error), 0);
        assert_eq!(log.count(Severity::Success), 3);
        assert!(log.contains(Severity::Success, "Generated 2 PDF file(s)."));
    }

    #[tokio::test]
    async fn test_processing_stops_at_cap() {
        let rows: Vec<(String, String, String)> = (0..25)
            .map(|i| {
                (
                    format!("{}-03-01", 2030 + i),
                    format!("0000000102-{:02}-000001", i),
                    format!("ok-{}.htm", i),
                )
            })
            .collect();
        let rows: Vec<Row<'_>> = rows.iter().map(|(d, a, p)| ("10-K", d.as_str(), a.as_str(), p.as_str())).collect();

        let server = edgar_server("0000000102", &[], &rows).await;
        let client = client_for(&server);
        let renderer = StubRenderer::default();
        let log = StatusLog::new();
        let limits = BatchLimits::default();
        let ctx = BatchContext { client: &client, renderer: &renderer, reporter: &log, limits: &limits };

        let mut req = request("102", true);
        req.ticker = Some("cap".to_string());
        let result = run_batch(&req, &ctx).await;

        assert_eq!(result.outputs.len(), 20);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 20);
        assert!(log.contains(Severity::Warning, "Reached processing limit (20)."));
        assert_eq!(file_names(&result)[0], "CAP_FY29.pdf");
    }

    #[tokio::test]
    async fn test_unsafe_document_name_is_never_fetched() {
        let server = edgar_server(
            "0000000103",
            &["SAFE"],
            &[
                ("10-K", "2023-03-15", "0000000103-23-000001", "../../etc/passwd"),
                ("10-K", "2024-03-15", "0000000103-24-000001", "ok-10k.htm"),
            ],
        )
        .await;
        let client = client_for(&server);
        let renderer = StubRenderer::default();
        let log = StatusLog::new();
        let limits = BatchLimits::default();
        let ctx = BatchContext { client: &client, renderer: &renderer, reporter: &log, limits: &limits };

        let result = run_batch(&request("103", true), &ctx).await;

        assert_eq!(file_names(&result), vec!["SAFE_FY23.pdf"]);
        assert!(log.contains(Severity::Warning, "Invalid doc name '../../etc/passwd'"));
        let requests = server.received_requests().await.unwrap();
        assert!(requests.iter().all(|r| !r.url.path().contains("passwd")));
    }

    #[tokio::test]
    async fn test_colliding_names_get_numeric_suffix() {
        let server = edgar_server(
            "0000000104",
            &["DUP"],
            &[
                ("10-Q", "2023-08-10", "0000000104-23-000001", "ok-a.htm"),
                ("10-Q", "2023-08-20", "0000000104-23-000002", "ok-b.htm"),
            ],
        )
        .await;
        let client = client_for(&server);
        let renderer = StubRenderer::default();
        let log = StatusLog::new();
        let limits = BatchLimits::default();
        let ctx = BatchContext { client: &client, renderer: &renderer, reporter: &log, limits: &limits };

        let result = run_batch(&request("104", true), &ctx).await;

        assert_eq!(file_names(&result), vec!["DUP_1Q23.pdf", "DUP_1Q23_1.pdf"]);
    }

    #[tokio::test]
    async fn test_records_are_filtered_and_failures_isolated() {
        let server = edgar_server(
            "0000000105",
            &["FLT"],
            &[
                ("8-K", "2023-05-01", "0000000105-23-000001", "ok-8k.htm"),
                ("10-Q", "2023/05/01", "0000000105-23-000002", "ok-bad-date.htm"),
                ("10-K", "2016-03-01", "0000000105-16-000001", "ok-old.htm"),
                ("10-K", "2022-03-01", "0000000105-22-000001", "missing.htm"),
                ("10-Q", "2023-11-02", "0000000105-23-000003", "ok-q.htm"),
            ],
        )
        .await;
        let client = client_for(&server);
        let renderer = StubRenderer::default();
        let log = StatusLog::new();
        let limits = BatchLimits::default();
        let ctx = BatchContext { client: &client, renderer: &renderer, reporter: &log, limits: &limits };

        let result = run_batch(&request("105", true), &ctx).await;

        assert_eq!(file_names(&result), vec!["FLT_2Q23.pdf"]);
        assert!(log.contains(Severity::Warning, "Invalid date format: 2023/05/01"));
        assert!(log.contains(Severity::Info, "Older than FY17"));
        assert!(log.contains(Severity::Error, "missing.htm"));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_index_aborts_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/submissions/CIK0000000106.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "Broken Corp",
                "filings": { "recent": { "form": ["10-K"], "filingDate": ["2023-03-15"] } }
            })))
            .mount(&server)
            .await;
        let client = client_for(&server);
        let renderer = StubRenderer::default();
        let log = StatusLog::new();
        let limits = BatchLimits::default();
        let ctx = BatchContext { client: &client, renderer: &renderer, reporter: &log, limits: &limits };

        let result = run_batch(&request("106", true), &ctx).await;

        assert!(result.outputs.is_empty());
        assert!(result.working_area.is_none());
        assert!(log.contains(Severity::Error, "missing expected keys"));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_index_not_found_is_reported() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        let renderer = StubRenderer::default();
        let log = StatusLog::new();
        let limits = BatchLimits::default();
        let ctx = BatchContext { client: &client, renderer: &renderer, reporter: &log, limits: &limits };

        let result = run_batch(&request("107", true), &ctx).await;

        assert!(result.outputs.is_empty());
        assert!(result.working_area.is_none());
        assert!(log.contains(Severity::Error, "Network error fetching submission data"));
    }

    #[tokio::test]
    async fn test_nothing_rendered_releases_run_area() {
        let server = edgar_server(
            "0000000108",
            &[],
            &[("10-K", "2023-03-15", "0000000108-23-000001", "ok-10k.htm")],
        )
        .await;
        let client = client_for(&server);
        let renderer = StubRenderer { fail: true, ..Default::default() };
        let log = StatusLog::new();
        let limits = BatchLimits::default();
        let ctx = BatchContext { client: &client, renderer: &renderer, reporter: &log, limits: &limits };

        let result = run_batch(&request("108", true), &ctx).await;

        assert!(result.outputs.is_empty());
        assert!(result.working_area.is_none());
        assert_eq!(result.ticker, None);
        assert_eq!(log.count(Severity::Error), 1);
        assert!(log.contains(Severity::Warning, "No PDF files generated"));
    }

    #[tokio::test]
    async fn test_cleanup_removes_filing_area() {
        let server = edgar_server(
            "0000000109",
            &["CLN"],
            &[("10-K", "2023-03-15", "0000000109-23-000001", "ok-10k.htm")],
        )
        .await;
        let client = client_for(&server);
        let renderer = StubRenderer::default();
        let log = StatusLog::new();
        let limits = BatchLimits::default();
        let ctx = BatchContext { client: &client, renderer: &renderer, reporter: &log, limits: &limits };

        let result = run_batch(&request("109", true), &ctx).await;

        assert_eq!(file_names(&result), vec!["CLN_FY22.pdf"]);
        assert!(filing_areas("sec_0000000109_000000010923000001_").is_empty());
    }

    #[tokio::test]
    async fn test_keep_intermediate_persists_filing_area() {
        let server = edgar_server(
            "0000000110",
            &["KEEP"],
            &[("10-K", "2023-03-15", "0000000110-23-000001", "ok-10k.htm")],
        )
        .await;
        let client = client_for(&server);
        let renderer = StubRenderer::default();
        let log = StatusLog::new();
        let limits = BatchLimits::default();
        let ctx = BatchContext { client: &client, renderer: &renderer, reporter: &log, limits: &limits };

        let result = run_batch(&request("110", false), &ctx).await;
        assert_eq!(file_names(&result), vec!["KEEP_FY22.pdf"]);

        let kept = filing_areas("sec_0000000110_000000011023000001_");
        assert_eq!(kept.len(), 1);
        let html = kept[0].join("0000000110_10-K_2023-03-15_000000011023000001.html");
        let exists = html.exists();
        for dir in &kept {
            std::fs::remove_dir_all(dir).unwrap();
        }
        assert!(exists);
    }
}
