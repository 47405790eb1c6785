use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::{Config, EdgarUrls};
use crate::errors::ClientError;
use crate::models::FilingRecord;

#[derive(Debug, Deserialize)]
struct CompanyTicker {
    pub cik_str: u64,
    pub ticker: String,
}

/// Registrant submissions document (`/submissions/CIK##########.json`).
///
/// Only the fields the pipeline reads are modelled, all optional so that a
/// partial response deserializes and can be rejected with a precise reason.
#[derive(Debug, Deserialize)]
pub struct Submissions {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tickers: Option<Vec<String>>,
    #[serde(default)]
    pub filings: Option<FilingsData>,
}

#[derive(Debug, Deserialize)]
pub struct FilingsData {
    #[serde(default)]
    pub recent: Option<RecentFilings>,
}

/// Parallel arrays, one element per filing
#[derive(Debug, Deserialize)]
pub struct RecentFilings {
    #[serde(default)]
    pub form: Option<Vec<String>>,
    #[serde(rename = "filingDate", default)]
    pub filing_date: Option<Vec<String>>,
    #[serde(rename = "accessionNumber", default)]
    pub accession_number: Option<Vec<String>>,
    #[serde(rename = "primaryDocument", default)]
    pub primary_document: Option<Vec<String>>,
}

/// One unvalidated row of the recent-filings index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub form: String,
    pub filing_date: String,
    pub accession_number: String,
    pub primary_document: String,
}

impl Submissions {
    /// Zips the parallel arrays into rows, stopping at the shortest array.
    pub fn recent_entries(&self) -> Result<Vec<IndexEntry>, ClientError> {
        let recent = self
            .filings
            .as_ref()
            .and_then(|f| f.recent.as_ref())
            .ok_or_else(|| ClientError::Shape("no recent filings found".to_string()))?;

        let (Some(forms), Some(dates), Some(accessions), Some(documents)) = (
            recent.form.as_ref(),
            recent.filing_date.as_ref(),
            recent.accession_number.as_ref(),
            recent.primary_document.as_ref(),
        ) else {
            return Err(ClientError::Shape("filings data missing expected keys".to_string()));
        };

        let len = forms
            .len()
            .min(dates.len())
            .min(accessions.len())
            .min(documents.len());

        Ok((0..len)
            .map(|i| IndexEntry {
                form: forms[i].clone(),
                filing_date: dates[i].clone(),
                accession_number: accessions[i].clone(),
                primary_document: documents[i].clone(),
            })
            .collect())
    }

    pub fn first_ticker(&self) -> Option<&str> {
        self.tickers
            .as_ref()
            .and_then(|t| t.iter().map(|s| s.trim()).find(|s| !s.is_empty()))
    }
}

/// Body and content type of a successful GET
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// HTTP access to EDGAR with per-call timeouts
#[derive(Debug, Clone)]
pub struct EdgarClient {
    client: Client,
    urls: EdgarUrls,
    index_timeout: Duration,
    document_timeout: Duration,
    asset_timeout: Duration,
}

impl EdgarClient {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let client = Client::builder()
            .user_agent(&config.http.user_agent)
            .build()?;

        Ok(Self {
            client,
            urls: config.edgar.clone(),
            index_timeout: config.index_timeout(),
            document_timeout: config.document_timeout(),
            asset_timeout: config.asset_timeout(),
        })
    }

    pub fn submissions_url(&self, cik_padded: &str) -> String {
        format!(
            "{}/submissions/CIK{}.json",
            self.urls.data.trim_end_matches('/'),
            cik_padded
        )
    }

    pub fn company_tickers_url(&self) -> String {
        format!("{}/files/company_tickers.json", self.urls.files.trim_end_matches('/'))
    }

    /// `{archives}/data/{cik}/{accession without dashes}/{primary document}`
    pub fn document_url(&self, cik_padded: &str, record: &FilingRecord) -> String {
        format!(
            "{}/data/{}/{}/{}",
            self.urls.archives.trim_end_matches('/'),
            cik_padded,
            record.accession_path(),
            record.primary_document
        )
    }

    async fn get(&self, url: &str, timeout: Duration, accept: &str) -> Result<FetchedBody, ClientError> {
        debug!("GET {} (timeout {:?})", url, timeout);

        let response = self
            .client
            .get(url)
            .header(ACCEPT, accept)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_request_error(e, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| map_request_error(e, url))?;

        Ok(FetchedBody {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    /// Fetches the recent-filings index for a zero-padded CIK.
    pub async fn fetch_submissions(&self, cik_padded: &str) -> Result<Submissions, ClientError> {
        let url = self.submissions_url(cik_padded);
        let body = self.get(&url, self.index_timeout, "application/json").await?;
        Ok(serde_json::from_slice(&body.bytes)?)
    }

    pub async fn fetch_document(&self, url: &str) -> Result<FetchedBody, ClientError> {
        self.get(url, self.document_timeout, "text/html,text/plain,*/*").await
    }

    pub async fn fetch_asset(&self, url: &Url) -> Result<FetchedBody, ClientError> {
        self.get(url.as_str(), self.asset_timeout, "*/*").await
    }

    /// Resolves a ticker to its zero-padded CIK via the SEC ticker map.
    pub async fn lookup_cik(&self, ticker: &str) -> Result<Option<String>, ClientError> {
        let url = self.company_tickers_url();
        let body = self.get(&url, self.index_timeout, "application/json").await?;
        let tickers: HashMap<String, CompanyTicker> = serde_json::from_slice(&body.bytes)?;

        let ticker_upper = ticker.trim().to_uppercase();
        Ok(tickers
            .values()
            .find(|company| company.ticker.to_uppercase() == ticker_upper)
            .map(|company| format!("{:0>10}", company.cik_str)))
    }
}

fn map_request_error(error: reqwest::Error, url: &str) -> ClientError {
    if error.is_timeout() {
        ClientError::Timeout {
            url: url.to_string(),
        }
    } else {
        ClientError::Request(error)
    }
}
