//! Downloads the images, scripts and stylesheets a filing references so the
//! renderer can work from local files only.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;
use url::Url;

use crate::downloader::edgar::EdgarClient;
use crate::html::FilingDocument;
use crate::status::StatusReporter;
use crate::workspace::{sanitize_filename, unique_destination};

/// An asset fetched into the working area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    /// Reference as written in the document
    pub original_url: String,
    /// Absolute location it was fetched from
    pub absolute_url: String,
    /// File name inside the working area
    pub local_filename: String,
}

/// File extension guessed from a Content-Type header
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    let mime = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    if mime.contains("css") {
        ".css"
    } else if mime.contains("jpeg") {
        ".jpg"
    } else if mime.contains("png") {
        ".png"
    } else if mime.contains("javascript") {
        ".js"
    } else {
        ".asset"
    }
}

/// Local file name for an asset: the URL's last path segment, or
/// `asset_{n}{ext}` when the path has none.
pub fn local_filename(url: &Url, content_type: Option<&str>, ordinal: usize) -> String {
    let from_path = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(sanitize_filename)
        .filter(|name| !name.is_empty() && name != "." && name != "..");

    match from_path {
        Some(name) => name,
        None => {
            let ext = extension_for_content_type(content_type.unwrap_or_default());
            sanitize_filename(&format!("asset_{}{}", ordinal, ext))
        }
    }
}

/// Fetches every asset `document` references and points the references at the local copies.
///
/// Failures are reported as warnings and leave the reference untouched; they
/// never fail the filing. Each distinct reference is attempted once. Returns
/// the assets that were stored and referenced.
pub async fn resolve_assets(
    document: &mut FilingDocument,
    base_url: &str,
    working_dir: &Path,
    client: &EdgarClient,
    reporter: &dyn StatusReporter,
) -> Vec<AssetReference> {
    let mut stored: Vec<AssetReference> = Vec::new();
    let mut local_names: HashMap<String, String> = HashMap::new();
    let mut attempted: HashSet<String> = HashSet::new();

    let base = match Url::parse(base_url) {
        Ok(base) => Some(base),
        Err(e) => {
            reporter.warning(&format!("Cannot resolve assets against {}: {}", base_url, e));
            None
        }
    };

    for link in document.asset_links() {
        if !attempted.insert(link.url.clone()) {
            continue;
        }

        let absolute = match base.as_ref().map(|b| b.join(link.url.trim())) {
            Some(Ok(url)) if matches!(url.scheme(), "http" | "https") => url,
            Some(Ok(url)) => {
                reporter.warning(&format!("Skipping asset {} with unsupported scheme '{}'", link.url, url.scheme()));
                continue;
            }
            Some(Err(e)) => {
                reporter.warning(&format!("Failed to download asset {}: {}", link.url, e));
                continue;
            }
            None => continue,
        };

        let body = match client.fetch_asset(&absolute).await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => {
                reporter.warning(&format!("Timeout downloading asset {}", link.url));
                continue;
            }
            Err(e) => {
                reporter.warning(&format!("Failed to download asset {}: {}", link.url, e));
                continue;
            }
        };

        let name = local_filename(&absolute, body.content_type.as_deref(), stored.len() + 1);
        let destination = unique_destination(working_dir, &name);
        let Some(stored_name) = destination.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };

        if let Err(e) = tokio::fs::write(&destination, &body.bytes).await {
            reporter.warning(&format!("Error processing asset {}: {}", link.url, e));
            continue;
        }

        local_names.insert(link.url.clone(), stored_name.clone());
        stored.push(AssetReference {
            original_url: link.url,
            absolute_url: absolute.to_string(),
            local_filename: stored_name,
        });
    }

    let rewritten = document.retarget_all(&local_names);

    let mut resolved = Vec::with_capacity(stored.len());
    for asset in stored {
        match rewritten.get(&asset.original_url) {
            Some(&count) if count > 0 => {
                debug!("Stored asset {} as {} ({} reference(s))", asset.absolute_url, asset.local_filename, count);
                resolved.push(asset);
            }
            _ => {
                reporter.warning(&format!("Could not rewrite reference to asset {}", asset.original_url));
                let _ = tokio::fs::remove_file(working_dir.join(&asset.local_filename)).await;
            }
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::status::{Severity, StatusLog};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> EdgarClient {
        let mut config = Config::default();
        config.http.asset_timeout_seconds = 1;
        EdgarClient::new(&config).unwrap()
    }

    #[test]
    fn test_extension_for_content_type() {
        assert_eq!(extension_for_content_type("text/css; charset=utf-8"), ".css");
        assert_eq!(extension_for_content_type("image/jpeg"), ".jpg");
        assert_eq!(extension_for_content_type("image/png"), ".png");
        assert_eq!(extension_for_content_type("application/javascript"), ".js");
        assert_eq!(extension_for_content_type("image/gif"), ".asset");
        assert_eq!(extension_for_content_type(""), ".asset");
    }

    #[test]
    fn test_local_filename() {
        let url = Url::parse("https://www.sec.gov/Archives/edgar/data/1/2/logo%20big.jpg").unwrap();
        assert_eq!(local_filename(&url, None, 1), "logo20big.jpg");

        let dir_url = Url::parse("https://www.sec.gov/include/").unwrap();
        assert_eq!(local_filename(&dir_url, Some("text/css"), 3), "asset_3.css");
        assert_eq!(local_filename(&dir_url, None, 1), "asset_1.asset");
    }

    #[tokio::test]
    async fn test_resolve_assets_downloads_and_rewrites() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Archives/edgar/data/1/2/g1.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/styles/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("body {}", "text/css"),
            )
            .mount(&server)
            .await;

        let base = format!("{}/Archives/edgar/data/1/2/doc.htm", server.uri());
        let mut document = FilingDocument::parse(format!(
            r#"<html><head><link rel="stylesheet" href="{}/styles/"></head>
               <body><img src="g1.jpg"><img src="g1.jpg"><img src="data:image/png;base64,AA"></body></html>"#,
            server.uri()
        ));

        let dir = tempfile::tempdir().unwrap();
        let log = StatusLog::new();
        let assets = resolve_assets(&mut document, &base, dir.path(), &client(), &log).await;

        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].local_filename, "asset_1.css");
        assert_eq!(assets[1].local_filename, "g1.jpg");
        assert!(dir.path().join("g1.jpg").exists());
        assert_eq!(std::fs::read_to_string(dir.path().join("asset_1.css")).unwrap(), "body {}");

        let html = document.as_str();
        assert!(html.contains(r#"href="asset_1.css""#));
        assert_eq!(html.matches(r#"src="g1.jpg""#).count(), 2);
        assert!(html.contains("data:image/png;base64,AA"));
        assert_eq!(log.count(Severity::Warning), 0);
    }

    #[tokio::test]
    async fn test_unreachable_asset_leaves_reference_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut document = FilingDocument::parse(
            r#"<body><img src="http://[bad-host/x.png"><img src="/missing.png"><img src="http://127.0.0.1:1/down.png"><img src="/missing.png"></body>"#,
        );
        let original = document.as_str().to_string();

        let dir = tempfile::tempdir().unwrap();
        let log = StatusLog::new();
        let base = format!("{}/doc.htm", server.uri());
        let assets = resolve_assets(&mut document, &base, dir.path(), &client(), &log).await;

        assert!(assets.is_empty());
        assert_eq!(document.as_str(), original);
        assert_eq!(log.count(Severity::Warning), 3);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.iter().filter(|r| r.url.path() == "/missing.png").count(), 1);
    }

    #[tokio::test]
    async fn test_same_file_name_from_different_directories() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/d/a/g1.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_string("SUBDIR"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/d/g1.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_string("TOP"))
            .mount(&server)
            .await;

        let mut document = FilingDocument::parse(r#"<body><img id="one" src="a/g1.jpg"><img id="two" src="g1.jpg"></body>"#);
        let dir = tempfile::tempdir().unwrap();
        let log = StatusLog::new();
        let base = format!("{}/d/doc.htm", server.uri());
        let assets = resolve_assets(&mut document, &base, dir.path(), &client(), &log).await;

        assert_eq!(assets.len(), 2);
        assert_eq!(
            document.as_str(),
            r#"<body><img id="one" src="g1.jpg"><img id="two" src="g1_1.jpg"></body>"#
        );
        assert_eq!(std::fs::read_to_string(dir.path().join("g1.jpg")).unwrap(), "SUBDIR");
        assert_eq!(std::fs::read_to_string(dir.path().join("g1_1.jpg")).unwrap(), "TOP");
    }

    #[tokio::test]
    async fn test_attribute_without_leading_space_is_rewritten() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/g2.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
            .mount(&server)
            .await;

        let mut document = FilingDocument::parse(r#"<body><img alt="x"src="img/g2.png"></body>"#);
        let dir = tempfile::tempdir().unwrap();
        let log = StatusLog::new();
        let base = format!("{}/doc.htm", server.uri());
        let assets = resolve_assets(&mut document, &base, dir.path(), &client(), &log).await;

        assert_eq!(assets.len(), 1);
        assert_eq!(document.as_str(), r#"<body><img alt="x"src="g2.png"></body>"#);
        assert_eq!(log.count(Severity::Warning), 0);
    }

    #[tokio::test]
    async fn test_slow_asset_times_out_and_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0x89, b'P', b'N', b'G'])
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let mut document = FilingDocument::parse(r#"<body><img src="/slow.png"></body>"#);
        let original = document.as_str().to_string();
        let dir = tempfile::tempdir().unwrap();
        let log = StatusLog::new();
        let base = format!("{}/doc.htm", server.uri());
        let assets = resolve_assets(&mut document, &base, dir.path(), &client(), &log).await;

        assert!(assets.is_empty());
        assert_eq!(document.as_str(), original);
        assert!(log.contains(Severity::Warning, "Timeout downloading asset /slow.png"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
