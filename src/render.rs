//! HTML-to-PDF conversion through an external renderer

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::RenderError;

/// Print stylesheet applied on top of the filing's own styles
pub const PRINT_STYLESHEET: &str = r#"
@page { size: A4; margin: 1.5cm; }
body { font-family: sans-serif; line-height: 1.4; word-wrap: break-word; }
table { border-collapse: collapse; width: 100%; margin-bottom: 1em; }
th, td { border: 1px solid #ddd; padding: 4px; text-align: left; vertical-align: top; }
th { background-color: #f2f2f2; }
img { max-width: 100%; height: auto; vertical-align: middle; }
h1, h2, h3, h4, h5, h6 { page-break-after: avoid; }
table, figure { page-break-inside: avoid; }
tr, li { page-break-inside: avoid; }
"#;

const STYLESHEET_NAME: &str = "_secpdf_print.css";

/// Converts a self-contained HTML file into a paginated document
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Writes `{base_name}.pdf` into `out_dir` and returns its path.
    async fn render(&self, html_path: &Path, base_name: &str, out_dir: &Path) -> Result<PathBuf, RenderError>;

    fn name(&self) -> &str;
}

/// Renderer backed by the `weasyprint` command-line tool
#[derive(Debug, Clone)]
pub struct WeasyPrintRenderer {
    program: String,
    binary_path: Option<PathBuf>,
}

impl WeasyPrintRenderer {
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            program: binary_path.display().to_string(),
            binary_path: Some(binary_path),
        }
    }

    /// Looks `program` up on PATH. A missing binary is reported on first use, not here.
    pub fn from_path(program: &str) -> Self {
        Self {
            program: program.to_string(),
            binary_path: which::which(program).ok(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.binary_path.is_some()
    }
}

#[async_trait]
impl Renderer for WeasyPrintRenderer {
    async fn render(&self, html_path: &Path, base_name: &str, out_dir: &Path) -> Result<PathBuf, RenderError> {
        let binary = self
            .binary_path
            .as_ref()
            .ok_or_else(|| RenderError::Unavailable(self.program.clone()))?;

        let pdf_path = out_dir.join(format!("{}.pdf", base_name));
        let stylesheet = out_dir.join(STYLESHEET_NAME);
        tokio::fs::write(&stylesheet, PRINT_STYLESHEET).await?;

        info!(
            "Converting to PDF ({}): {}",
            self.name(),
            pdf_path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
        );

        let output = Command::new(binary)
            .arg(html_path)
            .arg(&pdf_path)
            .arg("-s")
            .arg(&stylesheet)
            .output()
            .await
            .map_err(RenderError::Launch)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            return Err(RenderError::Failed {
                status: output.status.to_string(),
                stderr: lines[lines.len().saturating_sub(5)..].join("\n"),
            });
        }

        verify_output(&pdf_path).await?;
        debug!("Rendered {}", pdf_path.display());
        Ok(pdf_path)
    }

    fn name(&self) -> &str {
        "WeasyPrint"
    }
}

/// Fails with [`RenderError::EmptyOutput`] unless `pdf_path` is a non-empty file,
/// removing an empty leftover.
pub async fn verify_output(pdf_path: &Path) -> Result<(), RenderError> {
    match tokio::fs::metadata(pdf_path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => {
            let _ = tokio::fs::remove_file(pdf_path).await;
            Err(RenderError::EmptyOutput(pdf_path.to_path_buf()))
        }
        Err(_) => Err(RenderError::EmptyOutput(pdf_path.to_path_buf())),
    }
}
