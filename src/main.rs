use clap::Parser;
use anyhow::Result;
use std::path::Path;
use tracing::{info, error};

use secpdf::cli::{Cli, Commands};
use secpdf::config::Config;
use secpdf::downloader::edgar::EdgarClient;
use secpdf::downloader::{run_batch, BatchContext, BatchRequest};
use secpdf::models::normalize_cik;
use secpdf::render::WeasyPrintRenderer;
use secpdf::status::{StatusReporter, TracingReporter};
use secpdf::{package, period};

#[tokio::main]
async fn main() -> Result<()> {
    // Set default log level to INFO if not specified
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "secpdf=info");
    }

    // Initialize logging to both console and file
    use tracing_subscriber::{fmt, EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

    let file_appender = tracing_appender::rolling::never(".", "secpdf.log");

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::from_default_env())
        )
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_filter(EnvFilter::from_default_env())
        )
        .init();

    let cli = Cli::parse();
    let reporter = TracingReporter;

    match &cli.command {
        Commands::Fetch {
            cik,
            ticker,
            fy_end_month,
            fy_basis,
            keep_intermediate,
            output,
            zip,
        } => {
            let config = Config::from_env()?;
            config.validate()?;

            let fiscal = Commands::parse_fiscal_config(*fy_end_month, fy_basis)?;
            let client = EdgarClient::new(&config)?;

            let cik = match (cik.as_deref(), ticker.as_deref()) {
                (Some(cik), _) => match normalize_cik(cik) {
                    Ok(cik) => cik,
                    Err(_) => {
                        reporter.error("CIK must be a non-empty number.");
                        return Ok(());
                    }
                },
                (None, Some(ticker)) => match client.lookup_cik(ticker).await? {
                    Some(cik) => {
                        info!("Resolved ticker {} to CIK {}", ticker, cik);
                        cik
                    }
                    None => {
                        reporter.error(&format!("No CIK found for ticker '{}'.", ticker));
                        return Ok(());
                    }
                },
                (None, None) => anyhow::bail!("Either --cik or --ticker is required"),
            };

            let renderer = WeasyPrintRenderer::from_path(&config.renderer);
            if !renderer.is_available() {
                reporter.warning(&format!(
                    "PDF renderer '{}' was not found on PATH; every conversion will fail.",
                    config.renderer
                ));
            }

            let request = BatchRequest {
                cik: cik.clone(),
                ticker: ticker.clone(),
                fiscal,
                cleanup: !keep_intermediate,
            };
            let ctx = BatchContext {
                client: &client,
                renderer: &renderer,
                reporter: &reporter,
                limits: &config.limits,
            };

            info!("Starting fetch for CIK {}", cik);
            let result = run_batch(&request, &ctx).await;

            if !result.outputs.is_empty() {
                let output_dir = Path::new(output);
                let exported = package::export(&result.outputs, output_dir)?;
                for path in &exported {
                    println!("{}", path.display());
                }

                if *zip {
                    let base = result.ticker.clone().unwrap_or_else(|| cik.clone());
                    let bundle = output_dir.join(package::bundle_name(&base, &chrono::Local::now()));
                    match package::write_zip(&result.outputs, &bundle) {
                        Ok(_) => {
                            reporter.info(&format!("Created {} bundle for download.", bundle.display()));
                            println!("{}", bundle.display());
                        }
                        Err(e) => reporter.error(&format!("Error creating ZIP file: {:#}", e)),
                    }
                }
            }

            if let Some(area) = result.working_area {
                if let Err(e) = area.release() {
                    error!("Failed to remove working directory: {}", e);
                }
            }
        }

        Commands::Period { form, date, fy_end_month, fy_basis } => {
            let fiscal = Commands::parse_fiscal_config(*fy_end_month, fy_basis)?;
            let label = period::classify(
                form,
                *date,
                fiscal.fiscal_year_end_month(),
                fiscal.basis(),
                &reporter,
            );
            println!("{}", label);
        }
    }

    Ok(())
}
