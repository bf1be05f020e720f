use anyhow::{anyhow, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use colored::*;
use flipbook2pdf::{web, ConvertOptions, Converter, RequestHeaders};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process;
use tokio::fs;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "flipbook2pdf")]
#[command(about = "Turn the page images of an IPGS flipbook webpage into a single PDF")]
#[command(version = "0.1.0")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one flipbook page to a PDF
    Convert {
        /// URL of the webpage containing the flipbook
        url: String,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Serve a small web form for creating and downloading the PDF
    Serve {
        /// Address to listen on
        #[arg(short = 'b', long = "bind", default_value = "127.0.0.1:8501")]
        bind: String,

        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(ClapArgs)]
struct RunArgs {
    /// Output file, overwritten on every run
    #[arg(short = 'o', long = "output", default_value = "output.pdf")]
    output: PathBuf,

    /// Header sent with every request, as "Name: Value" (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// JSON object of headers sent with every request
    #[arg(long = "headers-file")]
    headers_file: Option<PathBuf>,

    /// Request timeout in seconds, per request
    #[arg(short = 't', long = "timeout", default_value = "30.0", value_parser = parse_timeout)]
    timeout: f64,
}

fn parse_timeout(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|_| "Not a number.")?;
    if !value.is_finite() || value <= 0.0 {
        return Err("Must be a positive, finite number.".to_string());
    }
    Ok(value)
}

async fn load_options(run: RunArgs) -> Result<ConvertOptions> {
    let mut headers = RequestHeaders::new();

    if let Some(path) = &run.headers_file {
        let json = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read headers file {}: {}", path.display(), e))?;
        headers.extend_from_json(&json)?;
    }
    for line in &run.headers {
        headers.insert_line(line)?;
    }

    if !headers.is_empty() {
        info!("Sending {} custom header(s) with every request", headers.len());
    }

    Ok(ConvertOptions::new(run.output, headers, run.timeout)?)
}

async fn convert(url: &str, run: RunArgs) -> Result<()> {
    let converter = Converter::new(load_options(run).await?)?;
    let conversion = converter.run(url).await?;

    for warning in conversion.warnings() {
        warn!("Skipped {}", warning.url().yellow());
    }

    info!(
        "Saved {} pages to: {}",
        conversion.pages(),
        conversion.output_path().display().to_string().green()
    );
    Ok(())
}

async fn serve(bind: &str, run: RunArgs) -> Result<()> {
    let converter = Converter::new(load_options(run).await?)?;
    let listener = TcpListener::bind(bind).map_err(|e| anyhow!("Failed to bind {}: {}", bind, e))?;

    info!("Serving the converter on http://{}", bind.green());
    web::run(listener, converter)?.await?;
    Ok(())
}

const DEFAULT_LOG_FILTER: &str = "flipbook2pdf=info,actix_web=info";

/// `RUST_LOG` directives when set and valid, the crate default otherwise.
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[tokio::main]
async fn main() {
    let filter = log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref());

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Convert { url, run } => convert(&url, run).await,
        Commands::Serve { bind, run } => serve(&bind, run).await,
    };

    if let Err(e) = result {
        error!("{}", format!("Error: {}", e).red());
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_accepts_positive_seconds() {
        assert_eq!(parse_timeout("30.0"), Ok(30.0));
        assert_eq!(parse_timeout("0.5"), Ok(0.5));
    }

    #[test]
    fn timeout_rejects_non_finite_and_non_positive() {
        for input in ["inf", "-inf", "NaN", "0", "-3", "soon"] {
            assert!(parse_timeout(input).is_err(), "accepted {input}");
        }
    }

    #[test]
    fn rust_log_overrides_default_filter() {
        assert_eq!(log_filter(Some("debug")).to_string(), "debug");
        assert_eq!(
            log_filter(Some("flipbook2pdf=trace")).to_string(),
            "flipbook2pdf=trace"
        );
    }

    #[test]
    fn missing_or_invalid_rust_log_uses_default() {
        for rust_log in [None, Some("flipbook2pdf=loud")] {
            let filter = log_filter(rust_log).to_string();
            assert!(filter.contains("flipbook2pdf=info"), "got: {filter}");
            assert!(filter.contains("actix_web=info"), "got: {filter}");
        }
    }
}
