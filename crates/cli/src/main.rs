use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tipjar_ocr::{
    parse_tip_amount, EngineSelection, OcrClient, OcrConfig, ReqwestTransport, TipSession, UploadFile,
};

mod render;

#[derive(Parser)]
#[command(name = "tipjar")]
#[command(about = "Split a tip pool across partners from a photo of the schedule")]
#[command(version)]
struct Cli {
    /// Schedule image (PNG, JPEG, ...) or PDF
    image: PathBuf,

    /// Total tips to distribute; "$1,250.00" style input is accepted
    #[arg(short, long, default_value = "500")]
    tips: String,

    /// OCR engine: service, azure or auto (overrides OCR_ENGINE)
    #[arg(long)]
    engine: Option<EngineSelection>,

    /// Self-hosted OCR endpoint (overrides OCR_SERVICE_URL)
    #[arg(long)]
    service_url: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!("Ignoring unreadable .env: {e}");
        }
    }

    let mut config = OcrConfig::from_env().context("Invalid OCR configuration")?;
    if let Some(engine) = cli.engine {
        config.engine = engine;
    }
    if let Some(url) = cli.service_url {
        config.service_url = url;
    }

    let client = OcrClient::<ReqwestTransport>::from_config(&config)
        .context("Could not set up the OCR client")?;
    let session = TipSession::new(client);
    session.set_total_tips(parse_tip_amount(&cli.tips)).await;

    let upload = UploadFile::from_path(&cli.image)
        .await
        .with_context(|| format!("Could not read {}", cli.image.display()))?;
    session.upload(&upload).await;

    let report = session.report().await;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render::render_report(&cli.image.display().to_string(), &report)?);
    }

    if report.error.is_some() {
        std::process::exit(1);
    }
    Ok(())
}
