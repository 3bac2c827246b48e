use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use taxscan::config::{self, ScanConfig};
use taxscan::pipeline::extraction::batch::process_batch;
use taxscan::pipeline::extraction::{default_engine, DocumentPipeline, Engine};

#[derive(Parser)]
#[command(name = "taxscan")]
#[command(version = config::APP_VERSION)]
#[command(about = "Blur-check or OCR scanned W-2s and pay stubs")]
struct Args {
    /// Processing mode: `blur` or `ocr`
    engine: Engine,

    /// Image files to process
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Override the blur threshold (Laplacian variance)
    #[arg(long)]
    threshold: Option<f64>,

    /// Extra matcher definitions (JSON)
    #[arg(long)]
    matchers: Option<PathBuf>,

    /// Tesseract language codes, e.g. "eng+spa"
    #[arg(long)]
    languages: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    taxscan::init_tracing();

    let mut scan_config = ScanConfig::from_env();
    if let Some(threshold) = args.threshold {
        scan_config.blur_threshold = threshold;
    }
    if let Some(matchers) = args.matchers {
        scan_config.matchers_path = Some(matchers);
    }
    if let Some(languages) = args.languages {
        scan_config.ocr_languages = languages;
    }

    tracing::info!("{} v{} starting", config::APP_NAME, config::APP_VERSION);

    let ocr_engine = default_engine(&scan_config.ocr_languages);
    let pipeline = DocumentPipeline::from_config(&scan_config, ocr_engine)
        .context("Failed to build document pipeline")?;

    let outcomes = process_batch(Arc::new(pipeline), args.files, args.engine).await;
    println!("{}", serde_json::to_string_pretty(&outcomes)?);

    Ok(())
}
