//! Cloud vision pipelines - Textract line extraction and Rekognition celebrity annotation.

mod annotate;
mod aws;
mod cache;
mod celebrities;
mod cli;
mod config;
mod fetcher;
mod lines;
mod ocr;
mod recognition;
mod schema;
mod storage;

use anyhow::Context;
use annotate::Annotator;
use aws::AwsClient;
use cache::ResponseCache;
use celebrities::{CelebrityPipeline, ImageOutcome};
use clap::Parser;
use cli::{Args, Commands};
use config::{AwsSettings, PipelineConfig};
use fetcher::Fetcher;
use lines::FormattedLines;
use ocr::textract::TextractClient;
use ocr::{DocumentSource, TextDetector};
use recognition::rekognition::RekognitionClient;
use std::sync::Arc;
use storage::s3::S3Client;
use storage::ObjectLocation;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "cloud_vision_pipelines=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = PipelineConfig::load(&args.config)?;
    args.command.apply(&mut config);

    match &args.command {
        Commands::Lines { .. } => run_lines(&config, &args.command).await,
        Commands::Celebrities { .. } => run_celebrities(&config).await,
    }
}

fn aws_client(settings: &AwsSettings) -> Result<AwsClient, aws::ServiceError> {
    let aws = AwsClient::from_env(settings)?;
    info!("AWS client initialized for region {}", aws.region());
    Ok(aws)
}

// ============================================================================
// Pipelines
// ============================================================================

/// Fetch (or read from cache) a detection response and write its lines.
/// Credentials are only resolved when the service has to be called.
async fn run_lines(config: &PipelineConfig, command: &Commands) -> anyhow::Result<()> {
    let job = &config.text;
    job.validate()?;

    let source = match (&job.file, &job.bucket, &job.key) {
        (Some(path), _, _) => DocumentSource::from_file(path)
            .with_context(|| format!("Failed to read {:?}", path))?,
        (None, Some(bucket), Some(key)) => DocumentSource::Object(ObjectLocation::new(bucket, key)),
        _ => anyhow::bail!("No document to process"),
    };

    let fetcher = {
        let settings = config.aws.clone();
        Fetcher::lazy(move || {
            let aws = aws_client(&settings)?;
            Ok(Arc::new(TextractClient::new(aws)) as Arc<dyn TextDetector>)
        })
    };
    let cache = ResponseCache::new(job.cache_path.clone());
    let response = fetcher
        .read_or_fetch(&cache, &source, command.cache_mode(config))
        .await
        .context("Text detection failed")?;

    let extracted = lines::extract_lines(&response)?;
    if extracted.is_empty() {
        warn!("No lines were extracted from {}", source);
        return Ok(());
    }

    info!("Extracted {} line(s) from {}", extracted.len(), source);
    for line in &extracted {
        println!("{}", line);
    }

    FormattedLines::new(extracted).write_to(&job.output_path)?;
    Ok(())
}

/// Annotate every configured image. Per-image failures are logged, not fatal.
async fn run_celebrities(config: &PipelineConfig) -> anyhow::Result<()> {
    let job = &config.celebrities;
    job.validate()?;

    let annotator = Annotator::for_job(job)?;
    let aws = aws_client(&config.aws).context("Failed to configure AWS access")?;

    let pipeline = CelebrityPipeline::new(
        Arc::new(RekognitionClient::new(aws.clone())),
        Arc::new(S3Client::new(aws)),
        annotator,
        job,
    );

    let results = pipeline.run(&job.keys).await;

    let mut annotated = 0;
    let mut empty = 0;
    let mut failed = 0;
    for (_, result) in &results {
        match result {
            Ok(ImageOutcome::Annotated { .. }) => annotated += 1,
            Ok(ImageOutcome::NoCelebrities) => empty += 1,
            Err(_) => failed += 1,
        }
    }
    info!(
        "Done: {} annotated, {} without celebrities, {} failed",
        annotated, empty, failed
    );
    Ok(())
}
