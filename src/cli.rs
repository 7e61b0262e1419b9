//! Command line arguments backing the binary.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::PipelineConfig;
use crate::fetcher::CacheMode;

#[derive(Parser, Debug)]
#[command(
    name = "cloud-vision-pipelines",
    about = "Extract text lines with Textract and annotate celebrity photos with Rekognition",
    version
)]
pub struct Args {
    /// JSON config file; flags below override its values
    #[arg(long, short = 'c', default_value = "pipeline.json", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect text in a document and write its lines to a JSON file
    Lines {
        /// Bucket holding the document
        #[arg(long, requires = "key")]
        bucket: Option<String>,

        /// Object key of the document
        #[arg(long, requires = "bucket")]
        key: Option<String>,

        /// Send a local image inline instead of a bucket object
        #[arg(long, conflicts_with_all = ["bucket", "key"])]
        file: Option<PathBuf>,

        /// Cache file for the raw service response
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Where to write the formatted lines
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Ignore an existing cache file but still rewrite it
        #[arg(long)]
        refresh: bool,

        /// Neither read nor write the cache file
        #[arg(long, conflicts_with = "refresh")]
        no_cache: bool,
    },
    /// Recognize celebrities and upload annotated copies of the images
    Celebrities {
        #[arg(long)]
        input_bucket: Option<String>,

        #[arg(long)]
        output_bucket: Option<String>,

        /// Draw only detections scoring strictly above this value
        #[arg(long)]
        min_confidence: Option<f64>,

        /// TrueType font used for the name labels (default: bundled DejaVu Sans)
        #[arg(long)]
        font: Option<PathBuf>,

        /// Object keys to process (replaces the configured list)
        keys: Vec<String>,
    },
}

impl Commands {
    /// Fold flag values into the loaded config.
    pub fn apply(&self, config: &mut PipelineConfig) {
        match self {
            Commands::Lines {
                bucket,
                key,
                file,
                cache,
                output,
                no_cache,
                ..
            } => {
                let text = &mut config.text;
                if let Some(file) = file {
                    text.file = Some(file.clone());
                    text.bucket = None;
                    text.key = None;
                }
                if bucket.is_some() {
                    text.bucket = bucket.clone();
                    text.key = key.clone();
                    text.file = None;
                }
                if let Some(cache) = cache {
                    text.cache_path = cache.clone();
                }
                if let Some(output) = output {
                    text.output_path = output.clone();
                }
                if *no_cache {
                    text.use_cache = false;
                }
            }
            Commands::Celebrities {
                input_bucket,
                output_bucket,
                min_confidence,
                font,
                keys,
            } => {
                let job = &mut config.celebrities;
                if let Some(bucket) = input_bucket {
                    job.input_bucket = bucket.clone();
                }
                if let Some(bucket) = output_bucket {
                    job.output_bucket = bucket.clone();
                }
                if let Some(min) = min_confidence {
                    job.min_confidence = *min;
                }
                if font.is_some() {
                    job.font_path = font.clone();
                }
                if !keys.is_empty() {
                    job.keys = keys.clone();
                }
            }
        }
    }

    /// Cache handling for the `lines` command.
    pub fn cache_mode(&self, config: &PipelineConfig) -> CacheMode {
        match self {
            Commands::Lines { refresh: true, .. } => CacheMode::Refresh,
            _ if !config.text.use_cache => CacheMode::Disabled,
            _ => CacheMode::ReadWrite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_flags_override_config() {
        let args = Args::try_parse_from([
            "cloud-vision-pipelines",
            "lines",
            "--bucket",
            "bkt-textract-lista-material",
            "--key",
            "lista-material-2.jpg",
            "--no-cache",
        ])
        .unwrap();

        let mut config = PipelineConfig::default();
        config.text.file = Some(PathBuf::from("old.png"));
        args.command.apply(&mut config);

        assert_eq!(config.text.bucket.as_deref(), Some("bkt-textract-lista-material"));
        assert_eq!(config.text.key.as_deref(), Some("lista-material-2.jpg"));
        assert!(config.text.file.is_none());
        assert_eq!(args.command.cache_mode(&config), CacheMode::Disabled);
        assert!(config.text.validate().is_ok());
    }

    #[test]
    fn test_refresh_mode() {
        let args = Args::try_parse_from(["cloud-vision-pipelines", "lines", "--refresh"]).unwrap();
        let config = PipelineConfig::default();
        assert_eq!(args.command.cache_mode(&config), CacheMode::Refresh);
    }

    #[test]
    fn test_file_conflicts_with_bucket() {
        let parsed = Args::try_parse_from([
            "cloud-vision-pipelines",
            "lines",
            "--file",
            "a.png",
            "--bucket",
            "b",
            "--key",
            "k",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_celebrity_keys_replace_config() {
        let args = Args::try_parse_from([
            "cloud-vision-pipelines",
            "--config",
            "fotos.json",
            "celebrities",
            "--min-confidence",
            "85",
            "input/contora.jpg",
            "input/outra.jpg",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("fotos.json"));

        let mut config = PipelineConfig::default();
        config.celebrities.keys = vec!["old.jpg".to_string()];
        args.command.apply(&mut config);
        assert_eq!(config.celebrities.keys, vec!["input/contora.jpg", "input/outra.jpg"]);
        assert_eq!(config.celebrities.min_confidence, 85.0);
    }
}
