//! Pipeline configuration.
//!
//! Loaded from a JSON file (default `pipeline.json`), then overridden by CLI
//! flags. Every field except the bucket/key inputs has a default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Root configuration for all pipelines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub aws: AwsSettings,
    #[serde(default)]
    pub text: TextJobConfig,
    #[serde(default)]
    pub celebrities: CelebrityJobConfig,
}

/// Region and endpoint; `None` falls back to the `AWS_*` environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AwsSettings {
    #[serde(default)]
    pub region: Option<String>,
    /// Send every service call to this endpoint (e.g. a local emulator).
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

/// Text detection and line extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextJobConfig {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    /// Local image sent inline instead of a bucket object.
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    #[serde(default = "default_true")]
    pub use_cache: bool,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
}

impl Default for TextJobConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            key: None,
            file: None,
            cache_path: default_cache_path(),
            use_cache: true,
            output_path: default_output_path(),
        }
    }
}

/// Celebrity recognition and annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CelebrityJobConfig {
    #[serde(default)]
    pub input_bucket: String,
    #[serde(default)]
    pub output_bucket: String,
    /// Object keys to process, in order.
    #[serde(default)]
    pub keys: Vec<String>,
    /// Detections must score strictly above this to be drawn.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default)]
    pub output: OutputNaming,
    /// TrueType font for labels. Without one the bundled DejaVu Sans is used.
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    #[serde(default)]
    pub style: BoxStyle,
}

impl Default for CelebrityJobConfig {
    fn default() -> Self {
        Self {
            input_bucket: String::new(),
            output_bucket: String::new(),
            keys: Vec::new(),
            min_confidence: default_min_confidence(),
            output: OutputNaming::default(),
            font_path: None,
            style: BoxStyle::default(),
        }
    }
}

/// Output key = `{prefix}{source file stem}{suffix}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputNaming {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            suffix: default_suffix(),
        }
    }
}

/// Drawing parameters for annotated images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxStyle {
    #[serde(default = "default_border_width")]
    pub border_width: u32,
    /// Label is drawn this many pixels above the box.
    #[serde(default = "default_label_offset")]
    pub label_offset: i32,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    #[serde(default = "default_box_color")]
    pub box_color: [u8; 3],
    #[serde(default = "default_text_color")]
    pub text_color: [u8; 3],
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for BoxStyle {
    fn default() -> Self {
        Self {
            border_width: default_border_width(),
            label_offset: default_label_offset(),
            font_size: default_font_size(),
            box_color: default_box_color(),
            text_color: default_text_color(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("response.json")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("formatted_response.json")
}

fn default_min_confidence() -> f64 {
    90.0
}

fn default_prefix() -> String {
    "results/".to_string()
}

fn default_suffix() -> String {
    "-resultado.jpg".to_string()
}

fn default_border_width() -> u32 {
    3
}

fn default_label_offset() -> i32 {
    20
}

fn default_font_size() -> f32 {
    16.0
}

fn default_box_color() -> [u8; 3] {
    [255, 0, 0]
}

fn default_text_color() -> [u8; 3] {
    [255, 255, 255]
}

fn default_jpeg_quality() -> u8 {
    75
}

impl PipelineConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {:?}", path))?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }
}

impl TextJobConfig {
    pub fn validate(&self) -> Result<()> {
        match (&self.file, &self.bucket, &self.key) {
            (Some(_), None, None) => Ok(()),
            (None, Some(bucket), Some(key)) if !bucket.is_empty() && !key.is_empty() => Ok(()),
            (Some(_), _, _) => anyhow::bail!("Set either a local file or bucket+key, not both"),
            _ => anyhow::bail!("Text job needs a local file or a bucket and key"),
        }
    }
}

impl CelebrityJobConfig {
    pub fn validate(&self) -> Result<()> {
        if self.input_bucket.is_empty() {
            anyhow::bail!("Celebrity job needs an input bucket");
        }
        if self.output_bucket.is_empty() {
            anyhow::bail!("Celebrity job needs an output bucket");
        }
        if self.keys.is_empty() {
            anyhow::bail!("Celebrity job has no object keys to process");
        }
        if !(0.0..=100.0).contains(&self.min_confidence) {
            anyhow::bail!(
                "min_confidence must be within 0..=100, got {}",
                self.min_confidence
            );
        }
        if self.style.border_width == 0 {
            anyhow::bail!("border_width must be at least 1");
        }
        Ok(())
    }
}
