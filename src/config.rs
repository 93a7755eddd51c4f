//! Configuration for extraction, OCR triggering, and layout reconstruction.
//!
//! Every setting lives on an immutable [`ExtractConfig`] that is handed to
//! each component when it is built. Values are resolved with the precedence
//! explicit override ([`ConfigOverrides`]) > instance config (a base
//! `ExtractConfig`, usually loaded from a TOML file) > process-wide default
//! ([`ExtractConfig::default`], which reads credentials from the environment).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable holding the Document Intelligence endpoint URL.
pub const ENDPOINT_ENV: &str = "AZURE_DOCINTEL_ENDPOINT";
/// Environment variable holding the Document Intelligence subscription key.
pub const SUBSCRIPTION_KEY_ENV: &str = "AZURE_DOCINTEL_SUBSCRIPTION_KEY";

/// Default Document Intelligence REST API version.
pub const DEFAULT_API_VERSION: &str = "2024-11-30";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Resolved configuration for one extractor instance.
#[derive(Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Document Intelligence endpoint, e.g. `https://myres.cognitiveservices.azure.com`.
    pub endpoint: String,
    /// Document Intelligence subscription key. Never serialized.
    #[serde(skip_serializing, default)]
    pub subscription_key: String,
    /// Build the recognition client automatically on first use.
    pub auto_client: bool,
    /// REST API version sent with every request.
    pub api_version: String,
    /// Seconds to wait for a whole recognition batch before giving up.
    pub timeout_secs: u64,
    /// Delay between polls of a running analyze operation.
    pub poll_interval_ms: u64,
    /// Never run recognition, even for corrupted pages.
    pub disable_ocr: bool,
    /// Skip embedded extraction and recognize every page.
    pub suppress_embedded: bool,
    pub disable_progress_bar: bool,
    /// A page with fewer non-blank embedded lines than this is low-text.
    pub min_lines_ocr_trigger: usize,
    /// Minimum fraction of flagged pages required to submit a batch.
    pub trigger_ocr_page_ratio: f64,
    /// Embedded text longer than this is treated as corrupted.
    pub max_chars_per_page: usize,
    /// Minimum handwriting confidence for a fragment to count as handwritten.
    pub handwritten_confidence_limit: f32,
    /// Page rotations at or below this magnitude are ignored.
    pub min_ocr_rotation_degrees: f64,
    /// Factor applied to service coordinates before layout.
    pub ocr_positioning_scale: f64,
    /// Percentage (0, 100] of the nominal line height that separates two lines.
    pub ocr_line_height_scale: f64,
    /// Weight applied to string length when inferring character width.
    pub scale_weight: f64,
    /// Weight applied to the median fragment height when grouping lines.
    pub font_height_weight: f64,
    /// Emit blank lines for vertical gaps between text lines.
    pub preserve_vertical_whitespace: bool,
    /// Documents processed concurrently by batch extraction.
    pub max_workers: usize,
    /// Pages extracted concurrently by the embedded-text collaborator.
    pub embedded_workers: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            endpoint: std::env::var(ENDPOINT_ENV).unwrap_or_default(),
            subscription_key: std::env::var(SUBSCRIPTION_KEY_ENV).unwrap_or_default(),
            auto_client: true,
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: 60,
            poll_interval_ms: 1000,
            disable_ocr: false,
            suppress_embedded: false,
            disable_progress_bar: false,
            min_lines_ocr_trigger: 1,
            trigger_ocr_page_ratio: 0.99,
            max_chars_per_page: 25_000,
            handwritten_confidence_limit: 0.8,
            min_ocr_rotation_degrees: 1e-5,
            ocr_positioning_scale: 100.0,
            ocr_line_height_scale: 50.0,
            scale_weight: 1.25,
            font_height_weight: 1.0,
            preserve_vertical_whitespace: false,
            max_workers: 4,
            embedded_workers: 4,
        }
    }
}

impl std::fmt::Debug for ExtractConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractConfig")
            .field("endpoint", &self.endpoint)
            .field(
                "subscription_key",
                &if self.subscription_key.is_empty() {
                    ""
                } else {
                    "***"
                },
            )
            .field("auto_client", &self.auto_client)
            .field("timeout_secs", &self.timeout_secs)
            .field("disable_ocr", &self.disable_ocr)
            .field("suppress_embedded", &self.suppress_embedded)
            .field("min_lines_ocr_trigger", &self.min_lines_ocr_trigger)
            .field("trigger_ocr_page_ratio", &self.trigger_ocr_page_ratio)
            .field("max_chars_per_page", &self.max_chars_per_page)
            .field("preserve_vertical_whitespace", &self.preserve_vertical_whitespace)
            .finish_non_exhaustive()
    }
}

/// Partial configuration. Every `Some` field replaces the base value.
///
/// This is also the shape of the TOML config file, so a file only needs to
/// mention the settings it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub subscription_key: Option<String>,
    pub auto_client: Option<bool>,
    pub api_version: Option<String>,
    pub timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub disable_ocr: Option<bool>,
    pub suppress_embedded: Option<bool>,
    pub disable_progress_bar: Option<bool>,
    pub min_lines_ocr_trigger: Option<usize>,
    pub trigger_ocr_page_ratio: Option<f64>,
    pub max_chars_per_page: Option<usize>,
    pub handwritten_confidence_limit: Option<f32>,
    pub min_ocr_rotation_degrees: Option<f64>,
    pub ocr_positioning_scale: Option<f64>,
    pub ocr_line_height_scale: Option<f64>,
    pub scale_weight: Option<f64>,
    pub font_height_weight: Option<f64>,
    pub preserve_vertical_whitespace: Option<bool>,
    pub max_workers: Option<usize>,
    pub embedded_workers: Option<usize>,
}

macro_rules! apply_overrides {
    ($target:expr, $overrides:expr, [$($field:ident),* $(,)?]) => {
        $(
            if let Some(value) = $overrides.$field.clone() {
                $target.$field = value;
            }
        )*
    };
}

impl ConfigOverrides {
    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(fields)) => fields.values().all(|v| v.is_null()),
            _ => false,
        }
    }

    /// Write every set field onto `config`.
    pub fn apply_to(&self, config: &mut ExtractConfig) {
        apply_overrides!(
            config,
            self,
            [
                endpoint,
                subscription_key,
                auto_client,
                api_version,
                timeout_secs,
                poll_interval_ms,
                disable_ocr,
                suppress_embedded,
                disable_progress_bar,
                min_lines_ocr_trigger,
                trigger_ocr_page_ratio,
                max_chars_per_page,
                handwritten_confidence_limit,
                min_ocr_rotation_degrees,
                ocr_positioning_scale,
                ocr_line_height_scale,
                scale_weight,
                font_height_weight,
                preserve_vertical_whitespace,
                max_workers,
                embedded_workers,
            ]
        );
    }
}

impl ExtractConfig {
    /// Resolve a configuration from an optional base and explicit overrides,
    /// then validate it.
    pub fn resolve(
        base: Option<&ExtractConfig>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut config = base.cloned().unwrap_or_default();
        overrides.apply_to(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides on top of this config, returning a new validated config.
    pub fn with_overrides(&self, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        Self::resolve(Some(self), overrides)
    }

    /// Load a TOML file as instance config layered over the process defaults.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: ConfigOverrides =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        tracing::debug!("Loaded config from {}", path.display());
        Self::resolve(None, &file)
    }

    /// Reject values that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if !(0.0..=1.0).contains(&self.trigger_ocr_page_ratio) {
            return Err(invalid(
                "trigger_ocr_page_ratio",
                format!("{} is outside [0, 1]", self.trigger_ocr_page_ratio),
            ));
        }
        if !(0.0..=1.0).contains(&self.handwritten_confidence_limit) {
            return Err(invalid(
                "handwritten_confidence_limit",
                format!("{} is outside [0, 1]", self.handwritten_confidence_limit),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs", "must be greater than zero"));
        }
        if !(self.min_ocr_rotation_degrees >= 0.0) {
            return Err(invalid("min_ocr_rotation_degrees", "must be non-negative"));
        }
        if !(self.ocr_positioning_scale > 0.0) {
            return Err(invalid("ocr_positioning_scale", "must be positive"));
        }
        if !(self.ocr_line_height_scale > 0.0 && self.ocr_line_height_scale <= 100.0) {
            return Err(invalid("ocr_line_height_scale", "must be within (0, 100]"));
        }
        if !(self.scale_weight > 0.0) {
            return Err(invalid("scale_weight", "must be positive"));
        }
        if !(self.font_height_weight > 0.0) {
            return Err(invalid("font_height_weight", "must be positive"));
        }
        if self.max_workers == 0 {
            return Err(invalid("max_workers", "must be at least 1"));
        }
        if self.embedded_workers == 0 {
            return Err(invalid("embedded_workers", "must be at least 1"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Endpoint and key, if both are present. Config values win over the
    /// environment; the environment is consulted at call time so credentials
    /// supplied after startup are picked up.
    pub fn credentials(&self) -> Option<(String, String)> {
        let pick = |configured: &str, env: &str| {
            if configured.trim().is_empty() {
                std::env::var(env).ok().filter(|v| !v.trim().is_empty())
            } else {
                Some(configured.trim().to_string())
            }
        };
        Some((
            pick(&self.endpoint, ENDPOINT_ENV)?,
            pick(&self.subscription_key, SUBSCRIPTION_KEY_ENV)?,
        ))
    }
}
