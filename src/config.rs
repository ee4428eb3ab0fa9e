use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::coordinator::HeightPolicy;
use crate::error::{LiveHtmlError, LiveHtmlResult};
use crate::measure::StrategyKind;
use crate::sandbox::{DialogPolicy, SandboxPolicy};

const MAX_ATTEMPTS_LIMIT: u32 = 50;

/// Settings for the embedded side: document scoping and the height reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RendererConfig {
    /// Minimum change in pixels before a new height is reported.
    pub noise_threshold_px: u32,
    /// Quiet period after the last trigger before measuring.
    pub debounce_ms: u64,
    /// Safety poll interval.
    pub poll_interval_ms: u64,
    /// Debounced measurements allowed per mutation burst.
    pub max_attempts: u32,
    /// Height reported when measurement fails before any success.
    pub fallback_height_px: u32,
    /// Container height before the first report arrives.
    pub initial_height_px: u32,
    pub body_padding_px: u32,
    /// Stop `vh`-sized content from growing with the frame it sizes.
    pub neutralize_viewport_units: bool,
    pub strategy: StrategyKind,
    /// `lang` attribute of the generated document.
    pub language: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            noise_threshold_px: 5,
            debounce_ms: 80,
            poll_interval_ms: 1500,
            max_attempts: 8,
            fallback_height_px: 150,
            initial_height_px: 200,
            body_padding_px: 10,
            neutralize_viewport_units: true,
            strategy: StrategyKind::MultiMetric,
            language: "en".to_string(),
        }
    }
}

impl RendererConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> LiveHtmlResult<()> {
        if self.debounce_ms == 0 {
            return Err(invalid("renderer.debounceMs", "must be greater than 0"));
        }
        if self.poll_interval_ms <= self.debounce_ms {
            return Err(invalid(
                "renderer.pollIntervalMs",
                format!("must be greater than debounceMs ({})", self.debounce_ms),
            ));
        }
        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(invalid(
                "renderer.maxAttempts",
                format!("must be between 1 and {}", MAX_ATTEMPTS_LIMIT),
            ));
        }
        if self.language.trim().is_empty() || self.language.contains(['"', '<', '>', ' ']) {
            return Err(invalid("renderer.language", "must be a plain language tag"));
        }
        Ok(())
    }
}

/// Full preview configuration, usually loaded from YAML.
///
/// ```yaml
/// renderer:
///   debounceMs: 60
///   strategy: scrollOnly
/// host:
///   maxViewportFraction: 0.9
/// sandbox:
///   modals: true
/// dialogs: passthrough
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreviewConfig {
    pub renderer: RendererConfig,
    pub host: HeightPolicy,
    pub sandbox: SandboxPolicy,
    pub dialogs: DialogPolicy,
    /// Info string of fenced blocks rendered as live previews.
    pub fence_language: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            renderer: RendererConfig::default(),
            host: HeightPolicy::default(),
            sandbox: SandboxPolicy::default(),
            dialogs: DialogPolicy::default(),
            fence_language: "html-live".to_string(),
        }
    }
}

impl PreviewConfig {
    /// Parse and validate a YAML document. Missing keys take defaults.
    pub fn from_yaml(yaml: &str) -> LiveHtmlResult<Self> {
        let config: PreviewConfig = if yaml.trim().is_empty() {
            PreviewConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> LiveHtmlResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| LiveHtmlError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> LiveHtmlResult<()> {
        self.renderer.validate()?;
        self.host.validate()?;
        if self.fence_language.trim().is_empty() {
            return Err(invalid("fenceLanguage", "must not be empty"));
        }
        Ok(())
    }
}

pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> LiveHtmlError {
    LiveHtmlError::InvalidConfig {
        field: field.to_string(),
        reason: reason.into(),
    }
}
