use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    composition::{ConcatMode, TransitionKind},
    effects::{ColorGrading, EffectConfig},
    error::{ConfigError, Result},
};

/// Main configuration for the clip compositor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How clips are joined
    pub composition: CompositionConfig,

    /// Color adjustments applied to the finished timeline
    pub grading: ColorGrading,

    /// Optional effect applied after grading
    pub effect: EffectConfig,

    /// Encoding settings
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.composition.validate()?;
        self.grading
            .validate()
            .map_err(|e| invalid("grading", e.to_string()))?;
        self.effect
            .validate()
            .map_err(|e| invalid("effect", e.to_string()))?;
        self.output.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, value: String) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    }
}

/// Composition engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    /// Hard cuts or transitions at every junction
    pub mode: ConcatMode,

    /// Transition used in `transition` mode
    pub transition: TransitionKind,

    /// Transition length in seconds (0.1-10.0)
    pub transition_duration: f64,

    /// Forces the output frame rate; the first clip's rate otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f64>,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            mode: ConcatMode::Simple,
            transition: TransitionKind::Crossfade,
            transition_duration: 1.0,
            frame_rate: None,
        }
    }
}

impl CompositionConfig {
    fn validate(&self) -> Result<()> {
        if !(0.1..=10.0).contains(&self.transition_duration) {
            return Err(invalid(
                "composition.transition_duration",
                self.transition_duration.to_string(),
            )
            .into());
        }

        if let Some(rate) = self.frame_rate {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(invalid("composition.frame_rate", rate.to_string()).into());
            }
        }

        Ok(())
    }
}

/// Video codec passed to ffmpeg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    Libx264,
    Libx265,
    Mpeg4,
}

impl Codec {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Libx264 => "libx264",
            Self::Libx265 => "libx265",
            Self::Mpeg4 => "mpeg4",
        }
    }

    /// Only the x264/x265 encoders understand `-preset`
    pub fn supports_preset(&self) -> bool {
        matches!(self, Self::Libx264 | Self::Libx265)
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoder speed/size trade-off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Ultrafast,
    Fast,
    #[default]
    Medium,
    Slow,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output encoding configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub codec: Codec,

    /// ffmpeg bitrate string such as `8000k` or `12M`
    pub bitrate: String,

    pub preset: Preset,

    /// Number of parallel frame rendering threads
    pub processing_threads: usize,

    /// Frame rate assumed for image sequences
    pub input_fps: f64,

    /// Seconds a single still image is shown
    pub still_duration: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            codec: Codec::Libx264,
            bitrate: "8000k".to_string(),
            preset: Preset::Medium,
            processing_threads: num_cpus::get(),
            input_fps: 30.0,
            still_duration: 3.0,
        }
    }
}

impl OutputConfig {
    fn validate(&self) -> Result<()> {
        if !is_valid_bitrate(&self.bitrate) {
            return Err(invalid("output.bitrate", self.bitrate.clone()).into());
        }

        if self.processing_threads == 0 {
            return Err(invalid(
                "output.processing_threads",
                self.processing_threads.to_string(),
            )
            .into());
        }

        if !self.input_fps.is_finite() || self.input_fps <= 0.0 {
            return Err(invalid("output.input_fps", self.input_fps.to_string()).into());
        }

        if !self.still_duration.is_finite() || self.still_duration <= 0.0 {
            return Err(invalid("output.still_duration", self.still_duration.to_string()).into());
        }

        Ok(())
    }
}

/// Digits with an optional `k`/`K`/`m`/`M` suffix
fn is_valid_bitrate(bitrate: &str) -> bool {
    let digits = bitrate.trim_end_matches(['k', 'K', 'm', 'M']);
    !digits.is_empty()
        && bitrate.len() - digits.len() <= 1
        && digits.chars().all(|c| c.is_ascii_digit())
}
