use thiserror::Error;

/// Main error type for the clip compositor
#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Invalid input: {details}")]
    InvalidInput { details: String },

    #[error("Unknown transition kind: {kind}")]
    UnknownTransitionKind { kind: String },

    #[error("Unknown effect kind: {kind}")]
    UnknownEffectKind { kind: String },

    #[error("Video processing error: {0}")]
    Video(#[from] VideoError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading, rendering or encoding frames
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Failed to load clip source: {path}")]
    LoadFailed { path: String },

    #[error("Unsupported input format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Video encoding failed: {reason}")]
    EncodingFailed { reason: String },

    #[error("Frame processing failed: {reason}")]
    FrameProcessingFailed { reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path} ({reason})")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using CompositorError
pub type Result<T> = std::result::Result<T, CompositorError>;

impl CompositorError {
    /// Build an `InvalidInput` error from a message
    pub fn invalid_input<S: Into<String>>(details: S) -> Self {
        Self::InvalidInput {
            details: details.into(),
        }
    }

    /// Check if this error is recoverable (can be retried)
    ///
    /// Invalid inputs and unknown kinds are caller mistakes and never succeed
    /// on a second attempt.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Video(VideoError::LoadFailed { .. }) => true,
            Self::Video(VideoError::EncodingFailed { .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::UnknownTransitionKind { kind } => {
                format!(
                    "Transition '{}' not found. Available transitions: none, crossfade, fade_black, fade_white, slide_left, slide_right, zoom_in, zoom_out",
                    kind
                )
            }
            Self::UnknownEffectKind { kind } => {
                format!(
                    "Effect '{}' not found. Available effects: none, blur, sharpen, mirror_x, mirror_y, speed_up, slow_down, noise, vignette",
                    kind
                )
            }
            Self::Video(VideoError::LoadFailed { path }) => {
                format!(
                    "Could not load '{}'. Please check it is an image or a directory of images.",
                    path
                )
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
