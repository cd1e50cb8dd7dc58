use std::fmt;
use thiserror::Error;

/// Pipeline stage a failure belongs to, used when reporting a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    Select,
    Generate,
    Synthesize,
    Compose,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Setup => "setup",
            Stage::Select => "selection",
            Stage::Generate => "script generation",
            Stage::Synthesize => "speech synthesis",
            Stage::Compose => "video composition",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("configuration invalid: {0}")]
    ConfigurationInvalid(String),

    #[error("authentication failed: {0}")]
    AuthenticationError(String),

    #[error("no topics configured for {day}")]
    EmptyTopicPool { day: String },

    #[error("script generation failed: {0}")]
    GenerationError(String),

    #[error("speech synthesis failed: {0}")]
    SynthesisError(String),

    #[error("could not load media: {0}")]
    MediaLoadError(String),

    #[error("render failed: {0}")]
    RenderError(String),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::ConfigurationMissing(_) | PipelineError::ConfigurationInvalid(_) => {
                Stage::Setup
            }
            PipelineError::EmptyTopicPool { .. } => Stage::Select,
            PipelineError::AuthenticationError(_) | PipelineError::GenerationError(_) => {
                Stage::Generate
            }
            PipelineError::SynthesisError(_) => Stage::Synthesize,
            PipelineError::MediaLoadError(_) | PipelineError::RenderError(_) => Stage::Compose,
        }
    }

    /// User-facing message naming the failed stage and its cause.
    pub fn report(&self) -> String {
        format!("{} stage failed: {}", self.stage(), self)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failure reported by a text-generation backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("transient backend error: {0}")]
    Transient(String),

    #[error("{0}")]
    Permanent(String),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Transient(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            LlmError::Transient(e.to_string())
        } else {
            LlmError::Permanent(e.to_string())
        }
    }
}
