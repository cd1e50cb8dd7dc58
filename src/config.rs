use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_topics_path")]
    pub topics_path: PathBuf,

    #[serde(default = "default_output")]
    pub output_folder: PathBuf,

    #[serde(default = "default_build")]
    pub build_folder: PathBuf,

    #[serde(default = "default_output_file_name")]
    pub output_file_name: String,

    /// Append a local timestamp to the output name so runs do not overwrite each other.
    #[serde(default)]
    pub unique_output: bool,

    #[serde(default = "default_background_videos")]
    pub background_videos: Vec<PathBuf>,

    #[serde(default)]
    pub duration_fit: DurationFit,

    #[serde(default)]
    pub caption: CaptionConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: String,

    #[serde(default = "default_ffprobe")]
    pub ffprobe_path: String,
}

/// How narration and background are reconciled when their lengths differ.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DurationFit {
    /// Stop at whichever stream ends first.
    Trim,
    /// Loop the background until the narration ends.
    #[default]
    Loop,
    /// Keep the full background and pad the narration with silence.
    Pad,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CaptionConfig {
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    pub font_path: Option<PathBuf>,
    #[serde(default = "default_max_line_chars")]
    pub max_line_chars: usize,
    #[serde(default = "default_caption_margin")]
    pub margin: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String, // "gemini" or "openai"
    #[serde(default = "default_llm_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// Normally left empty and supplied through the environment.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_retry_count")]
    pub retry_count: usize,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AudioConfig {
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_audio_retry_count")]
    pub retry_count: usize,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_topics_path() -> PathBuf {
    PathBuf::from("topics.json")
}
fn default_output() -> PathBuf {
    PathBuf::from("output")
}
fn default_build() -> PathBuf {
    PathBuf::from("build")
}
fn default_output_file_name() -> String {
    "brain_rot_video.mp4".to_string()
}
fn default_background_videos() -> Vec<PathBuf> {
    vec![PathBuf::from("videos/background.mp4")]
}
fn default_font_size() -> u32 {
    48
}
fn default_max_line_chars() -> usize {
    32
}
fn default_caption_margin() -> u32 {
    120
}
fn default_llm_provider() -> String {
    "gemini".to_string()
}
fn default_llm_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_retry_count() -> usize {
    3
}
fn default_audio_retry_count() -> usize {
    2
}
fn default_retry_delay() -> u64 {
    2
}
fn default_timeout() -> u64 {
    60
}
fn default_voice() -> String {
    "en-US-AriaNeural".to_string()
}
fn default_language() -> String {
    "en".to_string()
}
fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}
fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            font_size: default_font_size(),
            font_path: None,
            max_line_chars: default_max_line_chars(),
            margin: default_caption_margin(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            base_url: None,
            api_key: None,
            retry_count: default_retry_count(),
            retry_delay_seconds: default_retry_delay(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            voice: default_voice(),
            language: default_language(),
            retry_count: default_audio_retry_count(),
            retry_delay_seconds: default_retry_delay(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            topics_path: default_topics_path(),
            output_folder: default_output(),
            build_folder: default_build(),
            output_file_name: default_output_file_name(),
            unique_output: false,
            background_videos: default_background_videos(),
            duration_fit: DurationFit::default(),
            caption: CaptionConfig::default(),
            llm: LlmConfig::default(),
            audio: AudioConfig::default(),
            ffmpeg_path: default_ffmpeg(),
            ffprobe_path: default_ffprobe(),
        }
    }
}

impl Config {
    /// Reads `config.yml` from the working directory, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::ConfigurationMissing(format!("{}: {}", path.display(), e))
        })?;
        serde_yaml_ng::from_str(&content).map_err(|e| {
            PipelineError::ConfigurationInvalid(format!("{}: {}", path.display(), e))
        })
    }

    /// Fills credentials and the caption font from the given environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let key_var = match self.llm.provider.as_str() {
            "openai" => "OPENAI_API_KEY",
            _ => "GEMINI_API_KEY",
        };
        if let Some(key) = lookup(key_var).filter(|k| !k.trim().is_empty()) {
            self.llm.api_key = Some(key);
        }
        if let Some(font) = lookup("FONT_PATH").filter(|f| !f.trim().is_empty()) {
            self.caption.font_path = Some(PathBuf::from(font));
        }
    }

    pub fn audio_path(&self) -> PathBuf {
        self.build_folder.join("narration.mp3")
    }

    pub fn caption_path(&self) -> PathBuf {
        self.build_folder.join("caption.txt")
    }
}
