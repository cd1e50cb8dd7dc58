use crate::config::{CaptionConfig, Config, DurationFit};
use crate::error::{PipelineError, Result};
use crate::script::NarrationScript;
use crate::tts::AudioArtifact;
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

/// Everything needed for one ffmpeg invocation.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub video: PathBuf,
    pub audio: PathBuf,
    pub caption_file: PathBuf,
    pub output: PathBuf,
    pub fit: DurationFit,
    pub video_duration: f64,
    pub audio_duration: f64,
    pub caption: CaptionConfig,
}

impl RenderJob {
    pub fn caption_filter(&self) -> String {
        // expansion=none keeps '%' and '\\' in the narration literal.
        let mut filter = format!(
            "drawtext=textfile={}:expansion=none:fontcolor=white:fontsize={}\
            :box=1:boxcolor=black:boxborderw=12:line_spacing=8\
            :x=(w-text_w)/2:y=h-text_h-{}",
            escape_filter_value(&self.caption_file.to_string_lossy()),
            self.caption.font_size,
            self.caption.margin
        );
        if let Some(font) = &self.caption.font_path {
            filter.push_str(&format!(
                ":fontfile={}",
                escape_filter_value(&font.to_string_lossy())
            ));
        }
        filter
    }

    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into(), "-hide_banner".into()];

        if self.fit == DurationFit::Loop {
            args.extend(["-stream_loop".into(), "-1".into()]);
        }
        args.extend(["-i".into(), self.video.to_string_lossy().into_owned()]);
        args.extend(["-i".into(), self.audio.to_string_lossy().into_owned()]);

        args.extend(["-vf".into(), self.caption_filter()]);
        // Narration replaces the background's own soundtrack.
        args.extend([
            "-map".into(),
            "0:v:0".into(),
            "-map".into(),
            "1:a:0".into(),
        ]);

        match self.fit {
            DurationFit::Trim => args.push("-shortest".into()),
            DurationFit::Loop => {
                args.extend(["-t".into(), format!("{:.3}", self.audio_duration)]);
            }
            DurationFit::Pad => {
                args.extend(["-af".into(), "apad".into()]);
                args.extend(["-t".into(), format!("{:.3}", self.video_duration)]);
            }
        }

        args.extend(
            [
                "-c:v", "libx264", "-preset", "veryfast", "-pix_fmt", "yuv420p", "-c:a", "aac",
                "-b:a", "192k", "-movflags", "+faststart",
            ]
            .into_iter()
            .map(String::from),
        );
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

fn escape_filter_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\\\\\"),
            '\'' => out.push_str("\\\\\\'"),
            ':' => out.push_str("\\\\:"),
            ',' | ';' | '[' | ']' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Greedy word wrap so the caption block fits a vertical frame.
pub fn wrap_caption(text: &str, max_line_chars: usize) -> String {
    let max = max_line_chars.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.chars().count() + 1 + word.chars().count() <= max {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Length of a media file in seconds.
    async fn probe_duration(&self, path: &Path) -> anyhow::Result<f64>;
    async fn render(&self, job: &RenderJob) -> anyhow::Result<()>;
}

pub struct FfmpegEngine {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
        }
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn probe_duration(&self, path: &Path) -> anyhow::Result<f64> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.ffprobe))?;

        if !output.status.success() {
            bail!(
                "ffprobe failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .trim()
            .parse::<f64>()
            .map_err(|e| anyhow!("Unexpected ffprobe output '{}': {}", stdout.trim(), e))
    }

    async fn render(&self, job: &RenderJob) -> anyhow::Result<()> {
        let args = job.ffmpeg_args();
        debug!("{} {}", self.ffmpeg, args.join(" "));

        let pb = ProgressBar::new_spinner();
        let template = "{spinner:.green} [{elapsed_precise}] {msg}";
        let style = ProgressStyle::default_spinner().template(template)?;
        pb.set_style(style);
        pb.set_message("Rendering video...");
        pb.enable_steady_tick(Duration::from_millis(120));

        let output = Command::new(&self.ffmpeg).args(&args).output().await;
        pb.finish_and_clear();
        let output = output.with_context(|| format!("Failed to run {}", self.ffmpeg))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            bail!(
                "ffmpeg exited with {}: {}",
                output.status,
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            );
        }
        Ok(())
    }
}

/// Overlays narration and caption onto a background clip.
pub struct Composer {
    engine: Box<dyn MediaEngine>,
    output_folder: PathBuf,
    output_file_name: String,
    unique_output: bool,
    caption_path: PathBuf,
    caption: CaptionConfig,
    fit: DurationFit,
}

impl Composer {
    pub fn new(engine: Box<dyn MediaEngine>, config: &Config) -> Self {
        Self {
            engine,
            output_folder: config.output_folder.clone(),
            output_file_name: config.output_file_name.clone(),
            unique_output: config.unique_output,
            caption_path: config.caption_path(),
            caption: config.caption.clone(),
            fit: config.duration_fit,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        if !self.unique_output {
            return self.output_folder.join(&self.output_file_name);
        }
        let name = Path::new(&self.output_file_name);
        let stem = name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        let ext = name
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mp4".to_string());
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        self.output_folder.join(format!("{}_{}.{}", stem, stamp, ext))
    }

    /// Renders the final video. `audio` is consumed and deleted whether or not the render succeeds.
    pub async fn compose(
        &self,
        video: &Path,
        audio: AudioArtifact,
        script: &NarrationScript,
    ) -> Result<PathBuf> {
        let result = self.render_with(video, &audio, script).await;

        if self.caption_path.exists() {
            if let Err(e) = fs::remove_file(&self.caption_path) {
                warn!("Failed to remove {}: {}", self.caption_path.display(), e);
            }
        }
        if let Err(e) = audio.release() {
            warn!("Failed to remove narration audio: {}", e);
        }
        result
    }

    async fn render_with(
        &self,
        video: &Path,
        audio: &AudioArtifact,
        script: &NarrationScript,
    ) -> Result<PathBuf> {
        if !video.exists() {
            return Err(PipelineError::MediaLoadError(format!(
                "background video {} not found",
                video.display()
            )));
        }
        let video_duration = self.probe(video).await?;
        let audio_duration = self.probe(audio.path()).await?;
        info!(
            "Background {:.1}s, narration {:.1}s, fit {:?}",
            video_duration, audio_duration, self.fit
        );

        if let Some(parent) = self.caption_path.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::RenderError(e.to_string()))?;
        }
        fs::write(
            &self.caption_path,
            wrap_caption(script.as_str(), self.caption.max_line_chars),
        )
        .map_err(|e| {
            PipelineError::RenderError(format!("{}: {}", self.caption_path.display(), e))
        })?;

        fs::create_dir_all(&self.output_folder).map_err(|e| {
            PipelineError::RenderError(format!("{}: {}", self.output_folder.display(), e))
        })?;
        let output = self.output_path();

        let job = RenderJob {
            video: video.to_path_buf(),
            audio: audio.path().to_path_buf(),
            caption_file: self.caption_path.clone(),
            output: output.clone(),
            fit: self.fit,
            video_duration,
            audio_duration,
            caption: self.caption.clone(),
        };
        self.engine
            .render(&job)
            .await
            .map_err(|e| PipelineError::RenderError(format!("{:#}", e)))?;

        if !output.exists() {
            return Err(PipelineError::RenderError(format!(
                "renderer produced no file at {}",
                output.display()
            )));
        }
        Ok(output)
    }

    async fn probe(&self, path: &Path) -> Result<f64> {
        let duration = self
            .engine
            .probe_duration(path)
            .await
            .map_err(|e| PipelineError::MediaLoadError(format!("{}: {:#}", path.display(), e)))?;
        if !duration.is_finite() || duration <= 0.0 {
            return Err(PipelineError::MediaLoadError(format!(
                "{} has no playable duration",
                path.display()
            )));
        }
        Ok(duration)
    }
}
