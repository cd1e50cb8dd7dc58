use crate::config::AudioConfig;
use crate::error::{PipelineError, Result};
use crate::script::NarrationScript;
use async_trait::async_trait;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod edge;

#[async_trait]
pub trait TtsClient: Send + Sync {
    /// Returns encoded audio for `text`.
    async fn synthesize(&self, text: &str) -> anyhow::Result<Vec<u8>>;
}

pub fn create_tts_client(config: &AudioConfig) -> Box<dyn TtsClient> {
    Box::new(edge::EdgeTtsClient::new(config))
}

/// Narration audio on disk, owned by a single run. The file is removed exactly once,
/// by [`AudioArtifact::release`] or when the value is dropped.
#[derive(Debug)]
pub struct AudioArtifact {
    path: PathBuf,
    released: bool,
}

impl AudioArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) -> std::io::Result<()> {
        self.released = true;
        remove_if_present(&self.path)
    }
}

impl Drop for AudioArtifact {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = remove_if_present(&self.path) {
            warn!("Failed to remove {}: {}", self.path.display(), e);
        }
    }
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Turns a script into an audio file at a fixed path.
pub struct Narrator {
    tts: Box<dyn TtsClient>,
    output_path: PathBuf,
    retry_count: usize,
    retry_delay: Duration,
    timeout: Duration,
}

impl Narrator {
    pub fn new(tts: Box<dyn TtsClient>, config: &AudioConfig, output_path: PathBuf) -> Self {
        Self {
            tts,
            output_path,
            retry_count: config.retry_count,
            retry_delay: Duration::from_secs(config.retry_delay_seconds),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn narrate(&self, script: &NarrationScript) -> Result<AudioArtifact> {
        let text = script.as_str();
        if text.trim().is_empty() {
            return Err(PipelineError::SynthesisError("narration text is empty".to_string()));
        }

        let mut attempt = 0;
        let audio = loop {
            let result = match tokio::time::timeout(self.timeout, self.tts.synthesize(text)).await
            {
                Ok(r) => r,
                Err(_) => Err(anyhow::anyhow!("timed out after {:?}", self.timeout)),
            };
            match result {
                Ok(bytes) if !bytes.is_empty() => break bytes,
                Ok(_) => {
                    return Err(PipelineError::SynthesisError(
                        "speech engine returned no audio".to_string(),
                    ))
                }
                Err(e) if attempt < self.retry_count => {
                    attempt += 1;
                    warn!(
                        "Speech synthesis failed (attempt {}/{}): {:#}, retrying...",
                        attempt,
                        self.retry_count + 1,
                        e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(PipelineError::SynthesisError(format!("{:#}", e))),
            }
        };

        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| PipelineError::SynthesisError(e.to_string()))?;
            }
        }
        fs::write(&self.output_path, &audio).map_err(|e| {
            PipelineError::SynthesisError(format!("{}: {}", self.output_path.display(), e))
        })?;
        debug!(
            "Wrote {} bytes of narration to {}",
            audio.len(),
            self.output_path.display()
        );

        Ok(AudioArtifact::new(self.output_path.clone()))
    }
}
