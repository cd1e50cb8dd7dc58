use crate::config::LlmConfig;
use crate::error::{LlmError, PipelineError, Result};
use crate::llm::LlmClient;
use log::{debug, warn};
use std::fmt;
use std::time::Duration;

/// Generated narration, trimmed and guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationScript(String);

impl NarrationScript {
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NarrationScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn build_prompt(topic: &str) -> String {
    format!(
        "Write a narration script for a short-form vertical video about {topic}. \
        The audience is 18 to 30 year olds who are interested in {topic}. \
        Grab their attention within the first three seconds and keep every sentence concise. \
        The script must take about sixty seconds to read aloud. \
        Finish with a call to action asking viewers to like, comment and share. \
        Return only the words to be spoken, with no titles, stage directions or emojis."
    )
}

pub struct ScriptGenerator {
    retry_count: usize,
    retry_delay: Duration,
}

impl ScriptGenerator {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            retry_count: config.retry_count,
            retry_delay: Duration::from_secs(config.retry_delay_seconds),
        }
    }

    /// Sends the prompt for `topic`, retrying transient backend errors at most `retry_count` times.
    pub async fn generate(&self, llm: &dyn LlmClient, topic: &str) -> Result<NarrationScript> {
        let prompt = build_prompt(topic);
        debug!("Prompt ({} chars): {}", prompt.len(), prompt);

        let mut attempt = 0;
        let text = loop {
            match llm.generate(&prompt).await {
                Ok(text) => break text,
                Err(e) if e.is_retryable() && attempt < self.retry_count => {
                    attempt += 1;
                    warn!(
                        "Script generation failed (attempt {}/{}): {}, retrying...",
                        attempt,
                        self.retry_count + 1,
                        e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(LlmError::Unauthorized(msg)) => {
                    return Err(PipelineError::AuthenticationError(msg));
                }
                Err(e) => return Err(PipelineError::GenerationError(e.to_string())),
            }
        };

        NarrationScript::new(text).ok_or_else(|| {
            PipelineError::GenerationError("backend returned an empty script".to_string())
        })
    }
}
