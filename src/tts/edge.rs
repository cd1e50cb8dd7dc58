use crate::config::AudioConfig;
use crate::tts::TtsClient;
use anyhow::{anyhow, Result};
use async_trait::async_trait;

const OUTPUT_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";

/// Microsoft Edge read-aloud voices.
pub struct EdgeTtsClient {
    voice: String,
    language: String,
}

impl EdgeTtsClient {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            voice: config.voice.clone(),
            language: config.language.clone(),
        }
    }

    fn ssml(&self, text: &str) -> String {
        let lang = if self.language.contains('-') {
            self.language.clone()
        } else {
            // Voice names start with their locale, e.g. en-US-AriaNeural.
            self.voice
                .splitn(3, '-')
                .take(2)
                .collect::<Vec<_>>()
                .join("-")
        };
        format!(
            "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' \
             xml:lang='{}'><voice name='{}'>{}</voice></speak>",
            lang,
            self.voice,
            escape_xml(text)
        )
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[async_trait]
impl TtsClient for EdgeTtsClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let ssml = self.ssml(text);

        tokio::task::spawn_blocking(move || {
            edge_tts::request_audio(&ssml, OUTPUT_FORMAT)
                .map_err(|e| anyhow!("Edge TTS crate error: {:?}", e))
        })
        .await?
    }
}
