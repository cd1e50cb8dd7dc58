use crate::compose::{Composer, MediaEngine};
use crate::config::Config;
use crate::error::Result;
use crate::llm::LlmClient;
use crate::script::{NarrationScript, ScriptGenerator};
use crate::selector::Selector;
use crate::topics::TopicCatalog;
use crate::tts::{Narrator, TtsClient};
use chrono::{Datelike, Weekday};
use log::info;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::path::PathBuf;

/// Optional overrides accepted from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub day: Option<String>,
    pub topic: Option<String>,
}

/// State threaded through one run, filled in stage by stage.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub day: Option<String>,
    pub topic: String,
    pub video: PathBuf,
    pub script: Option<NarrationScript>,
    pub audio_path: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

pub struct WorkflowManager {
    config: Config,
    catalog: TopicCatalog,
    selector: Selector,
    llm: Box<dyn LlmClient>,
    script_generator: ScriptGenerator,
    narrator: Narrator,
    composer: Composer,
    today: Weekday,
}

impl WorkflowManager {
    pub fn new(
        config: Config,
        catalog: TopicCatalog,
        llm: Box<dyn LlmClient>,
        tts: Box<dyn TtsClient>,
        media: Box<dyn MediaEngine>,
    ) -> Self {
        let script_generator = ScriptGenerator::new(&config.llm);
        let narrator = Narrator::new(tts, &config.audio, config.audio_path());
        let composer = Composer::new(media, &config);

        Self {
            config,
            catalog,
            selector: Selector::new(Box::new(StdRng::from_os_rng())),
            llm,
            script_generator,
            narrator,
            composer,
            today: chrono::Local::now().weekday(),
        }
    }

    pub fn with_rng(mut self, rng: Box<dyn RngCore + Send>) -> Self {
        self.selector = Selector::new(rng);
        self
    }

    pub fn with_today(mut self, today: Weekday) -> Self {
        self.today = today;
        self
    }

    /// Select, generate, synthesize and compose, stopping at the first failure.
    pub async fn run(&mut self, options: &RunOptions) -> Result<RunContext> {
        let mut ctx = RunContext::default();

        println!("Selecting topic...");
        let choice = self.selector.resolve_topic(
            &self.catalog,
            options.topic.as_deref(),
            options.day.as_deref(),
            self.today,
        )?;
        ctx.video = self.selector.pick_video(&self.config.background_videos)?;
        match &choice.day {
            Some(day) => println!("Topic for {}: {}", day, choice.topic),
            None => println!("Topic: {}", choice.topic),
        }
        info!("Background video: {}", ctx.video.display());
        ctx.day = choice.day;
        ctx.topic = choice.topic;

        println!("Generating script...");
        let script = self
            .script_generator
            .generate(self.llm.as_ref(), &ctx.topic)
            .await?;
        info!("Script is {} words", script.as_str().split_whitespace().count());
        ctx.script = Some(script.clone());

        println!("Synthesizing narration...");
        let audio = self.narrator.narrate(&script).await?;
        ctx.audio_path = Some(audio.path().to_path_buf());

        println!("Composing video...");
        let output = self.composer.compose(&ctx.video, audio, &script).await?;
        println!("Video saved to {}", output.display());
        ctx.output = Some(output);

        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::RenderJob;
    use crate::error::{LlmError, PipelineError};
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct MockLlmClient {
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl MockLlmClient {
        fn new() -> Self {
            Self {
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn generate(&self, prompt: &str) -> std::result::Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("Here is a sixty second story. Like, comment and share!".to_string())
        }
    }

    struct MockTtsClient {
        call_count: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl TtsClient for MockTtsClient {
        async fn synthesize(&self, _text: &str) -> anyhow::Result<Vec<u8>> {
            *self.call_count.lock().unwrap() += 1;
            Ok(vec![0u8; 10])
        }
    }

    struct MockEngine {
        fail_render: bool,
    }

    #[async_trait]
    impl MediaEngine for MockEngine {
        async fn probe_duration(&self, _path: &Path) -> anyhow::Result<f64> {
            Ok(30.0)
        }

        async fn render(&self, job: &RenderJob) -> anyhow::Result<()> {
            if self.fail_render {
                anyhow::bail!("Mock render error");
            }
            fs::write(&job.output, b"mp4")?;
            Ok(())
        }
    }

    struct Harness {
        _temp_dir: tempfile::TempDir,
        config: Config,
        prompts: Arc<Mutex<Vec<String>>>,
        tts_calls: Arc<Mutex<usize>>,
        manager: WorkflowManager,
    }

    fn harness(catalog_json: &str, today: Weekday, fail_render: bool) -> Harness {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let video = root.join("videos").join("background.mp4");
        fs::create_dir_all(video.parent().unwrap()).unwrap();
        fs::write(&video, b"video").unwrap();

        let mut config = Config {
            output_folder: root.join("output"),
            build_folder: root.join("build"),
            background_videos: vec![video],
            ..Config::default()
        };
        config.llm.retry_delay_seconds = 0;
        config.audio.retry_delay_seconds = 0;

        let catalog = TopicCatalog::from_json(catalog_json).unwrap();
        let llm = MockLlmClient::new();
        let prompts = llm.prompts.clone();
        let tts_calls = Arc::new(Mutex::new(0));
        let tts = MockTtsClient {
            call_count: tts_calls.clone(),
        };

        let manager = WorkflowManager::new(
            config.clone(),
            catalog,
            Box::new(llm),
            Box::new(tts),
            Box::new(MockEngine { fail_render }),
        )
        .with_rng(Box::new(StdRng::seed_from_u64(11)))
        .with_today(today);

        Harness {
            _temp_dir: temp_dir,
            config,
            prompts,
            tts_calls,
            manager,
        }
    }

    #[tokio::test]
    async fn test_day_override_picks_from_that_day() {
        let mut h = harness(
            r#"{"Monday": ["Stoicism", "Roman History"], "Friday": ["Volcanoes"]}"#,
            Weekday::Fri,
            false,
        );
        let options = RunOptions {
            day: Some("Monday".to_string()),
            topic: None,
        };

        let ctx = h.manager.run(&options).await.unwrap();
        assert_eq!(ctx.day.as_deref(), Some("Monday"));
        assert!(["Stoicism", "Roman History"].contains(&ctx.topic.as_str()));
        assert!(h.prompts.lock().unwrap()[0].contains(&ctx.topic));
    }

    #[tokio::test]
    async fn test_topic_override_reaches_prompt() {
        let mut h = harness(r#"{"Monday": ["Stoicism"]}"#, Weekday::Sun, false);
        let options = RunOptions {
            day: None,
            topic: Some("Quantum Computing".to_string()),
        };

        let ctx = h.manager.run(&options).await.unwrap();
        assert_eq!(ctx.topic, "Quantum Computing");
        let prompts = h.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Quantum Computing"));
    }

    #[tokio::test]
    async fn test_missing_weekday_fails_before_any_backend_call() {
        let mut h = harness(r#"{"Monday": ["Stoicism"]}"#, Weekday::Sun, false);

        let err = h.manager.run(&RunOptions::default()).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyTopicPool { ref day } if day == "Sunday"));
        assert!(h.prompts.lock().unwrap().is_empty());
        assert_eq!(*h.tts_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_successful_run_leaves_only_output() {
        let mut h = harness(r#"{"Wednesday": ["Ancient Egypt"]}"#, Weekday::Wed, false);

        let ctx = h.manager.run(&RunOptions::default()).await.unwrap();
        let output = ctx.output.clone().unwrap();
        assert_eq!(output, h.config.output_folder.join("brain_rot_video.mp4"));
        assert!(output.exists());

        let outputs: Vec<_> = fs::read_dir(&h.config.output_folder).unwrap().collect();
        assert_eq!(outputs.len(), 1);

        let audio = ctx.audio_path.unwrap();
        assert_eq!(audio, h.config.audio_path());
        assert!(!audio.exists());
        assert_eq!(ctx.topic, "Ancient Egypt");
        assert!(ctx.script.is_some());
    }

    #[tokio::test]
    async fn test_failed_render_removes_audio() {
        let mut h = harness(r#"{"Wednesday": ["Ancient Egypt"]}"#, Weekday::Wed, true);

        let err = h.manager.run(&RunOptions::default()).await.unwrap_err();
        assert!(matches!(err, PipelineError::RenderError(_)));
        assert!(!h.config.audio_path().exists());
        assert_eq!(*h.tts_calls.lock().unwrap(), 1);
    }
}
