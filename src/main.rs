use anyhow::Result;
use clap::Parser;
use daily_shorts::compose::FfmpegEngine;
use daily_shorts::config::Config;
use daily_shorts::error::PipelineError;
use daily_shorts::llm::create_llm;
use daily_shorts::topics::TopicCatalog;
use daily_shorts::tts::create_tts_client;
use daily_shorts::workflow::{RunOptions, WorkflowManager};
use std::time::Duration;

/// Generate a narrated short-form video about today's topic.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Weekday whose topic list to draw from, e.g. "Monday"
    #[arg(long)]
    day: Option<String>,

    /// Use this topic instead of drawing one from the catalog
    #[arg(long)]
    topic: Option<String>,
}

/// How long to wait at exit for a speech request that already timed out.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

fn main() {
    env_logger::init();
    let args = Args::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };
    let result = runtime.block_on(run(args));
    // A stalled blocking TTS call must not keep the process alive after the run is over.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    if let Err(e) = result {
        match e.downcast_ref::<PipelineError>() {
            Some(err) => eprintln!("Error: {}", err.report()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    dotenvy::dotenv().ok();

    let mut config = Config::load()?;
    config.apply_env(|key| std::env::var(key).ok());

    let catalog = TopicCatalog::load(&config.topics_path)?;
    let llm = create_llm(&config.llm)?;
    let tts = create_tts_client(&config.audio);
    let media = Box::new(FfmpegEngine::new(&config));

    let mut manager = WorkflowManager::new(config, catalog, llm, tts, media);
    manager
        .run(&RunOptions {
            day: args.day,
            topic: args.topic,
        })
        .await?;

    Ok(())
}
