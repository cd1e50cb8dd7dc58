use crate::error::{PipelineError, Result};
use crate::topics::{normalize_day, weekday_name, TopicCatalog};
use chrono::Weekday;
use rand::seq::IndexedRandom;
use rand::RngCore;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicChoice {
    /// Weekday the topic was drawn for; `None` when the caller supplied the topic.
    pub day: Option<String>,
    pub topic: String,
}

/// Uniform choices over background videos and catalog topics, driven by an injected random source.
pub struct Selector {
    rng: Box<dyn RngCore + Send>,
}

impl Selector {
    pub fn new(rng: Box<dyn RngCore + Send>) -> Self {
        Self { rng }
    }

    pub fn pick_video(&mut self, videos: &[PathBuf]) -> Result<PathBuf> {
        videos.choose(&mut *self.rng).cloned().ok_or_else(|| {
            PipelineError::ConfigurationMissing("no background videos configured".to_string())
        })
    }

    pub fn resolve_topic(
        &mut self,
        catalog: &TopicCatalog,
        topic: Option<&str>,
        day: Option<&str>,
        today: Weekday,
    ) -> Result<TopicChoice> {
        if let Some(topic) = topic {
            return Ok(TopicChoice {
                day: None,
                topic: topic.to_string(),
            });
        }

        let day = match day {
            Some(d) => normalize_day(d),
            None => weekday_name(today).to_string(),
        };
        let topic = catalog
            .topics_for(&day)
            .choose(&mut *self.rng)
            .cloned()
            .ok_or_else(|| PipelineError::EmptyTopicPool { day: day.clone() })?;

        Ok(TopicChoice {
            day: Some(day),
            topic,
        })
    }
}
