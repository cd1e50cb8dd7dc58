use crate::error::{PipelineError, Result};
use chrono::Weekday;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

pub fn weekday_name(day: Weekday) -> &'static str {
    WEEKDAYS[day.num_days_from_monday() as usize]
}

/// Canonical weekday name for `day`, or the trimmed input unchanged when it is not a weekday.
pub fn normalize_day(day: &str) -> String {
    let day = day.trim();
    match day.parse::<Weekday>() {
        Ok(weekday) => weekday_name(weekday).to_string(),
        Err(_) => day.to_string(),
    }
}

/// Weekday name to candidate topics, read once per run.
#[derive(Debug, Clone, Default)]
pub struct TopicCatalog {
    topics: HashMap<String, Vec<String>>,
}

impl TopicCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::ConfigurationMissing(format!(
                "topic file {} not found",
                path.display()
            )));
        }
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::ConfigurationMissing(format!("{}: {}", path.display(), e))
        })?;
        let catalog = Self::from_json(&content)?;
        log::debug!(
            "Loaded {} weekday entries from {}",
            catalog.topics.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: HashMap<String, Vec<String>> = serde_json::from_str(content)
            .map_err(|e| PipelineError::ConfigurationInvalid(format!("topic file: {}", e)))?;

        let mut topics = HashMap::new();
        for (day, entries) in raw {
            if !WEEKDAYS.contains(&day.as_str()) {
                return Err(PipelineError::ConfigurationInvalid(format!(
                    "unknown weekday key '{}'",
                    day
                )));
            }
            let entries: Vec<String> = entries
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            topics.insert(day, entries);
        }
        Ok(Self { topics })
    }

    /// Candidates for `day`; empty when the day has no entry.
    pub fn topics_for(&self, day: &str) -> &[String] {
        self.topics.get(day).map(Vec::as_slice).unwrap_or(&[])
    }
}
