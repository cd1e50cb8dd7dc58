pub mod compose;
pub mod config;
pub mod error;
pub mod llm;
pub mod script;
pub mod selector;
pub mod topics;
pub mod tts;
pub mod workflow;
