//! Error types for the session engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Scenario has no stages")]
    EmptyScenario,

    #[error("Stage index {index} out of range (scenario has {len} stages)")]
    StageOutOfRange { index: usize, len: usize },

    #[error("Unknown transcript entry: {0}")]
    UnknownEntry(String),

    #[error("Unknown voting option: {0}")]
    UnknownOption(String),

    #[error("Unknown stage event: {0}")]
    UnknownEvent(String),

    #[error("Unknown character: {0}")]
    UnknownCharacter(String),

    #[error("Prompt too long: {actual} characters (max {max})")]
    PromptTooLong { max: usize, actual: usize },

    #[error("Character '{name}' returned an empty response after {attempts} attempts")]
    EmptyResponse { name: String, attempts: u32 },

    #[error("OpenAI API error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),

    #[error("Snapshot error: {0}")]
    SnapshotError(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
