//! Agora Core Library
//!
//! Runs a classroom role-play session: staged timing, randomly scheduled
//! stage events, the argument transcript, voting, AI character responses
//! and crash-safe auto-save.

pub mod config;
pub mod debounce;
pub mod error;
pub mod responder;
pub mod scenario;
pub mod schedule;
pub mod session;
pub mod snapshot;
pub mod timer;
pub mod transcript;

pub use config::{Config, SessionSettings, default_config};
pub use debounce::Debouncer;
pub use error::SessionError;
pub use responder::{
    ArgumentTags, CharacterResponder, OpenAiResponder, ResponderConfig, classify_argument,
    generate_npc_response,
};
pub use scenario::{
    CharacterSheet, NpcCharacter, NpcResponse, Scenario, Stage, StageEvent, StageType,
    StudentRole, VotingOption,
};
pub use schedule::{EventStatus, RandomSource, RngSource, ScheduledEvent, TriggeredEvents};
pub use session::{Banner, Session, SessionCallback, SessionEvent};
pub use snapshot::{
    AutoSaver, FileSnapshotStore, MemorySnapshotStore, SessionSnapshot, SnapshotStore,
    load_resumable,
};
pub use timer::Timer;
pub use transcript::{
    Analysis, ArgumentStance, DemographicBucket, RhetoricMode, StanceCounts, Transcript,
    TranscriptEntry,
};
