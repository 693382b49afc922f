//! Scenario definitions: stages, stage events and characters.
//!
//! A scenario is the immutable script of a session. Stages are visited by
//! index and never reordered while a session runs.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Kind of activity a stage represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageType {
    /// Open class discussion.
    Freeform,
    /// Structured for/against debate.
    Debate,
    /// Individual speeches.
    Speech,
    /// AI characters react to the arguments so far.
    NpcResponse,
    /// The class votes.
    Vote,
    /// Characters deliver the verdict.
    Verdict,
    /// Post-session debrief.
    Debrief,
}

impl StageType {
    /// Live, timed group activity. Only these stages schedule events.
    pub fn is_live(&self) -> bool {
        matches!(self, StageType::Freeform | StageType::Debate | StageType::Speech)
    }

    pub fn is_verdict(&self) -> bool {
        matches!(self, StageType::Verdict | StageType::Debrief)
    }

    pub fn display_name(&self) -> &str {
        match self {
            StageType::Freeform => "Discussion",
            StageType::Debate => "Debate",
            StageType::Speech => "Speeches",
            StageType::NpcResponse => "Character Response",
            StageType::Vote => "Vote",
            StageType::Verdict => "Verdict",
            StageType::Debrief => "Debrief",
        }
    }
}

/// A possible interruption attached to a stage.
///
/// Delays are seconds since the stage timer started. `min_delay <= max_delay`
/// and `probability` in `[0, 1]` are expected but not enforced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StageEvent {
    pub id: String,
    pub text: String,
    pub description: String,
    pub min_delay: f64,
    pub max_delay: f64,
    pub probability: f64,
}

/// One timed phase of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: String,
    #[serde(rename = "type")]
    pub stage_type: StageType,
    pub title: String,
    pub description: String,
    pub duration_seconds: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<StageEvent>,
}

impl Stage {
    pub fn event(&self, id: &str) -> Option<&StageEvent> {
        self.events.iter().find(|e| e.id == id)
    }
}

/// An AI-voiced character who reacts to the class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NpcCharacter {
    pub id: String,
    pub name: String,
    pub title: String,
    pub personality: String,
    #[serde(default)]
    pub context: String,
    pub stance: String,
    #[serde(default)]
    pub avatar_emoji: String,
    #[serde(default = "default_voice")]
    pub voice: String,
}

fn default_voice() -> String {
    "alloy".to_string()
}

impl NpcCharacter {
    /// Create a character with the given id, name and title.
    pub fn new(id: impl Into<String>, name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            title: title.into(),
            personality: String::new(),
            context: String::new(),
            stance: String::new(),
            avatar_emoji: String::new(),
            voice: default_voice(),
        }
    }

    pub fn with_stance(mut self, stance: impl Into<String>) -> Self {
        self.stance = stance.into();
        self
    }

    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = personality.into();
        self
    }

    /// Name with title, e.g. "King Ezana, Negus of Axum".
    pub fn display_name_with_title(&self) -> String {
        format!("{}, {}", self.name.trim(), self.title)
    }
}

/// A character's reply, logged with the stage it was given in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NpcResponse {
    pub npc_id: String,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub stage_id: String,
}

/// A student's character sheet from the class roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CharacterSheet {
    pub id: String,
    pub student_real_name: String,
    pub character_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profession: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default)]
    pub needs_review: bool,
}

/// Who a role is intended for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoleAudience {
    Student,
    Ta,
    Facilitator,
    Participant,
    Observer,
}

/// A role handed out to a member of the class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentRole {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub suggested_for: RoleAudience,
    /// Name of the student playing this role; empty when unassigned.
    #[serde(default)]
    pub assigned_to: String,
}

/// One answer to the scenario's central question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VotingOption {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub votes: u32,
}

/// The full script of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub setting: String,
    pub central_question: String,
    #[serde(default)]
    pub voting_options: Vec<VotingOption>,
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub npcs: Vec<NpcCharacter>,
    #[serde(default)]
    pub roles: Vec<StudentRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}

impl Scenario {
    /// Check the scenario can drive a session.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.stages.is_empty() {
            return Err(SessionError::EmptyScenario);
        }
        Ok(())
    }

    pub fn npc(&self, id: &str) -> Option<&NpcCharacter> {
        self.npcs.iter().find(|n| n.id == id)
    }

    /// Voting options with every tally reset to zero.
    pub fn fresh_voting_options(&self) -> Vec<VotingOption> {
        self.voting_options
            .iter()
            .map(|o| VotingOption {
                votes: 0,
                ..o.clone()
            })
            .collect()
    }
}
