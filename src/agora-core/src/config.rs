//! Configuration module for loading TOML config files.
//!
//! Session settings use snake_case keys. The `[scenario]` table uses the same
//! camelCase keys as saved sessions so a scenario can be copied between them.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SessionError;
use crate::scenario::{
    CharacterSheet, NpcCharacter, RoleAudience, Scenario, Stage, StageEvent, StageType, StudentRole, VotingOption,
};

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionSettings,
    pub scenario: Scenario,
    /// Class roster: who plays which character.
    #[serde(default)]
    pub cast: Vec<CharacterSheet>,
}

/// Tunables for a running session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Quiet period before an auto-save is written.
    pub autosave_debounce_ms: u64,
    /// Remaining seconds at which the timer warning sounds.
    pub warning_threshold_secs: i64,
    /// How long an event banner stays up.
    pub banner_secs: u64,
    /// Where the auto-save blob lives.
    pub save_file: PathBuf,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            autosave_debounce_ms: 2000,
            warning_threshold_secs: 30,
            banner_secs: 8,
            save_file: PathBuf::from("agora-session.json"),
        }
    }
}

impl SessionSettings {
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    pub fn banner_duration(&self) -> Duration {
        Duration::from_secs(self.banner_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SessionError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| SessionError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, SessionError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| SessionError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.scenario.validate()?;
        Ok(config)
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config {
        session: SessionSettings::default(),
        scenario: Scenario {
            title: "The Conversion of Axum".to_string(),
            description: "It is 340 CE in the Kingdom of Axum. King Ezana must decide whether to \
                adopt Christianity as the state religion."
                .to_string(),
            context: AXUM_CONTEXT.to_string(),
            setting: "340 CE, Kingdom of Axum".to_string(),
            central_question: "Should King Ezana convert the Kingdom of Axum to Christianity?"
                .to_string(),
            voting_options: vec![
                option("convert", "Convert to Christianity"),
                option("traditional", "Maintain traditional religion"),
                option("pluralism", "Adopt religious pluralism"),
            ],
            stages: vec![
                Stage {
                    id: "opening".to_string(),
                    stage_type: StageType::Freeform,
                    title: "Opening Discussion".to_string(),
                    description: "Students introduce their characters and share initial \
                        positions on the question of conversion."
                        .to_string(),
                    duration_seconds: 300,
                    events: vec![event(
                        "merchant-news",
                        "Ships from Alexandria",
                        "Merchants report that Egyptian ports now favour Christian traders.",
                        60.0,
                        180.0,
                        0.5,
                    )],
                },
                Stage {
                    id: "debate".to_string(),
                    stage_type: StageType::Debate,
                    title: "The Great Debate".to_string(),
                    description: "Structured arguments for and against conversion.".to_string(),
                    duration_seconds: 600,
                    events: vec![
                        event(
                            "roman-envoy",
                            "A Roman envoy arrives",
                            "Constantius II sends gifts and asks Axum to receive his bishop.",
                            120.0,
                            300.0,
                            0.7,
                        ),
                        event(
                            "famine",
                            "Famine in the highlands",
                            "The rains have failed. Priests of Mahrem call it a divine warning.",
                            240.0,
                            480.0,
                            0.4,
                        ),
                    ],
                },
                Stage {
                    id: "npc-react".to_string(),
                    stage_type: StageType::NpcResponse,
                    title: "The Court Responds".to_string(),
                    description: "Key figures at the Axumite court react to the arguments."
                        .to_string(),
                    duration_seconds: 180,
                    events: Vec::new(),
                },
                Stage {
                    id: "final-speeches".to_string(),
                    stage_type: StageType::Speech,
                    title: "Final Appeals".to_string(),
                    description: "Last chance to make the case before the vote.".to_string(),
                    duration_seconds: 300,
                    events: vec![event(
                        "omen",
                        "An omen at the stelae",
                        "A great stele has cracked overnight. The city is uneasy.",
                        30.0,
                        150.0,
                        0.4,
                    )],
                },
                Stage {
                    id: "vote".to_string(),
                    stage_type: StageType::Vote,
                    title: "The King Decides".to_string(),
                    description: "The class votes on what King Ezana should do.".to_string(),
                    duration_seconds: 120,
                    events: Vec::new(),
                },
                Stage {
                    id: "verdict".to_string(),
                    stage_type: StageType::Verdict,
                    title: "The Verdict".to_string(),
                    description: "Characters react to the decision and the historical outcome \
                        is revealed."
                        .to_string(),
                    duration_seconds: 300,
                    events: Vec::new(),
                },
            ],
            npcs: vec![
                NpcCharacter::new("ezana", "King Ezana", "Negus of Axum, King of Kings")
                    .with_personality(
                        "Shrewd and ambitious. Pragmatic about power but curious about \
                         spiritual matters.",
                    )
                    .with_stance(
                        "Torn. Sees the Roman alliance but fears alienating traditionalist \
                         nobles and priests.",
                    ),
                NpcCharacter::new("frumentius", "Frumentius", "Bishop of Axum")
                    .with_personality("Passionate, eloquent and devout.")
                    .with_stance(
                        "Strongly for conversion: the true faith, closer ties with Rome and \
                         Egypt.",
                    ),
                NpcCharacter::new("wagri", "Wagri", "High Priest of Mahrem")
                    .with_personality("Proud, traditional, suspicious of foreign influence.")
                    .with_stance(
                        "Strongly against: abandoning Mahrem abandons Axumite identity.",
                    ),
            ],
            roles: vec![
                StudentRole {
                    id: "facilitator".to_string(),
                    name: "Royal Herald".to_string(),
                    title: "Keeper of the Court".to_string(),
                    description: "Runs the session and announces events.".to_string(),
                    suggested_for: RoleAudience::Facilitator,
                    assigned_to: String::new(),
                },
                StudentRole {
                    id: "merchant".to_string(),
                    name: "Red Sea Merchant".to_string(),
                    title: "Trader of Adulis".to_string(),
                    description: "Cares about trade routes and foreign partners.".to_string(),
                    suggested_for: RoleAudience::Student,
                    assigned_to: String::new(),
                },
            ],
            outcome: Some(AXUM_OUTCOME.to_string()),
        },
        cast: Vec::new(),
    }
}

fn option(id: &str, label: &str) -> VotingOption {
    VotingOption {
        id: id.to_string(),
        label: label.to_string(),
        votes: 0,
    }
}

fn event(
    id: &str,
    text: &str,
    description: &str,
    min_delay: f64,
    max_delay: f64,
    probability: f64,
) -> StageEvent {
    StageEvent {
        id: id.to_string(),
        text: text.to_string(),
        description: description.to_string(),
        min_delay,
        max_delay,
        probability,
    }
}

const AXUM_CONTEXT: &str = "The Kingdom of Axum controls the Red Sea trade routes connecting \
Rome, India and Arabia. Christianity has spread through merchant networks and the Roman Empire \
has recently embraced it. Axum's traditional religion centres on the god Mahrem, but Jewish, \
Christian and pagan communities coexist in the kingdom.";

const AXUM_OUTCOME: &str = "King Ezana converted around 330-340 CE, making Axum one of the \
first states to adopt Christianity. His coins changed from the disc and crescent to the cross, \
and the Ethiopian Orthodox Church became one of the oldest Christian institutions in the world.";
