//! AI character responses.
//!
//! Characters are voiced by an OpenAI-compatible chat endpoint. The session
//! only consumes the final text; everything here sits behind
//! [`CharacterResponder`] so it can be swapped or stubbed.

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::scenario::{NpcCharacter, Scenario, StageType, VotingOption};
use crate::transcript::{ArgumentStance, RhetoricMode, Transcript};

/// Combined system + user prompt limit, in characters.
pub const MAX_PROMPT_CHARS: usize = 100_000;

/// Connection settings for the character model.
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    /// Model name, e.g. "gpt-4o-mini".
    pub model: String,
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    /// API key for authentication.
    pub api_key: String,
    /// Maximum response length.
    pub max_tokens: u32,
}

impl ResponderConfig {
    pub fn new(
        model: impl Into<String>,
        api_base: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            api_base: api_base.into(),
            api_key: api_key.into(),
            max_tokens: 600,
        }
    }
}

/// Anything that can turn a prompt pair into a character's reply.
#[async_trait]
pub trait CharacterResponder: Send + Sync {
    async fn respond(&self, system_prompt: &str, user_prompt: &str)
    -> Result<String, SessionError>;
}

pub struct OpenAiResponder {
    config: ResponderConfig,
    client: Client<OpenAIConfig>,
}

impl OpenAiResponder {
    pub fn new(config: ResponderConfig) -> Result<Self, SessionError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                SessionError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(&config.api_base);

        let client = Client::with_config(openai_config).with_http_client(http_client);

        Ok(Self { config, client })
    }

    /// One completion, retried with exponential backoff on API errors.
    async fn complete(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<String, SessionError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .max_completion_tokens(self.config.max_tokens)
            .messages(messages)
            .build()?;

        let max_retries = 3;
        let mut last_error = None;

        for attempt in 0..max_retries {
            if attempt > 0 {
                // 2s, 4s
                tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
            }

            match self.client.chat().create(request.clone()).await {
                Ok(response) => {
                    return Ok(response
                        .choices
                        .first()
                        .and_then(|c| c.message.content.clone())
                        .unwrap_or_default());
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "character completion failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.map(SessionError::from).unwrap_or_else(|| {
            SessionError::ConfigError("Unknown API error after retries".to_string())
        }))
    }
}

#[async_trait]
impl CharacterResponder for OpenAiResponder {
    async fn respond(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, SessionError> {
        check_prompt_len(system_prompt, user_prompt)?;

        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: system_prompt.to_string().into(),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: user_prompt.to_string().into(),
                name: None,
            }),
        ];

        let max_empty_retries = 3;
        for attempt in 0..max_empty_retries {
            let response = sanitize_response(&self.complete(messages.clone()).await?);
            if is_meaningful(&response) {
                return Ok(response);
            }
            debug!(
                attempt = attempt + 1,
                max = max_empty_retries,
                "empty character response, retrying"
            );
            if attempt < max_empty_retries - 1 {
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }

        Err(SessionError::EmptyResponse {
            name: self.config.model.clone(),
            attempts: max_empty_retries,
        })
    }
}

/// Reject prompt pairs that would time out the endpoint.
pub fn check_prompt_len(system_prompt: &str, user_prompt: &str) -> Result<(), SessionError> {
    let actual = system_prompt.chars().count() + user_prompt.chars().count();
    if actual > MAX_PROMPT_CHARS {
        return Err(SessionError::PromptTooLong {
            max: MAX_PROMPT_CHARS,
            actual,
        });
    }
    Ok(())
}

fn is_meaningful(response: &str) -> bool {
    response.trim().len() > 10
}

/// System prompt that puts the model in character.
pub fn npc_system_prompt(npc: &NpcCharacter, scenario: &Scenario) -> String {
    format!(
        r#"You are {name}, {title}.

SETTING: {setting} - {context}

YOUR CHARACTER:
- Personality: {personality}
- Background: {background}
- Your stance on "{question}": {stance}

INSTRUCTIONS:
- Stay completely in character as {name}
- Speak in first person, with the authority and manner appropriate to your role
- Reference specific arguments made by students when responding
- Ground your responses in historically accurate details
- Keep responses to 2-4 paragraphs
- Do NOT use modern language or anachronisms
- Output ONLY your spoken words - no stage directions or markdown"#,
        name = npc.name.trim(),
        title = npc.title,
        setting = scenario.setting,
        context = scenario.context,
        personality = npc.personality,
        background = npc.context,
        question = scenario.central_question,
        stance = npc.stance,
    )
}

fn transcript_text(transcript: &Transcript) -> String {
    transcript
        .entries()
        .iter()
        .map(|e| format!("[{}]: {}", e.speaker, e.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// User prompt asking a character to react to the arguments so far.
pub fn npc_response_prompt(transcript: &Transcript, scenario: &Scenario) -> String {
    let text = transcript_text(transcript);
    format!(
        "The following arguments have been made in this debate about: \"{}\"\n\n\
         TRANSCRIPT OF ARGUMENTS:\n{}\n\n\
         Respond to these arguments in character. Reference specific points made by the \
         speakers. Be historically grounded and persuasive.",
        scenario.central_question,
        if text.is_empty() { "(No arguments have been made yet)" } else { text.as_str() },
    )
}

/// User prompt asking a character to deliver the verdict after the vote.
pub fn verdict_prompt(
    transcript: &Transcript,
    scenario: &Scenario,
    results: &[VotingOption],
) -> String {
    let text = transcript_text(transcript);
    let results_text = results
        .iter()
        .map(|o| format!("{}: {} votes", o.label, o.votes))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "The debate on \"{}\" has concluded.\n\n\
         TRANSCRIPT OF ARGUMENTS:\n{}\n\n\
         VOTING RESULTS:\n{}\n\n\
         Deliver your final verdict in character. React to the vote outcome. Reference the \
         strongest arguments made. Explain what this decision means historically.",
        scenario.central_question,
        if text.is_empty() { "(No arguments were recorded)" } else { text.as_str() },
        results_text,
    )
}

/// Ask `npc` to respond, using the verdict prompt on verdict stages.
pub async fn generate_npc_response(
    responder: &dyn CharacterResponder,
    npc: &NpcCharacter,
    scenario: &Scenario,
    stage_type: StageType,
    transcript: &Transcript,
    results: &[VotingOption],
) -> Result<String, SessionError> {
    let system_prompt = npc_system_prompt(npc, scenario);
    let user_prompt = if stage_type.is_verdict() {
        verdict_prompt(transcript, scenario, results)
    } else {
        npc_response_prompt(transcript, scenario)
    };
    check_prompt_len(&system_prompt, &user_prompt)?;

    debug!(npc = %npc.id, verdict = stage_type.is_verdict(), "requesting character response");
    let text = responder.respond(&system_prompt, &user_prompt).await?;
    if text.trim().is_empty() {
        return Err(SessionError::EmptyResponse {
            name: npc.name.trim().to_string(),
            attempts: 1,
        });
    }
    Ok(text)
}

const TAG_SYSTEM_PROMPT: &str = "You classify debate arguments. Return ONLY valid JSON with \
two fields: \"stance\" (one of \"for\", \"against\", or \"mixed\") and \"rhetoric\" (one of \
\"evidence\", \"values\", \"consequences\", or \"authority\"). No other text.";

/// Classifier output. Unrecognised values come back as `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArgumentTags {
    pub stance: Option<ArgumentStance>,
    pub rhetoric: Option<RhetoricMode>,
}

/// User prompt asking for an argument's stance and rhetorical mode.
pub fn tag_prompt(text: &str, central_question: &str) -> String {
    if central_question.trim().is_empty() {
        format!("Classify this debate argument: \"{}\"", text)
    } else {
        format!(
            "Classify this argument in the context of the debate question: \"{}\"\n\n\
             Argument: \"{}\"",
            central_question, text
        )
    }
}

/// Read classifier JSON, tolerating a markdown code fence around it.
pub fn parse_tags(raw: &str) -> ArgumentTags {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let value: serde_json::Value = match serde_json::from_str(cleaned) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "classifier returned invalid JSON");
            return ArgumentTags::default();
        }
    };

    ArgumentTags {
        stance: value
            .get("stance")
            .and_then(|v| serde_json::from_value(v.clone()).ok()),
        rhetoric: value
            .get("rhetoric")
            .and_then(|v| serde_json::from_value(v.clone()).ok()),
    }
}

/// Classify one argument against the scenario's central question.
pub async fn classify_argument(
    responder: &dyn CharacterResponder,
    text: &str,
    central_question: &str,
) -> Result<ArgumentTags, SessionError> {
    let user_prompt = tag_prompt(text, central_question);
    check_prompt_len(TAG_SYSTEM_PROMPT, &user_prompt)?;
    let raw = responder.respond(TAG_SYSTEM_PROMPT, &user_prompt).await?;
    Ok(parse_tags(&raw))
}

/// Sanitize AI response by stripping reasoning tokens and XML-like tags.
///
/// Removes patterns like <thinking>...</thinking>, <reflection>...</reflection>, etc.
fn sanitize_response(response: &str) -> String {
    let tags_to_strip = [
        "thinking",
        "think",
        "reflection",
        "reflect",
        "internal",
        "reasoning",
        "thought",
        "scratchpad",
        "plan",
        "analysis",
    ];

    let mut result = response.to_string();

    for tag in &tags_to_strip {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>", tag = tag);
        if let Ok(re) = regex::Regex::new(&pattern) {
            result = re.replace_all(&result, "").to_string();
        }
    }

    // Orphaned tags and markdown emphasis.
    if let Ok(orphan_re) = regex::Regex::new(r"</?[\w]+[^>]*>") {
        result = orphan_re.replace_all(&result, "").to_string();
    }
    result = result.replace('*', "");

    // Collapse runs of spaces but keep paragraph breaks.
    if let Ok(ws_re) = regex::Regex::new(r"[ \t]+") {
        result = ws_re.replace_all(&result, " ").to_string();
    }
    if let Ok(nl_re) = regex::Regex::new(r"\n\s*\n\s*") {
        result = nl_re.replace_all(&result, "\n\n").to_string();
    }

    result.trim().to_string()
}
