//! Session transcript: arguments, system announcements and their tags.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;
use crate::scenario::{Stage, StageEvent, StudentRole};

/// Speaker label used for system event announcements.
pub const EVENT_SPEAKER: &str = "EVENT";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentStance {
    For,
    Against,
    Mixed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RhetoricMode {
    Evidence,
    Values,
    Consequences,
    Authority,
}

/// One recorded utterance or system announcement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub id: String,
    pub speaker: String,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub stage_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profession: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub votes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stance: Option<ArgumentStance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rhetoric: Option<RhetoricMode>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_system_event: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
}

impl TranscriptEntry {
    /// A spoken argument, stamped now.
    pub fn argument(
        speaker: impl Into<String>,
        text: impl Into<String>,
        stage_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            speaker: speaker.into(),
            text: text.into(),
            timestamp: Utc::now().timestamp_millis(),
            stage_id: stage_id.into(),
            profession: None,
            age: None,
            gender: None,
            votes: None,
            stance: None,
            rhetoric: None,
            is_system_event: false,
            character_id: None,
        }
    }

    /// Announcement of a fired stage event. The id embeds the event id and
    /// the timestamp so repeated announcements never collide.
    pub fn system_event(event: &StageEvent, stage_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: format!("event-{}-{}", event.id, timestamp),
            speaker: EVENT_SPEAKER.to_string(),
            text: format!("{}: {}", event.text, event.description),
            timestamp,
            stage_id: stage_id.into(),
            profession: None,
            age: None,
            gender: None,
            votes: None,
            stance: None,
            rhetoric: None,
            is_system_event: true,
            character_id: None,
        }
    }

    /// Attach the speaker's character details.
    pub fn with_tags(
        mut self,
        profession: Option<String>,
        age: Option<String>,
        gender: Option<String>,
    ) -> Self {
        self.profession = profession;
        self.age = age;
        self.gender = gender;
        self
    }

    pub fn with_character(mut self, character_id: impl Into<String>) -> Self {
        self.character_id = Some(character_id.into());
        self
    }
}

/// Consecutive entries recorded during the same stage.
#[derive(Debug)]
pub struct TranscriptSection<'a> {
    pub stage_id: &'a str,
    /// Stage title, or the raw stage id when the stage is unknown.
    pub label: String,
    pub entries: Vec<&'a TranscriptEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerStat {
    pub name: String,
    pub count: usize,
    pub total_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participation {
    /// Speakers ordered by number of arguments, most active first.
    pub speakers: Vec<SpeakerStat>,
    /// Assigned students who have not spoken yet.
    pub silent: Vec<String>,
}

/// Argument counts per stance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StanceCounts {
    pub for_count: usize,
    pub against: usize,
    pub mixed: usize,
}

impl StanceCounts {
    fn add(&mut self, stance: Option<ArgumentStance>) {
        match stance {
            Some(ArgumentStance::For) => self.for_count += 1,
            Some(ArgumentStance::Against) => self.against += 1,
            Some(ArgumentStance::Mixed) => self.mixed += 1,
            None => {}
        }
    }

    pub fn tagged(&self) -> usize {
        self.for_count + self.against + self.mixed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RhetoricCounts {
    pub evidence: usize,
    pub values: usize,
    pub consequences: usize,
    pub authority: usize,
}

impl RhetoricCounts {
    fn add(&mut self, mode: Option<RhetoricMode>) {
        match mode {
            Some(RhetoricMode::Evidence) => self.evidence += 1,
            Some(RhetoricMode::Values) => self.values += 1,
            Some(RhetoricMode::Consequences) => self.consequences += 1,
            Some(RhetoricMode::Authority) => self.authority += 1,
            None => {}
        }
    }
}

/// Stance mix of the arguments made during one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSentiment {
    pub stage_id: String,
    pub title: String,
    pub total: usize,
    pub stances: StanceCounts,
}

/// Arguments grouped by one speaker attribute (profession, gender, age bracket).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemographicBucket {
    pub label: String,
    pub count: usize,
    pub stances: StanceCounts,
}

/// End-of-session breakdown of the arguments. System announcements are left out.
#[derive(Debug)]
pub struct Analysis<'a> {
    pub total: usize,
    pub stances: StanceCounts,
    pub untagged: usize,
    pub rhetoric: RhetoricCounts,
    /// Up to five arguments with non-zero votes, highest first.
    pub top_arguments: Vec<&'a TranscriptEntry>,
    /// Stages with at least one argument, in scenario order.
    pub by_stage: Vec<StageSentiment>,
    pub professions: Vec<DemographicBucket>,
    pub genders: Vec<DemographicBucket>,
    pub ages: Vec<DemographicBucket>,
    /// Summed votes on arguments tagged "for".
    pub for_vote_score: i64,
    pub against_vote_score: i64,
}

const TOP_ARGUMENTS: usize = 5;

/// Append-only ordered log of transcript entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TranscriptEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut TranscriptEntry, SessionError> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| SessionError::UnknownEntry(id.to_string()))
    }

    pub fn remove(&mut self, id: &str) -> Result<TranscriptEntry, SessionError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| SessionError::UnknownEntry(id.to_string()))?;
        Ok(self.entries.remove(index))
    }

    /// Add `delta` to an entry's vote counter and return the new value.
    pub fn adjust_votes(&mut self, id: &str, delta: i64) -> Result<i64, SessionError> {
        let entry = self.get_mut(id)?;
        let votes = entry.votes.unwrap_or(0) + delta;
        entry.votes = Some(votes);
        Ok(votes)
    }

    /// Set the stance, or clear it when it already holds `stance`.
    pub fn toggle_stance(
        &mut self,
        id: &str,
        stance: ArgumentStance,
    ) -> Result<Option<ArgumentStance>, SessionError> {
        let entry = self.get_mut(id)?;
        entry.stance = toggle(entry.stance, stance);
        Ok(entry.stance)
    }

    /// Set the rhetoric mode, or clear it when it already holds `mode`.
    pub fn toggle_rhetoric(
        &mut self,
        id: &str,
        mode: RhetoricMode,
    ) -> Result<Option<RhetoricMode>, SessionError> {
        let entry = self.get_mut(id)?;
        entry.rhetoric = toggle(entry.rhetoric, mode);
        Ok(entry.rhetoric)
    }

    /// Apply classifier tags. `None` leaves the existing tag in place.
    pub fn set_tags(
        &mut self,
        id: &str,
        stance: Option<ArgumentStance>,
        rhetoric: Option<RhetoricMode>,
    ) -> Result<(), SessionError> {
        let entry = self.get_mut(id)?;
        if stance.is_some() {
            entry.stance = stance;
        }
        if rhetoric.is_some() {
            entry.rhetoric = rhetoric;
        }
        Ok(())
    }

    /// Group consecutive entries by stage.
    pub fn sections<'a>(&'a self, stages: &[Stage]) -> Vec<TranscriptSection<'a>> {
        let mut sections: Vec<TranscriptSection<'a>> = Vec::new();
        for entry in &self.entries {
            if let Some(section) = sections
                .last_mut()
                .filter(|s| s.stage_id == entry.stage_id)
            {
                section.entries.push(entry);
                continue;
            }

            let label = stages
                .iter()
                .find(|s| s.id == entry.stage_id)
                .map(|s| s.title.clone())
                .unwrap_or_else(|| entry.stage_id.clone());
            sections.push(TranscriptSection {
                stage_id: &entry.stage_id,
                label,
                entries: vec![entry],
            });
        }
        sections
    }

    /// Per-speaker argument counts. System announcements are not counted.
    pub fn participation(&self, roles: &[StudentRole]) -> Participation {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut speakers: Vec<SpeakerStat> = Vec::new();

        for entry in self.entries.iter().filter(|e| !e.is_system_event) {
            match index.get(entry.speaker.as_str()) {
                Some(&i) => {
                    speakers[i].count += 1;
                    speakers[i].total_chars += entry.text.chars().count();
                }
                None => {
                    index.insert(&entry.speaker, speakers.len());
                    speakers.push(SpeakerStat {
                        name: entry.speaker.clone(),
                        count: 1,
                        total_chars: entry.text.chars().count(),
                    });
                }
            }
        }

        let silent = roles
            .iter()
            .filter(|r| !r.assigned_to.is_empty() && !index.contains_key(r.assigned_to.as_str()))
            .map(|r| r.assigned_to.clone())
            .collect();

        speakers.sort_by(|a, b| b.count.cmp(&a.count));

        Participation { speakers, silent }
    }

    /// Stance, rhetoric, vote and demographic breakdown of the arguments.
    pub fn analysis<'a>(&'a self, stages: &[Stage]) -> Analysis<'a> {
        let arguments: Vec<&TranscriptEntry> =
            self.entries.iter().filter(|e| !e.is_system_event).collect();

        let mut stances = StanceCounts::default();
        let mut rhetoric = RhetoricCounts::default();
        let mut for_vote_score = 0;
        let mut against_vote_score = 0;
        for entry in &arguments {
            stances.add(entry.stance);
            rhetoric.add(entry.rhetoric);
            match entry.stance {
                Some(ArgumentStance::For) => for_vote_score += entry.votes.unwrap_or(0),
                Some(ArgumentStance::Against) => against_vote_score += entry.votes.unwrap_or(0),
                _ => {}
            }
        }

        let mut top_arguments: Vec<&TranscriptEntry> = arguments
            .iter()
            .copied()
            .filter(|e| e.votes.unwrap_or(0) != 0)
            .collect();
        top_arguments.sort_by(|a, b| b.votes.unwrap_or(0).cmp(&a.votes.unwrap_or(0)));
        top_arguments.truncate(TOP_ARGUMENTS);

        let by_stage = stages
            .iter()
            .filter_map(|stage| {
                let mut counts = StanceCounts::default();
                let mut total = 0;
                for entry in arguments.iter().filter(|e| e.stage_id == stage.id) {
                    total += 1;
                    counts.add(entry.stance);
                }
                (total > 0).then(|| StageSentiment {
                    stage_id: stage.id.clone(),
                    title: stage.title.clone(),
                    total,
                    stances: counts,
                })
            })
            .collect();

        Analysis {
            total: arguments.len(),
            untagged: arguments.len() - stances.tagged(),
            stances,
            rhetoric,
            top_arguments,
            by_stage,
            professions: buckets(&arguments, |e| e.profession.clone()),
            genders: buckets(&arguments, |e| e.gender.clone()),
            ages: buckets(&arguments, |e| e.age.as_deref().and_then(age_bracket)),
            for_vote_score,
            against_vote_score,
        }
    }
}

/// Group by `label`, most populated first. Entries without a label are skipped.
fn buckets(
    entries: &[&TranscriptEntry],
    label: impl Fn(&TranscriptEntry) -> Option<String>,
) -> Vec<DemographicBucket> {
    let mut buckets: Vec<DemographicBucket> = Vec::new();
    for &entry in entries {
        let Some(label) = label(entry).filter(|l| !l.trim().is_empty()) else {
            continue;
        };
        let index = match buckets.iter().position(|b| b.label == label) {
            Some(i) => i,
            None => {
                buckets.push(DemographicBucket {
                    label,
                    count: 0,
                    stances: StanceCounts::default(),
                });
                buckets.len() - 1
            }
        };
        buckets[index].count += 1;
        buckets[index].stances.add(entry.stance);
    }
    buckets.sort_by(|a, b| b.count.cmp(&a.count));
    buckets
}

/// Bracket a free-text age by its leading number ("34", "34 years").
fn age_bracket(age: &str) -> Option<String> {
    let digits: String = age.trim().chars().take_while(char::is_ascii_digit).collect();
    let age: u32 = digits.parse().ok()?;
    let bracket = match age {
        0..=24 => "Under 25",
        25..=34 => "25-34",
        35..=44 => "35-44",
        45..=54 => "45-54",
        _ => "55+",
    };
    Some(bracket.to_string())
}

fn toggle<T: PartialEq>(current: Option<T>, value: T) -> Option<T> {
    if current.as_ref() == Some(&value) {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{RoleAudience, StageType};

    fn stage(id: &str, title: &str) -> Stage {
        Stage {
            id: id.to_string(),
            stage_type: StageType::Debate,
            title: title.to_string(),
            description: String::new(),
            duration_seconds: 300,
            events: Vec::new(),
        }
    }

    fn role(assigned_to: &str) -> StudentRole {
        StudentRole {
            id: format!("role-{}", assigned_to),
            name: "Merchant".to_string(),
            title: String::new(),
            description: String::new(),
            suggested_for: RoleAudience::Student,
            assigned_to: assigned_to.to_string(),
        }
    }

    #[test]
    fn test_votes_adjust_without_bounds() {
        let mut transcript = Transcript::new();
        let entry = TranscriptEntry::argument("Amara", "Trade with Rome matters.", "debate");
        let id = entry.id.clone();
        transcript.push(entry);

        assert_eq!(transcript.adjust_votes(&id, 1).unwrap(), 1);
        assert_eq!(transcript.adjust_votes(&id, -3).unwrap(), -2);
        assert_eq!(transcript.adjust_votes(&id, 5).unwrap(), 3);
        assert_eq!(transcript.get(&id).unwrap().votes, Some(3));
    }

    #[test]
    fn test_stance_and_rhetoric_toggle() {
        let mut transcript = Transcript::new();
        let entry = TranscriptEntry::argument("Amara", "The gods protect us.", "debate");
        let id = entry.id.clone();
        transcript.push(entry);

        assert_eq!(
            transcript.toggle_stance(&id, ArgumentStance::Against).unwrap(),
            Some(ArgumentStance::Against)
        );
        assert_eq!(
            transcript.toggle_stance(&id, ArgumentStance::For).unwrap(),
            Some(ArgumentStance::For)
        );
        assert_eq!(transcript.toggle_stance(&id, ArgumentStance::For).unwrap(), None);

        assert_eq!(
            transcript.toggle_rhetoric(&id, RhetoricMode::Values).unwrap(),
            Some(RhetoricMode::Values)
        );
        assert_eq!(transcript.toggle_rhetoric(&id, RhetoricMode::Values).unwrap(), None);
    }

    #[test]
    fn test_unknown_entry_errors() {
        let mut transcript = Transcript::new();
        assert!(matches!(
            transcript.adjust_votes("missing", 1),
            Err(SessionError::UnknownEntry(_))
        ));
        assert!(matches!(transcript.remove("missing"), Err(SessionError::UnknownEntry(_))));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut transcript = Transcript::new();
        let entries: Vec<TranscriptEntry> = ["a", "b", "c"]
            .iter()
            .map(|t| TranscriptEntry::argument("S", *t, "debate"))
            .collect();
        let middle = entries[1].id.clone();
        for e in entries {
            transcript.push(e);
        }

        let removed = transcript.remove(&middle).unwrap();
        assert_eq!(removed.text, "b");
        let texts: Vec<&str> = transcript.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "c"]);
    }

    #[test]
    fn test_sections_group_consecutive_stages() {
        let stages = vec![stage("opening", "Opening Discussion"), stage("debate", "The Great Debate")];
        let mut transcript = Transcript::new();
        transcript.push(TranscriptEntry::argument("A", "1", "opening"));
        transcript.push(TranscriptEntry::argument("B", "2", "opening"));
        transcript.push(TranscriptEntry::argument("A", "3", "debate"));
        transcript.push(TranscriptEntry::argument("C", "4", "opening"));
        transcript.push(TranscriptEntry::argument("C", "5", "removed-stage"));

        let sections = transcript.sections(&stages);
        let labels: Vec<&str> = sections.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Opening Discussion", "The Great Debate", "Opening Discussion", "removed-stage"]
        );
        assert_eq!(sections[0].entries.len(), 2);
    }

    #[test]
    fn test_system_event_entry() {
        let event = StageEvent {
            id: "famine".to_string(),
            text: "Famine in the highlands".to_string(),
            description: "Grain prices triple.".to_string(),
            min_delay: 0.0,
            max_delay: 0.0,
            probability: 1.0,
        };
        let entry = TranscriptEntry::system_event(&event, "debate", 1_700_000_000_000);
        assert_eq!(entry.id, "event-famine-1700000000000");
        assert_eq!(entry.text, "Famine in the highlands: Grain prices triple.");
        assert!(entry.is_system_event);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["isSystemEvent"], true);
        assert_eq!(json["stageId"], "debate");
    }

    #[test]
    fn test_participation_counts_and_silent_students() {
        let mut transcript = Transcript::new();
        transcript.push(TranscriptEntry::argument("Amara", "one", "debate"));
        transcript.push(TranscriptEntry::argument("Bekele", "two", "debate"));
        transcript.push(TranscriptEntry::argument("Bekele", "three", "debate"));
        let event = StageEvent {
            id: "e".to_string(),
            text: "News".to_string(),
            description: "desc".to_string(),
            min_delay: 0.0,
            max_delay: 0.0,
            probability: 1.0,
        };
        transcript.push(TranscriptEntry::system_event(&event, "debate", 1));

        let stats = transcript.participation(&[role("Amara"), role("Dawit"), role("")]);
        assert_eq!(stats.speakers.len(), 2);
        assert_eq!(stats.speakers[0].name, "Bekele");
        assert_eq!(stats.speakers[0].count, 2);
        assert_eq!(stats.speakers[0].total_chars, 8);
        assert_eq!(stats.silent, vec!["Dawit".to_string()]);
    }

    fn tagged(
        transcript: &mut Transcript,
        speaker: &str,
        stage_id: &str,
        stance: Option<ArgumentStance>,
        rhetoric: Option<RhetoricMode>,
        votes: i64,
    ) -> String {
        let entry = TranscriptEntry::argument(speaker, "An argument.", stage_id);
        let id = entry.id.clone();
        transcript.push(entry);
        transcript.set_tags(&id, stance, rhetoric).unwrap();
        if votes != 0 {
            transcript.adjust_votes(&id, votes).unwrap();
        }
        id
    }

    #[test]
    fn test_set_tags_keeps_existing_on_none() {
        let mut transcript = Transcript::new();
        let id = tagged(&mut transcript, "Amara", "debate", Some(ArgumentStance::For), None, 0);
        transcript.set_tags(&id, None, Some(RhetoricMode::Values)).unwrap();

        let entry = transcript.get(&id).unwrap();
        assert_eq!(entry.stance, Some(ArgumentStance::For));
        assert_eq!(entry.rhetoric, Some(RhetoricMode::Values));
        assert!(matches!(
            transcript.set_tags("missing", None, None),
            Err(SessionError::UnknownEntry(_))
        ));
    }

    #[test]
    fn test_analysis_counts_stances_rhetoric_and_votes() {
        let mut transcript = Transcript::new();
        let best = tagged(
            &mut transcript,
            "Amara",
            "opening",
            Some(ArgumentStance::For),
            Some(RhetoricMode::Evidence),
            4,
        );
        tagged(&mut transcript, "Bekele", "debate", Some(ArgumentStance::Against), None, -1);
        tagged(&mut transcript, "Dawit", "debate", Some(ArgumentStance::For), None, 2);
        tagged(&mut transcript, "Eleni", "debate", None, Some(RhetoricMode::Authority), 0);
        let event = StageEvent {
            id: "e".to_string(),
            text: "News".to_string(),
            description: "desc".to_string(),
            min_delay: 0.0,
            max_delay: 0.0,
            probability: 1.0,
        };
        transcript.push(TranscriptEntry::system_event(&event, "debate", 1));

        let stages = vec![
            stage("opening", "Opening Discussion"),
            stage("debate", "The Great Debate"),
            stage("vote", "The King Decides"),
        ];
        let analysis = transcript.analysis(&stages);

        assert_eq!(analysis.total, 4);
        assert_eq!(analysis.stances.for_count, 2);
        assert_eq!(analysis.stances.against, 1);
        assert_eq!(analysis.untagged, 1);
        assert_eq!(analysis.rhetoric.evidence, 1);
        assert_eq!(analysis.rhetoric.authority, 1);
        assert_eq!(analysis.for_vote_score, 6);
        assert_eq!(analysis.against_vote_score, -1);

        let top: Vec<i64> = analysis.top_arguments.iter().map(|e| e.votes.unwrap()).collect();
        assert_eq!(top, vec![4, 2, -1]);
        assert_eq!(analysis.top_arguments[0].id, best);

        assert_eq!(analysis.by_stage.len(), 2);
        assert_eq!(analysis.by_stage[1].title, "The Great Debate");
        assert_eq!(analysis.by_stage[1].total, 3);
        assert_eq!(analysis.by_stage[1].stances.mixed, 0);
    }

    #[test]
    fn test_analysis_demographic_buckets() {
        let mut transcript = Transcript::new();
        let speakers = [
            ("Amara", Some("Merchant"), Some("34 years"), ArgumentStance::For),
            ("Bekele", Some("Priest"), Some("61"), ArgumentStance::Against),
            ("Dawit", Some("Merchant"), Some("22"), ArgumentStance::Mixed),
            ("Eleni", None, Some("unknown"), ArgumentStance::For),
        ];
        for (speaker, profession, age, stance) in speakers {
            let mut entry = TranscriptEntry::argument(speaker, "Text.", "debate")
                .with_tags(profession.map(str::to_string), age.map(str::to_string), None);
            entry.stance = Some(stance);
            transcript.push(entry);
        }

        let analysis = transcript.analysis(&[stage("debate", "Debate")]);
        assert_eq!(analysis.professions[0].label, "Merchant");
        assert_eq!(analysis.professions[0].count, 2);
        assert_eq!(analysis.professions[0].stances.mixed, 1);
        assert_eq!(analysis.professions[1].label, "Priest");
        assert!(analysis.genders.is_empty());

        let ages: Vec<&str> = analysis.ages.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(ages, vec!["25-34", "55+", "Under 25"]);
    }
}
