//! Session control.
//!
//! Owns everything that changes while a class works through a scenario:
//! stage position, timer, event schedule, transcript, votes and character
//! responses. Side effects the front-end must show (stage changes, timer
//! cues, event banners) are reported through [`SessionEvent`].

use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};

use crate::config::SessionSettings;
use crate::error::SessionError;
use crate::responder::ArgumentTags;
use crate::scenario::{CharacterSheet, NpcResponse, Scenario, Stage, StageEvent, StageType, VotingOption};
use crate::schedule::{
    EventStatus, RandomSource, RngSource, ScheduledEvent, TriggeredEvents, compute_schedule,
    next_due,
};
use crate::snapshot::SessionSnapshot;
use crate::timer::Timer;
use crate::transcript::{
    Analysis, ArgumentStance, Participation, RhetoricMode, Transcript, TranscriptEntry,
};

/// Callback for session events.
pub type SessionCallback = Box<dyn Fn(SessionEvent) + Send + Sync>;

/// Events emitted while a session runs.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A stage became current.
    StageStart {
        index: usize,
        stage_type: StageType,
        title: String,
        description: String,
    },
    /// Remaining time crossed the warning threshold.
    TimerWarning { seconds: i64 },
    /// The stage timer ran out.
    TimerComplete { stage_id: String },
    /// A stage event fired; show it as a banner.
    EventFired { event: StageEvent },
}

/// A fired event on display.
#[derive(Debug, Clone)]
pub struct Banner {
    pub event: StageEvent,
    pub shown_at: Instant,
}

pub struct Session {
    scenario: Scenario,
    settings: SessionSettings,
    stage_index: usize,
    timer: Timer,
    /// Resolved on stage entry, read-only until the next stage change.
    schedule: Vec<ScheduledEvent>,
    triggered: TriggeredEvents,
    transcript: Transcript,
    npc_responses: Vec<NpcResponse>,
    voting_options: Vec<VotingOption>,
    cast: Option<Vec<CharacterSheet>>,
    banner: Option<Banner>,
    rng: Box<dyn RandomSource + Send>,
    revision: u64,
    callback: Option<SessionCallback>,
}

impl Session {
    /// Start a fresh session at the first stage with the timer paused.
    pub fn new(scenario: Scenario, settings: SessionSettings) -> Result<Self, SessionError> {
        scenario.validate()?;
        let voting_options = scenario.fresh_voting_options();
        let mut session = Self::assemble(scenario, settings, voting_options);
        session.timer.restart_epoch(session.current_stage().duration_seconds);
        session.reschedule();
        Ok(session)
    }

    /// Rebuild a session from a snapshot. The timer always comes back paused.
    pub fn resume(snapshot: SessionSnapshot, settings: SessionSettings) -> Result<Self, SessionError> {
        snapshot.scenario.validate()?;
        let voting_options = if snapshot.voting_options.is_empty() {
            snapshot.scenario.fresh_voting_options()
        } else {
            snapshot.voting_options
        };

        let last = snapshot.scenario.stages.len() - 1;
        let mut session = Self::assemble(snapshot.scenario, settings, voting_options);
        session.stage_index = snapshot.current_stage_index.min(last);
        session.timer.set_seconds(snapshot.timer_seconds);
        session.triggered = snapshot.triggered_event_ids;
        session.transcript = snapshot.transcript;
        session.npc_responses = snapshot.npc_responses;
        session.cast = snapshot.cast;
        session.reschedule();

        info!(
            stage = session.stage_index,
            entries = session.transcript.len(),
            "resumed saved session"
        );
        Ok(session)
    }

    fn assemble(
        scenario: Scenario,
        settings: SessionSettings,
        voting_options: Vec<VotingOption>,
    ) -> Self {
        let timer = Timer::new(0).with_warning_threshold(settings.warning_threshold_secs);
        Self {
            scenario,
            settings,
            stage_index: 0,
            timer,
            schedule: Vec::new(),
            triggered: TriggeredEvents::new(),
            transcript: Transcript::new(),
            npc_responses: Vec::new(),
            voting_options,
            cast: None,
            banner: None,
            rng: Box::new(RngSource::from_entropy()),
            revision: 0,
            callback: None,
        }
    }

    /// Use `rng` for event scheduling. The current stage is rescheduled.
    pub fn with_rng(mut self, rng: impl RandomSource + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self.reschedule();
        self
    }

    /// Set a callback for session events.
    pub fn with_callback(mut self, callback: SessionCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    fn emit_event(&self, event: SessionEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }

    /// Mark state that needs saving.
    fn touch(&mut self) {
        self.revision += 1;
    }

    fn reschedule(&mut self) {
        let stage = &self.scenario.stages[self.stage_index];
        self.schedule = compute_schedule(stage, &self.triggered, self.rng.as_mut());
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn current_stage_index(&self) -> usize {
        self.stage_index
    }

    pub fn current_stage(&self) -> &Stage {
        &self.scenario.stages[self.stage_index]
    }

    pub fn is_last_stage(&self) -> bool {
        self.stage_index + 1 >= self.scenario.stages.len()
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn npc_responses(&self) -> &[NpcResponse] {
        &self.npc_responses
    }

    pub fn voting_options(&self) -> &[VotingOption] {
        &self.voting_options
    }

    pub fn triggered(&self) -> &TriggeredEvents {
        &self.triggered
    }

    pub fn schedule(&self) -> &[ScheduledEvent] {
        &self.schedule
    }

    pub fn cast(&self) -> Option<&[CharacterSheet]> {
        self.cast.as_deref()
    }

    /// Bumped on every change that should be auto-saved.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Seconds since the current stage's timer started.
    pub fn elapsed(&self) -> i64 {
        self.current_stage().duration_seconds - self.timer.seconds()
    }

    // Stage navigation

    /// Move to stage `index`. Out-of-range indices are ignored.
    pub fn go_to_stage(&mut self, index: usize) -> bool {
        if index >= self.scenario.stages.len() {
            return false;
        }

        self.stage_index = index;
        self.timer.restart_epoch(self.current_stage().duration_seconds);
        self.reschedule();
        self.touch();

        let stage = self.current_stage();
        info!(index, stage = %stage.id, "entered stage");
        self.emit_event(SessionEvent::StageStart {
            index,
            stage_type: stage.stage_type,
            title: stage.title.clone(),
            description: stage.description.clone(),
        });
        true
    }

    pub fn next_stage(&mut self) -> bool {
        self.go_to_stage(self.stage_index + 1)
    }

    pub fn prev_stage(&mut self) -> bool {
        match self.stage_index.checked_sub(1) {
            Some(index) => self.go_to_stage(index),
            None => false,
        }
    }

    // Timer controls

    pub fn toggle_timer(&mut self) {
        self.timer.toggle();
    }

    /// Back to the full stage duration, paused.
    pub fn reset_timer(&mut self) {
        self.timer.reset(self.current_stage().duration_seconds);
        self.touch();
    }

    pub fn add_minute(&mut self) {
        self.timer.add_minute();
        self.touch();
    }

    /// Advance one second. Call once per second while the timer runs.
    pub fn tick(&mut self, now: Instant) {
        let Some(tick) = self.timer.tick() else {
            return;
        };
        self.touch();

        if tick.warning {
            self.emit_event(SessionEvent::TimerWarning {
                seconds: tick.seconds,
            });
        }

        self.fire_due_events(now);

        if tick.completed {
            let stage_id = self.current_stage().id.clone();
            debug!(stage = %stage_id, "stage timer complete");
            self.emit_event(SessionEvent::TimerComplete { stage_id });
            self.next_stage();
        }
    }

    /// Fire everything due at the current elapsed time, earliest first.
    fn fire_due_events(&mut self, now: Instant) {
        let elapsed = self.elapsed() as f64;
        while let Some(event) =
            next_due(&self.schedule, elapsed, &self.triggered).map(|s| s.event.clone())
        {
            self.fire(event, now);
        }
    }

    /// Fire a current-stage event immediately, whatever its schedule.
    /// Returns `false` if it had already fired.
    pub fn trigger_event(&mut self, event_id: &str, now: Instant) -> Result<bool, SessionError> {
        let event = self
            .current_stage()
            .event(event_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownEvent(event_id.to_string()))?;
        Ok(self.fire(event, now))
    }

    fn fire(&mut self, event: StageEvent, now: Instant) -> bool {
        // Claim the id before anything else so a repeated call is a no-op.
        if !self.triggered.insert(&event.id) {
            return false;
        }

        let stage_id = self.current_stage().id.clone();
        info!(event = %event.id, stage = %stage_id, elapsed = self.elapsed(), "stage event fired");

        self.transcript.push(TranscriptEntry::system_event(
            &event,
            stage_id,
            Utc::now().timestamp_millis(),
        ));
        self.banner = Some(Banner {
            event: event.clone(),
            shown_at: now,
        });
        self.touch();
        self.emit_event(SessionEvent::EventFired { event });
        true
    }

    /// The banner still on display at `now`.
    pub fn banner(&self, now: Instant) -> Option<&Banner> {
        self.banner
            .as_ref()
            .filter(|b| now.saturating_duration_since(b.shown_at) < self.settings.banner_duration())
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    /// Status of each scheduled event for the current stage visit.
    pub fn event_statuses(&self) -> Vec<(&StageEvent, EventStatus)> {
        self.schedule
            .iter()
            .map(|s| (&s.event, s.status(&self.triggered)))
            .collect()
    }

    // Transcript

    /// Record an argument in the current stage and return its id.
    ///
    /// When the speaker matches a cast sheet (by character or student name)
    /// the sheet's profession, age and gender are attached.
    pub fn record_argument(&mut self, speaker: &str, text: &str) -> String {
        let mut entry = TranscriptEntry::argument(speaker, text, self.current_stage().id.clone());
        if let Some(sheet) = self.cast_sheet_for(speaker) {
            entry = entry
                .with_tags(sheet.profession.clone(), sheet.age.clone(), sheet.gender.clone())
                .with_character(sheet.id.clone());
        }
        self.record_entry(entry)
    }

    fn cast_sheet_for(&self, speaker: &str) -> Option<&CharacterSheet> {
        let speaker = speaker.trim();
        self.cast.as_deref()?.iter().find(|sheet| {
            sheet.character_name.trim().eq_ignore_ascii_case(speaker)
                || sheet.student_real_name.trim().eq_ignore_ascii_case(speaker)
        })
    }

    /// Record an entry produced elsewhere (e.g. transcribed speech).
    pub fn record_entry(&mut self, entry: TranscriptEntry) -> String {
        let id = entry.id.clone();
        self.transcript.push(entry);
        self.touch();
        id
    }

    pub fn remove_entry(&mut self, id: &str) -> Result<TranscriptEntry, SessionError> {
        let entry = self.transcript.remove(id)?;
        self.touch();
        Ok(entry)
    }

    pub fn vote_on_entry(&mut self, id: &str, delta: i64) -> Result<i64, SessionError> {
        let votes = self.transcript.adjust_votes(id, delta)?;
        self.touch();
        Ok(votes)
    }

    pub fn toggle_stance(
        &mut self,
        id: &str,
        stance: ArgumentStance,
    ) -> Result<Option<ArgumentStance>, SessionError> {
        let stance = self.transcript.toggle_stance(id, stance)?;
        self.touch();
        Ok(stance)
    }

    pub fn toggle_rhetoric(
        &mut self,
        id: &str,
        mode: RhetoricMode,
    ) -> Result<Option<RhetoricMode>, SessionError> {
        let mode = self.transcript.toggle_rhetoric(id, mode)?;
        self.touch();
        Ok(mode)
    }

    pub fn participation(&self) -> Participation {
        self.transcript.participation(&self.scenario.roles)
    }

    /// Store classifier tags on an entry.
    pub fn apply_tags(&mut self, id: &str, tags: ArgumentTags) -> Result<(), SessionError> {
        self.transcript.set_tags(id, tags.stance, tags.rhetoric)?;
        self.touch();
        Ok(())
    }

    pub fn analysis(&self) -> Analysis<'_> {
        self.transcript.analysis(&self.scenario.stages)
    }

    // Voting

    /// Set an option's tally. Negative values are clamped to zero.
    pub fn set_option_votes(&mut self, option_id: &str, votes: i64) -> Result<u32, SessionError> {
        let option = self
            .voting_options
            .iter_mut()
            .find(|o| o.id == option_id)
            .ok_or_else(|| SessionError::UnknownOption(option_id.to_string()))?;
        option.votes = votes.clamp(0, u32::MAX as i64) as u32;
        let votes = option.votes;
        self.touch();
        Ok(votes)
    }

    pub fn adjust_option_votes(&mut self, option_id: &str, delta: i64) -> Result<u32, SessionError> {
        let current = self
            .voting_options
            .iter()
            .find(|o| o.id == option_id)
            .map(|o| o.votes as i64)
            .ok_or_else(|| SessionError::UnknownOption(option_id.to_string()))?;
        self.set_option_votes(option_id, current + delta)
    }

    pub fn total_votes(&self) -> u32 {
        self.voting_options.iter().map(|o| o.votes).sum()
    }

    /// Options ordered by votes, most first. Ties keep scenario order.
    pub fn tally(&self) -> Vec<&VotingOption> {
        let mut options: Vec<&VotingOption> = self.voting_options.iter().collect();
        options.sort_by(|a, b| b.votes.cmp(&a.votes));
        options
    }

    // Characters

    /// Log a character's reply against the current stage.
    pub fn record_npc_response(&mut self, npc_id: &str, text: &str) -> Result<(), SessionError> {
        if self.scenario.npc(npc_id).is_none() {
            return Err(SessionError::UnknownCharacter(npc_id.to_string()));
        }
        self.npc_responses.push(NpcResponse {
            npc_id: npc_id.to_string(),
            text: text.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            stage_id: self.current_stage().id.clone(),
        });
        self.touch();
        Ok(())
    }

    pub fn set_cast(&mut self, cast: Vec<CharacterSheet>) {
        self.cast = Some(cast);
        self.touch();
    }

    /// Serializable copy of the whole session, stamped now.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            scenario: self.scenario.clone(),
            current_stage_index: self.stage_index,
            timer_seconds: self.timer.seconds(),
            transcript: self.transcript.clone(),
            npc_responses: self.npc_responses.clone(),
            voting_options: self.voting_options.clone(),
            triggered_event_ids: self.triggered.clone(),
            cast: self.cast.clone(),
            saved_at: Utc::now(),
        }
    }
}
