//! Agora CLI - Classroom Role-Play Facilitator
//!
//! Runs a staged role-play session from the terminal: stage timer, random
//! stage events, argument transcript, voting and AI character responses.

use agora_core::{
    ArgumentStance, ArgumentTags, AutoSaver, CharacterResponder, Config, DemographicBucket,
    EventStatus, FileSnapshotStore, NpcCharacter, OpenAiResponder, ResponderConfig, RhetoricMode,
    Session, SessionCallback, SessionError, SessionEvent, classify_argument, default_config,
    generate_npc_response, load_resumable,
};
use clap::Parser;
use colored::Colorize;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "agora",
    version,
    about = "Agora - Run classroom role-play sessions",
    long_about = "A facilitator console for staged classroom role-plays with timed stages, \
                  random events, voting and AI characters via OpenAI-compatible APIs."
)]
struct Cli {
    /// Scenario file (TOML). The built-in Axum scenario is used when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Where the session is auto-saved
    #[arg(long, value_name = "FILE")]
    save_file: Option<PathBuf>,

    /// Discard any saved session and start fresh
    #[arg(long)]
    fresh: bool,

    /// Log filter, e.g. "info" or "agora_core=debug" (RUST_LOG wins when set)
    #[arg(long, default_value = "warn", value_name = "FILTER")]
    log_level: String,

    /// Model used for character responses
    #[arg(short, long, value_name = "MODEL")]
    model: Option<String>,
}

/// A facilitator command typed at the prompt.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Help,
    ToggleTimer,
    ResetTimer,
    AddMinute,
    Next,
    Prev,
    Goto(usize),
    Say { speaker: String, text: String },
    Vote { entry: String, delta: i64 },
    Stance { entry: String, stance: ArgumentStance },
    Rhetoric { entry: String, mode: RhetoricMode },
    Remove(String),
    Trigger(String),
    Events,
    Stats,
    Ballot(Option<(String, BallotChange)>),
    Ask(String),
    Tag(String),
    Analysis,
    Transcript,
    Status,
    End,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BallotChange {
    Adjust(i64),
    Set(i64),
}

enum Flow {
    Continue,
    Quit,
    End,
}

/// Result of an AI request that ran off the event loop.
enum Reply {
    Character {
        npc: NpcCharacter,
        result: Result<String, SessionError>,
    },
    Tags {
        entry_id: String,
        result: Result<ArgumentTags, SessionError>,
    },
}

/// Spawns AI requests so the stage timer keeps running while they wait.
struct Background {
    responder: Arc<dyn CharacterResponder>,
    replies: mpsc::UnboundedSender<Reply>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => default_config(),
    };
    if let Some(save_file) = &cli.save_file {
        config.session.save_file = save_file.clone();
    }
    let settings = config.session.clone();

    let cast = std::mem::take(&mut config.cast);
    let (background, mut replies) = Background::new(create_responder(cli.model.as_deref())?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let store = FileSnapshotStore::at_path(settings.save_file.clone());
    let saved = load_resumable(&store);
    let mut saver = AutoSaver::with_debounce(Box::new(store), settings.autosave_debounce());

    let resume = match &saved {
        Some(snapshot) if !cli.fresh => confirm_resume(snapshot, &mut lines).await?,
        _ => false,
    };
    let session = match saved {
        Some(snapshot) if resume => Session::resume(snapshot, settings)?,
        Some(_) => {
            saver.discard();
            println!("{}", "Saved session discarded.".yellow());
            Session::new(config.scenario, settings)?
        }
        None => Session::new(config.scenario, settings)?,
    };
    let mut session = session.with_callback(create_console_callback());
    if session.cast().is_none() && !cast.is_empty() {
        session.set_cast(cast);
    }

    print_header(&session);
    print_stage(&session);
    println!("{}", "Type 'help' for commands.".dimmed());

    let mut interval = time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await;

    let mut saved_revision = session.revision();

    loop {
        let save_deadline = saver.deadline();

        tokio::select! {
            _ = interval.tick() => {
                if session.timer().is_running() {
                    session.tick(Instant::now());
                    let seconds = session.timer().seconds();
                    if session.timer().is_running() && (seconds % 60 == 0 || seconds <= 10) {
                        println!("{} {}", "⏱".bright_white(), session.timer().display().bright_white());
                    }
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    saver.flush();
                    break;
                };
                let flow = match parse_command(&line) {
                    Ok(Some(command)) => run_command(&mut session, command, &background),
                    Ok(None) => Flow::Continue,
                    Err(message) => {
                        eprintln!("{} {}", "Error:".red().bold(), message);
                        Flow::Continue
                    }
                };
                match flow {
                    Flow::Continue => {}
                    Flow::Quit => {
                        saver.note_change(Instant::now(), session.snapshot());
                        saver.flush();
                        println!("{}", "Session saved. Run agora again to resume.".green());
                        break;
                    }
                    Flow::End => {
                        saver.discard();
                        print_summary(&session);
                        break;
                    }
                }
            }
            Some(reply) = replies.recv() => {
                if let Err(e) = handle_reply(&mut session, reply) {
                    eprintln!("{} {}", "Error:".red().bold(), e);
                }
            }
            _ = time::sleep_until(
                save_deadline.map(time::Instant::from_std).unwrap_or_else(time::Instant::now)
            ), if save_deadline.is_some() => {
                saver.poll(Instant::now());
            }
        }

        if session.revision() != saved_revision {
            saved_revision = session.revision();
            saver.note_change(Instant::now(), session.snapshot());
        }
    }

    Ok(())
}

fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Build the character responder from the environment.
fn create_responder(model: Option<&str>) -> Result<Arc<dyn CharacterResponder>, SessionError> {
    // Get API configuration from environment
    let api_base = env::var("OPENAI_API_BASE")
        .or_else(|_| env::var("OPENAI_BASE_URL"))
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

    let api_key = env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        eprintln!(
            "{}",
            "Warning: OPENAI_API_KEY not set. Character responses may fail.".yellow()
        );
        String::new()
    });

    let model = model
        .map(str::to_string)
        .or_else(|| env::var("AGORA_MODEL").ok())
        .unwrap_or_else(|| "gpt-4o-mini".to_string());

    info!(%api_base, %model, "character responder configured");
    let responder = OpenAiResponder::new(ResponderConfig::new(model, api_base, api_key))?;
    Ok(Arc::new(responder))
}

async fn confirm_resume(
    snapshot: &agora_core::SessionSnapshot,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<bool, std::io::Error> {
    println!(
        "{} '{}' (stage {}, {} entries, saved {})",
        "Found a saved session:".bold(),
        snapshot.scenario.title.bright_white(),
        snapshot.current_stage_index + 1,
        snapshot.transcript.len(),
        snapshot.saved_at.format("%Y-%m-%d %H:%M"),
    );
    println!("Resume it? [Y/n]");

    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(!matches!(answer.trim().to_lowercase().as_str(), "n" | "no"))
}

/// Parse one input line. Blank lines yield `None`.
fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match word.to_lowercase().as_str() {
        "help" | "?" => Command::Help,
        "start" | "pause" | "t" => Command::ToggleTimer,
        "reset" => Command::ResetTimer,
        "+1m" | "more" => Command::AddMinute,
        "next" | "n" => Command::Next,
        "prev" | "p" => Command::Prev,
        "goto" => {
            let number: usize = rest
                .parse()
                .map_err(|_| format!("goto expects a stage number, got '{}'", rest))?;
            Command::Goto(number.saturating_sub(1))
        }
        "say" => {
            let (speaker, text) = rest
                .split_once(':')
                .ok_or("usage: say <speaker>: <argument>")?;
            let (speaker, text) = (speaker.trim(), text.trim());
            if speaker.is_empty() || text.is_empty() {
                return Err("usage: say <speaker>: <argument>".to_string());
            }
            Command::Say {
                speaker: speaker.to_string(),
                text: text.to_string(),
            }
        }
        "up" | "down" => {
            let entry = args.first().ok_or("usage: up|down <entry>")?;
            Command::Vote {
                entry: entry.to_string(),
                delta: if word.eq_ignore_ascii_case("up") { 1 } else { -1 },
            }
        }
        "stance" => {
            let &[entry, stance] = args.as_slice() else {
                return Err("usage: stance <entry> for|against|mixed".to_string());
            };
            let stance = match stance {
                "for" => ArgumentStance::For,
                "against" => ArgumentStance::Against,
                "mixed" => ArgumentStance::Mixed,
                other => return Err(format!("unknown stance '{}'", other)),
            };
            Command::Stance {
                entry: entry.to_string(),
                stance,
            }
        }
        "mode" => {
            let &[entry, mode] = args.as_slice() else {
                return Err(
                    "usage: mode <entry> evidence|values|consequences|authority".to_string()
                );
            };
            let mode = match mode {
                "evidence" => RhetoricMode::Evidence,
                "values" => RhetoricMode::Values,
                "consequences" => RhetoricMode::Consequences,
                "authority" => RhetoricMode::Authority,
                other => return Err(format!("unknown rhetoric mode '{}'", other)),
            };
            Command::Rhetoric {
                entry: entry.to_string(),
                mode,
            }
        }
        "remove" | "rm" => {
            let entry = args.first().ok_or("usage: remove <entry>")?;
            Command::Remove(entry.to_string())
        }
        "trigger" => {
            let id = args.first().ok_or("usage: trigger <event-id>")?;
            Command::Trigger(id.to_string())
        }
        "events" => Command::Events,
        "stats" => Command::Stats,
        "ballot" => match *args.as_slice() {
            [] => Command::Ballot(None),
            [option, amount] => {
                let change = parse_ballot_change(amount)?;
                Command::Ballot(Some((option.to_string(), change)))
            }
            _ => return Err("usage: ballot [<option> <+n|-n|n>]".to_string()),
        },
        "ask" => {
            let npc = args.first().ok_or("usage: ask <character-id>")?;
            Command::Ask(npc.to_string())
        }
        "tag" => {
            let entry = args.first().ok_or("usage: tag <entry>")?;
            Command::Tag(entry.to_string())
        }
        "analysis" | "analyze" => Command::Analysis,
        "transcript" | "log" => Command::Transcript,
        "status" | "s" => Command::Status,
        "end" => Command::End,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command '{}'. Type 'help'.", other)),
    };
    Ok(Some(command))
}

fn parse_ballot_change(amount: &str) -> Result<BallotChange, String> {
    let value: i64 = amount
        .trim_start_matches('+')
        .parse()
        .map_err(|_| format!("'{}' is not a vote count", amount))?;
    if amount.starts_with('+') || amount.starts_with('-') {
        Ok(BallotChange::Adjust(value))
    } else {
        Ok(BallotChange::Set(value))
    }
}

/// Accept either a transcript position (1-based) or a raw entry id.
fn resolve_entry(session: &Session, token: &str) -> String {
    token
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| session.transcript().entries().get(i))
        .map(|e| e.id.clone())
        .unwrap_or_else(|| token.to_string())
}

fn run_command(session: &mut Session, command: Command, background: &Background) -> Flow {
    debug!(?command, "facilitator command");
    let result = match command {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::ToggleTimer => {
            session.toggle_timer();
            let state = if session.timer().is_running() { "running" } else { "paused" };
            println!("{} {} ({})", "⏱".bright_white(), session.timer().display(), state);
            Ok(())
        }
        Command::ResetTimer => {
            session.reset_timer();
            println!("{} {} (reset)", "⏱".bright_white(), session.timer().display());
            Ok(())
        }
        Command::AddMinute => {
            session.add_minute();
            println!("{} {}", "⏱".bright_white(), session.timer().display());
            Ok(())
        }
        Command::Next => {
            if !session.next_stage() {
                println!("{}", "Already at the last stage.".yellow());
            }
            Ok(())
        }
        Command::Prev => {
            if !session.prev_stage() {
                println!("{}", "Already at the first stage.".yellow());
            }
            Ok(())
        }
        Command::Goto(index) => {
            let len = session.scenario().stages.len();
            if session.go_to_stage(index) {
                Ok(())
            } else {
                Err(SessionError::StageOutOfRange { index: index + 1, len })
            }
        }
        Command::Say { speaker, text } => {
            session.record_argument(&speaker, &text);
            println!(
                "  {} #{} {}",
                "✎".bright_cyan(),
                session.transcript().len(),
                speaker.bright_cyan()
            );
            Ok(())
        }
        Command::Vote { entry, delta } => {
            let id = resolve_entry(session, &entry);
            session
                .vote_on_entry(&id, delta)
                .map(|votes| println!("  votes: {}", votes))
        }
        Command::Stance { entry, stance } => {
            let id = resolve_entry(session, &entry);
            session
                .toggle_stance(&id, stance)
                .map(|s| println!("  stance: {}", s.map_or("none".to_string(), |s| format!("{:?}", s))))
        }
        Command::Rhetoric { entry, mode } => {
            let id = resolve_entry(session, &entry);
            session
                .toggle_rhetoric(&id, mode)
                .map(|m| println!("  mode: {}", m.map_or("none".to_string(), |m| format!("{:?}", m))))
        }
        Command::Remove(entry) => {
            let id = resolve_entry(session, &entry);
            session
                .remove_entry(&id)
                .map(|e| println!("  removed {}'s entry", e.speaker))
        }
        Command::Trigger(id) => session.trigger_event(&id, Instant::now()).map(|fired| {
            if !fired {
                println!("{}", format!("'{}' has already happened.", id).yellow());
            }
        }),
        Command::Events => {
            print_events(session);
            Ok(())
        }
        Command::Stats => {
            print_stats(session);
            Ok(())
        }
        Command::Ballot(None) => {
            print_ballot(session);
            Ok(())
        }
        Command::Ballot(Some((option, change))) => {
            let result = match change {
                BallotChange::Adjust(delta) => session.adjust_option_votes(&option, delta),
                BallotChange::Set(votes) => session.set_option_votes(&option, votes),
            };
            result.map(|_| print_ballot(session))
        }
        Command::Ask(npc_id) => background.ask(session, &npc_id),
        Command::Tag(entry) => {
            let id = resolve_entry(session, &entry);
            background.tag(session, &id)
        }
        Command::Analysis => {
            print_analysis(session);
            Ok(())
        }
        Command::Transcript => {
            print_transcript(session);
            Ok(())
        }
        Command::Status => {
            print_stage(session);
            Ok(())
        }
        Command::End => return Flow::End,
        Command::Quit => return Flow::Quit,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
    }
    Flow::Continue
}

impl Background {
    fn new(responder: Arc<dyn CharacterResponder>) -> (Self, mpsc::UnboundedReceiver<Reply>) {
        let (replies, receiver) = mpsc::unbounded_channel();
        (Self { responder, replies }, receiver)
    }

    /// Ask a character to respond to the transcript so far.
    fn ask(&self, session: &Session, npc_id: &str) -> Result<(), SessionError> {
        let npc = session
            .scenario()
            .npc(npc_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownCharacter(npc_id.to_string()))?;

        let scenario = session.scenario().clone();
        let stage_type = session.current_stage().stage_type;
        let transcript = session.transcript().clone();
        let results = session.voting_options().to_vec();
        let responder = Arc::clone(&self.responder);
        let replies = self.replies.clone();

        println!("{}", format!("  {} is considering...", npc.name).dimmed());
        tokio::spawn(async move {
            let result = generate_npc_response(
                responder.as_ref(),
                &npc,
                &scenario,
                stage_type,
                &transcript,
                &results,
            )
            .await;
            if replies.send(Reply::Character { npc, result }).is_err() {
                debug!("character reply dropped after shutdown");
            }
        });
        Ok(())
    }

    /// Classify an argument's stance and rhetoric.
    fn tag(&self, session: &Session, entry_id: &str) -> Result<(), SessionError> {
        let entry = session
            .transcript()
            .get(entry_id)
            .filter(|e| !e.is_system_event)
            .ok_or_else(|| SessionError::UnknownEntry(entry_id.to_string()))?;

        let entry_id = entry.id.clone();
        let text = entry.text.clone();
        let question = session.scenario().central_question.clone();
        let responder = Arc::clone(&self.responder);
        let replies = self.replies.clone();

        tokio::spawn(async move {
            let result = classify_argument(responder.as_ref(), &text, &question).await;
            if replies.send(Reply::Tags { entry_id, result }).is_err() {
                debug!("tag reply dropped after shutdown");
            }
        });
        Ok(())
    }
}

fn handle_reply(session: &mut Session, reply: Reply) -> Result<(), SessionError> {
    match reply {
        Reply::Character { npc, result } => {
            let text = result?;
            println!();
            println!(
                "{} {} {}",
                npc.avatar_emoji,
                npc.name.bright_cyan().bold(),
                format!("({})", npc.title).yellow()
            );
            for line in textwrap(&text, 66).lines() {
                println!("  {}", line);
            }
            println!();
            session.record_npc_response(&npc.id, &text)
        }
        Reply::Tags { entry_id, result } => {
            let tags = result?;
            if tags == ArgumentTags::default() {
                println!("{}", "  The classifier gave no usable tags.".yellow());
                return Ok(());
            }
            session.apply_tags(&entry_id, tags)?;
            println!(
                "  tagged: stance {}, rhetoric {}",
                tags.stance.map_or("-".to_string(), |s| format!("{:?}", s)),
                tags.rhetoric.map_or("-".to_string(), |m| format!("{:?}", m))
            );
            Ok(())
        }
    }
}

/// Create a callback that prints session events to the console.
fn create_console_callback() -> SessionCallback {
    Box::new(move |event| match event {
        SessionEvent::StageStart {
            index,
            stage_type,
            title,
            description,
        } => {
            println!();
            println!("{}", "═".repeat(70).bright_magenta());
            println!(
                "{}",
                format!("  Stage {}: {} [{}]", index + 1, title, stage_type.display_name())
                    .bright_magenta()
                    .bold()
            );
            if !description.is_empty() {
                println!("  {}", description.dimmed());
            }
            println!("{}", "═".repeat(70).bright_magenta());
            println!();
        }
        SessionEvent::TimerWarning { seconds } => {
            println!(
                "{}",
                format!("⚠ {} seconds remaining", seconds).yellow().bold()
            );
        }
        SessionEvent::TimerComplete { stage_id } => {
            println!("{}", format!("⏰ Time is up for '{}'.", stage_id).red().bold());
        }
        SessionEvent::EventFired { event } => {
            println!();
            println!("{}", "─".repeat(70).bright_red());
            println!("{}", format!("  ⚡ {}", event.text).bright_red().bold());
            for line in textwrap(&event.description, 66).lines() {
                println!("  {}", line);
            }
            println!("{}", "─".repeat(70).bright_red());
            println!();
        }
    })
}

fn print_header(session: &Session) {
    let scenario = session.scenario();
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  {} - {}", "Agora".bold(), scenario.title)
            .bright_blue()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    if !scenario.setting.is_empty() {
        println!("{} {}", "Setting:".bold(), scenario.setting);
    }
    println!("{} {}", "Question:".bold(), scenario.central_question.bright_white());
    println!();
    if !scenario.npcs.is_empty() {
        println!("{}", "Characters:".bold());
        for npc in &scenario.npcs {
            println!(
                "  {} {} ({}) - {}",
                npc.avatar_emoji,
                npc.display_name_with_title().bright_cyan(),
                npc.id.dimmed(),
                npc.stance.dimmed()
            );
        }
        println!();
    }
    println!("{}", "─".repeat(70).dimmed());
}

fn print_stage(session: &Session) {
    let stage = session.current_stage();
    let state = if session.timer().is_running() { "running" } else { "paused" };
    println!(
        "{} {}/{} {} [{}]  {} {} ({})",
        "Stage".bold(),
        session.current_stage_index() + 1,
        session.scenario().stages.len(),
        stage.title.bright_magenta(),
        stage.stage_type.display_name(),
        "⏱".bright_white(),
        session.timer().display(),
        state
    );
}

fn print_help() {
    let commands = [
        ("start | pause | t", "toggle the stage timer"),
        ("reset", "reset the timer to the stage duration"),
        ("+1m", "add a minute"),
        ("next | prev | goto N", "change stage"),
        ("say <speaker>: <text>", "record an argument"),
        ("up | down <entry>", "vote on an argument"),
        ("stance <entry> for|against|mixed", "tag an argument's stance"),
        ("mode <entry> evidence|values|consequences|authority", "tag rhetoric"),
        ("remove <entry>", "delete a transcript entry"),
        ("trigger <event-id>", "fire a stage event now"),
        ("events", "show this stage's event schedule"),
        ("stats", "participation by speaker"),
        ("ballot [<option> <+n|-n|n>]", "show or change the vote"),
        ("ask <character-id>", "get an AI character's response"),
        ("tag <entry>", "classify stance and rhetoric with AI"),
        ("analysis", "stance, rhetoric and demographic breakdown"),
        ("transcript", "show the transcript by stage"),
        ("status", "show stage and timer"),
        ("end", "finish and delete the saved session"),
        ("quit", "save and exit"),
    ];
    for (usage, description) in commands {
        println!("  {:<54} {}", usage.bright_white(), description.dimmed());
    }
}

fn print_events(session: &Session) {
    let statuses = session.event_statuses();
    if statuses.is_empty() {
        println!("{}", "No events for this stage.".dimmed());
        return;
    }
    println!("{} (elapsed {}s)", "Events:".bold(), session.elapsed());
    for (event, status) in statuses {
        let status = match status {
            EventStatus::Triggered => "triggered".green().to_string(),
            EventStatus::Skipped => "skipped".dimmed().to_string(),
            EventStatus::Scheduled(at) => format!("at {:.0}s", at).yellow().to_string(),
        };
        println!("  {:<20} {:<30} {}", event.id.bright_white(), event.text, status);
    }
}

fn print_stats(session: &Session) {
    let participation = session.participation();
    if participation.speakers.is_empty() {
        println!("{}", "Nobody has spoken yet.".dimmed());
    }
    for stat in &participation.speakers {
        println!(
            "  {:<24} {:>3} arguments  {:>6} chars",
            stat.name.bright_cyan(),
            stat.count,
            stat.total_chars
        );
    }
    if !participation.silent.is_empty() {
        println!("{} {}", "Not yet heard:".yellow(), participation.silent.join(", "));
    }
}

fn print_ballot(session: &Session) {
    let total = session.total_votes();
    for option in session.tally() {
        let share = if total == 0 {
            0.0
        } else {
            option.votes as f64 * 100.0 / total as f64
        };
        println!(
            "  {:<14} {:<36} {:>3} ({:>3.0}%)",
            option.id.bright_white(),
            option.label,
            option.votes,
            share
        );
    }
}

fn print_transcript(session: &Session) {
    let transcript = session.transcript();
    if transcript.is_empty() {
        println!("{}", "The transcript is empty.".dimmed());
        return;
    }
    let mut number = 0;
    for section in transcript.sections(&session.scenario().stages) {
        println!("{}", format!("── {} ──", section.label).bright_magenta());
        for entry in section.entries {
            number += 1;
            if entry.is_system_event {
                println!("  #{:<3} {}", number, format!("⚡ {}", entry.text).bright_red());
                continue;
            }
            let votes = entry.votes.map(|v| format!(" [{:+}]", v)).unwrap_or_default();
            println!("  #{:<3} {}{}", number, entry.speaker.bright_cyan().bold(), votes.dimmed());
            for line in textwrap(&entry.text, 64).lines() {
                println!("        {}", line);
            }
        }
    }
}

fn print_summary(session: &Session) {
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  Session concluded.".bright_green().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    print_ballot(session);
    println!();
    print_stats(session);
    println!();
    print_analysis(session);
    if let Some(outcome) = &session.scenario().outcome {
        println!();
        println!("{}", "What actually happened:".bold());
        for line in textwrap(outcome, 66).lines() {
            println!("  {}", line);
        }
    }
    println!();
}

fn print_analysis(session: &Session) {
    let analysis = session.analysis();
    if analysis.total == 0 {
        println!("{}", "No arguments to analyse yet.".dimmed());
        return;
    }

    println!("{}", "Argument stance:".bold());
    println!("  {:<14} {}", "For".green(), analysis.stances.for_count);
    println!("  {:<14} {}", "Against".red(), analysis.stances.against);
    println!("  {:<14} {}", "Mixed".blue(), analysis.stances.mixed);
    if analysis.untagged > 0 {
        println!("  {}", format!("{} untagged", analysis.untagged).dimmed());
    }
    if analysis.for_vote_score != 0 || analysis.against_vote_score != 0 {
        println!(
            "  Vote-weighted: for {:+} / against {:+}",
            analysis.for_vote_score, analysis.against_vote_score
        );
    }

    let rhetoric = analysis.rhetoric;
    if rhetoric.evidence + rhetoric.values + rhetoric.consequences + rhetoric.authority > 0 {
        println!("{}", "Rhetorical approach:".bold());
        for (label, count) in [
            ("Evidence", rhetoric.evidence),
            ("Values", rhetoric.values),
            ("Consequences", rhetoric.consequences),
            ("Authority", rhetoric.authority),
        ] {
            println!("  {:<14} {}", label, count);
        }
    }

    if !analysis.top_arguments.is_empty() {
        println!("{}", "Top arguments:".bold());
        for entry in &analysis.top_arguments {
            let text: String = entry.text.chars().take(60).collect();
            println!(
                "  {:>+4} {} {}",
                entry.votes.unwrap_or(0),
                entry.speaker.bright_cyan(),
                text.dimmed()
            );
        }
    }

    if analysis.by_stage.len() > 1 {
        println!("{}", "Sentiment by stage:".bold());
        for stage in &analysis.by_stage {
            println!(
                "  {:<28} {:>3} args  for {} / against {} / mixed {}",
                stage.title,
                stage.total,
                stage.stances.for_count,
                stage.stances.against,
                stage.stances.mixed
            );
        }
    }

    print_buckets("By profession:", &analysis.professions);
    print_buckets("By gender:", &analysis.genders);
    print_buckets("By age:", &analysis.ages);
}

fn print_buckets(title: &str, buckets: &[DemographicBucket]) {
    if buckets.is_empty() {
        return;
    }
    println!("{}", title.bold());
    for bucket in buckets {
        println!(
            "  {:<20} {:>3} args  for {} / against {} / mixed {}",
            bucket.label,
            bucket.count,
            bucket.stances.for_count,
            bucket.stances.against,
            bucket.stances.mixed
        );
    }
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();

    for (i, paragraph) in text.split("\n\n").enumerate() {
        if i > 0 {
            result.push_str("\n\n");
        }
        let mut current_line_len = 0;
        for word in paragraph.split_whitespace() {
            if current_line_len + word.len() + 1 > width && current_line_len > 0 {
                result.push('\n');
                current_line_len = 0;
            }
            if current_line_len > 0 {
                result.push(' ');
                current_line_len += 1;
            }
            result.push_str(word);
            current_line_len += word.len();
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    #[test]
    fn test_parse_say_splits_on_first_colon() {
        assert_eq!(
            parse_command("say Amara: Rome is far: Egypt is near").unwrap(),
            Some(Command::Say {
                speaker: "Amara".to_string(),
                text: "Rome is far: Egypt is near".to_string(),
            })
        );
        assert!(parse_command("say nobody").is_err());
        assert!(parse_command("say : empty").is_err());
    }

    #[test]
    fn test_parse_goto_is_one_based() {
        assert_eq!(parse_command("goto 3").unwrap(), Some(Command::Goto(2)));
        assert!(parse_command("goto three").is_err());
    }

    #[test]
    fn test_parse_ballot_changes() {
        assert_eq!(parse_command("ballot").unwrap(), Some(Command::Ballot(None)));
        assert_eq!(
            parse_command("ballot convert +2").unwrap(),
            Some(Command::Ballot(Some(("convert".to_string(), BallotChange::Adjust(2)))))
        );
        assert_eq!(
            parse_command("ballot convert -1").unwrap(),
            Some(Command::Ballot(Some(("convert".to_string(), BallotChange::Adjust(-1)))))
        );
        assert_eq!(
            parse_command("ballot convert 7").unwrap(),
            Some(Command::Ballot(Some(("convert".to_string(), BallotChange::Set(7)))))
        );
    }

    #[test]
    fn test_parse_tags_and_blank_lines() {
        assert_eq!(parse_command("   ").unwrap(), None);
        assert_eq!(
            parse_command("stance 2 against").unwrap(),
            Some(Command::Stance {
                entry: "2".to_string(),
                stance: ArgumentStance::Against,
            })
        );
        assert!(parse_command("mode 2 bluster").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[test]
    fn test_parse_tag_and_analysis() {
        assert_eq!(parse_command("tag 3").unwrap(), Some(Command::Tag("3".to_string())));
        assert!(parse_command("tag").is_err());
        assert_eq!(parse_command("analysis").unwrap(), Some(Command::Analysis));
        assert_eq!(parse_command("analyze").unwrap(), Some(Command::Analysis));
    }

    /// Holds every reply until the gate opens.
    struct GatedResponder {
        gate: Arc<Notify>,
        reply: String,
    }

    #[async_trait]
    impl CharacterResponder for GatedResponder {
        async fn respond(&self, _system: &str, _user: &str) -> Result<String, SessionError> {
            self.gate.notified().await;
            Ok(self.reply.clone())
        }
    }

    fn gated(reply: &str) -> (Background, mpsc::UnboundedReceiver<Reply>, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let responder = GatedResponder {
            gate: Arc::clone(&gate),
            reply: reply.to_string(),
        };
        let (background, replies) = Background::new(Arc::new(responder));
        (background, replies, gate)
    }

    #[tokio::test]
    async fn test_character_request_does_not_hold_up_the_timer() {
        let (background, mut replies, gate) = gated("Axum will keep the old gods.");
        let mut session =
            Session::new(default_config().scenario, default_config().session).unwrap();
        session.go_to_stage(2);
        session.toggle_timer();

        background.ask(&session, "wagri").unwrap();
        for _ in 0..5 {
            session.tick(Instant::now());
        }
        assert_eq!(session.timer().seconds(), 175);
        assert!(replies.try_recv().is_err());
        assert!(session.npc_responses().is_empty());

        gate.notify_one();
        let reply = replies.recv().await.unwrap();
        handle_reply(&mut session, reply).unwrap();
        assert_eq!(session.npc_responses().len(), 1);
        assert_eq!(session.npc_responses()[0].npc_id, "wagri");
        assert_eq!(session.npc_responses()[0].text, "Axum will keep the old gods.");
    }

    #[tokio::test]
    async fn test_ask_unknown_character_fails_without_spawning() {
        let (background, mut replies, _gate) = gated("unused");
        let session = Session::new(default_config().scenario, default_config().session).unwrap();
        assert!(matches!(
            background.ask(&session, "caesar"),
            Err(SessionError::UnknownCharacter(_))
        ));
        assert!(replies.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_tag_reply_applies_classification() {
        let (background, mut replies, gate) =
            gated(r#"{"stance": "against", "rhetoric": "authority"}"#);
        let mut session =
            Session::new(default_config().scenario, default_config().session).unwrap();
        let id = session.record_argument("Amara", "The bishop cannot overrule the priests.");

        background.tag(&session, &id).unwrap();
        gate.notify_one();
        let reply = replies.recv().await.unwrap();
        handle_reply(&mut session, reply).unwrap();

        let entry = session.transcript().get(&id).unwrap();
        assert_eq!(entry.stance, Some(ArgumentStance::Against));
        assert_eq!(entry.rhetoric, Some(RhetoricMode::Authority));
        assert_eq!(session.analysis().stances.against, 1);
    }

    #[tokio::test]
    async fn test_unusable_tags_leave_entry_untouched() {
        let (background, mut replies, gate) = gated("I would rather not say.");
        let mut session =
            Session::new(default_config().scenario, default_config().session).unwrap();
        let id = session.record_argument("Amara", "For.");
        let revision = session.revision();

        background.tag(&session, &id).unwrap();
        gate.notify_one();
        let reply = replies.recv().await.unwrap();
        handle_reply(&mut session, reply).unwrap();

        assert_eq!(session.transcript().get(&id).unwrap().stance, None);
        assert_eq!(session.revision(), revision);
    }

    #[test]
    fn test_resolve_entry_by_position() {
        let mut session =
            Session::new(default_config().scenario, default_config().session).unwrap();
        let id = session.record_argument("Amara", "For.");
        assert_eq!(resolve_entry(&session, "1"), id);
        assert_eq!(resolve_entry(&session, "9"), "9");
        assert_eq!(resolve_entry(&session, "abc"), "abc");
    }

    #[test]
    fn test_textwrap_keeps_paragraphs() {
        let wrapped = textwrap("one two three\n\nfour", 8);
        assert_eq!(wrapped, "one two\nthree\n\nfour");
    }
}
