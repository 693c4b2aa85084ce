use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use keepwriting::{
    app::{App, Control},
    app_dirs::AppDirs,
    clock::SystemClock,
    config::{FileSettingsStore, GoalMode, Settings, SettingsStore},
    history::{HistoryStore, SqliteHistoryStore},
    logging,
    penalty::PenaltyMode,
    recorder::SessionRecorder,
    runtime::{AppEvent, CrosstermEventSource, EventPump},
    stats::{export_csv, format_clock, HistorySummary},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};

/// same period as the warning poll
const TICK_RATE_MS: u64 = 50;

/// write or lose it: a timed writing session that deletes your work if you stop
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A distraction-free writing session for the terminal. Keep typing until the goal is reached; stop for too long and your text is penalised."
)]
pub struct Cli {
    #[clap(subcommand)]
    command: Option<Command>,

    /// session length in minutes (duration goal)
    #[clap(short = 'm', long, conflicts_with = "words")]
    minutes: Option<u64>,

    /// number of words to write (word-count goal)
    #[clap(short = 'w', long)]
    words: Option<u64>,

    /// seconds of inactivity before the penalty
    #[clap(short = 'i', long)]
    idle: Option<u64>,

    /// what the penalty deletes
    #[clap(short = 'p', long, value_enum)]
    penalty: Option<PenaltyMode>,

    /// seconds before the penalty when the warning starts
    #[clap(long)]
    warning: Option<u64>,

    /// allow restoring pre-session content after a penalty (ctrl+r)
    #[clap(long)]
    practice: bool,

    /// file loaded into the draft buffer and written back on ctrl+s
    #[clap(short = 'f', long)]
    file: Option<PathBuf>,

    /// persist the given options as the new defaults
    #[clap(long)]
    save: bool,

    /// history database to use instead of the default location
    #[clap(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// print past sessions
    History {
        /// export every session as CSV
        #[clap(long)]
        csv: bool,
    },
}

impl Cli {
    /// Overrides loaded settings for this run.
    fn apply_to(&self, settings: &mut Settings) {
        if let Some(minutes) = self.minutes {
            settings.session_minutes = minutes;
            settings.goal_mode = GoalMode::Duration;
        }
        if let Some(words) = self.words {
            settings.word_goal = words;
            settings.goal_mode = GoalMode::Words;
        }
        if let Some(idle) = self.idle {
            settings.idle_timeout_secs = idle;
        }
        if let Some(penalty) = self.penalty {
            settings.penalty_mode = penalty;
        }
        if let Some(warning) = self.warning {
            settings.warning_threshold_secs = warning;
        }
        if self.practice {
            settings.practice_mode = true;
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(log_path) = AppDirs::log_path() {
        if let Err(e) = logging::init(&log_path) {
            eprintln!("logging disabled: {e}");
        }
    }

    let db_path = cli
        .db
        .clone()
        .or_else(AppDirs::db_path)
        .ok_or("could not determine where to keep the session history")?;
    let store = SqliteHistoryStore::open(&db_path)?;

    if let Some(Command::History { csv }) = cli.command {
        return print_history(&store, csv);
    }

    let settings_store = FileSettingsStore::new();
    let mut settings = settings_store.load();
    cli.apply_to(&mut settings);
    if let Err(e) = settings.validate() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::ValueValidation, e).exit();
    }
    if cli.save {
        settings_store.save(&settings)?;
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let recorder = SessionRecorder::load(Box::new(store))?;
    let mut app = App::new(settings, SystemClock::new(), recorder);
    if let Some(path) = &cli.file {
        app.open_file(path)?;
    }
    tracing::info!(db = %db_path.display(), "keepwriting started");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let events = EventPump::new(
        CrosstermEventSource::new(),
        Duration::from_millis(TICK_RATE_MS),
    );

    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        match events.next_event() {
            AppEvent::Tick => {
                app.on_tick();
            }
            AppEvent::Resize => {}
            AppEvent::Paste(text) => app.handle_paste(&text),
            AppEvent::Key(key) => {
                if app.handle_key(key) == Control::Quit {
                    break;
                }
            }
        }
    }
    Ok(())
}

fn print_history(store: &SqliteHistoryStore, csv: bool) -> Result<(), Box<dyn Error>> {
    let records = store.load_history()?;
    if csv {
        export_csv(&records, io::stdout().lock())?;
        return Ok(());
    }

    if records.is_empty() {
        println!("No sessions yet.");
        return Ok(());
    }

    let summary = HistorySummary::from_records(&records);
    println!(
        "{} sessions, {} completed, {} failed ({:.0}% success)",
        summary.total_sessions,
        summary.completed_sessions,
        summary.failed_sessions(),
        summary.success_rate()
    );
    println!(
        "{} words in {}, longest session {}, current streak {}",
        summary.total_words,
        format_clock(summary.total_seconds),
        format_clock(summary.longest_session_seconds),
        summary.current_streak
    );
    println!();
    for day in &summary.daily {
        println!(
            "{}  {:>6} words  {:>3} sessions",
            day.day.format("%Y-%m-%d"),
            day.words,
            day.sessions
        );
    }
    Ok(())
}
