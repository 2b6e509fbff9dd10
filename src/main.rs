use clap::{Parser, ValueEnum};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io,
    path::PathBuf,
    time::{Duration, Instant},
};
use tracing::info;

use cueline::{
    align::{FifoSpeechSource, NoSpeechSource, SpeechSource},
    config::{Config, ConfigStore, FileConfigStore},
    logging,
    playback::{Mode, Playback},
    runtime::{CrosstermEventSource, CueEvent, FixedTicker, Runner},
};

const TICK_RATE_MS: u64 = 16;
const WHEEL_STEP_LINES: f64 = 3.0;

/// terminal teleprompter with kinematic scrolling, paged reading, voice
/// tracking, and rsvp pacing
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Cli {
    /// script file to present
    script: PathBuf,

    /// scroll speed in lines per second (continuous mode)
    #[clap(short, long)]
    speed: Option<f64>,

    /// words per minute (rsvp mode)
    #[clap(short, long)]
    wpm: Option<u32>,

    /// wrap lines longer than this many words (0 = keep source lines)
    #[clap(long)]
    wrap: Option<usize>,

    /// fraction of the previous page re-shown after a page flip
    #[clap(long)]
    overlap: Option<f64>,

    /// starting playback mode
    #[clap(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// path to a fifo or file of newline-delimited transcript fragments
    /// (enables voice mode; lines prefixed with ~ are interim)
    #[clap(short, long)]
    transcript: Option<PathBuf>,

    /// recognition locale hint passed to the speech source
    #[clap(long)]
    locale: Option<String>,

    /// log file location (defaults to the platform data dir)
    #[clap(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Copy, Clone, ValueEnum, strum_macros::Display)]
pub enum ModeArg {
    Continuous,
    Paging,
    Voice,
    Rsvp,
}

impl From<ModeArg> for Mode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Continuous => Mode::Continuous,
            ModeArg::Paging => Mode::Paging,
            ModeArg::Voice => Mode::Voice,
            ModeArg::Rsvp => Mode::Rsvp,
        }
    }
}

fn mode_from_name(name: &str) -> Mode {
    match name {
        "paging" => Mode::Paging,
        "voice" => Mode::Voice,
        "rsvp" => Mode::Rsvp,
        _ => Mode::Continuous,
    }
}

fn mode_name(mode: Mode) -> String {
    mode.to_string().to_lowercase()
}

/// CLI flags override the persisted config; whatever wins is saved back on
/// exit.
fn effective_config(cli: &Cli, stored: Config) -> Config {
    Config {
        speed_lines_per_sec: cli.speed.unwrap_or(stored.speed_lines_per_sec),
        words_per_minute: cli.wpm.unwrap_or(stored.words_per_minute),
        wrap_limit: cli.wrap.unwrap_or(stored.wrap_limit),
        page_overlap: cli.overlap.unwrap_or(stored.page_overlap),
        mode: cli
            .mode
            .map(|m| m.to_string().to_lowercase())
            .unwrap_or(stored.mode),
        locale: cli.locale.clone().unwrap_or(stored.locale),
        transcript_path: cli.transcript.clone().or(stored.transcript_path),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let log_path = cli
        .log_file
        .clone()
        .unwrap_or_else(logging::default_log_path);
    let _ = logging::init(&log_path);

    let text = std::fs::read_to_string(&cli.script)?;

    let store = FileConfigStore::new();
    let cfg = effective_config(&cli, store.load());

    let speech: Box<dyn SpeechSource> = match &cfg.transcript_path {
        Some(path) => Box::new(FifoSpeechSource::new(path.clone())),
        None => Box::new(NoSpeechSource),
    };

    let mut playback = Playback::new(
        &text,
        cfg.wrap_limit,
        cfg.speed_lines_per_sec,
        1.0, // one terminal row per script line
        cfg.words_per_minute,
        cfg.page_overlap,
        speech,
        &cfg.locale,
    );
    playback.set_mode(mode_from_name(&cfg.mode));
    info!(script = %cli.script.display(), lines = playback.script.line_count(), "script loaded");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut playback);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    // persist whatever the session ended with
    let final_cfg = Config {
        speed_lines_per_sec: playback.scroller.speed_lines_per_sec,
        words_per_minute: playback.rsvp.words_per_minute,
        wrap_limit: playback.wrap_limit(),
        page_overlap: playback.paginator.overlap,
        mode: mode_name(playback.mode),
        locale: cfg.locale,
        transcript_path: cfg.transcript_path,
    };
    let _ = store.save(&final_cfg);

    result
}

fn update_metrics<B: Backend>(
    terminal: &Terminal<B>,
    playback: &mut Playback,
) -> Result<(), Box<dyn Error>> {
    let size = terminal.size()?;
    // status and footer rows are not part of the scroll viewport
    let viewport = f64::from(size.height.saturating_sub(2));
    playback.set_metrics(playback.script.line_count() as f64, viewport.max(1.0));
    Ok(())
}

fn run<B: Backend>(
    terminal: &mut Terminal<B>,
    playback: &mut Playback,
) -> Result<(), Box<dyn Error>> {
    let events = CrosstermEventSource::new();
    let runner = Runner::new(events, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));
    let started = Instant::now();

    update_metrics(terminal, playback)?;
    terminal.draw(|f| f.render_widget(&*playback, f.area()))?;

    loop {
        let now_ms = started.elapsed().as_millis() as u64;

        let redraw = match runner.step() {
            CueEvent::Tick => playback.on_tick(now_ms),
            CueEvent::Resize => {
                update_metrics(terminal, playback)?;
                true
            }
            CueEvent::Wheel(detents) => {
                playback.scroller.nudge(f64::from(detents) * WHEEL_STEP_LINES);
                true
            }
            CueEvent::Key(key) => match key.code {
                KeyCode::Esc | KeyCode::Char('q') => break,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                KeyCode::Char(' ') => {
                    playback.toggle_play(now_ms);
                    true
                }
                KeyCode::Tab => {
                    playback.cycle_mode();
                    true
                }
                KeyCode::Char('j') | KeyCode::Down | KeyCode::Char('l') | KeyCode::Right => {
                    playback.seek_lines(1, now_ms);
                    true
                }
                KeyCode::Char('k') | KeyCode::Up | KeyCode::Char('h') | KeyCode::Left => {
                    playback.seek_lines(-1, now_ms);
                    true
                }
                KeyCode::Char('+') | KeyCode::Char('=') => {
                    playback.adjust_speed(true);
                    true
                }
                KeyCode::Char('-') => {
                    playback.adjust_speed(false);
                    true
                }
                KeyCode::Char('g') => {
                    playback.seek_to_start();
                    true
                }
                _ => false,
            },
        };

        if redraw {
            terminal.draw(|f| f.render_widget(&*playback, f.area()))?;
        }
    }

    Ok(())
}
