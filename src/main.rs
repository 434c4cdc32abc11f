mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    fs,
    io::{self, stdin},
    path::PathBuf,
    time::{Duration, SystemTime},
};
use tovel::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    pagination::{paginate, Page, PaginationConfig},
    progress::{chapter_id, ChapterSummary, ProgressRecord, ProgressStore, SqliteProgressStore},
    reader::{ChapterReader, Position, ReaderEvent, ReaderUpdate},
    runtime::{
        AppEvent, Clock, CrosstermEventSource, EventSource, FixedTicker, Runner, SystemClock,
        Ticker,
    },
    samples,
    session::AdvanceScheduler,
    typing::InputResult,
    Error as TovelError,
};

use crate::ui::screen::current_screen;

const TICK_RATE_MS: u64 = 100;

/// type your way through a book, one chunk at a time
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Splits a chapter into sentence-aligned chunks and pages, then has you type it chunk by chunk while tracking speed, accuracy and progress."
)]
pub struct Cli {
    /// plain-text chapter to practice on (defaults to a bundled sample)
    file: Option<PathBuf>,

    /// bundled sample to use when no file is given
    #[clap(long, default_value = samples::DEFAULT_SAMPLE)]
    sample: String,

    /// list the bundled samples and exit
    #[clap(long)]
    list_samples: bool,

    /// word target per chunk
    #[clap(long)]
    words_per_chunk: Option<usize>,

    /// character limit per chunk (a single longer sentence still becomes its own chunk)
    #[clap(long)]
    max_chunk_chars: Option<usize>,

    /// chunks per page
    #[clap(long)]
    chunks_per_page: Option<usize>,

    /// pause after a finished chunk before the next one loads
    #[clap(long)]
    advance_delay_ms: Option<u64>,

    /// persist the pagination options given on this command line
    #[clap(long)]
    save_config: bool,

    /// print the paginated chapter as JSON and exit
    #[clap(long)]
    paginate: bool,

    /// print the recorded progress for the chapter and exit
    #[clap(long)]
    summary: bool,

    /// continue after the last chunk recorded for this chapter
    #[clap(short = 'r', long)]
    resume: bool,
}

impl Cli {
    /// Command line values win over the stored config.
    fn apply_overrides(&self, mut config: Config) -> Config {
        if let Some(words) = self.words_per_chunk {
            config.words_per_chunk = words;
        }
        if let Some(chars) = self.max_chunk_chars {
            config.max_chunk_chars = chars;
        }
        if let Some(chunks) = self.chunks_per_page {
            config.chunks_per_page = chunks;
        }
        if let Some(delay) = self.advance_delay_ms {
            config.advance_delay_ms = delay;
        }
        config
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    pub text: String,
}

fn load_chapter(cli: &Cli) -> Result<Chapter, Box<dyn Error>> {
    match &cli.file {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            let title = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(Chapter { title, text })
        }
        None => {
            let sample = samples::sample(&cli.sample).ok_or_else(|| {
                format!(
                    "unknown sample '{}' (available: {})",
                    cli.sample,
                    samples::sample_names().join(", ")
                )
            })?;
            Ok(Chapter {
                title: sample.name.to_string(),
                text: sample.text.to_string(),
            })
        }
    }
}

fn summary_lines(title: &str, summary: Option<&ChapterSummary>) -> Vec<String> {
    let Some(s) = summary else {
        return vec![format!("{title}: no progress recorded yet")];
    };
    let mut lines = vec![
        format!(
            "{title}: {}% complete ({} of {} chunks)",
            s.progress_percent(),
            s.distinct_chunks,
            s.total_chunks
        ),
        format!(
            "{} chunks typed, {:.0} wpm average, {:.0}% accuracy average, {} wpm best",
            s.chunks_typed, s.avg_wpm, s.avg_accuracy, s.best_wpm
        ),
        format!("{:.0}s spent typing", s.total_secs),
    ];
    if let Some(last) = s.last_recorded_at {
        lines.push(format!("last practiced {}", last.format("%Y-%m-%d %H:%M")));
    }
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Typing,
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

#[derive(Debug)]
pub struct App {
    pub reader: ChapterReader<Vec<Page>>,
    pub state: AppState,
    pub title: String,
    pub chapter_id: String,
    /// Time of the latest event, used for the live timer.
    pub now: SystemTime,
    /// Stored figures for the chapter, loaded when the summary opens.
    pub stored_summary: Option<ChapterSummary>,
    first: Position,
    summary_timer: AdvanceScheduler,
    store: Option<SqliteProgressStore>,
}

impl App {
    pub fn new(
        chapter: Chapter,
        pagination: &PaginationConfig,
        advance_delay: Duration,
        store: Option<SqliteProgressStore>,
    ) -> tovel::Result<Self> {
        let chapter_id = chapter_id(&chapter.text, pagination);
        let pages = paginate(&chapter.text, pagination);
        let reader = ChapterReader::new(pages, advance_delay)?;
        let first = reader.position();

        Ok(Self {
            reader,
            state: AppState::Typing,
            title: chapter.title,
            chapter_id,
            now: SystemTime::now(),
            stored_summary: None,
            first,
            summary_timer: AdvanceScheduler::new(advance_delay),
            store,
        })
    }

    /// Moves past the last recorded chunk. Returns whether a usable record
    /// existed; a recorded position that no longer resolves leaves the reader
    /// at the start of the chapter.
    pub fn resume(&mut self) -> tovel::Result<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        let Some(last) = store.last_position(&self.chapter_id)? else {
            return Ok(false);
        };
        match self.reader.resume_after(last) {
            Ok(true) => Ok(true),
            Ok(false) => {
                log::info!("chapter {} was finished, starting over", self.chapter_id);
                Ok(true)
            }
            Err(e @ (TovelError::PageOutOfRange(_) | TovelError::ChunkNotOnPage { .. })) => {
                log::warn!("stale position for chapter {} ({e}), starting over", self.chapter_id);
                self.reader.jump_to(self.first)?;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn on_key(&mut self, key: KeyEvent, now: SystemTime) -> Flow {
        self.now = now;
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if key.code == KeyCode::Esc || (ctrl && key.code == KeyCode::Char('c')) {
            self.reader.cancel_pending();
            self.summary_timer.cancel();
            return Flow::Quit;
        }

        match self.state {
            AppState::Typing => {
                let update = match key.code {
                    KeyCode::Char('r') if ctrl => {
                        log::debug!(
                            "restarting chunk {} from {}",
                            self.reader.chunk_number(),
                            self.reader.session().phase()
                        );
                        self.summary_timer.cancel();
                        self.reader.restart_chunk();
                        return Flow::Continue;
                    }
                    KeyCode::Char(_) if ctrl => return Flow::Continue,
                    KeyCode::Char(c) => self.reader.type_char_at(c, now),
                    KeyCode::Enter => self.reader.type_char_at('\n', now),
                    KeyCode::Backspace => self.reader.backspace_at(now),
                    _ => return Flow::Continue,
                };
                self.apply(update);
            }
            AppState::Summary => match key.code {
                KeyCode::Char('q') => return Flow::Quit,
                KeyCode::Char('r') => self.restart_chapter(),
                _ => {}
            },
        }
        Flow::Continue
    }

    fn on_paste(&mut self, text: &str, now: SystemTime) {
        self.now = now;
        if self.state == AppState::Typing {
            let update = self.reader.paste_at(text, now);
            self.apply(update);
        }
    }

    fn on_tick(&mut self, now: SystemTime) {
        self.now = now;
        if let Some(event) = self.reader.on_tick(now) {
            self.handle_event(event);
        }
        if self.summary_timer.poll(now).is_some() {
            self.open_summary();
        }
    }

    fn apply(&mut self, update: ReaderUpdate) {
        if let InputResult::Rejected(reason) = update.input {
            log::trace!("input rejected: {reason:?}");
        }
        for event in update.events {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: ReaderEvent) {
        match event {
            ReaderEvent::ChunkCompleted {
                position,
                chunk_number,
                stats,
            } => {
                log::info!(
                    "chunk {chunk_number}/{} done: {} wpm, {}% acc",
                    self.reader.total_chunks(),
                    stats.wpm,
                    stats.accuracy
                );
                let record = ProgressRecord {
                    chapter_id: self.chapter_id.clone(),
                    page_number: position.page_number,
                    chunk_id: position.chunk_id,
                    chunk_number,
                    total_chunks: self.reader.total_chunks(),
                    stats,
                    recorded_at: chrono::Local::now(),
                };
                if let Some(store) = self.store.as_mut() {
                    if let Err(e) = store.record(&record) {
                        log::warn!("could not save progress: {e}");
                    }
                }
            }
            ReaderEvent::PageCompleted { page_number, stats } => {
                log::info!("page {page_number} done: {} wpm", stats.wpm);
            }
            ReaderEvent::ChapterCompleted { stats } => {
                log::info!(
                    "chapter {} done: {} wpm, {}% acc",
                    self.chapter_id,
                    stats.wpm,
                    stats.accuracy
                );
                self.summary_timer.arm(self.now);
            }
            ReaderEvent::Advanced { .. } => {}
        }
    }

    fn open_summary(&mut self) {
        self.stored_summary = self.store.as_ref().and_then(|store| {
            store
                .chapter_summary(&self.chapter_id)
                .map_err(|e| log::warn!("could not load chapter summary: {e}"))
                .ok()
                .flatten()
        });
        self.state = AppState::Summary;
    }

    fn restart_chapter(&mut self) {
        if let Err(e) = self.reader.jump_to(self.first) {
            log::warn!("could not restart chapter: {e}");
            return;
        }
        self.state = AppState::Typing;
    }
}

fn init_logging() {
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = fs::OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    // stderr belongs to the terminal UI
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();

    if cli.list_samples {
        for name in samples::sample_names() {
            println!("{name}");
        }
        return Ok(());
    }

    let config_store = FileConfigStore::new();
    let config = cli.apply_overrides(config_store.load());
    let pagination = match config.pagination() {
        Ok(p) => p,
        Err(e) => Cli::command().error(ErrorKind::InvalidValue, e).exit(),
    };
    if cli.save_config {
        config_store.save(&config)?;
        log::info!("saved config to {}", config_store.path().display());
    }

    let chapter = match load_chapter(&cli) {
        Ok(chapter) => chapter,
        Err(e) => Cli::command().error(ErrorKind::InvalidValue, e).exit(),
    };

    if cli.paginate {
        let pages = paginate(&chapter.text, &pagination);
        println!("{}", serde_json::to_string_pretty(&pages)?);
        return Ok(());
    }

    if cli.summary {
        let store = SqliteProgressStore::open_default()?;
        let summary = store.chapter_summary(&chapter_id(&chapter.text, &pagination))?;
        for line in summary_lines(&chapter.title, summary.as_ref()) {
            println!("{line}");
        }
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = SqliteProgressStore::open_default()
        .map_err(|e| log::warn!("progress will not be saved: {e}"))
        .ok();
    let mut app = match App::new(chapter, &pagination, config.advance_delay(), store) {
        Ok(app) => app,
        Err(e) => Cli::command().error(ErrorKind::InvalidValue, e).exit(),
    };
    if cli.resume && !app.resume()? {
        log::info!("nothing to resume for chapter {}", app.chapter_id);
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let result = start_tui(&mut terminal, &mut app, &mut runner, &SystemClock);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, E: EventSource, T: Ticker, C: Clock>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &mut Runner<E, T>,
    clock: &C,
) -> Result<(), Box<dyn Error>> {
    terminal.draw(|f| ui(app, f))?;

    loop {
        let event = runner.step();
        let now = clock.now();

        let flow = match event {
            AppEvent::Key(key) => app.on_key(key, now),
            AppEvent::Paste(text) => {
                app.on_paste(&text, now);
                Flow::Continue
            }
            AppEvent::Tick => {
                app.on_tick(now);
                Flow::Continue
            }
            AppEvent::Resize => Flow::Continue,
        };

        if flow == Flow::Quit {
            break;
        }
        if runner.is_disconnected() {
            log::warn!("input closed, leaving");
            break;
        }

        terminal.draw(|f| ui(app, f))?;
    }

    Ok(())
}

fn ui(app: &App, f: &mut Frame) {
    current_screen(&app.state).render(app, f);
}
