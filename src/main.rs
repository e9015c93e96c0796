use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use typemaster::{
    app_dirs::AppDirs,
    catalog::PassageCatalog,
    config::{Config, ConfigStore, FileConfigStore},
    keymap::{map_key, Command},
    profile::{FileProfileBackend, UserProfileStore},
    runtime::{CrosstermEventSource, EngineEvent, FixedTicker, MonotonicClock, Runner},
    ui::View,
    Intent, SessionMachine, State,
};

/// typing speed trainer with live metrics, error breakdowns, and per-user history
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Cli {
    /// line-delimited passage file (one passage per line); built-in passages when omitted
    #[clap(long)]
    passages: Option<PathBuf>,

    /// user profile store
    #[clap(long)]
    users: Option<PathBuf>,

    /// preselect this user
    #[clap(short = 'u', long)]
    user: Option<String>,

    /// preselect this passage (1-based)
    #[clap(short = 'p', long)]
    paragraph: Option<usize>,

    /// milliseconds between engine ticks
    #[clap(long)]
    tick_rate: Option<u64>,

    /// log filter, overridden by RUST_LOG
    #[clap(long, default_value = "typemaster=info")]
    log_level: String,
}

impl Cli {
    /// Command line wins over remembered settings.
    fn merge_into(&self, mut cfg: Config) -> Config {
        if let Some(p) = &self.passages {
            cfg.passages_path = Some(p.clone());
        }
        if let Some(p) = &self.users {
            cfg.users_path = Some(p.clone());
        }
        if let Some(u) = &self.user {
            cfg.last_user = Some(u.clone());
        }
        if let Some(n) = self.paragraph {
            cfg.last_paragraph = n.saturating_sub(1);
        }
        if let Some(ms) = self.tick_rate {
            cfg.tick_rate_ms = ms;
        }
        cfg
    }
}

/// The terminal is owned by the TUI, so logs go to a file.
fn init_logging(default_filter: &str) -> Option<WorkerGuard> {
    let dir = AppDirs::log_dir();
    std::fs::create_dir_all(&dir).ok()?;
    let appender = tracing_appender::rolling::never(&dir, "typemaster.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;
    Some(guard)
}

pub struct App {
    pub machine: SessionMachine<FileProfileBackend>,
    pub cursor: usize,
    pub status: Option<String>,
    clock: MonotonicClock,
}

impl App {
    pub fn new(cfg: &Config) -> Self {
        let catalog = match &cfg.passages_path {
            Some(path) => PassageCatalog::or_placeholder(PassageCatalog::load(path)),
            None => PassageCatalog::builtin(),
        };
        let store = UserProfileStore::open(FileProfileBackend::with_path(cfg.users_path()));
        let mut machine = SessionMachine::new(catalog, store);

        machine.select_paragraph(cfg.last_paragraph);
        let mut status = None;
        if let Some(user) = &cfg.last_user {
            if let Err(e) = machine.select_user(user) {
                warn!(error = %e, "could not preselect user");
                status = Some(e.to_string());
            }
        }

        Self {
            machine,
            cursor: 0,
            status,
            clock: MonotonicClock::start(),
        }
    }

    fn list_len(&self) -> usize {
        match self.machine.state() {
            State::ParagraphSelect => self.machine.snapshot().passages.len(),
            State::UserSelect => self.machine.store().usernames().len(),
            _ => 0,
        }
    }

    fn dispatch(&mut self, intent: Intent) {
        let before = self.machine.state();
        let now = self.clock.now_ms();
        match self.machine.dispatch(intent, now) {
            Ok(()) => {
                if before != self.machine.state() {
                    self.status = None;
                }
            }
            Err(e) => self.status = Some(e.to_string()),
        }
        if before != self.machine.state() {
            self.cursor = match self.machine.state() {
                State::ParagraphSelect => self.machine.selected_paragraph(),
                State::UserSelect => self
                    .machine
                    .current_user()
                    .and_then(|cur| {
                        self.machine
                            .store()
                            .usernames()
                            .iter()
                            .position(|u| *u == cur)
                    })
                    .unwrap_or(0),
                _ => 0,
            };
        }
        for signal in self.machine.drain_signals() {
            debug!(%signal, "signal");
        }
    }

    /// Returns false when the app should exit.
    fn on_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Quit => return false,
            Command::Nothing => {}
            Command::Engine(intent) => self.dispatch(intent),
            Command::CursorUp => self.cursor = self.cursor.saturating_sub(1),
            Command::CursorDown => {
                if self.cursor + 1 < self.list_len() {
                    self.cursor += 1;
                }
            }
            Command::Choose => match self.machine.state() {
                State::ParagraphSelect => self.dispatch(Intent::ChooseParagraph(self.cursor)),
                State::UserSelect => {
                    let chosen = self
                        .machine
                        .store()
                        .usernames()
                        .get(self.cursor)
                        .map(|u| u.to_string());
                    if let Some(name) = chosen {
                        self.dispatch(Intent::ChooseUser(name));
                    }
                }
                _ => {}
            },
        }
        true
    }

    /// Only the selections carry over; command-line overrides stay one-off.
    fn remembered(&self, mut cfg: Config) -> Config {
        cfg.last_user = self.machine.current_user().map(str::to_string);
        cfg.last_paragraph = self.machine.selected_paragraph();
        cfg
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let _log_guard = init_logging(&cli.log_level);
    let config_store = FileConfigStore::new();
    let cfg = cli.merge_into(config_store.load());
    info!(?cfg, "starting");

    let mut app = App::new(&cfg);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, cfg.tick_rate_ms);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = config_store.save(&app.remembered(config_store.load())) {
        warn!(error = %e, "could not save config");
    }
    result
}

fn draw<B: Backend>(terminal: &mut Terminal<B>, app: &App) -> io::Result<()> {
    terminal.draw(|f| {
        let view = View {
            snapshot: app.machine.snapshot(),
            cursor: app.cursor,
            status: app.status.as_deref(),
        };
        f.render_widget(&view, f.area());
    })?;
    Ok(())
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    tick_rate_ms: u64,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::from_millis(tick_rate_ms),
    );

    draw(terminal, app)?;
    loop {
        match runner.step() {
            EngineEvent::Tick => {
                app.dispatch(Intent::Tick);
                if matches!(app.machine.state(), State::Countdown | State::Typing) {
                    draw(terminal, app)?;
                }
            }
            EngineEvent::Resize => draw(terminal, app)?,
            EngineEvent::Key(key) => {
                if !app.on_command(map_key(app.machine.state(), key)) {
                    break;
                }
                draw(terminal, app)?;
            }
        }
    }

    Ok(())
}
