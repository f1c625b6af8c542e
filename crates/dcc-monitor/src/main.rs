mod app;
mod report;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::{App, ViewSignal};
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dcc_core::{
    config::{INITIAL_DELAY_MS_ENV, POLL_MS_ENV, STATE_DIR_ENV, STRICT_MAGIC_ENV},
    MonitorConfig, MonitorLifecycle, SchedulerState, Snapshot, SnapshotPublisher,
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    fs::OpenOptions,
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const LOG_FILE_ENV: &str = "DCC_MONITOR_LOG_FILE";

#[derive(Parser, Debug)]
#[command(name = "dcc-monitor")]
#[command(about = "Live table of in-flight distcc compile jobs", long_about = None)]
struct Args {
    /// State directory to watch (defaults to $DISTCC_DIR/state or ~/.distcc/state)
    #[arg(long)]
    state_dir: Option<PathBuf>,
    /// Polling interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Delay before the first poll in milliseconds
    #[arg(long)]
    initial_delay_ms: Option<u64>,
    /// Only accept records carrying the distcc state magic
    #[arg(long, default_value_t = false)]
    strict_magic: bool,
    /// Poll once, print the table and exit
    #[arg(long, default_value_t = false)]
    once: bool,
    /// With --once, print the snapshot as JSON
    #[arg(long, default_value_t = false, requires = "once")]
    json: bool,
}

impl Args {
    fn override_for(&self, key: &str) -> Option<String> {
        match key {
            STATE_DIR_ENV => self
                .state_dir
                .as_ref()
                .map(|dir| dir.to_string_lossy().to_string()),
            POLL_MS_ENV => self.interval_ms.map(|ms| ms.to_string()),
            INITIAL_DELAY_MS_ENV => self.initial_delay_ms.map(|ms| ms.to_string()),
            STRICT_MAGIC_ENV if self.strict_magic => Some("1".to_string()),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.once)?;
    let config = MonitorConfig::from_env_with(|key| args.override_for(key))
        .context("resolve monitor configuration")?;

    if args.once {
        let stdout = io::stdout();
        return report::run_once(&config, args.json, &mut stdout.lock());
    }

    run_interactive(config).await
}

async fn run_interactive(config: MonitorConfig) -> Result<()> {
    let (snapshot_tx, mut snapshot_rx) = mpsc::unbounded_channel::<Arc<Snapshot>>();
    let publisher: Arc<dyn SnapshotPublisher> = Arc::new(move |snapshot: Arc<Snapshot>| {
        let _ = snapshot_tx.send(snapshot);
    });
    let mut lifecycle = MonitorLifecycle::new(config.clone(), publisher);
    let mut app = App::new(config.state_dir.clone());
    app.apply_activation(lifecycle.activate()?);

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app, &mut lifecycle, &mut snapshot_rx).await;
    lifecycle.deactivate();
    restore_terminal(&mut terminal)?;
    info!(event = "dcc_monitor_exit", ok = result.is_ok());
    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    lifecycle: &mut MonitorLifecycle,
    snapshot_rx: &mut mpsc::UnboundedReceiver<Arc<Snapshot>>,
) -> Result<()> {
    let mut events = EventStream::new();

    loop {
        terminal.draw(|frame| ui::render(frame, app))?;

        tokio::select! {
            Some(snapshot) = snapshot_rx.recv() => {
                app.apply_snapshot(snapshot);
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key)))
                        if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) =>
                    {
                        if let Some(ViewSignal::TogglePause) = app.handle_key(key) {
                            if lifecycle.state() == SchedulerState::Running {
                                lifecycle.deactivate();
                                app.mark_paused();
                            } else {
                                app.apply_activation(lifecycle.activate()?);
                            }
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err.into()),
                    None => break,
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn init_logging(headless: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_file = std::env::var_os(LOG_FILE_ENV).filter(|value| !value.is_empty());

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open log file {}", PathBuf::from(&path).display()))?;
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init();
    } else if headless {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init();
    } else {
        // Anything written to the terminal would tear the alternate screen.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn flags_override_environment_keys() {
        let args = Args::parse_from([
            "dcc-monitor",
            "--state-dir",
            "/tmp/dcc-state",
            "--interval-ms",
            "250",
            "--strict-magic",
        ]);
        assert_eq!(
            args.override_for(STATE_DIR_ENV).as_deref(),
            Some("/tmp/dcc-state")
        );
        assert_eq!(args.override_for(POLL_MS_ENV).as_deref(), Some("250"));
        assert_eq!(args.override_for(INITIAL_DELAY_MS_ENV), None);
        assert_eq!(args.override_for(STRICT_MAGIC_ENV).as_deref(), Some("1"));

        let config = MonitorConfig::from_lookup(|key| args.override_for(key), None)
            .expect("config");
        assert_eq!(config.state_dir, PathBuf::from("/tmp/dcc-state"));
        assert_eq!(config.timing.interval, Duration::from_millis(250));
        assert_eq!(config.magic_policy, dcc_core::MagicPolicy::Strict);
    }

    #[test]
    fn json_requires_once() {
        assert!(Args::try_parse_from(["dcc-monitor", "--json"]).is_err());
        let args = Args::try_parse_from(["dcc-monitor", "--once", "--json"]).expect("args");
        assert!(args.once && args.json);
    }
}
