use runw::actions;
use runw::app::{self, AppConfig, AppState, MenuState};
use runw::backend::executor::CommandBackend;
use runw::backend::poller::{self, Poller};
use runw::cli::Cli;
use runw::dialog::{ActionReport, ActionSession, OutcomeStatus, PendingOperation};
use runw::events::{AppEvent, EventHandler};
use runw::input::{self, Action, InputContext, OverlayMode};
use runw::notify;
use runw::traits::RunBackend;
use runw::tui;

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen, SetTitle};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::Terminal;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

fn setup_verbose_logging() -> Result<()> {
    let state_dir = dirs_next_or_fallback();
    std::fs::create_dir_all(&state_dir)
        .map_err(|e| eyre!("Failed to create log directory {state_dir:?}: {e}"))?;
    let log_path = state_dir.join("debug.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| eyre!("Failed to open log file {log_path:?}: {e}"))?;
    tracing_subscriber::fmt()
        .with_writer(file)
        .with_ansi(false)
        .init();
    tracing::info!(
        "runw v{} starting with verbose logging",
        env!("CARGO_PKG_VERSION")
    );
    Ok(())
}

fn dirs_next_or_fallback() -> std::path::PathBuf {
    if let Some(state) = std::env::var_os("XDG_STATE_HOME") {
        std::path::PathBuf::from(state).join("runw")
    } else if let Some(home) = std::env::var_os("HOME") {
        std::path::PathBuf::from(home)
            .join(".local")
            .join("state")
            .join("runw")
    } else {
        std::path::PathBuf::from("/tmp/runw")
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(s) => *s,
        Err(payload) => match payload.downcast::<&str>() {
            Ok(s) => (*s).to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    }
}

/// Spawn `fut` and report a panic in it as an error toast instead of losing it.
fn spawn_monitored(
    tx: mpsc::UnboundedSender<AppEvent>,
    label: &'static str,
    fut: impl Future<Output = ()> + Send + 'static,
) {
    tokio::spawn(async move {
        let handle = tokio::spawn(fut);
        if let Err(join_err) = handle.await {
            let msg = if join_err.is_panic() {
                panic_message(join_err.into_panic())
            } else {
                "task cancelled".to_string()
            };
            tracing::error!("{label} panicked: {msg}");
            if tx
                .send(AppEvent::Error(format!("{label} crashed: {msg}")))
                .is_err()
            {
                tracing::warn!("{label}: channel closed while reporting panic");
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    if args.verbose {
        setup_verbose_logging()?;
    }

    let backend: Arc<dyn RunBackend> = Arc::new(CommandBackend::new(args.program.clone()));
    if let Err(e) = backend.check_available().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        if let Err(e) = terminal::disable_raw_mode() {
            eprintln!("Failed to disable raw mode during panic: {e}");
        }
        if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen, SetTitle("")) {
            eprintln!("Failed to leave alternate screen during panic: {e}");
        }
        original_hook(panic_info);
    }));

    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, SetTitle("runw"))?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    terminal.clear()?;

    let version_string = format!(
        "runw v{}+{}",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_NUMBER")
    );
    let mut state = AppState::new(AppConfig {
        backend: args.program.clone(),
        job_filter: args.job.clone(),
        limit: args.limit,
        version_string,
    });
    state.poll_interval = args.interval;
    state.desktop_notify = !args.no_notify;

    let events = EventHandler::new(Duration::from_millis(100));
    let tx = events.sender();

    // Adaptive polling interval channel
    let (interval_tx, interval_rx) = watch::channel(args.interval);

    let poller = Poller::new(
        backend.clone(),
        args.limit,
        args.job.clone(),
        tx.clone(),
        interval_rx,
    );
    let poller_handle = tokio::spawn(poller.run());

    let result = run_app(
        &mut terminal,
        &mut state,
        events,
        &tx,
        &interval_tx,
        &poller_handle,
        &backend,
    )
    .await;

    poller_handle.abort();
    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, SetTitle(""))?;
    terminal.show_cursor()?;

    result
}

fn input_context(state: &AppState) -> InputContext {
    let overlay = match (state.dialogs.session(), &state.menu) {
        (ActionSession::Config(_), _) => OverlayMode::Config,
        (ActionSession::None, MenuState::Run(_)) => OverlayMode::RunMenu,
        (ActionSession::None, MenuState::Bulk) => OverlayMode::BulkMenu,
        (ActionSession::None, MenuState::Closed) => OverlayMode::None,
        _ => OverlayMode::Dialog,
    };
    InputContext {
        has_error: state.error.is_some(),
        is_loading: state.is_loading(),
        has_selection: !state.selection.is_empty(),
        overlay,
    }
}

/// Lines the config view can scroll before its last line reaches the bottom.
fn config_scroll_max(terminal: &Terminal<CrosstermBackend<io::Stdout>>, state: &AppState) -> usize {
    let total = state.viewed_config_text().map_or(0, |t| t.lines().count());
    let visible = terminal
        .size()
        .map(|s| tui::config_overlay::visible_height(Rect::new(0, 0, s.width, s.height)))
        .unwrap_or_else(|e| {
            tracing::warn!("terminal size query failed: {e}");
            20
        });
    total.saturating_sub(visible)
}

fn spawn_refresh(
    state: &mut AppState,
    backend: &Arc<dyn RunBackend>,
    tx: &mpsc::UnboundedSender<AppEvent>,
) {
    state.begin_loading();
    let backend = backend.clone();
    let tx2 = tx.clone();
    let limit = state.config.limit;
    let job = state.config.job_filter.clone();
    spawn_monitored(tx.clone(), "refresh", async move {
        poller::refresh(&*backend, limit, job.as_deref(), &tx2, true).await;
    });
}

fn spawn_config_fetch(
    backend: &Arc<dyn RunBackend>,
    tx: &mpsc::UnboundedSender<AppEvent>,
    run_id: app::RunId,
) {
    let backend = backend.clone();
    let tx2 = tx.clone();
    spawn_monitored(tx.clone(), "config_fetch", async move {
        poller::fetch_run_config(&*backend, run_id, &tx2).await;
    });
}

fn dispatch(
    op: PendingOperation,
    backend: &Arc<dyn RunBackend>,
    tx: &mpsc::UnboundedSender<AppEvent>,
) {
    let backend = backend.clone();
    let tx2 = tx.clone();
    spawn_monitored(tx.clone(), "action", async move {
        let report = actions::execute(&*backend, &op.request).await;
        if tx2
            .send(AppEvent::ActionResult {
                token: op.token,
                report,
            })
            .is_err()
        {
            tracing::warn!("action: channel closed");
        }
    });
}

fn notify_launched(state: &AppState, report: &ActionReport, tx: &mpsc::UnboundedSender<AppEvent>) {
    if !state.desktop_notify {
        return;
    }
    for outcome in &report.outcomes {
        let OutcomeStatus::Succeeded {
            new_run_id: Some(new_run),
        } = &outcome.status
        else {
            continue;
        };
        let parent = outcome.run_id.clone();
        let new_run = new_run.clone();
        let job = state
            .run(&parent)
            .map_or_else(|| "run".to_string(), |r| r.job_name.clone());
        let tx2 = tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                notify::send_launched(&job, &parent, &new_run)
            }));
            let message = match result {
                Ok(None) => return,
                Ok(Some(err)) => err,
                Err(payload) => {
                    let msg = panic_message(payload);
                    tracing::error!("notify panicked: {msg}");
                    format!("Notification crashed: {msg}")
                }
            };
            if tx2.send(AppEvent::Error(message)).is_err() {
                tracing::warn!("notify: channel closed");
            }
        });
    }
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState,
    mut events: EventHandler,
    tx: &mpsc::UnboundedSender<AppEvent>,
    interval_tx: &watch::Sender<u64>,
    poller_handle: &tokio::task::JoinHandle<()>,
    backend: &Arc<dyn RunBackend>,
) -> Result<()> {
    let mut last_tick = Instant::now();
    let mut poll_start = Instant::now();

    loop {
        terminal.draw(|f| tui::render::render(f, state))?;

        let elapsed = poll_start.elapsed().as_secs();
        state.next_poll_in = (*interval_tx.borrow()).saturating_sub(elapsed);

        state.prune_notifications();
        state.prune_error();

        let Some(event) = events.next().await else {
            return Ok(());
        };
        match event {
            AppEvent::Key(key) => match input::map_key(key, &input_context(state)) {
                Action::Quit => state.should_quit = true,
                Action::DismissError => state.clear_error(),
                Action::MoveUp => state.move_cursor_up(),
                Action::MoveDown => state.move_cursor_down(),
                Action::ToggleSelect => state.toggle_current_selection(),
                Action::SelectAll => state.select_all(),
                Action::ClearSelection => state.clear_selection(),
                Action::OpenRunMenu => {
                    if let Some(run_id) = state.open_run_menu() {
                        spawn_config_fetch(backend, tx, run_id);
                    }
                }
                Action::OpenBulkMenu => {
                    state.open_bulk_menu();
                }
                Action::Refresh => {
                    spawn_refresh(state, backend, tx);
                    poll_start = Instant::now();
                }
                Action::Activate(kind) => {
                    if !state.activate(kind) {
                        tracing::debug!(?kind, "menu item disabled");
                    }
                }
                Action::CloseMenu => state.close_menu(),
                Action::Confirm => {
                    if let Some(op) = state.dialogs.confirm() {
                        dispatch(op, backend, tx);
                    }
                }
                Action::ToggleForce => {
                    state.dialogs.toggle_force();
                }
                Action::CloseDialog => state.dialogs.close(),
                Action::ScrollUp => state.dialogs.scroll_config(-1, usize::MAX),
                Action::ScrollDown => {
                    let max = config_scroll_max(terminal, state);
                    state.dialogs.scroll_config(1, max);
                }
                Action::PageUp => state.dialogs.scroll_config(-20, usize::MAX),
                Action::PageDown => {
                    let max = config_scroll_max(terminal, state);
                    state.dialogs.scroll_config(20, max);
                }
                Action::ScrollToTop => state.dialogs.scroll_config_to(0),
                Action::ScrollToBottom => {
                    let max = config_scroll_max(terminal, state);
                    state.dialogs.scroll_config_to(max);
                }
                Action::CopyToClipboard => {
                    if let Some(text) = state.viewed_config_text().map(str::to_string) {
                        let backend2 = backend.clone();
                        let tx2 = tx.clone();
                        spawn_monitored(tx.clone(), "clipboard", async move {
                            let result = backend2
                                .copy_to_clipboard(&text)
                                .await
                                .map_err(|e| format!("{e}"));
                            if tx2.send(AppEvent::ClipboardResult(result)).is_err() {
                                tracing::warn!("clipboard: channel closed");
                            }
                        });
                    }
                }
                Action::None => {}
            },
            AppEvent::Tick => {
                if last_tick.elapsed() >= Duration::from_millis(100) {
                    state.advance_spinner();
                    last_tick = Instant::now();
                }
                if poller_handle.is_finished() {
                    state.set_error(
                        "Poller stopped unexpectedly. Press r to refresh manually.".to_string(),
                    );
                }
                // Adaptive polling: notify the poller only on change
                let current = *interval_tx.borrow();
                let new_interval = state.desired_poll_interval();
                if new_interval != current {
                    tracing::debug!(from = current, to = new_interval, "poll interval changed");
                    if interval_tx.send(new_interval).is_err() {
                        tracing::warn!("interval: poller channel closed");
                    }
                }
            }
            AppEvent::PollResult {
                runs,
                workspace,
                manual,
            } => {
                if manual {
                    state.end_loading();
                }
                state.clear_error();
                if let Some(workspace) = workspace {
                    state.update_workspace(workspace);
                }
                state.update_runs(runs);
                state.last_poll = Some(Instant::now());
                poll_start = Instant::now();
            }
            AppEvent::PollFailed { message, manual } => {
                if manual {
                    state.end_loading();
                }
                state.set_error(message);
            }
            AppEvent::ConfigResult { run_id, result } => {
                state.finish_config_fetch(run_id, result);
            }
            AppEvent::ActionResult { token, report } => {
                notify_launched(state, &report, tx);
                let completion = state.dialogs.resolve(token, report);
                if state.apply_completion(&completion) {
                    spawn_refresh(state, backend, tx);
                    poll_start = Instant::now();
                }
            }
            AppEvent::ClipboardResult(result) => match result {
                Ok(()) => state.add_notification("Copied to clipboard".to_string()),
                Err(e) => state.set_error(e),
            },
            AppEvent::Error(e) => state.set_error(e),
        }

        if state.should_quit {
            events.stop();
            return Ok(());
        }
    }
}
