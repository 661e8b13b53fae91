//! Terminal client for the Lumino HTTP surface.
//!
//! [`run`] takes over the terminal, talks to the server over HTTP and renders
//! replies as markdown. Local commands (`/model`, `/paste`, `/reset`, ...) are
//! handled here before anything reaches the network; every other line is sent
//! to `POST /chat`, including `/read` directives which the server expands.

mod app;
mod client;
mod event;
mod markdown;
mod ui;

pub use client::LuminoClient;
pub use event::{AppEvent, ModelsView};

use anyhow::anyhow;
use app::App;
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    Event as CrosstermEvent, KeyCode, KeyEvent, KeyModifiers, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use log::{debug, info};
use lumino_rs_core::directives;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Commands handled locally by the TUI.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Quit,
    Help,
    Paste,
    Reset,
    Models,
    ModelPicker,
    Model(String),
}

/// Server requests issued from the event loop.
enum Request {
    Chat(String),
    Models(ModelsView),
    SetModel(String),
    Reset,
}

/// Configuration for a TUI session.
#[derive(Debug, Clone)]
pub struct TuiConfig {
    /// Base URL of the Lumino server.
    pub server_url: String,
    /// Project directory shown in the header.
    pub project_dir: PathBuf,
    /// Request streamed replies.
    pub stream: bool,
    /// Tokens received between redraws of a streamed reply.
    pub render_batch: usize,
}

/// Launch the TUI against a running server.
///
/// The caller initializes logging and starts the server before calling `run`.
///
/// # Errors
/// Returns an error if terminal setup or the event loop fails. Request
/// failures are shown inline and never end the session.
pub async fn run(config: TuiConfig) -> anyhow::Result<()> {
    let client = Arc::new(LuminoClient::new(config.server_url.clone()));
    let mut app = App::new(
        client.base_url().to_string(),
        config.project_dir.display().to_string(),
        config.stream,
        config.render_batch,
    );

    let mut terminal = setup_terminal()?;
    let (tx, mut rx) = mpsc::channel(256);
    spawn_input_handler(tx.clone());
    spawn_tick(tx.clone());

    dispatch(&client, &mut app, &tx, Request::Models(ModelsView::Quiet));

    let result = loop {
        if let Err(err) = terminal.draw(|frame| ui::draw(frame, &mut app)) {
            break Err(err.into());
        }
        let Some(event) = rx.recv().await else {
            break Err(anyhow!("event channel closed unexpectedly"));
        };
        match handle_app_event(event, &client, &mut app, &tx) {
            Ok(true) => break Ok(()),
            Ok(false) => {}
            Err(err) => break Err(err),
        }
    };

    restore_terminal(&mut terminal)?;
    result
}

/// Dispatch a UI event and return true when the app should exit.
fn handle_app_event(
    event: AppEvent,
    client: &Arc<LuminoClient>,
    app: &mut App,
    sender: &mpsc::Sender<AppEvent>,
) -> anyhow::Result<bool> {
    match event {
        AppEvent::Input(key) => return handle_input(key, client, app, sender),
        AppEvent::Paste(text) => {
            if !app.picker_open {
                app.input.push_str(&text.replace("\r\n", "\n").replace('\r', "\n"));
                app.show_slash_commands = false;
            }
        }
        AppEvent::Tick => app.refresh_cpu(),
        AppEvent::Scroll(delta) => {
            if delta < 0 {
                app.scroll_up(delta.unsigned_abs());
            } else if delta > 0 {
                app.scroll_down(delta as u16);
            }
        }
        AppEvent::Token(delta) => app.push_token(&delta),
        AppEvent::Usage(usage) => app.record_usage(usage),
        AppEvent::StreamDone => app.finish_reply(None, None, None),
        AppEvent::Reply(reply) => {
            app.finish_reply(Some(reply.response), reply.usage, Some(reply.files_read))
        }
        AppEvent::Models { list, view } => {
            app.set_models(list);
            match view {
                ModelsView::Quiet => {}
                ModelsView::Listing => app.push_models_listing(),
                ModelsView::Picker => app.open_picker(),
            }
        }
        AppEvent::Status(reply) => app.apply_status(reply),
        AppEvent::RequestFailed(message) => app.fail_request(message),
    }
    Ok(false)
}

/// Handle keyboard input and dispatch actions.
fn handle_input(
    key: KeyEvent,
    client: &Arc<LuminoClient>,
    app: &mut App,
    sender: &mpsc::Sender<AppEvent>,
) -> anyhow::Result<bool> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Ok(true);
    }
    if app.picker_open {
        handle_picker_input(key, client, app, sender);
        return Ok(false);
    }
    if app.paste_mode {
        handle_paste_input(key, client, app, sender);
        return Ok(false);
    }
    if key.code == KeyCode::Esc {
        if app.show_slash_commands {
            app.show_slash_commands = false;
            app.input.clear();
            return Ok(false);
        }
        return Ok(true);
    }
    handle_default_input(key, client, app, sender)
}

/// Keyboard input while the model picker is open.
fn handle_picker_input(
    key: KeyEvent,
    client: &Arc<LuminoClient>,
    app: &mut App,
    sender: &mpsc::Sender<AppEvent>,
) {
    match key.code {
        KeyCode::Esc => app.close_picker(),
        KeyCode::Up => app.select_previous_model(),
        KeyCode::Down => app.select_next_model(),
        KeyCode::Enter => {
            let selected = app.selected_model_id().map(str::to_string);
            app.close_picker();
            match selected {
                Some(model) => dispatch(client, app, sender, Request::SetModel(model)),
                None => app.push_status("no models available"),
            }
        }
        _ => {}
    }
}

/// Keyboard input in paste mode: Enter inserts a newline, Ctrl+S sends.
fn handle_paste_input(
    key: KeyEvent,
    client: &Arc<LuminoClient>,
    app: &mut App,
    sender: &mpsc::Sender<AppEvent>,
) {
    match key.code {
        KeyCode::Esc => {
            app.paste_mode = false;
            app.input.clear();
            app.push_status("paste cancelled");
        }
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            if app.input.trim().is_empty() {
                return;
            }
            if app.in_flight {
                app.push_status("waiting for the current reply");
                return;
            }
            app.paste_mode = false;
            let message = std::mem::take(&mut app.input);
            dispatch(client, app, sender, Request::Chat(message));
        }
        KeyCode::Enter => app.input.push('\n'),
        KeyCode::Backspace => {
            app.input.pop();
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.input.push(ch);
        }
        _ => {}
    }
}

/// Keyboard input in the default state.
fn handle_default_input(
    key: KeyEvent,
    client: &Arc<LuminoClient>,
    app: &mut App,
    sender: &mpsc::Sender<AppEvent>,
) -> anyhow::Result<bool> {
    match key.code {
        KeyCode::PageUp => app.scroll_up(5),
        KeyCode::PageDown => app.scroll_down(5),
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::Home => app.scroll_to_top(),
        KeyCode::End => app.enable_auto_scroll(),
        KeyCode::Enter => {
            app.show_slash_commands = false;
            if app.input.trim().is_empty() {
                return Ok(false);
            }
            return submit(client, app, sender);
        }
        KeyCode::Backspace => {
            app.input.pop();
            app.show_slash_commands = app.input.trim_start().starts_with('/');
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.input.push(ch);
            app.show_slash_commands = app.input.trim_start().starts_with('/');
        }
        _ => {}
    }
    Ok(false)
}

/// Act on the input line: run a local command or send it as a chat message.
fn submit(
    client: &Arc<LuminoClient>,
    app: &mut App,
    sender: &mpsc::Sender<AppEvent>,
) -> anyhow::Result<bool> {
    let command = parse_command(&app.input);
    let request = match command {
        Some(Command::Quit) => return Ok(true),
        Some(Command::Help) => {
            app.input.clear();
            app.push_help();
            return Ok(false);
        }
        Some(Command::Paste) => {
            app.input.clear();
            app.paste_mode = true;
            app.push_status("paste mode");
            return Ok(false);
        }
        Some(Command::Reset) => Request::Reset,
        Some(Command::Models) => Request::Models(ModelsView::Listing),
        Some(Command::ModelPicker) => Request::Models(ModelsView::Picker),
        Some(Command::Model(id)) => Request::SetModel(id),
        None => Request::Chat(app.input.clone()),
    };
    if app.in_flight {
        app.push_status("waiting for the current reply");
        return Ok(false);
    }
    app.input.clear();
    dispatch(client, app, sender, request);
    Ok(false)
}

/// Parse a local command. Anything else, `/read` included, goes to the server.
fn parse_command(input: &str) -> Option<Command> {
    let trimmed = input.trim();
    let lowered = trimmed.to_lowercase();
    if lowered == "exit" || lowered == "quit" {
        return Some(Command::Quit);
    }
    let mut parts = trimmed.strip_prefix('/')?.split_whitespace();
    let command = parts.next()?.to_lowercase();
    match command.as_str() {
        "help" => Some(Command::Help),
        "paste" => Some(Command::Paste),
        "reset" => Some(Command::Reset),
        "models" => Some(Command::Models),
        "model" => match parts.next() {
            None => Some(Command::ModelPicker),
            Some(id) => Some(Command::Model(id.to_string())),
        },
        _ => None,
    }
}

/// Update local state for `request` and run it in the background.
fn dispatch(
    client: &Arc<LuminoClient>,
    app: &mut App,
    sender: &mpsc::Sender<AppEvent>,
    request: Request,
) {
    match &request {
        Request::Chat(message) => app.begin_reply(message.clone(), directives(message)),
        Request::Models(_) => app.begin_request("loading models"),
        Request::SetModel(model) => app.begin_request(format!("loading {model}")),
        Request::Reset => app.begin_request("resetting"),
    }
    spawn_request(client.clone(), request, app, sender.clone());
}

/// Spawn a task that performs `request` and reports back through `sender`.
fn spawn_request(
    client: Arc<LuminoClient>,
    request: Request,
    app: &App,
    sender: mpsc::Sender<AppEvent>,
) {
    let stream = app.stream;
    tokio::spawn(async move {
        let outcome = match request {
            Request::Chat(message) if stream => client
                .chat_stream(&message, &sender)
                .await
                .map(|()| AppEvent::StreamDone),
            Request::Chat(message) => client.chat(&message).await.map(AppEvent::Reply),
            Request::Models(view) => client
                .list_models()
                .await
                .map(|list| AppEvent::Models { list, view }),
            Request::SetModel(model) => client.set_model(&model).await.map(AppEvent::Status),
            Request::Reset => client.reset().await.map(AppEvent::Status),
        };
        let event = outcome.unwrap_or_else(|err| {
            info!("request failed (err={err:#})");
            AppEvent::RequestFailed(format!("{err:#}"))
        });
        let _ = sender.send(event).await;
    });
}

/// Spawn a task to poll for terminal input events.
fn spawn_input_handler(sender: mpsc::Sender<AppEvent>) {
    tokio::spawn(async move {
        const MOUSE_SCROLL_LINES: i16 = 3;
        loop {
            if matches!(crossterm::event::poll(Duration::from_millis(30)), Ok(true)) {
                while matches!(crossterm::event::poll(Duration::from_millis(0)), Ok(true)) {
                    let event = match crossterm::event::read() {
                        Ok(event) => event,
                        Err(_) => break,
                    };
                    let app_event = match event {
                        CrosstermEvent::Key(key) => AppEvent::Input(key),
                        CrosstermEvent::Paste(text) => AppEvent::Paste(text),
                        CrosstermEvent::Mouse(mouse) => match mouse.kind {
                            MouseEventKind::ScrollUp => AppEvent::Scroll(-MOUSE_SCROLL_LINES),
                            MouseEventKind::ScrollDown => AppEvent::Scroll(MOUSE_SCROLL_LINES),
                            _ => continue,
                        },
                        _ => continue,
                    };
                    if sender.send(app_event).await.is_err() {
                        return;
                    }
                }
            }
        }
    });
}

/// Spawn a periodic tick event generator.
fn spawn_tick(sender: mpsc::Sender<AppEvent>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(250));
        loop {
            interval.tick().await;
            if sender.send(AppEvent::Tick).await.is_err() {
                return;
            }
        }
    });
}

/// Configure terminal in raw mode with alternate screen.
fn setup_terminal() -> anyhow::Result<Terminal<CrosstermBackend<Stdout>>> {
    debug!("setting up terminal");
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste
    )?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal state on exit.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    debug!("restoring terminal");
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn local_commands_are_recognized() {
        assert_eq!(parse_command("exit"), Some(Command::Quit));
        assert_eq!(parse_command("  QUIT "), Some(Command::Quit));
        assert_eq!(parse_command("/help"), Some(Command::Help));
        assert_eq!(parse_command("/paste"), Some(Command::Paste));
        assert_eq!(parse_command("/reset"), Some(Command::Reset));
        assert_eq!(parse_command("/models"), Some(Command::Models));
        assert_eq!(parse_command("/model"), Some(Command::ModelPicker));
        assert_eq!(
            parse_command("/model phi-2.gguf"),
            Some(Command::Model("phi-2.gguf".to_string()))
        );
    }

    #[test]
    fn everything_else_goes_to_the_server() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("/read src/main.rs explain"), None);
        assert_eq!(parse_command("exit the loop early?"), None);
        assert_eq!(parse_command("/"), None);
    }
}
