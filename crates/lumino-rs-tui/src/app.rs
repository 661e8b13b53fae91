//! Application state for the Lumino TUI.

use crate::markdown;
use log::{debug, info};
use lumino_rs_protocol::{ModelList, Status, StatusReply, Usage};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use std::cmp::min;
use std::time::{Duration, Instant};
use sysinfo::System;

const HELP: &str = "\
/model          pick a model from the list
/model <id>     switch to a model directly
/models         list available models
/paste          multi-line input (Enter = newline, Ctrl+S = send, Esc = cancel)
/reset          clear the conversation
/help           show this help
exit, quit      leave (also Ctrl+C)
/read <path>    inline a project file into your message";

/// Chat roles displayed in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
    System,
    Error,
}

/// Single chat entry rendered in the transcript.
#[derive(Debug, Clone)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub content: String,
    /// Token stats and referenced files shown under an assistant reply.
    pub footer: Option<String>,
}

/// Assistant reply currently being streamed.
#[derive(Debug)]
pub struct LiveReply {
    /// Everything received so far.
    pub text: String,
    /// Text as of the last flush; this is what gets drawn.
    pub shown: String,
    pending: usize,
    usage: Option<Usage>,
    files: Vec<String>,
    started: Instant,
}

/// Top-level application state for the TUI.
pub struct App {
    /// Label of the active model shown in the header.
    pub model: String,
    /// Model ids reported by the server.
    pub models: Vec<String>,
    /// Index of the highlighted entry in the model picker.
    pub selected_model: usize,
    pub picker_open: bool,
    pub project_dir: String,
    pub server_url: String,
    pub stream: bool,
    /// Tokens received between redraws of a streamed reply.
    pub render_batch: usize,
    pub messages: Vec<ChatEntry>,
    pub input: String,
    /// Enter inserts a newline instead of sending.
    pub paste_mode: bool,
    pub show_slash_commands: bool,
    pub status: String,
    pub live: Option<LiveReply>,
    /// A request is outstanding; new ones are refused until it settles.
    pub in_flight: bool,
    pub scroll: u16,
    pub auto_scroll: bool,
    pub chat_max_scroll: u16,
    /// Current CPU usage percentage (0.0 to 100.0).
    pub cpu_usage: f32,
    sys: System,
}

impl App {
    pub fn new(server_url: String, project_dir: String, stream: bool, render_batch: usize) -> Self {
        Self {
            model: "none".to_string(),
            models: Vec::new(),
            selected_model: 0,
            picker_open: false,
            project_dir,
            server_url,
            stream,
            render_batch: render_batch.max(1),
            messages: Vec::new(),
            input: String::new(),
            paste_mode: false,
            show_slash_commands: false,
            status: "idle".to_string(),
            live: None,
            in_flight: false,
            scroll: 0,
            auto_scroll: true,
            chat_max_scroll: 0,
            cpu_usage: 0.0,
            sys: System::new(),
        }
    }

    /// Refresh CPU usage reading.
    pub fn refresh_cpu(&mut self) {
        self.sys.refresh_cpu_usage();
        let loads: Vec<f32> = self.sys.cpus().iter().map(|c| c.cpu_usage()).collect();
        if let Some(average) = average_load(&loads) {
            self.cpu_usage = average;
        }
    }

    /// Set the status line.
    pub fn push_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// Mark a non-chat request as outstanding.
    pub fn begin_request(&mut self, status: impl Into<String>) {
        self.in_flight = true;
        self.status = status.into();
    }

    fn settle(&mut self) {
        self.in_flight = false;
        self.status = "idle".to_string();
    }

    /// Record the outgoing message and open a live reply.
    pub fn begin_reply(&mut self, message: String, files: Vec<String>) {
        info!(
            "reply started (len={}, files={}, stream={})",
            message.len(),
            files.len(),
            self.stream
        );
        self.push_entry(ChatRole::User, message);
        self.auto_scroll = true;
        self.live = Some(LiveReply {
            text: String::new(),
            shown: String::new(),
            pending: 0,
            usage: None,
            files,
            started: Instant::now(),
        });
        self.begin_request("thinking");
    }

    /// Append a streamed delta, flushing the drawn text every `render_batch` tokens.
    pub fn push_token(&mut self, delta: &str) {
        let batch = self.render_batch;
        let Some(live) = self.live.as_mut() else {
            return;
        };
        live.text.push_str(delta);
        live.pending += 1;
        if live.pending >= batch {
            live.shown.clone_from(&live.text);
            live.pending = 0;
        }
        self.status = "streaming".to_string();
        self.maybe_enable_auto_scroll();
    }

    pub fn record_usage(&mut self, usage: Usage) {
        if let Some(live) = self.live.as_mut() {
            live.usage = Some(usage);
        }
    }

    /// Close the live reply and keep it in the transcript.
    ///
    /// Blocking replies pass their content, usage and the server's file list;
    /// streamed replies pass `None` and use what was accumulated.
    pub fn finish_reply(
        &mut self,
        content: Option<String>,
        usage: Option<Usage>,
        files: Option<Vec<String>>,
    ) {
        let Some(live) = self.live.take() else {
            self.settle();
            return;
        };
        let elapsed = live.started.elapsed();
        let content = content.unwrap_or(live.text);
        let usage = usage.or(live.usage);
        let files = files.unwrap_or(live.files);
        debug!(
            "reply finished (len={}, elapsed_ms={})",
            content.len(),
            elapsed.as_millis()
        );
        self.messages.push(ChatEntry {
            role: ChatRole::Assistant,
            content,
            footer: reply_footer(usage, elapsed, &files),
        });
        self.maybe_enable_auto_scroll();
        self.settle();
    }

    /// Drop any partial reply and show the failure inline.
    pub fn fail_request(&mut self, message: String) {
        info!("request failed (err={message})");
        self.live = None;
        self.push_entry(ChatRole::Error, message);
        self.settle();
    }

    /// Store the server's model list and track its active model.
    pub fn set_models(&mut self, list: ModelList) {
        debug!("set models (count={})", list.models.len());
        self.models = list.models;
        if let Some(active) = list.active {
            self.model = active;
        }
        self.selected_model = self
            .models
            .iter()
            .position(|id| id == &self.model)
            .unwrap_or(0);
        self.settle();
    }

    /// Apply the outcome of a model switch or reset.
    pub fn apply_status(&mut self, reply: StatusReply) {
        match reply.status {
            Status::Success => {
                if let Some(model) = reply.model {
                    self.model = model;
                    if let Some(idx) = self.models.iter().position(|id| id == &self.model) {
                        self.selected_model = idx;
                    }
                }
                let message = reply.message.unwrap_or_else(|| "done".to_string());
                self.push_entry(ChatRole::System, message);
            }
            Status::Error => {
                let error = reply.error.unwrap_or_else(|| "request failed".to_string());
                self.push_entry(ChatRole::Error, error);
            }
        }
        self.settle();
    }

    pub fn push_models_listing(&mut self) {
        let listing = if self.models.is_empty() {
            "No models found in the models directory.".to_string()
        } else {
            self.models
                .iter()
                .map(|id| {
                    if id == &self.model {
                        format!("* {id} (active)")
                    } else {
                        format!("  {id}")
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        self.push_entry(ChatRole::System, listing);
    }

    pub fn push_help(&mut self) {
        self.push_entry(ChatRole::System, HELP.to_string());
    }

    /// Append a system message to the transcript.
    pub fn push_system_message(&mut self, content: impl Into<String>) {
        self.push_entry(ChatRole::System, content.into());
    }

    fn push_entry(&mut self, role: ChatRole, content: String) {
        self.messages.push(ChatEntry {
            role,
            content,
            footer: None,
        });
        self.maybe_enable_auto_scroll();
    }

    pub fn open_picker(&mut self) {
        self.picker_open = true;
    }

    pub fn close_picker(&mut self) {
        self.picker_open = false;
    }

    pub fn select_previous_model(&mut self) {
        self.selected_model = self.selected_model.saturating_sub(1);
    }

    pub fn select_next_model(&mut self) {
        if self.selected_model + 1 < self.models.len() {
            self.selected_model += 1;
        }
    }

    pub fn selected_model_id(&self) -> Option<&str> {
        self.models.get(self.selected_model).map(String::as_str)
    }

    /// Scroll the chat view upward by a number of lines.
    pub fn scroll_up(&mut self, lines: u16) {
        self.auto_scroll = false;
        self.scroll = self.scroll.saturating_sub(lines);
    }

    /// Scroll the chat view downward by a number of lines.
    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = min(self.scroll.saturating_add(lines), self.chat_max_scroll);
        if self.scroll >= self.chat_max_scroll {
            self.auto_scroll = true;
        }
    }

    pub fn scroll_to_top(&mut self) {
        self.auto_scroll = false;
        self.scroll = 0;
    }

    pub fn enable_auto_scroll(&mut self) {
        self.auto_scroll = true;
        self.scroll = self.chat_max_scroll;
    }

    /// Update scroll bounds after layout changes.
    ///
    /// Snaps to the new bottom only when auto-scroll is on or the view was
    /// already pinned to the bottom.
    pub fn update_scroll_bounds(&mut self, max_scroll: u16) {
        let was_at_bottom = self.scroll >= self.chat_max_scroll;
        self.chat_max_scroll = max_scroll;
        if self.auto_scroll || was_at_bottom {
            self.scroll = max_scroll;
            self.auto_scroll = true;
        } else {
            self.scroll = self.scroll.min(max_scroll);
        }
    }

    fn maybe_enable_auto_scroll(&mut self) {
        if self.auto_scroll {
            self.scroll = self.chat_max_scroll;
        }
    }

    /// Render the transcript and any live reply into styled lines.
    pub fn render_lines(&self) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        if self.messages.is_empty() && self.live.is_none() {
            lines.push(Line::from(Span::styled(
                " Ask anything. Use /read <path> to include a project file, /help for commands.",
                Style::default().fg(Color::Rgb(128, 128, 128)),
            )));
            return lines;
        }

        for (idx, entry) in self.messages.iter().enumerate() {
            if idx > 0 {
                lines.push(Line::from(""));
            }
            lines.push(badge(entry.role));
            if entry.role == ChatRole::Assistant {
                lines.extend(indent(markdown::render(&markdown::clean(&entry.content))));
            } else {
                let style = content_style(entry.role);
                for line in entry.content.lines() {
                    lines.push(Line::from(Span::styled(format!(" {line}"), style)));
                }
            }
            if let Some(footer) = &entry.footer {
                lines.push(Line::from(Span::styled(
                    format!(" {footer}"),
                    Style::default()
                        .fg(Color::Rgb(128, 128, 128))
                        .add_modifier(Modifier::ITALIC),
                )));
            }
        }

        if let Some(live) = &self.live {
            if !self.messages.is_empty() {
                lines.push(Line::from(""));
            }
            lines.push(badge(ChatRole::Assistant));
            if live.shown.is_empty() {
                lines.push(Line::from(Span::styled(
                    " ...",
                    Style::default().fg(Color::Rgb(128, 128, 128)),
                )));
            } else {
                lines.extend(indent(markdown::render(&markdown::clean(&live.shown))));
            }
        }

        // Trailing padding so the last line can always be scrolled into view.
        lines.push(Line::from(""));
        lines
    }
}

/// Mean of per-core loads, clamped to 0..=100.
fn average_load(loads: &[f32]) -> Option<f32> {
    if loads.is_empty() {
        return None;
    }
    let total: f32 = loads.iter().sum();
    Some((total / loads.len() as f32).clamp(0.0, 100.0))
}

/// Footer for a finished reply: token counts, throughput and referenced files.
pub fn reply_footer(usage: Option<Usage>, elapsed: Duration, files: &[String]) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(usage) = usage {
        parts.push(format!(
            "{} prompt + {} completion tokens, {:.1} tok/s",
            usage.prompt_tokens,
            usage.completion_tokens,
            tokens_per_second(usage.completion_tokens, elapsed)
        ));
    }
    if !files.is_empty() {
        parts.push(format!("Context: {}", files.join(", ")));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("  |  "))
    }
}

fn tokens_per_second(tokens: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 { 0.0 } else { tokens as f64 / secs }
}

fn badge(role: ChatRole) -> Line<'static> {
    let (label, bg) = match role {
        ChatRole::User => (" you ", Color::Rgb(120, 220, 140)),
        ChatRole::Assistant => (" lumino ", Color::Rgb(0, 215, 235)),
        ChatRole::System => (" system ", Color::Rgb(60, 60, 60)),
        ChatRole::Error => (" error ", Color::Rgb(255, 110, 110)),
    };
    Line::from(Span::styled(
        label,
        Style::default()
            .fg(Color::Rgb(10, 10, 10))
            .bg(bg)
            .add_modifier(Modifier::BOLD),
    ))
}

fn content_style(role: ChatRole) -> Style {
    match role {
        ChatRole::System => Style::default().fg(Color::Rgb(128, 128, 128)),
        ChatRole::Error => Style::default().fg(Color::Rgb(255, 110, 110)),
        ChatRole::User | ChatRole::Assistant => Style::default().fg(Color::Rgb(238, 238, 238)),
    }
}

fn indent(lines: Vec<Line<'static>>) -> impl Iterator<Item = Line<'static>> {
    lines.into_iter().map(|line| {
        let mut spans = vec![Span::raw(" ")];
        spans.extend(line.spans);
        Line::from(spans)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn app(batch: usize) -> App {
        App::new(
            "http://127.0.0.1:5000".to_string(),
            "/work".to_string(),
            true,
            batch,
        )
    }

    #[test]
    fn live_text_flushes_every_batch() {
        let mut app = app(3);
        app.begin_reply("hi".to_string(), Vec::new());
        app.push_token("a");
        app.push_token("b");
        assert_eq!(app.live.as_ref().map(|live| live.shown.as_str()), Some(""));
        app.push_token("c");
        assert_eq!(app.live.as_ref().map(|live| live.shown.as_str()), Some("abc"));
        app.push_token("d");
        let live = app.live.as_ref().expect("live");
        assert_eq!(live.shown, "abc");
        assert_eq!(live.text, "abcd");
    }

    #[test]
    fn finished_stream_keeps_full_text_and_footer() {
        let mut app = app(4);
        app.begin_reply("explain".to_string(), vec!["a.py".to_string()]);
        assert!(app.in_flight);
        for token in ["x", "y"] {
            app.push_token(token);
        }
        app.record_usage(Usage::new(5, 2));
        app.finish_reply(None, None, None);

        assert!(!app.in_flight);
        assert!(app.live.is_none());
        let reply = app.messages.last().expect("reply");
        assert_eq!(reply.role, ChatRole::Assistant);
        assert_eq!(reply.content, "xy");
        let footer = reply.footer.as_deref().expect("footer");
        assert!(footer.starts_with("5 prompt + 2 completion tokens, "));
        assert!(footer.ends_with("Context: a.py"));
    }

    #[test]
    fn failure_drops_partial_reply() {
        let mut app = app(1);
        app.begin_reply("hi".to_string(), Vec::new());
        app.push_token("par");
        app.fail_request("cannot connect".to_string());
        assert!(app.live.is_none());
        assert!(!app.in_flight);
        assert_eq!(app.messages.len(), 2);
        assert_eq!(app.messages[1].role, ChatRole::Error);
    }

    #[test]
    fn cpu_load_averages_cores() {
        assert_eq!(average_load(&[]), None);
        assert_eq!(average_load(&[20.0, 60.0]), Some(40.0));
        assert_eq!(average_load(&[130.0]), Some(100.0));
    }

    #[test]
    fn footer_reports_throughput() {
        let footer = reply_footer(
            Some(Usage::new(10, 20)),
            Duration::from_secs(4),
            &["src/lib.rs".to_string(), "Cargo.toml".to_string()],
        );
        assert_eq!(
            footer.as_deref(),
            Some("10 prompt + 20 completion tokens, 5.0 tok/s  |  Context: src/lib.rs, Cargo.toml")
        );
        assert_eq!(reply_footer(None, Duration::ZERO, &[]), None);
        assert_eq!(tokens_per_second(10, Duration::ZERO), 0.0);
    }

    #[test]
    fn status_replies_update_active_model() {
        let mut app = app(4);
        app.set_models(ModelList {
            models: vec!["a.gguf".to_string(), "b.gguf".to_string()],
            active: Some("a.gguf".to_string()),
        });
        assert_eq!(app.model, "a.gguf");

        app.begin_request("switching model");
        app.apply_status(StatusReply::success("Switched to b.gguf (General mode)").with_model("b.gguf"));
        assert_eq!(app.model, "b.gguf");
        assert_eq!(app.selected_model, 1);
        assert!(!app.in_flight);

        app.apply_status(StatusReply::failure("model not found: c.gguf").with_model("c.gguf"));
        assert_eq!(app.model, "b.gguf");
        assert_eq!(app.messages.last().map(|entry| entry.role), Some(ChatRole::Error));
    }
}
