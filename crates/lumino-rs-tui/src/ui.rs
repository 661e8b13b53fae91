//! Rendering routines for the Lumino TUI.

use crate::app::App;
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
};

const PRIMARY: Color = Color::Rgb(0, 215, 235);
const SECONDARY: Color = Color::Rgb(95, 175, 255);
const TEXT: Color = Color::Rgb(238, 238, 238);
const TEXT_MUTED: Color = Color::Rgb(128, 128, 128);
const BORDER: Color = Color::Rgb(60, 60, 60);
const GREEN: Color = Color::Rgb(120, 220, 140);
const YELLOW: Color = Color::Rgb(229, 192, 123);
const RED: Color = Color::Rgb(255, 110, 110);

const SLASH_PALETTE_HEIGHT: u16 = 12;
const HEADER_HEIGHT: u16 = 7; // 5 inner lines + 2 border lines
const MAX_INPUT_LINES: u16 = 8;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HERO_ART: [&str; 2] = [
    " █    █  █ █▀▄▀█ █ █▄ █ █▀▀█",
    " █▄▄▄ █▄▄█ █ ▀ █ █ █ ▀█ █▄▄█",
];

/// Draw the entire TUI frame.
pub fn draw(frame: &mut Frame<'_>, app: &mut App) {
    let area = frame.area();
    let input_height = input_height(app);

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Min(0),
            Constraint::Length(input_height),
            Constraint::Length(1),
        ])
        .split(area);

    draw_header(frame, app, root[0]);
    if app.picker_open {
        draw_model_picker(frame, app, root[1]);
    } else {
        draw_chat(frame, app, root[1]);
        if app.show_slash_commands {
            draw_slash_palette(frame, root[1]);
        }
    }
    draw_input(frame, app, root[2]);
    draw_status_bar(frame, app, root[3]);
}

fn input_height(app: &App) -> u16 {
    let lines = app.input.split('\n').count() as u16;
    lines.clamp(1, MAX_INPUT_LINES) + 2
}

/// Draw the banner and session details, CPU gauge on the right.
fn draw_header(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let cpu_widget_width: u16 = 22;
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(cpu_widget_width)])
        .split(area);

    let left_block = Block::default()
        .borders(Borders::TOP | Borders::LEFT | Borders::BOTTOM)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BORDER));

    let inner = left_block.inner(cols[0]);
    frame.render_widget(left_block, cols[0]);

    let label_style = Style::default().fg(TEXT_MUTED);
    let value_style = Style::default().fg(TEXT);
    let art_style = Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD);

    let mut lines: Vec<Line<'_>> = Vec::new();
    for (i, art_line) in HERO_ART.iter().enumerate() {
        if i == HERO_ART.len() - 1 {
            lines.push(Line::from(vec![
                Span::styled(*art_line, art_style),
                Span::styled(format!("  v{VERSION}"), label_style),
            ]));
        } else {
            lines.push(Line::from(Span::styled(*art_line, art_style)));
        }
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("  model ", label_style),
        Span::styled(app.model.as_str(), value_style),
        Span::styled("  project ", label_style),
        Span::styled(app.project_dir.as_str(), value_style),
    ]));
    lines.push(Line::from(vec![
        Span::styled("  server ", label_style),
        Span::styled(app.server_url.as_str(), value_style),
        Span::styled("  replies ", label_style),
        Span::styled(
            if app.stream { "streaming" } else { "blocking" },
            value_style,
        ),
    ]));

    let line_count = lines.len() as u16;
    let pad_top = inner.height.saturating_sub(line_count) / 2;
    let centered_area = Rect {
        x: inner.x,
        y: inner.y + pad_top,
        width: inner.width,
        height: inner.height.saturating_sub(pad_top),
    };
    frame.render_widget(Paragraph::new(lines), centered_area);

    draw_cpu_widget(frame, app, cols[1]);
}

/// Draw a compact CPU usage widget with a bar gauge.
fn draw_cpu_widget(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let cpu = app.cpu_usage;
    let cpu_color = if cpu < 50.0 {
        GREEN
    } else if cpu < 80.0 {
        YELLOW
    } else {
        RED
    };

    let block = Block::default()
        .borders(Borders::TOP | Borders::RIGHT | Borders::BOTTOM)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BORDER))
        .title(Span::styled(" CPU ", Style::default().fg(TEXT_MUTED)));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let bar_width = inner.width.saturating_sub(2);
    let filled = ((cpu / 100.0) * bar_width as f32).round() as u16;
    let empty = bar_width.saturating_sub(filled);

    let lines = vec![
        Line::from(Span::styled(
            format!(" {cpu:5.1}%"),
            Style::default().fg(cpu_color).add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::raw(" "),
            Span::styled("█".repeat(filled as usize), Style::default().fg(cpu_color)),
            Span::styled("░".repeat(empty as usize), Style::default().fg(BORDER)),
        ]),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
}

/// Draw the chat transcript with border and scrollbar.
fn draw_chat(frame: &mut Frame<'_>, app: &mut App, area: Rect) {
    let lines = app.render_lines();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BORDER))
        .title(Span::styled(" Chat ", Style::default().fg(TEXT_MUTED)));

    let inner = block.inner(area);
    let content_width = inner.width.saturating_sub(1);
    let content_height = inner.height as usize;

    let total_lines = Paragraph::new(lines.clone())
        .wrap(Wrap { trim: false })
        .line_count(content_width)
        .max(1);

    let max_scroll = total_lines.saturating_sub(content_height) as u16;
    app.update_scroll_bounds(max_scroll);
    let scroll = app.scroll;

    let chat_inner = Rect {
        width: inner.width.saturating_sub(1),
        ..inner
    };
    let chat = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));

    frame.render_widget(block, area);
    frame.render_widget(chat, chat_inner);

    if total_lines > content_height {
        let mut scrollbar_state = ScrollbarState::default()
            .content_length(total_lines)
            .position(scroll as usize)
            .viewport_content_length(content_height);
        let scrollbar_area = Rect {
            x: inner.x + inner.width.saturating_sub(1),
            y: inner.y,
            width: 1,
            height: inner.height,
        };
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .style(Style::default().fg(BORDER))
                .thumb_style(Style::default().fg(TEXT_MUTED)),
            scrollbar_area,
            &mut scrollbar_state,
        );
    }
}

/// Draw the input box; grows with multi-line input.
fn draw_input(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let (title, border_color) = if app.picker_open {
        (" Up/Down to choose  Enter to switch  Esc to close ", BORDER)
    } else if app.paste_mode {
        (" Paste (Enter newline, Ctrl+S send, Esc cancel) ", YELLOW)
    } else if app.in_flight {
        (" Waiting for reply ", BORDER)
    } else {
        (" Input ", SECONDARY)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border_color))
        .title(Span::styled(title, Style::default().fg(border_color)));
    let inner = block.inner(area);

    let prompt_style = Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD);
    let input_lines: Vec<&str> = app.input.split('\n').collect();
    let visible = input_lines.len().saturating_sub(inner.height as usize);
    let lines: Vec<Line<'_>> = if app.input.is_empty() {
        vec![Line::from(vec![
            Span::styled("❯ ", prompt_style),
            Span::styled("Type a message...", Style::default().fg(TEXT_MUTED)),
        ])]
    } else {
        input_lines
            .iter()
            .enumerate()
            .skip(visible)
            .map(|(idx, line)| {
                let prompt = if idx == 0 { "❯ " } else { "  " };
                Line::from(vec![
                    Span::styled(prompt, prompt_style),
                    Span::styled(*line, Style::default().fg(TEXT)),
                ])
            })
            .collect()
    };

    frame.render_widget(block, area);
    frame.render_widget(Paragraph::new(lines), inner);

    if !app.picker_open {
        let last = input_lines.last().copied().unwrap_or("");
        let row = (input_lines.len() - visible).saturating_sub(1) as u16;
        frame.set_cursor_position((
            cursor_column(inner, last),
            inner.y + row.min(inner.height.saturating_sub(1)),
        ));
    }
}

/// Column after `line` behind the prompt, kept inside `inner`.
fn cursor_column(inner: Rect, line: &str) -> u16 {
    let typed = u16::try_from(line.chars().count()).unwrap_or(u16::MAX);
    let offset = typed
        .saturating_add(2)
        .min(inner.width.saturating_sub(1));
    inner.x.saturating_add(offset)
}

/// Draw the status bar at the bottom.
fn draw_status_bar(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let status_color = match app.status.as_str() {
        "idle" => TEXT_MUTED,
        "thinking" | "streaming" => PRIMARY,
        _ => YELLOW,
    };

    let shortcuts = vec![
        Span::styled(" Ctrl+C", Style::default().fg(TEXT_MUTED)),
        Span::styled(" quit", Style::default().fg(BORDER)),
        Span::styled("  /", Style::default().fg(TEXT_MUTED)),
        Span::styled(" commands", Style::default().fg(BORDER)),
        Span::styled("  /paste", Style::default().fg(TEXT_MUTED)),
        Span::styled(" multi-line", Style::default().fg(BORDER)),
        Span::styled("  PgUp/PgDn", Style::default().fg(TEXT_MUTED)),
        Span::styled(" scroll", Style::default().fg(BORDER)),
    ];

    let right_text = format!(" {} ", app.status);
    let right_len = right_text.chars().count() as u16;
    let left_area = Rect {
        width: area.width.saturating_sub(right_len),
        ..area
    };
    let right_area = Rect {
        x: area.x + area.width.saturating_sub(right_len),
        width: right_len.min(area.width),
        ..area
    };

    frame.render_widget(Paragraph::new(Line::from(shortcuts)), left_area);
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            right_text,
            Style::default().fg(status_color),
        ))),
        right_area,
    );
}

fn draw_slash_palette(frame: &mut Frame<'_>, area: Rect) {
    let cmd_style = Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD);
    let desc_style = Style::default().fg(TEXT_MUTED);
    let hint_style = Style::default()
        .fg(TEXT_MUTED)
        .add_modifier(Modifier::ITALIC);

    let commands = [
        ("/model", "Pick a model"),
        ("/model <id>", "Switch model by id"),
        ("/models", "List available models"),
        ("/paste", "Multi-line input"),
        ("/reset", "Clear the conversation"),
        ("/read <path>", "Include a project file"),
        ("/help", "Show help"),
    ];
    let mut lines = vec![Line::from("")];
    for (command, description) in commands {
        lines.push(Line::from(vec![
            Span::styled(format!("  {command:<15}"), cmd_style),
            Span::styled(description, desc_style),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("  Esc to close", hint_style)));

    let height = SLASH_PALETTE_HEIGHT
        .min(area.height)
        .min(lines.len() as u16 + 2);
    let palette_area = Rect {
        x: area.x + 1,
        y: area.y + area.height.saturating_sub(height),
        width: area.width.saturating_sub(2).min(50),
        height,
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(PRIMARY))
        .title(Span::styled(
            " Commands ",
            Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD),
        ))
        .style(Style::default().bg(Color::Rgb(20, 20, 20)));

    frame.render_widget(Paragraph::new(lines).block(block), palette_area);
}

fn draw_model_picker(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BORDER))
        .title(Span::styled(
            " Models ",
            Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    let lines = render_model_lines(app);
    let selected = app.selected_model as u16 + 1;
    let scroll = selected.saturating_sub(inner.height);

    frame.render_widget(block, area);
    frame.render_widget(Paragraph::new(lines).scroll((scroll, 0)), inner);
}

fn render_model_lines(app: &App) -> Vec<Line<'static>> {
    if app.models.is_empty() {
        return vec![Line::from(Span::styled(
            " No .gguf models found.",
            Style::default().fg(TEXT_MUTED),
        ))];
    }

    app.models
        .iter()
        .enumerate()
        .map(|(idx, model_id)| {
            let is_selected = idx == app.selected_model;
            let line_style = if is_selected {
                Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(TEXT)
            };
            let marker = if is_selected { ">" } else { " " };
            let active_tag = if model_id == &app.model {
                " (active)"
            } else {
                ""
            };
            Line::from(vec![
                Span::styled(format!(" {marker} "), line_style),
                Span::styled(model_id.clone(), line_style),
                Span::styled(active_tag, Style::default().fg(SECONDARY)),
            ])
        })
        .collect()
}
