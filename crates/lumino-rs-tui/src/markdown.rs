//! Markdown cleanup and rendering for assistant replies.
//!
//! Models frequently emit markdown that is almost right: headers glued to the
//! previous line, untagged code fences, tables without a leading blank line,
//! LaTeX commands meant for a math renderer. [`clean`] repairs those before
//! [`render`] turns the text into styled terminal lines.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use regex::{Captures, Regex};
use std::sync::LazyLock;

const TEXT: Color = Color::Rgb(238, 238, 238);
const MUTED: Color = Color::Rgb(128, 128, 128);
const HEADING: Color = Color::Rgb(0, 215, 235);
const SUBHEADING: Color = Color::Rgb(95, 175, 255);
const INLINE_CODE: Color = Color::Rgb(255, 0, 255);
const CODE: Color = Color::Rgb(230, 219, 116);
const STRONG: Color = Color::Rgb(229, 192, 123);
const LINK: Color = Color::Rgb(95, 135, 255);
const RULE_WIDTH: usize = 40;

static LATEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\\(times|div|pm|le|ge|neq|approx|infty|pi|theta|alpha|beta|sum|prod|sqrt|int|rightarrow)\b",
    )
    .expect("latex pattern")
});

/// Ordered rewrite rules applied after LaTeX substitution.
static CLEANUPS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        // unterminated fence directly followed by a header
        (r"(```\w*)\s*\n(#{1,6}\s)", "$1\n```\n\n$2"),
        (r"([^\n])\n(#{1,6}\s)", "$1\n\n$2"),
        // untagged opening fence
        (r"(\n\n|^)```\s*\n", "$1```python\n"),
        (r"(```)\n([^`])", "$1\n\n$2"),
        (r"(\n)([*-] )", "$1\n$2"),
        (r"(\n)(\d+\. )", "$1\n$2"),
        (r"([^|])\n(\|.*\|)", "$1\n\n$2"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).expect("cleanup pattern"), replacement))
    .collect()
});

fn latex_symbol(name: &str) -> &'static str {
    match name {
        "times" => "×",
        "div" => "÷",
        "pm" => "±",
        "le" => "≤",
        "ge" => "≥",
        "neq" => "≠",
        "approx" => "≈",
        "infty" => "∞",
        "pi" => "π",
        "theta" => "θ",
        "alpha" => "α",
        "beta" => "β",
        "sum" => "∑",
        "prod" => "∏",
        "sqrt" => "√",
        "int" => "∫",
        "rightarrow" => "→",
        _ => "",
    }
}

/// Replace leftover LaTeX commands and `**2`/`**3` powers with Unicode.
pub fn replace_latex(text: &str) -> String {
    let text = LATEX.replace_all(text, |caps: &Captures<'_>| latex_symbol(&caps[1]));
    text.replace("**2", "²").replace("**3", "³")
}

/// Normalize common formatting slips in model output.
pub fn clean(text: &str) -> String {
    let mut text = replace_latex(text);
    for (pattern, replacement) in CLEANUPS.iter() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }
    text
}

/// Render markdown into styled lines.
pub fn render(text: &str) -> Vec<Line<'static>> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut renderer = Renderer::default();
    for event in Parser::new_ext(text, options) {
        renderer.event(event);
    }
    renderer.finish()
}

/// Open containers, popped on the matching end event.
#[derive(Debug)]
enum Block {
    Paragraph,
    Heading,
    Quote,
    Code,
    List,
    Item,
    Styled,
    Table,
    TableRow,
    TableCell,
    Other,
}

#[derive(Default)]
struct Renderer {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    stack: Vec<Block>,
    styles: Vec<Style>,
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    in_code: bool,
    table: Vec<Vec<String>>,
    header_rows: usize,
    row: Vec<String>,
    cell: String,
}

impl Renderer {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(_) => self.end(),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                if self.in_cell() {
                    self.cell.push_str(&code);
                } else {
                    self.current.push(Span::styled(
                        code.into_string(),
                        Style::default().fg(INLINE_CODE).add_modifier(Modifier::BOLD),
                    ));
                }
            }
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => self.flush_line(),
            Event::Rule => {
                self.flush_line();
                self.push_line(vec![Span::styled(
                    "─".repeat(RULE_WIDTH),
                    Style::default().fg(MUTED),
                )]);
                self.blank();
            }
            Event::TaskListMarker(done) => {
                let marker = if done { "[x] " } else { "[ ] " };
                self.current.push(Span::styled(marker, Style::default().fg(MUTED)));
            }
            Event::Html(html) | Event::InlineHtml(html) => self.text(&html),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let block = match tag {
            Tag::Paragraph => Block::Paragraph,
            Tag::Heading { level, .. } => {
                self.flush_line();
                let (color, hashes) = match level {
                    HeadingLevel::H1 => (HEADING, 1),
                    HeadingLevel::H2 => (HEADING, 2),
                    HeadingLevel::H3 => (SUBHEADING, 3),
                    _ => (SUBHEADING, 4),
                };
                let mut style = Style::default().fg(color).add_modifier(Modifier::BOLD);
                if hashes == 1 {
                    style = style.add_modifier(Modifier::UNDERLINED);
                }
                self.current
                    .push(Span::styled(format!("{} ", "#".repeat(hashes)), style));
                self.styles.push(style);
                Block::Heading
            }
            Tag::BlockQuote(_) => {
                self.flush_line();
                self.quote_depth += 1;
                Block::Quote
            }
            Tag::CodeBlock(kind) => {
                self.flush_line();
                let lang = match kind {
                    CodeBlockKind::Fenced(lang) => {
                        lang.split_whitespace().next().unwrap_or("").to_string()
                    }
                    CodeBlockKind::Indented => String::new(),
                };
                self.push_line(vec![Span::styled(
                    format!("╭─ {lang}").trim_end().to_string(),
                    Style::default().fg(MUTED),
                )]);
                self.in_code = true;
                Block::Code
            }
            Tag::List(start) => {
                self.flush_line();
                self.lists.push(start);
                Block::List
            }
            Tag::Item => {
                self.flush_line();
                let depth = self.lists.len().saturating_sub(1);
                let bullet = match self.lists.last_mut() {
                    Some(Some(number)) => {
                        let bullet = format!("{number}. ");
                        *number += 1;
                        bullet
                    }
                    _ => "• ".to_string(),
                };
                self.current.push(Span::raw("  ".repeat(depth)));
                self.current
                    .push(Span::styled(bullet, Style::default().fg(HEADING)));
                Block::Item
            }
            Tag::Emphasis => self.styled(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.styled(Style::default().fg(STRONG).add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self.styled(Style::default().add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { .. } => {
                self.styled(Style::default().fg(LINK).add_modifier(Modifier::UNDERLINED))
            }
            Tag::Table(_) => {
                self.flush_line();
                self.table.clear();
                self.header_rows = 0;
                Block::Table
            }
            Tag::TableHead => {
                self.header_rows = 1;
                Block::TableRow
            }
            Tag::TableRow => Block::TableRow,
            Tag::TableCell => {
                self.cell.clear();
                Block::TableCell
            }
            _ => Block::Other,
        };
        self.stack.push(block);
    }

    fn end(&mut self) {
        let Some(block) = self.stack.pop() else {
            return;
        };
        match block {
            Block::Paragraph => {
                self.flush_line();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            Block::Heading => {
                self.styles.pop();
                self.flush_line();
                self.blank();
            }
            Block::Quote => {
                self.flush_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                if self.quote_depth == 0 {
                    self.blank();
                }
            }
            Block::Code => {
                self.in_code = false;
                self.push_line(vec![Span::styled("╰─", Style::default().fg(MUTED))]);
                self.blank();
            }
            Block::List => {
                self.flush_line();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            Block::Item => self.flush_line(),
            Block::Styled => {
                self.styles.pop();
            }
            Block::Table => {
                let rows = std::mem::take(&mut self.table);
                self.render_table(rows);
                self.blank();
            }
            Block::TableRow => {
                let row = std::mem::take(&mut self.row);
                self.table.push(row);
            }
            Block::TableCell => {
                let cell = std::mem::take(&mut self.cell);
                self.row.push(cell.trim().to_string());
            }
            Block::Other => {}
        }
    }

    fn styled(&mut self, style: Style) -> Block {
        let base = self.style();
        self.styles.push(base.patch(style));
        Block::Styled
    }

    fn style(&self) -> Style {
        self.styles
            .last()
            .copied()
            .unwrap_or_else(|| Style::default().fg(TEXT))
    }

    fn in_cell(&self) -> bool {
        self.stack
            .iter()
            .any(|block| matches!(block, Block::TableCell))
    }

    fn text(&mut self, text: &str) {
        if self.in_code {
            for line in text.lines() {
                self.push_line(vec![
                    Span::styled("│ ", Style::default().fg(MUTED)),
                    Span::styled(line.to_string(), Style::default().fg(CODE)),
                ]);
            }
            return;
        }
        if self.in_cell() {
            self.cell.push_str(text);
            return;
        }
        let style = self.style();
        self.current.push(Span::styled(text.to_string(), style));
    }

    fn flush_line(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.current);
        self.push_line(spans);
    }

    fn push_line(&mut self, spans: Vec<Span<'static>>) {
        let mut line = Vec::with_capacity(spans.len() + 1);
        if self.quote_depth > 0 {
            line.push(Span::styled(
                "▌ ".repeat(self.quote_depth),
                Style::default().fg(MUTED),
            ));
        }
        line.extend(spans);
        self.lines.push(Line::from(line));
    }

    fn blank(&mut self) {
        let last_blank = self
            .lines
            .last()
            .is_some_and(|line| line.spans.iter().all(|span| span.content.trim().is_empty()));
        if !self.lines.is_empty() && !last_blank {
            self.lines.push(Line::from(""));
        }
    }

    fn render_table(&mut self, rows: Vec<Vec<String>>) {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return;
        }
        let mut widths = vec![0usize; columns];
        for row in &rows {
            for (idx, cell) in row.iter().enumerate() {
                widths[idx] = widths[idx].max(cell.chars().count());
            }
        }
        let border = Style::default().fg(MUTED);
        for (row_idx, row) in rows.iter().enumerate() {
            let header = row_idx < self.header_rows;
            let cell_style = if header {
                Style::default().fg(HEADING).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(TEXT)
            };
            let mut spans = vec![Span::styled("│", border)];
            for (idx, width) in widths.iter().enumerate() {
                let cell = row.get(idx).map(String::as_str).unwrap_or("");
                let pad = width - cell.chars().count();
                spans.push(Span::styled(
                    format!(" {cell}{} ", " ".repeat(pad)),
                    cell_style,
                ));
                spans.push(Span::styled("│", border));
            }
            self.push_line(spans);
            if header {
                let rule: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
                self.push_line(vec![Span::styled(format!("├{}┤", rule.join("┼")), border)]);
            }
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush_line();
        while self
            .lines
            .last()
            .is_some_and(|line| line.spans.iter().all(|span| span.content.is_empty()))
        {
            self.lines.pop();
        }
        self.lines
    }
}
