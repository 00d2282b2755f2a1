//! Terminal markdown rendering with syntax-highlighted code blocks.
//!
//! `ChatRenderer` combines `termimad` for prose and `syntect` for code block
//! syntax highlighting. During streaming, fragments are printed raw; batch
//! replies are rendered as formatted markdown. The session theme picks the
//! skin and the highlighting palette.

use std::io::Write;
use std::time::Duration;

use console::style;
use crossterm::style::Color;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Style, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::as_24_bit_terminal_escaped;
use termimad::MadSkin;

use cyphernova_types::analytics::AnalyticsSummary;
use cyphernova_types::chat::{MessageRole, Theme, Turn};

/// Terminal markdown renderer with syntax highlighting.
pub struct ChatRenderer {
    theme: Theme,
    skin: MadSkin,
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
}

impl ChatRenderer {
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            skin: Self::skin_for(theme),
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
        }
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        self.skin = Self::skin_for(theme);
    }

    fn skin_for(theme: Theme) -> MadSkin {
        let (mut skin, accent) = match theme {
            Theme::Light => (MadSkin::default_light(), Color::Magenta),
            Theme::Dark => (MadSkin::default_dark(), Color::Cyan),
        };
        let tc = Self::crossterm_to_termimad(accent);
        skin.bold.set_fg(tc);
        skin.headers[0].set_fg(tc);
        skin.headers[1].set_fg(tc);
        skin.inline_code
            .set_fg(termimad::crossterm::style::Color::Yellow);
        skin
    }

    fn syntax_theme_name(&self) -> &'static str {
        match self.theme {
            Theme::Light => "base16-ocean.light",
            Theme::Dark => "base16-ocean.dark",
        }
    }

    /// Render a complete markdown reply with syntax-highlighted code blocks.
    ///
    /// Code fences with a language tag are highlighted via syntect; everything
    /// else is rendered through termimad.
    pub fn render_final(&self, markdown: &str) -> String {
        let mut output = String::new();
        let mut in_code_block = false;
        let mut code_lang = String::new();
        let mut code_buf = String::new();

        for line in markdown.lines() {
            if line.starts_with("```") && !in_code_block {
                in_code_block = true;
                code_lang = line.trim_start_matches('`').trim().to_string();
                code_buf.clear();
            } else if line.starts_with("```") && in_code_block {
                in_code_block = false;
                let highlighted = self.highlight_code(&code_buf, &code_lang);
                output.push_str(&highlighted);
                output.push('\n');
            } else if in_code_block {
                code_buf.push_str(line);
                code_buf.push('\n');
            } else {
                let rendered = self.skin.term_text(line);
                output.push_str(&format!("{rendered}"));
            }
        }

        // Unclosed fence
        if in_code_block && !code_buf.is_empty() {
            let highlighted = self.highlight_code(&code_buf, &code_lang);
            output.push_str(&highlighted);
        }

        output
    }

    /// Print a single streaming fragment (raw, no formatting).
    pub fn print_streaming_token(&self, token: &str) {
        print!("{token}");
        let _ = std::io::stdout().flush();
    }

    /// Print the footer after a reply: "| 1.2s · model".
    pub fn print_reply_footer(&self, response_time: Option<Duration>, model: &str) {
        let seconds = response_time.map(|d| d.as_secs_f64()).unwrap_or_default();
        println!(
            "\n  {} {:.1}s {} {}",
            style("|").dim(),
            style(seconds).dim(),
            style("\u{00b7}").dim(),
            style(model).dim(),
        );
    }

    /// Print an upstream failure turn.
    pub fn print_error_turn(&self, content: &str) {
        println!("\n  {}", style(content).red());
    }

    /// Print the analytics panel.
    pub fn print_stats(&self, summary: &AnalyticsSummary) {
        println!();
        println!("  {}", style("📊 Chat Analytics").bold());
        println!();
        println!("  Total Messages:   {}", style(summary.total_messages).bold());
        println!("  User Messages:    {}", summary.user_messages);
        println!("  Bot Messages:     {}", summary.bot_messages);
        println!("  Session Duration: {}", summary.duration_display());
        match summary.avg_response_time {
            Some(avg) => println!("  Avg Response:     {avg:.2}s"),
            None => println!("  Avg Response:     {}", style("n/a").dim()),
        }
        if !summary.models_used.is_empty() {
            println!("  Models Used:      {}", summary.models_used.join(", "));
        }
        println!();
    }

    /// Print the transcript, one line per turn, previews truncated.
    pub fn print_history(&self, turns: &[Turn]) {
        println!();
        for turn in turns {
            let label = match turn.role {
                MessageRole::User => style("You").green().bold(),
                MessageRole::Assistant => style("CypherNova").magenta().bold(),
                MessageRole::System => style("System").dim(),
            };
            let time = turn.timestamp.with_timezone(&chrono::Local).format("%H:%M");
            println!("  {} {label} {}", style(time).dim(), preview(&turn.content, 100));
        }
        println!();
    }

    fn highlight_code(&self, code: &str, lang: &str) -> String {
        let syntax = if lang.is_empty() {
            self.syntax_set.find_syntax_plain_text()
        } else {
            self.syntax_set
                .find_syntax_by_token(lang)
                .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text())
        };

        let mut output = String::new();
        output.push_str(&format!("  {}\n", style(format!("--- {lang} ---")).dim()));

        let Some(theme) = self.theme_set.themes.get(self.syntax_theme_name()) else {
            for line in code.lines() {
                output.push_str(&format!("  {line}\n"));
            }
            return output;
        };
        let mut h = HighlightLines::new(syntax, theme);

        for line in code.lines() {
            let ranges: Vec<(Style, &str)> = h
                .highlight_line(line, &self.syntax_set)
                .unwrap_or_default();
            let escaped = as_24_bit_terminal_escaped(&ranges[..], false);
            output.push_str(&format!("  {escaped}\x1b[0m\n"));
        }

        output
    }

    fn crossterm_to_termimad(color: Color) -> termimad::crossterm::style::Color {
        match color {
            Color::Cyan => termimad::crossterm::style::Color::Cyan,
            Color::Magenta => termimad::crossterm::style::Color::Magenta,
            Color::Rgb { r, g, b } => termimad::crossterm::style::Color::Rgb { r, g, b },
            _ => termimad::crossterm::style::Color::Cyan,
        }
    }
}

/// First `max` characters of `text` on one line, with an ellipsis when cut.
fn preview(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}
