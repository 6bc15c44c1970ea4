//! Terminal output for a judging round.

use colored::{Color, Colorize};
use pose_verdict::Verdict;
use std::io::{self, Write};

/// Writes the judging progress to a terminal.
///
/// Interim feedback is typed out in place: only the part not yet on screen is
/// written. When the extractor's guess changes rather than grows, the new text
/// starts on a fresh line.
pub struct TerminalRenderer<W: Write> {
    out: W,
    shown: String,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            shown: String::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn show_judging(&mut self) -> io::Result<()> {
        writeln!(self.out, "{}", "AI is judging...".cyan().bold())?;
        self.out.flush()
    }

    pub fn show_partial(&mut self, partial: &str) -> io::Result<()> {
        match partial.strip_prefix(self.shown.as_str()) {
            Some(suffix) => write!(self.out, "{}", suffix.italic())?,
            None => write!(self.out, "\n{}", partial.italic())?,
        }
        self.shown = partial.to_string();
        self.out.flush()
    }

    pub fn show_verdict(&mut self, verdict: &Verdict) -> io::Result<()> {
        self.end_partial()?;

        writeln!(self.out)?;
        writeln!(self.out, "{}", "The Verdict".bold().underline())?;
        writeln!(
            self.out,
            "{}",
            format!("{}%", verdict.score)
                .color(score_color(verdict.score))
                .bold()
        )?;
        writeln!(self.out, "\"{}\"", verdict.feedback)?;
        self.out.flush()
    }

    pub fn show_stopped(&mut self) -> io::Result<()> {
        self.end_partial()?;
        writeln!(self.out, "{}", "Stopped. No verdict this round.".dimmed())?;
        self.out.flush()
    }

    pub fn show_error(&mut self, message: &str) -> io::Result<()> {
        self.end_partial()?;
        writeln!(self.out, "🚨 {}", message.red())?;
        self.out.flush()
    }

    fn end_partial(&mut self) -> io::Result<()> {
        if !self.shown.is_empty() {
            writeln!(self.out)?;
            self.shown.clear();
        }
        Ok(())
    }
}

fn score_color(score: f64) -> Color {
    if score >= 80.0 {
        Color::Green
    } else if score >= 50.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}
