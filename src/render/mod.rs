mod palette;
pub mod symbols;

pub use palette::{Palette, Tone};

use crate::capture::{self, Interceptor};
use crate::events::TaskStatus;
use crate::events::projector::TaskTree;
use crossterm::Command;
use crossterm::cursor::{MoveTo, MoveUp};
use crossterm::terminal::{Clear, ClearType};
use serde_json::Value;
use std::io;

const TRUNCATE_OVER: usize = 40;
const TRUNCATE_KEEP: usize = 20;
const HELP: &str = "ctrl+c: exit | ctrl+e: truncate output | ctrl+left/right: switch view";
// Raw mode turns off output post-processing, so a bare \n would not return
// the carriage.
const LINE_BREAK: &str = "\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Tasks,
    Stdout,
    Stderr,
}

impl ViewMode {
    const ALL: [ViewMode; 3] = [ViewMode::Tasks, ViewMode::Stdout, ViewMode::Stderr];

    fn position(self) -> usize {
        Self::ALL.iter().position(|m| *m == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.position() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.position() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    pub fn title(self) -> &'static str {
        match self {
            ViewMode::Tasks => "Tasks",
            ViewMode::Stdout => "Stdout",
            ViewMode::Stderr => "Stderr",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: [String; 2],
    pub body: Vec<String>,
}

pub struct Renderer {
    title: String,
    spinner_interval_ms: u64,
    palette: Palette,
    previous_lines: usize,
}

impl Renderer {
    pub fn new(title: &str, spinner_interval_ms: u64, color: bool) -> Self {
        Self {
            title: title.to_string(),
            spinner_interval_ms: spinner_interval_ms.max(1),
            palette: Palette::new(color),
            previous_lines: 0,
        }
    }

    pub fn previous_lines(&self) -> usize {
        self.previous_lines
    }

    pub fn frame(
        &self,
        mode: ViewMode,
        truncate: bool,
        tree: &TaskTree,
        captured: &[u8],
        now_ms: i64,
    ) -> Frame {
        let body = match mode {
            ViewMode::Tasks => {
                let spinner = spinner_frame(now_ms, self.spinner_interval_ms);
                self.tree_lines(tree, None, 0, truncate, spinner)
            }
            ViewMode::Stdout | ViewMode::Stderr => buffer_lines(captured),
        };
        Frame {
            header: [
                format!(" {} - {} View", self.title, mode.title()),
                format!(" {HELP} "),
            ],
            body,
        }
    }

    pub fn draw(&mut self, frame: &Frame, out: &Interceptor) -> io::Result<()> {
        let mut controls = origin_and_clear();
        for _ in 0..self.previous_lines {
            push_command(&mut controls, MoveUp(1));
            push_command(&mut controls, Clear(ClearType::UntilNewLine));
        }
        out.write_err(controls.as_bytes())?;

        let header = frame
            .header
            .iter()
            .map(|line| self.palette.paint(line, Tone::Banner))
            .collect::<Vec<_>>()
            .join(LINE_BREAK);
        out.write_frame(&format!("{header}{LINE_BREAK}{LINE_BREAK}"))?;
        if !frame.body.is_empty() {
            out.write_frame(&frame.body.join(LINE_BREAK))?;
        }

        self.previous_lines = frame.body.len();
        Ok(())
    }

    pub fn clear(&mut self, out: &Interceptor) -> io::Result<()> {
        out.write_err(origin_and_clear().as_bytes())
    }

    pub fn banner(&self, text: &str) -> String {
        self.palette.paint(text, Tone::Banner)
    }

    fn tree_lines(
        &self,
        tree: &TaskTree,
        parent: Option<&str>,
        depth: usize,
        truncate: bool,
        spinner: &str,
    ) -> Vec<String> {
        let indent = "  ".repeat(depth);
        let mut lines = Vec::new();

        for node in tree.children(parent) {
            let status = node.status.unwrap_or(TaskStatus::Running);
            let (symbol, tone) = status_symbol(status, spinner);
            lines.push(format!(
                "{indent}{} {}{}",
                self.palette.paint(symbol, tone),
                self.palette.paint(&node.name, Tone::Bold),
                self.palette.paint(
                    &format!("({})", render_value(node.inputs.as_ref(), truncate)),
                    Tone::Dim
                ),
            ));

            let bar = self.palette.paint(symbols::BAR, Tone::Dim);
            for line in self.tree_lines(tree, Some(&node.id), depth + 1, truncate, spinner) {
                lines.push(format!("{indent}{bar}{line}"));
            }

            let output = render_value(node.output.as_ref(), truncate);
            let result = match status {
                TaskStatus::Completed => Some(
                    self.palette
                        .paint(&format!("{} {output}", symbols::RIGHT_ARROW), Tone::Dim),
                ),
                TaskStatus::Failed => Some(format!(
                    "{} {}",
                    self.palette.paint(symbols::RIGHT_ARROW, Tone::Dim),
                    self.palette.paint(&output, Tone::Red)
                )),
                TaskStatus::Retrying => Some(format!(
                    "{} {}",
                    self.palette.paint(symbols::WARNING, Tone::Yellow),
                    self.palette.paint(&output, Tone::Dim)
                )),
                _ => None,
            };
            if let Some(result) = result {
                lines.push(format!("{indent}  {result}"));
            }
        }

        lines
    }
}

fn status_symbol(status: TaskStatus, spinner: &str) -> (&str, Tone) {
    match status {
        TaskStatus::Completed => (symbols::CIRCLE, Tone::Green),
        TaskStatus::Failed => (symbols::CROSS, Tone::Red),
        TaskStatus::Retrying => (spinner, Tone::Yellow),
        _ => (spinner, Tone::Cyan),
    }
}

fn buffer_lines(captured: &[u8]) -> Vec<String> {
    capture::decode(captured)
        .lines()
        .map(ToString::to_string)
        .collect()
}

fn origin_and_clear() -> String {
    let mut seq = String::new();
    push_command(&mut seq, MoveTo(0, 0));
    push_command(&mut seq, Clear(ClearType::FromCursorDown));
    seq
}

fn push_command(seq: &mut String, command: impl Command) {
    // Writing into a String cannot fail.
    let _ = command.write_ansi(seq);
}

pub fn spinner_frame(now_ms: i64, interval_ms: u64) -> &'static str {
    let interval = interval_ms.max(1) as i64;
    let idx = now_ms.div_euclid(interval).rem_euclid(symbols::SPINNER.len() as i64);
    symbols::SPINNER[idx as usize]
}

pub fn render_value(value: Option<&Value>, truncate: bool) -> String {
    let Some(value) = value else {
        return String::new();
    };
    let text = value.to_string();
    let len = text.chars().count();
    if !truncate || len < TRUNCATE_OVER {
        return text;
    }
    let head = text.chars().take(TRUNCATE_KEEP).collect::<String>();
    let tail = text.chars().skip(len - TRUNCATE_KEEP).collect::<String>();
    format!("{head}{}{tail}", symbols::ELLIPSIS)
}
