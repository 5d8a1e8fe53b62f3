//! Output sink: table and tagged-line rendering
//!
//! Cosmetic only. Table widths are measured in display columns with ANSI
//! escapes (highlight markers and colours) ignored.

use colored::{Color, Colorize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::sync::Mutex;
use tabled::{settings::Style, Table, Tabled};

/// Palette used to tell interleaved instances apart
const OWNER_COLORS: &[Color] = &[
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Magenta,
    Color::BrightCyan,
    Color::BrightGreen,
    Color::BrightMagenta,
];

/// Render rows under a header and a dashed rule, columns joined with `" | "`
pub fn render_table<T: Tabled>(rows: &[T]) -> String {
    Table::new(rows).with(Style::psql()).to_string()
}

/// Colour picked for an owner tag, stable across a run
pub fn owner_color(owner: &str) -> Color {
    let mut hasher = DefaultHasher::new();
    owner.hash(&mut hasher);
    OWNER_COLORS[(hasher.finish() % OWNER_COLORS.len() as u64) as usize]
}

/// `owner:text` with the owner tag colourised
pub fn render_line(owner: &str, text: &str) -> String {
    format!("{}:{}", owner.color(owner_color(owner)).bold(), text)
}

/// Destination for annotated log lines
pub trait LineSink: Send + Sync {
    fn emit(&self, owner: &str, text: &str);
}

/// Prints tagged lines to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl LineSink for StdoutSink {
    fn emit(&self, owner: &str, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", render_line(owner, text));
    }
}

/// Collects emitted lines in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(String, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(owner, text)` pair emitted so far, in arrival order
    pub fn lines(&self) -> Vec<(String, String)> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Texts emitted for one owner, in arrival order
    pub fn lines_for(&self, owner: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(o, _)| o == owner)
            .map(|(_, text)| text)
            .collect()
    }
}

impl LineSink for MemorySink {
    fn emit(&self, owner: &str, text: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((owner.to_string(), text.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{HIGHLIGHT_END, HIGHLIGHT_START};

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    fn row(name: &str, status: &str) -> Row {
        Row {
            name: name.to_string(),
            status: status.to_string(),
        }
    }

    fn separator_at(line: &str) -> Option<usize> {
        line.chars().position(|c| c == '|' || c == '+')
    }

    #[test]
    fn test_render_table_pads_and_joins() {
        let table = render_table(&[row("api-1", "Running"), row("worker-long-name", "Pending")]);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("Name") && lines[0].contains(" | "));
        assert!(lines[1].chars().all(|c| c == '-' || c == '+'));
        assert!(lines[2].contains("api-1") && lines[2].contains("Running"));
        assert!(lines[3].contains("worker-long-name | Pending"));

        let column = separator_at(lines[0]);
        assert!(lines.iter().all(|line| separator_at(line) == column));
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|line| line.chars().count() == width));
    }

    #[test]
    fn test_render_table_ignores_markers_for_width() {
        let highlighted = format!("{}Bad{}", HIGHLIGHT_START, HIGHLIGHT_END);
        let table = render_table(&[row("api-1", &highlighted), row("api-2", "Good")]);
        let lines: Vec<&str> = table.lines().collect();

        let visible = lines[2]
            .replace(HIGHLIGHT_START, "")
            .replace(HIGHLIGHT_END, "");
        assert!(lines[2].contains(&highlighted));
        assert_eq!(visible.chars().count(), lines[3].chars().count());
    }

    #[test]
    fn test_render_table_measures_display_width() {
        // Each CJK character takes two columns
        let table = render_table(&[row("名前", "x"), row("abcd", "y")]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[2].chars().count() + 2, lines[3].chars().count());
    }

    #[test]
    fn test_render_line_keeps_text() {
        let rendered = render_line("pod-a", "hello");
        assert!(rendered.contains("pod-a"));
        assert!(rendered.ends_with(":hello"));
    }

    #[test]
    fn test_owner_color_stable() {
        assert_eq!(owner_color("pod-a"), owner_color("pod-a"));
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemorySink::new();
        sink.emit("a", "1");
        sink.emit("b", "x");
        sink.emit("a", "2");
        assert_eq!(sink.lines_for("a"), ["1", "2"]);
        assert_eq!(sink.lines().len(), 3);
    }
}
