// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes plus plain tables.

use serde::Serialize;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => self.event("success", message, false),
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {message}"),
            OutputMode::Json => self.event("warning", message, true),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => self.event("error", message, true),
        }
    }

    /// Print a command result: serialized in JSON mode, rendered by
    /// `render` otherwise.
    pub fn data<T: Serialize>(&self, value: &T, render: impl FnOnce() -> String) {
        match self.mode {
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(value) {
                    println!("{json}");
                }
            }
            OutputMode::Normal | OutputMode::Quiet => {
                let text = render();
                if !text.is_empty() {
                    println!("{}", text.trim_end());
                }
            }
        }
    }

    fn event(&self, event: &str, message: &str, to_stderr: bool) {
        let event = JsonEvent {
            event,
            message,
            duration_secs: self.duration(),
        };
        if let Ok(json) = serde_json::to_string(&event) {
            if to_stderr {
                eprintln!("{json}");
            } else {
                println!("{json}");
            }
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

/// Render rows as left-aligned columns. An empty header skips the header line.
pub fn table(header: &[&str], rows: &[Vec<String>]) -> String {
    let columns = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0);

    let mut widths = vec![0usize; columns];
    for (i, cell) in header.iter().enumerate() {
        widths[i] = widths[i].max(cell.chars().count());
    }
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    if !header.is_empty() {
        push_row(&mut out, &widths, header.iter().copied());
    }
    for row in rows {
        push_row(&mut out, &widths, row.iter().map(String::as_str));
    }

    out
}

fn push_row<'a>(out: &mut String, widths: &[usize], cells: impl Iterator<Item = &'a str>) {
    let line: Vec<String> = cells
        .enumerate()
        .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_pads_columns_to_widest_cell() {
        let rendered = table(
            &["Name", "Image"],
            &[
                vec!["prod_website_1".to_string(), "nginx:1.19".to_string()],
                vec!["prod_db_1".to_string(), "postgres".to_string()],
            ],
        );
        assert_eq!(
            rendered,
            "Name            Image\nprod_website_1  nginx:1.19\nprod_db_1       postgres\n"
        );
    }

    #[test]
    fn table_without_header() {
        let rendered = table(&[], &[vec!["Replicas:".to_string(), "1 of 2".to_string()]]);
        assert_eq!(rendered, "Replicas:  1 of 2\n");
    }
}
