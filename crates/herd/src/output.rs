// ABOUTME: Line-oriented output stream for worker output and supervisor status.
// ABOUTME: Pads every line with a fixed-width tag and a '|' or '>' marker.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

/// Destination for fully formatted lines.
pub trait LineSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Writes each line to stdout and flushes right away.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl LineSink for StdoutSink {
    fn write_line(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}

/// Collects lines in memory, for embedding and tests.
#[derive(Debug, Default)]
pub struct BufferSink {
    lines: Mutex<Vec<String>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|line| line.contains(needle))
    }
}

impl LineSink for BufferSink {
    fn write_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Captured worker output.
    Output,
    /// Supervisor-generated status.
    Status,
}

impl Marker {
    pub fn symbol(self) -> char {
        match self {
            Marker::Output => '|',
            Marker::Status => '>',
        }
    }
}

/// Formats and emits tagged lines. Cheap to clone; every monitor task holds one.
#[derive(Clone)]
pub struct Console {
    sink: Arc<dyn LineSink>,
    label: Arc<str>,
    width: usize,
}

impl Console {
    /// The tag column is as wide as the longest of `label` and `names`.
    pub fn new<'a>(
        sink: Arc<dyn LineSink>,
        label: &str,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let width = names
            .into_iter()
            .map(str::len)
            .chain(std::iter::once(label.len()))
            .max()
            .unwrap_or(0);
        Self {
            sink,
            label: Arc::from(label),
            width,
        }
    }

    pub fn format(&self, tag: &str, marker: Marker, text: &str) -> String {
        format!(
            "{tag:<width$} {} {text}",
            marker.symbol(),
            width = self.width
        )
    }

    /// A line the worker itself wrote.
    pub fn output(&self, instance: &str, line: &str) {
        self.sink
            .write_line(&self.format(instance, Marker::Output, line));
    }

    /// A status line about one worker.
    pub fn status(&self, instance: &str, text: &str) {
        self.sink
            .write_line(&self.format(instance, Marker::Status, text));
    }

    /// A status line about the whole fleet.
    pub fn notice(&self, text: &str) {
        self.sink
            .write_line(&self.format(&self.label, Marker::Status, text));
    }
}
