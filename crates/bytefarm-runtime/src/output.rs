//! Bounded, line-oriented output buffer for program `print` output and
//! diagnostics.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Lines kept before the oldest are dropped.
pub const DEFAULT_OUTPUT_CAPACITY: usize = 500;

#[derive(Debug, Default)]
struct Lines {
    lines: VecDeque<String>,
    /// Text after the last newline, waiting for the rest of its line.
    partial: String,
}

/// Thread-safe text sink.
///
/// Accepts arbitrary chunks; a trailing fragment without a newline is held
/// until a later write completes it. At most `capacity` complete lines are
/// kept, oldest first.
#[derive(Debug)]
pub struct OutputBuffer {
    inner: Mutex<Lines>,
    capacity: usize,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_OUTPUT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Lines::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a chunk of text.
    pub fn write(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut inner = self.lock();
        let mut combined = std::mem::take(&mut inner.partial);
        combined.push_str(text);
        let mut pieces: Vec<&str> = combined.split('\n').collect();
        // `split` always yields at least one piece; the last is unterminated.
        let tail = pieces.pop().unwrap_or_default().to_owned();
        for line in pieces {
            inner.lines.push_back(line.to_owned());
        }
        inner.partial = tail;
        self.trim(&mut inner);
    }

    /// Append one complete line. A pending fragment is left untouched.
    pub fn append_line(&self, line: &str) {
        let mut inner = self.lock();
        inner.lines.push_back(line.to_owned());
        self.trim(&mut inner);
    }

    /// Complete lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lock().lines.iter().cloned().collect()
    }

    /// The unterminated trailing fragment, if any.
    pub fn partial(&self) -> String {
        self.lock().partial.clone()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.lines.clear();
        inner.partial.clear();
    }

    /// Number of complete lines.
    pub fn len(&self) -> usize {
        self.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Lines> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn trim(&self, inner: &mut Lines) {
        while inner.lines.len() > self.capacity {
            inner.lines.pop_front();
        }
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}
