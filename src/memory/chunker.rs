//! Line-based overlapping chunker.
//!
//! Token counts are approximated as `words × 1.3`. Chunks never split a line; a single
//! line over budget becomes a chunk on its own.

use std::iter::Enumerate;
use std::str::Lines;

use crate::config::ChunkingConfig;
use crate::memory::types::ChunkDraft;

/// Approximate token count of a line.
pub fn estimate_tokens(text: &str) -> usize {
    (text.split_whitespace().count() as f64 * 1.3) as usize
}

/// Lazily split `text` into chunks using the configured budget.
pub fn chunk_text<'a>(text: &'a str, config: &ChunkingConfig) -> Chunks<'a> {
    Chunks::new(text, config.target_tokens, config.overlap_tokens)
}

/// Iterator over the chunks of one document. Single pass; not restartable.
pub struct Chunks<'a> {
    lines: Enumerate<Lines<'a>>,
    buffer: Vec<&'a str>,
    /// 0-indexed line number of `buffer[0]`.
    start: usize,
    tokens: usize,
    target: usize,
    overlap: usize,
}

impl<'a> Chunks<'a> {
    pub fn new(text: &'a str, target: usize, overlap: usize) -> Self {
        Self {
            lines: text.lines().enumerate(),
            buffer: Vec::new(),
            start: 0,
            tokens: 0,
            target,
            overlap,
        }
    }

    fn draft(&self) -> ChunkDraft {
        ChunkDraft {
            content: self.buffer.join("\n"),
            line_start: self.start + 1,
            line_end: self.start + self.buffer.len(),
        }
    }

    /// Number of trailing buffered lines that fit in the overlap budget, and their tokens.
    fn overlap_tail(&self) -> (usize, usize) {
        let mut keep = 0;
        let mut tokens = 0;
        for line in self.buffer.iter().rev() {
            let t = estimate_tokens(line);
            if tokens + t > self.overlap {
                break;
            }
            tokens += t;
            keep += 1;
        }
        (keep, tokens)
    }
}

impl Iterator for Chunks<'_> {
    type Item = ChunkDraft;

    fn next(&mut self) -> Option<ChunkDraft> {
        while let Some((i, line)) = self.lines.next() {
            let line_tokens = estimate_tokens(line);

            if self.tokens + line_tokens > self.target && !self.buffer.is_empty() {
                let emitted = self.draft();

                let (keep, overlap_tokens) = self.overlap_tail();
                self.buffer.drain(..self.buffer.len() - keep);
                self.buffer.push(line);
                self.start = i - keep;
                self.tokens = overlap_tokens + line_tokens;

                return Some(emitted);
            }

            self.buffer.push(line);
            self.tokens += line_tokens;
        }

        if self.buffer.is_empty() {
            return None;
        }
        let last = self.draft();
        self.buffer.clear();
        self.tokens = 0;
        Some(last)
    }
}
