//! Transcript accumulation: a live partial line plus the committed history.

use super::protocol::TranscriptEvent;
use std::fmt;

/// One committed transcript entry. Backend errors are kept in-line so the
/// rendered transcript shows where recognition failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Utterance {
    Text(String),
    Error(String),
}

impl fmt::Display for Utterance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Utterance::Text(text) => write!(f, "{text}"),
            Utterance::Error(text) => write!(f, "[error] {text}"),
        }
    }
}

/// Folds partial/final/error events into a partial line and committed history.
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    partial: String,
    committed: Vec<Utterance>,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A partial replaces the live line; a final commits its text and clears
    /// the live line; an error commits a tagged entry and leaves the live
    /// line alone. Unknown events are ignored here.
    pub fn apply(&mut self, event: &TranscriptEvent) {
        match event {
            TranscriptEvent::Partial { text } => {
                self.partial = text.clone();
            }
            TranscriptEvent::Final { text } => {
                self.committed.push(Utterance::Text(text.clone()));
                self.partial.clear();
            }
            TranscriptEvent::Error { text } => {
                self.committed.push(Utterance::Error(text.clone()));
            }
            TranscriptEvent::Other { .. } => {}
        }
    }

    /// The in-flight line, empty when nothing is pending.
    pub fn partial(&self) -> &str {
        &self.partial
    }

    pub fn committed(&self) -> &[Utterance] {
        &self.committed
    }

    /// Committed history rendered one entry per line.
    pub fn render(&self) -> String {
        self.committed
            .iter()
            .map(|u| u.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
