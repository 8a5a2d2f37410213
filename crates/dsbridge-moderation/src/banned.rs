use std::path::Path;

use tracing::{info, warn};

/// Banned words and phrases, matched whole-word and case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BannedWords {
    words: Vec<String>,
}

impl BannedWords {
    /// Build from raw entries. Entries are trimmed; blank ones are dropped.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = lines
            .into_iter()
            .map(|l| l.as_ref().trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        Self { words }
    }

    /// Read a newline-separated list. A missing or unreadable file yields an
    /// empty list and a warning, so the bridge still runs without one.
    pub fn load_or_empty(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let list = Self::from_lines(contents.lines());
                info!("Loaded {} banned words from {}", list.len(), path.display());
                list
            }
            Err(e) => {
                warn!("Banned word list {} not loaded: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// A single alternation regex, or `None` when the list is empty.
    ///
    /// Longest entries come first so a phrase wins over a word it starts with.
    pub fn pattern(&self) -> Option<String> {
        if self.words.is_empty() {
            return None;
        }

        let mut words: Vec<&str> = self.words.iter().map(String::as_str).collect();
        words.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        words.dedup();

        let alternation = words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");

        Some(format!(r"(?i)\b(?:{})\b", alternation))
    }
}
