use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid memory type: {0}. Use: preference, fact, mistake, or success")]
    InvalidKind(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Preference,
    Fact,
    Mistake,
    Success,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 4] = [
        MemoryKind::Preference,
        MemoryKind::Fact,
        MemoryKind::Mistake,
        MemoryKind::Success,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MemoryKind::Preference => "PREFERENCE",
            MemoryKind::Fact => "FACT",
            MemoryKind::Mistake => "MISTAKE",
            MemoryKind::Success => "SUCCESS",
        }
    }

    /// Plural section name as stored in the memory file.
    pub fn section(&self) -> &'static str {
        match self {
            MemoryKind::Preference => "preferences",
            MemoryKind::Fact => "facts",
            MemoryKind::Mistake => "mistakes",
            MemoryKind::Success => "successes",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MemoryKind::Preference => "preference",
            MemoryKind::Fact => "fact",
            MemoryKind::Mistake => "mistake",
            MemoryKind::Success => "success",
        })
    }
}

impl FromStr for MemoryKind {
    type Err = MemoryError;

    /// Accepts singular and plural forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "preference" | "preferences" => Ok(MemoryKind::Preference),
            "fact" | "facts" => Ok(MemoryKind::Fact),
            "mistake" | "mistakes" => Ok(MemoryKind::Mistake),
            "success" | "successes" => Ok(MemoryKind::Success),
            other => Err(MemoryError::InvalidKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedNote {
    pub key: String,
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything in the long-term memory file. Preferences and facts are keyed
/// and replaced on save; mistakes and successes accumulate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryBank {
    #[serde(default)]
    pub preferences: BTreeMap<String, Note>,
    #[serde(default)]
    pub facts: BTreeMap<String, Note>,
    #[serde(default)]
    pub mistakes: Vec<KeyedNote>,
    #[serde(default)]
    pub successes: Vec<KeyedNote>,
}

impl MemoryBank {
    pub fn total(&self) -> usize {
        self.preferences.len() + self.facts.len() + self.mistakes.len() + self.successes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn insert(&mut self, kind: MemoryKind, key: &str, value: &str, at: DateTime<Utc>) {
        let note = Note {
            value: value.to_string(),
            timestamp: at,
        };
        let keyed = || KeyedNote {
            key: key.to_string(),
            value: value.to_string(),
            timestamp: at,
        };
        match kind {
            MemoryKind::Preference => {
                self.preferences.insert(key.to_string(), note);
            }
            MemoryKind::Fact => {
                self.facts.insert(key.to_string(), note);
            }
            MemoryKind::Mistake => self.mistakes.push(keyed()),
            MemoryKind::Success => self.successes.push(keyed()),
        }
    }

    pub fn clear(&mut self, kind: Option<MemoryKind>) {
        match kind {
            None => *self = MemoryBank::default(),
            Some(MemoryKind::Preference) => self.preferences.clear(),
            Some(MemoryKind::Fact) => self.facts.clear(),
            Some(MemoryKind::Mistake) => self.mistakes.clear(),
            Some(MemoryKind::Success) => self.successes.clear(),
        }
    }

    /// `(key, value)` pairs of one section, in stored order.
    pub fn entries(&self, kind: MemoryKind) -> Vec<(&str, &str)> {
        match kind {
            MemoryKind::Preference => keyed_map(&self.preferences),
            MemoryKind::Fact => keyed_map(&self.facts),
            MemoryKind::Mistake => keyed_list(&self.mistakes),
            MemoryKind::Success => keyed_list(&self.successes),
        }
    }

    /// Case-insensitive search over keys and values of every section.
    pub fn search(&self, query: &str) -> Vec<(MemoryKind, &str, &str)> {
        let needle = query.to_lowercase();
        MemoryKind::ALL
            .iter()
            .flat_map(|kind| {
                self.entries(*kind)
                    .into_iter()
                    .map(move |(key, value)| (*kind, key, value))
            })
            .filter(|(_, key, value)| {
                key.to_lowercase().contains(&needle) || value.to_lowercase().contains(&needle)
            })
            .collect()
    }
}

fn keyed_map(map: &BTreeMap<String, Note>) -> Vec<(&str, &str)> {
    map.iter()
        .map(|(key, note)| (key.as_str(), note.value.as_str()))
        .collect()
}

fn keyed_list(list: &[KeyedNote]) -> Vec<(&str, &str)> {
    list.iter()
        .map(|note| (note.key.as_str(), note.value.as_str()))
        .collect()
}
