//! Knowledge store seam for execution traces.
//!
//! The orchestrator only adds entries and searches them. Persistence belongs
//! to whoever implements [`KnowledgeStore`]; [`InMemoryKnowledgeStore`] keeps
//! everything for the lifetime of the process.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::core::feedback::truncate_bytes;

/// Bytes of command output kept in an execution entry.
pub const EXECUTION_RESULT_BYTES: usize = 200;

/// Bytes of each entry shown in a context block.
pub const CONTEXT_ENTRY_BYTES: usize = 150;

const CONTEXT_HEADER: &str = "=== Relevant Context ===";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeCategory {
    Command,
    SystemInfo,
    ErrorPattern,
    Solution,
    Tip,
    Documentation,
}

impl KnowledgeCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            KnowledgeCategory::Command => "command",
            KnowledgeCategory::SystemInfo => "system_info",
            KnowledgeCategory::ErrorPattern => "error_pattern",
            KnowledgeCategory::Solution => "solution",
            KnowledgeCategory::Tip => "tip",
            KnowledgeCategory::Documentation => "documentation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: String,
    pub content: String,
    pub category: KnowledgeCategory,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub access_count: u64,
}

/// Search filters. Every set filter must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeQuery {
    /// Case-insensitive substring of the entry content.
    pub text: Option<String>,
    pub category: Option<KnowledgeCategory>,
    /// Matches entries carrying at least one of these tags.
    pub tags: Vec<String>,
    pub limit: usize,
}

impl Default for KnowledgeQuery {
    fn default() -> Self {
        Self {
            text: None,
            category: None,
            tags: Vec::new(),
            limit: 10,
        }
    }
}

impl KnowledgeQuery {
    fn matches(&self, entry: &KnowledgeEntry) -> bool {
        if self.category.is_some_and(|category| category != entry.category) {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|tag| entry.tags.contains(tag)) {
            return false;
        }
        match &self.text {
            Some(text) => entry.content.to_lowercase().contains(&text.to_lowercase()),
            None => true,
        }
    }
}

pub trait KnowledgeStore {
    /// Store an entry and return its id.
    fn add(
        &mut self,
        content: String,
        category: KnowledgeCategory,
        metadata: BTreeMap<String, Value>,
        tags: Vec<String>,
    ) -> String;

    /// Matching entries, most accessed first, at most `query.limit`.
    fn search(&self, query: &KnowledgeQuery) -> Vec<KnowledgeEntry>;

    /// Past command entries sharing a word with the first three words of
    /// `command`, at most `limit`.
    fn similar_commands(&self, command: &str, limit: usize) -> Vec<KnowledgeEntry> {
        let keywords: Vec<String> = command
            .split_whitespace()
            .take(3)
            .map(str::to_lowercase)
            .collect();
        if keywords.is_empty() {
            return Vec::new();
        }
        let mut found = self.search(&KnowledgeQuery {
            category: Some(KnowledgeCategory::Command),
            limit: usize::MAX,
            ..KnowledgeQuery::default()
        });
        found.retain(|entry| {
            let content = entry.content.to_lowercase();
            keywords.iter().any(|word| content.contains(word.as_str()))
        });
        found.truncate(limit);
        found
    }

    /// Prompt-ready block of the entries most relevant to `query`, or an
    /// empty string when nothing matches.
    ///
    /// Falls back to [`KnowledgeStore::similar_commands`] when no entry
    /// contains the whole query.
    fn context_for_query(&self, query: &str, max_entries: usize) -> String {
        let mut found = self.search(&KnowledgeQuery {
            text: Some(query.trim().to_string()),
            limit: max_entries,
            ..KnowledgeQuery::default()
        });
        if found.is_empty() {
            found = self.similar_commands(query, max_entries);
        }
        if found.is_empty() {
            return String::new();
        }
        let mut block = CONTEXT_HEADER.to_string();
        for entry in &found {
            block.push_str(&format!(
                "\n[{}] {}",
                entry.category.as_str(),
                truncate_bytes(&entry.content, CONTEXT_ENTRY_BYTES)
            ));
        }
        block
    }

    /// Record one command run for later reference.
    fn add_command_execution(&mut self, command: &str, output: &str, success: bool) -> String {
        let content = format!(
            "Command: {command}\nResult: {}",
            truncate_bytes(output, EXECUTION_RESULT_BYTES)
        );
        let metadata = BTreeMap::from([
            ("command".to_string(), json!(command)),
            ("success".to_string(), json!(success)),
        ]);
        let outcome = if success { "success" } else { "failure" };
        self.add(
            content,
            KnowledgeCategory::Command,
            metadata,
            vec!["execution".to_string(), outcome.to_string()],
        )
    }

    /// Record an error together with the fix that worked.
    fn add_error_pattern(&mut self, error: &str, solution: &str) -> String {
        let metadata = BTreeMap::from([
            ("error".to_string(), json!(error)),
            ("solution".to_string(), json!(solution)),
        ]);
        self.add(
            format!("Error: {error}\nSolution: {solution}"),
            KnowledgeCategory::ErrorPattern,
            metadata,
            vec!["error".to_string(), "solution".to_string()],
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryKnowledgeStore {
    entries: Vec<KnowledgeEntry>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fetch an entry by id, counting the access.
    pub fn get(&mut self, id: &str) -> Option<&KnowledgeEntry> {
        let entry = self.entries.iter_mut().find(|entry| entry.id == id)?;
        entry.access_count += 1;
        Some(entry)
    }
}

impl KnowledgeStore for InMemoryKnowledgeStore {
    fn add(
        &mut self,
        content: String,
        category: KnowledgeCategory,
        metadata: BTreeMap<String, Value>,
        tags: Vec<String>,
    ) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string()[..16].to_string();
        debug!(id = %id, ?category, "knowledge entry added");
        self.entries.push(KnowledgeEntry {
            id: id.clone(),
            content,
            category,
            metadata,
            tags,
            created_at: Utc::now(),
            access_count: 0,
        });
        id
    }

    fn search(&self, query: &KnowledgeQuery) -> Vec<KnowledgeEntry> {
        let mut found: Vec<KnowledgeEntry> = self
            .entries
            .iter()
            .filter(|entry| query.matches(entry))
            .cloned()
            .collect();
        // Stable sort keeps insertion order among equally used entries.
        found.sort_by(|a, b| b.access_count.cmp(&a.access_count));
        found.truncate(query.limit);
        found
    }
}
