//! Conversation data model and the wire contract of the answering service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::disclosure::DisclosureId;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A citation pointing at a retrieved document chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: String,
    pub section_id: String,
    pub chunk_id: String,
    /// Retrieval relevance, always within `[0, 1]`.
    #[serde(default, deserialize_with = "deserialize_relevance")]
    pub relevance: f64,
}

impl SourceRef {
    /// Create a citation, clamping `relevance` into `[0, 1]`.
    pub fn new(
        title: impl Into<String>,
        section_id: impl Into<String>,
        chunk_id: impl Into<String>,
        relevance: f64,
    ) -> Self {
        Self {
            title: title.into(),
            section_id: section_id.into(),
            chunk_id: chunk_id.into(),
            relevance: clamp_relevance(relevance),
        }
    }

    /// Relevance as a rounded whole percentage.
    pub fn relevance_percent(&self) -> u8 {
        // relevance is clamped, so the product is within 0..=100
        (self.relevance * 100.0).round() as u8
    }

    /// `Section <section_id> • Chunk <chunk_id>`
    pub fn meta_line(&self) -> String {
        format!("Section {} • Chunk {}", self.section_id, self.chunk_id)
    }
}

fn clamp_relevance(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn deserialize_relevance<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw.map_or(0.0, clamp_relevance))
}

/// Label for a collapsed citation list, e.g. `3 sources referenced`.
pub fn sources_label(count: usize) -> String {
    if count == 1 {
        "1 source referenced".to_string()
    } else {
        format!("{count} sources referenced")
    }
}

/// One message unit in the conversation record.
///
/// Turns are built by the request lifecycle and never change after being
/// appended to history.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub sources: Vec<SourceRef>,
    pub rephrased_query: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Disclosure widget for this turn's citations, if it has any.
    pub disclosure: Option<DisclosureId>,
}

impl Turn {
    /// A user question.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: Vec::new(),
            rephrased_query: None,
            created_at: Utc::now(),
            disclosure: None,
        }
    }

    /// An assistant answer.
    pub fn assistant(
        content: impl Into<String>,
        sources: Vec<SourceRef>,
        rephrased_query: Option<String>,
        disclosure: Option<DisclosureId>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources,
            rephrased_query,
            created_at: Utc::now(),
            disclosure,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }

    /// Wire representation sent back to the service as history.
    pub fn to_entry(&self) -> HistoryEntry {
        HistoryEntry {
            kind: self.role,
            content: self.content.clone(),
            sources: match self.role {
                Role::User => None,
                Role::Assistant => Some(self.sources.clone()),
            },
            timestamp: self.created_at,
        }
    }
}

// ============================================================================
// Wire contract
// ============================================================================

/// One element of `conversation_history` in a `/chat` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub kind: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceRef>>,
    /// ISO-8601 on the wire.
    pub timestamp: DateTime<Utc>,
}

/// `POST /chat` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    pub conversation_history: Vec<HistoryEntry>,
}

/// `POST /chat` success body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
    #[serde(default)]
    pub rephrased_query: Option<String>,
}
