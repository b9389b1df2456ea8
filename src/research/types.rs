use serde::{Deserialize, Serialize};

use crate::core::errors::{GenerationError, ResearchError};
use crate::rag::Passage;

/// Text shown in place of an answer when generation fails.
pub const DEGRADED_ANSWER: &str = "Failed to generate research results due to an error.";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    /// Signed so that negative values from callers surface as `InvalidArgument`
    /// rather than a deserialization failure.
    #[serde(default)]
    pub top_k: Option<i64>,
}

impl ResearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.jurisdiction = Some(jurisdiction.into());
        self
    }

    pub fn with_top_k(mut self, top_k: i64) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Checks the request and resolves the effective `top_k`.
    pub fn validate(&self, default_top_k: usize, max_query_chars: usize) -> Result<usize, ResearchError> {
        if self.query.trim().is_empty() {
            return Err(ResearchError::invalid("query must not be empty"));
        }
        let query_chars = self.query.chars().count();
        if query_chars > max_query_chars {
            return Err(ResearchError::invalid(format!(
                "query is {} characters long; the limit is {}",
                query_chars, max_query_chars
            )));
        }
        match self.top_k {
            None => Ok(default_top_k),
            Some(k) if k > 0 => Ok(k as usize),
            Some(k) => Err(ResearchError::invalid(format!(
                "top_k must be a positive integer, got {}",
                k
            ))),
        }
    }

    /// Blank jurisdictions count as absent.
    pub fn jurisdiction(&self) -> Option<&str> {
        self.jurisdiction
            .as_deref()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Generated { text: String },
    Degraded { message: String, error: GenerationError },
}

/// Result of one research request. Never persisted.
#[derive(Debug, Clone)]
pub struct ResearchAnswer {
    pub query: String,
    pub sources: Vec<Passage>,
    pub outcome: GenerationOutcome,
}

impl ResearchAnswer {
    pub fn is_degraded(&self) -> bool {
        matches!(self.outcome, GenerationOutcome::Degraded { .. })
    }

    pub fn text(&self) -> &str {
        match &self.outcome {
            GenerationOutcome::Generated { text } => text,
            GenerationOutcome::Degraded { message, .. } => message,
        }
    }

    pub fn error(&self) -> Option<&GenerationError> {
        match &self.outcome {
            GenerationOutcome::Generated { .. } => None,
            GenerationOutcome::Degraded { error, .. } => Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAttribution {
    pub jurisdiction: String,
    pub title: String,
    pub source: String,
}

impl From<&Passage> for SourceAttribution {
    fn from(passage: &Passage) -> Self {
        Self {
            jurisdiction: passage.jurisdiction.clone(),
            title: passage.title.clone(),
            source: passage.source.clone(),
        }
    }
}

/// Wire shape returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResponse {
    pub answer: String,
    pub sources: Vec<SourceAttribution>,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ResearchAnswer> for ResearchResponse {
    fn from(answer: ResearchAnswer) -> Self {
        Self {
            answer: answer.text().to_string(),
            sources: answer.sources.iter().map(SourceAttribution::from).collect(),
            error: answer.error().map(ToString::to_string),
            query: answer.query,
        }
    }
}
