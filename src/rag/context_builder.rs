//! Context assembly.
//!
//! Turns ranked passages into the context block handed to the model:
//! 1. One labelled block per passage, highest-ranked first
//! 2. A character budget; lowest-ranked blocks are dropped first
//! 3. A fixed sentinel when there is no evidence at all

use serde::{Deserialize, Serialize};

use super::store::Passage;
use crate::core::config::defaults::DEFAULT_MAX_CONTEXT_CHARS;

/// Handed to the model instead of an empty context.
pub const NO_DOCUMENTS_SENTINEL: &str = "No relevant documents found in the knowledge base.";

const UNTITLED: &str = "Untitled";
const UNKNOWN_SOURCE: &str = "Unknown Source";
const TRUNCATION_MARKER: &str = "…";
const BLOCK_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBuilderConfig {
    /// Maximum total context length in characters
    pub max_context_chars: usize,
}

impl Default for ContextBuilderConfig {
    fn default() -> Self {
        Self {
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

/// Context text plus the passages that actually made it in.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub text: String,
    pub sources: Vec<Passage>,
    /// Passages left out by the budget.
    pub dropped: usize,
}

impl AssembledContext {
    pub fn has_evidence(&self) -> bool {
        !self.sources.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContextAssembler {
    config: ContextBuilderConfig,
}

impl ContextAssembler {
    pub fn new(config: ContextBuilderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextBuilderConfig {
        &self.config
    }

    /// Builds the context from passages in ranked order.
    ///
    /// Never returns empty text. When even the top passage exceeds the budget
    /// its body is cut to fit, so the best evidence is never lost entirely.
    pub fn build(&self, passages: &[Passage]) -> AssembledContext {
        if passages.is_empty() {
            return AssembledContext {
                text: NO_DOCUMENTS_SENTINEL.to_string(),
                sources: Vec::new(),
                dropped: 0,
            };
        }

        let max_chars = self.config.max_context_chars;
        let mut context = String::new();
        let mut used_chars = 0;
        let mut sources = Vec::new();

        for passage in passages {
            let block = format_block(passage, &passage.text);
            let block_chars = block.chars().count();

            if used_chars + block_chars <= max_chars {
                context.push_str(&block);
                used_chars += block_chars;
                sources.push(passage.clone());
                continue;
            }

            if sources.is_empty() {
                context.push_str(&truncated_block(passage, max_chars));
                sources.push(passage.clone());
            }
            break;
        }

        let dropped = passages.len() - sources.len();
        if dropped > 0 {
            tracing::debug!(
                kept = sources.len(),
                dropped,
                max_chars,
                "Context budget reached"
            );
        }

        AssembledContext {
            text: context.trim_end().to_string(),
            sources,
            dropped,
        }
    }
}

fn format_block(passage: &Passage, body: &str) -> String {
    format!(
        "{}{}{}",
        block_header(passage),
        body,
        BLOCK_SEPARATOR
    )
}

fn block_header(passage: &Passage) -> String {
    let title = non_blank_or(&passage.title, UNTITLED);
    let source = non_blank_or(&passage.source, UNKNOWN_SOURCE);
    format!("SOURCE: {} ({})\nCONTENT: ", title, source)
}

fn truncated_block(passage: &Passage, max_chars: usize) -> String {
    let header = block_header(passage);
    let marker_chars = TRUNCATION_MARKER.chars().count();
    let overhead = header.chars().count() + marker_chars + BLOCK_SEPARATOR.chars().count();

    // Header alone is over budget: cut the whole block.
    if overhead > max_chars {
        let mut block: String = format!("{}{}", header, passage.text)
            .chars()
            .take(max_chars.saturating_sub(marker_chars))
            .collect();
        block.push_str(TRUNCATION_MARKER);
        return block;
    }

    let body_chars = max_chars - overhead;
    let mut body: String = passage.text.chars().take(body_chars).collect();
    body.push_str(TRUNCATION_MARKER);
    format_block(passage, &body)
}

fn non_blank_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_passage(id: &str, text: &str) -> Passage {
        Passage::new(id, text, "all", format!("Title {}", id), "Statute")
    }

    #[test]
    fn empty_input_yields_sentinel() {
        let context = ContextAssembler::default().build(&[]);

        assert_eq!(context.text, NO_DOCUMENTS_SENTINEL);
        assert!(!context.text.is_empty());
        assert!(!context.has_evidence());
        assert!(context.text.to_lowercase().contains("no relevant documents found"));
    }

    #[test]
    fn blocks_follow_ranked_order_with_attribution() {
        let context = ContextAssembler::default().build(&[
            make_passage("a", "First body."),
            make_passage("b", "Second body."),
        ]);

        assert_eq!(
            context.text,
            "SOURCE: Title a (Statute)\nCONTENT: First body.\n\nSOURCE: Title b (Statute)\nCONTENT: Second body."
        );
        assert_eq!(context.sources.len(), 2);
        assert_eq!(context.dropped, 0);
    }

    #[test]
    fn blank_metadata_renders_placeholders() {
        let passage = Passage::new("x", "Body", "all", "", " ");
        let context = ContextAssembler::default().build(&[passage]);
        assert!(context.text.starts_with("SOURCE: Untitled (Unknown Source)\n"));
    }

    #[test]
    fn budget_drops_lowest_ranked_passages_first() {
        let passages = vec![
            make_passage("a", &"a".repeat(40)),
            make_passage("b", &"b".repeat(40)),
            make_passage("c", &"c".repeat(40)),
        ];
        // each block is 40 body chars + 37 chars of framing
        let assembler = ContextAssembler::new(ContextBuilderConfig {
            max_context_chars: 160,
        });

        let context = assembler.build(&passages);

        let ids: Vec<&str> = context.sources.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(context.dropped, 1);
        assert!(context.text.contains(&"b".repeat(40)));
        assert!(!context.text.contains('c'.to_string().repeat(40).as_str()));
        assert!(context.text.chars().count() <= 160);
    }

    #[test]
    fn oversized_top_passage_is_cut_to_fit() {
        let passages = vec![make_passage("a", &"é".repeat(500)), make_passage("b", "short")];
        let assembler = ContextAssembler::new(ContextBuilderConfig {
            max_context_chars: 100,
        });

        let context = assembler.build(&passages);

        assert_eq!(context.sources.len(), 1);
        assert_eq!(context.sources[0].id, "a");
        assert_eq!(context.dropped, 1);
        assert!(context.text.ends_with(TRUNCATION_MARKER));
        assert!(context.text.chars().count() <= 100);
    }

    #[test]
    fn header_longer_than_budget_is_cut_too() {
        let passage = Passage::new("long", "Body text.", "all", "T".repeat(200), "Statute");
        let assembler = ContextAssembler::new(ContextBuilderConfig {
            max_context_chars: 100,
        });

        let context = assembler.build(&[passage]);

        assert_eq!(context.sources.len(), 1);
        assert!(context.text.starts_with("SOURCE: TTT"));
        assert!(context.text.ends_with(TRUNCATION_MARKER));
        assert_eq!(context.text.chars().count(), 100);
    }
}
