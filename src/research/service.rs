//! Composition of retrieval, context assembly and generation.

use uuid::Uuid;

use super::generator::AnswerGenerator;
use super::types::{ResearchAnswer, ResearchRequest};
use crate::core::config::RetrievalSettings;
use crate::core::errors::ResearchError;
use crate::rag::{ContextAssembler, Passage, Retriever};

#[derive(Clone)]
pub struct ResearchService {
    retriever: Retriever,
    assembler: ContextAssembler,
    generator: AnswerGenerator,
    retrieval: RetrievalSettings,
}

impl ResearchService {
    pub fn new(
        retriever: Retriever,
        assembler: ContextAssembler,
        generator: AnswerGenerator,
        retrieval: RetrievalSettings,
    ) -> Self {
        Self {
            retriever,
            assembler,
            generator,
            retrieval,
        }
    }

    /// Only malformed requests fail. Store failures fall back to an empty
    /// retrieval and generation failures come back as a degraded answer.
    pub async fn research(&self, request: ResearchRequest) -> Result<ResearchAnswer, ResearchError> {
        let top_k = request.validate(self.retrieval.default_top_k, self.retrieval.max_query_chars)?;
        let request_id = Uuid::new_v4();
        let jurisdiction = request.jurisdiction();

        tracing::info!(
            %request_id,
            jurisdiction = jurisdiction.unwrap_or("<any>"),
            top_k,
            "Research request"
        );

        let passages: Vec<Passage> = match self.retriever.fetch(&request.query, jurisdiction, top_k).await {
            Ok(results) => results.into_iter().map(|scored| scored.passage).collect(),
            Err(ResearchError::Store(message)) => {
                tracing::warn!(%request_id, error = %message, "Retrieval failed; continuing without context");
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        let context = self.assembler.build(&passages);
        tracing::debug!(
            %request_id,
            retrieved = passages.len(),
            used = context.sources.len(),
            dropped = context.dropped,
            "Context assembled"
        );

        let answer = self.generator.answer(&request.query, context).await;
        if answer.is_degraded() {
            tracing::warn!(%request_id, "Research answer degraded");
        } else {
            tracing::info!(%request_id, sources = answer.sources.len(), "Research answer generated");
        }
        Ok(answer)
    }
}
