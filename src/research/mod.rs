//! Research pipeline: retrieve, assemble context, generate a cited answer.

pub mod generator;
pub mod service;
pub mod types;

pub use generator::AnswerGenerator;
pub use service::ResearchService;
pub use types::{
    GenerationOutcome, ResearchAnswer, ResearchRequest, ResearchResponse, SourceAttribution,
    DEGRADED_ANSWER,
};
