pub mod core;
pub mod llm;
pub mod rag;
pub mod research;
pub mod server;
pub mod state;
pub mod vector_math;
