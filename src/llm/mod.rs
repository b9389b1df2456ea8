pub mod openai;
pub mod provider;
pub mod retry;
pub mod types;

pub use openai::OpenAiCompatibleProvider;
pub use provider::LlmProvider;
pub use retry::RetryPolicy;
pub use types::{ChatMessage, ChatRequest};
