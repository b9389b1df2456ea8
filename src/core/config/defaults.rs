//! Built-in defaults for every configurable knob.

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8001;

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_MAX_QUERY_CHARS: usize = 4_000;
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 6_000;

pub const DEFAULT_EMBEDDING_DIMENSION: usize = 512;
pub const DEFAULT_HASHING_MODEL: &str = "feature-hash-v1";

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4-turbo-preview";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_MAX_TOKENS: u32 = 1_500;
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 500;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 8_000;
