//! Text-completion provider layer for finagent
//!
//! The pipeline only needs plain text in and plain text out, so this crate
//! keeps a small provider-agnostic surface:
//!
//! - Message types for a chat-style exchange
//! - Completion request/response types
//! - The [`LLMProvider`] trait
//! - Anthropic and OpenAI-compatible providers (behind feature flags)

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;

pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{ContentBlock, Message, MessageContent, Role};
pub use provider::LLMProvider;

#[cfg(any(feature = "anthropic", feature = "openai"))]
pub mod providers;
