//! Protocol definitions for the upstream image API.
//!
//! The upstream speaks the OpenAI ChatCompletions dialect with OpenRouter's
//! multimodal extensions (`message.images`).

pub mod openai;

pub use openai::OpenAIRole;
