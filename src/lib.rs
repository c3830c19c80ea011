//! Real-time voice conversation client with mid-conversation tool calls.
//!
//! Microphone audio streams to a live model session; the model's audio is
//! played back with barge-in support, and function calls it requests are
//! resolved and executed by [`tools::ToolExecutionEngine`] before the
//! results go back into the conversation.

pub mod audio;
pub mod config;
pub mod console;
pub mod conversation;
pub mod llm;
pub mod pipeline;
pub mod session;
pub mod tools;
