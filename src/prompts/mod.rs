//! Prompt module for LLM-based operations.

pub mod match_summary;

pub use match_summary::*;
