//! Core pipeline orchestration for csvagent.
//!
//! This crate ties together input discovery, dataset merging, the embedded
//! query engine, and the language model into the end-to-end `ask` workflow.

pub mod answer;
pub mod pipeline;
pub mod prompts;
pub mod query;

#[cfg(test)]
mod testing;

pub use csvagent_discovery::InputRequest;
pub use pipeline::{
    AskConfig, AskResult, DatasetSummary, ProgressReporter, SilentProgress, ask, describe,
};
