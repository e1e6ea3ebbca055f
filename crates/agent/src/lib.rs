//! Agent Runtime - model calls behind the quoting interview
//!
//! This crate connects the interview session from `quoteflow-core` to the
//! remote completion service:
//! - Extracts the JSON payload from noisy model text (`extract`)
//! - Sends one system + user turn per call and classifies failures (`llm`, `openai`)
//! - Drives the session through its model calls and archives finished
//!   interviews in the background (`runtime`)
//!
//! # Safety Principle
//!
//! Model output is untrusted. It is decoded here and validated into typed
//! questions and quotes by the core before the session accepts it.

pub mod extract;
pub mod llm;
pub mod openai;
pub mod runtime;

pub use extract::{ExtractionError, StructuredOutputExtractor};
pub use llm::{GatewayError, ModelGateway};
pub use openai::HttpModelGateway;
pub use runtime::InterviewRuntime;
