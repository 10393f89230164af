//! Grounded question answering over ingested rulebooks.
//!
//! Retrieval and composition are separate steps: the [`Retriever`] ranks one
//! game's passages, the [`AnswerComposer`] turns them into a cited answer, and
//! the [`RagAgent`] runs both for a request.

pub mod agent;
pub mod citations;
pub mod compose;
pub mod retrieve;

pub use agent::{AskOptions, RagAgent};
pub use citations::{extract_citations, ParsedAnswer};
pub use compose::AnswerComposer;
pub use retrieve::Retriever;
