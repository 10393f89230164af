//! Crate-level tests that exercise several modules together.

pub mod support;

mod rag_ranking;
