//! Core pipeline orchestration and domain logic for Songbook.
//!
//! This crate ties together parsing, name resolution, optional metadata
//! enrichment, and catalog assembly into the end-to-end `build` workflow.

pub mod assembler;
pub mod enrichment;
pub mod openrouter;
pub mod pipeline;
