//! Streamlex - streaming rule-based tokenizer
//!
//! A lexing primitive that converts incrementally delivered text chunks
//! into typed tokens using an ordered list of matching rules:
//!
//! - Rules are literals, anchored regex patterns, or predicates, tried in
//!   registration order (first match wins)
//! - Chunk boundaries never change the emitted tokens: ambiguous input is
//!   buffered until more input or an explicit flush resolves it
//! - Synchronous callback emission, one call per token, left to right
//! - Per-kind ignore flags for skipping delivery of noise tokens
//!
//! See [`Tokenizer`] for the incremental buffering contract and a usage
//! example.

pub mod core;

pub use core::{
    PredicateFn, RuleDef, RuleTest, Token, Tokenizer, TokenizerError, IDENTIFIER_PATTERN,
    INTEGER_PATTERN, NUMBER_PATTERN, STRING_PATTERN, WHITESPACE_PATTERN,
};
