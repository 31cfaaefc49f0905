//! Append-only JSONL stream of run events with graceful degradation.

pub mod jsonl;
