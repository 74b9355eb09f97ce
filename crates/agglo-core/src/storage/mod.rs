//! # Storage
//!
//! Persistent RAG backends.

mod redb_rag;

pub use redb_rag::RedbRag;
