//! # ragchat-cli
//!
//! Terminal front end for ragchat: `ragchat ingest` builds the knowledge base
//! from a directory of documents and `ragchat chat` answers questions about it
//! in an interactive session.

pub mod app;
pub mod cli;
pub mod logging;
pub mod repl;
