//! Snapshot persistence for the CLI
//!
//! The library itself only reports progress through callbacks; the CLI
//! wires those callbacks to a [`BookStore`].

pub mod book_store;

pub use book_store::{BookStore, BookSummary};
