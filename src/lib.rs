//! AI-assisted personal bookmark manager
//!
//! Saving a URL fetches a readable rendition of the page through an
//! extraction service, classifies it with an LLM (category, tags, summary),
//! and persists the result as a note in SQLite. Browsing supports full-text
//! search over titles and descriptions, category OR-filters, tag
//! AND-filters, and sorting. Tag administration (rename, merge, delete)
//! rewrites notes transactionally.

pub mod actions;
pub mod app_state;
pub mod classifier;
pub mod db;
pub mod fetcher;
pub mod settings;
pub mod tags;
