//! Discovery of projects to announce.
//!
//! A [`ContentProvider`] hands out one [`Content`] at a time and remembers
//! what it already handed out through an [`ossky_cache::Cache`].

mod content;
pub mod error;
mod github;

pub use crate::content::{Content, ContentProvider};
pub use crate::github::{DEFAULT_API_BASE, DEFAULT_REPUBLISH_AFTER, GithubProvider, GithubQuery, cache_key};
