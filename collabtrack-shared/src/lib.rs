//! # CollabTrack Shared Library
//!
//! Domain types and business logic behind the CollabTrack API server.
//!
//! ## Module Organization
//!
//! - `db`: connection pool and embedded migrations
//! - `models`: database models (users, projects, tasks, teams, one-time tokens)
//! - `auth`: passwords, session tokens, bearer middleware, authorization, navigation gate
//! - `membership`: project roster rules (invite, join, remove)
//! - `board`: Kanban columns, search filter and drag-and-drop ranks
//! - `live`: change notifications for live queries
//! - `mail`: outgoing verification, reset and invitation emails

pub mod auth;
pub mod board;
pub mod db;
pub mod live;
pub mod mail;
pub mod membership;
pub mod models;

/// Current version of the CollabTrack shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
