//! # CollabTrack API Server Library
//!
//! HTTP surface of CollabTrack: accounts, projects with invitations, kanban
//! boards and live snapshot streams.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration from the environment
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Response security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
