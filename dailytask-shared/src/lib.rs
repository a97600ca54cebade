//! # DailyTask Shared Library
//!
//! Domain types, persistence and business rules shared by the API server and
//! the reminder worker.
//!
//! ## Module Organization
//!
//! - `auth`: password hashing, tokens, identity verification, the request
//!   authentication gate and the authorization policy
//! - `db`: connection pool and embedded migrations
//! - `models`: users, tasks, comments and their SQL
//! - `services`: task lifecycle, comments, stats and user administration
//! - `storage`: attachment storage backends
//! - `error`: the service-level error type

pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;

/// Current version of the DailyTask shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
