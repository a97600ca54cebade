//! # DailyTask API Server Library
//!
//! HTTP surface of DailyTask: users submit daily research tasks, reviewers
//! comment on them and admins approve or reject them.
//!
//! ## Modules
//!
//! - `app`: application state and router builder
//! - `config`: configuration from the environment
//! - `error`: error handling and HTTP response mapping
//! - `extract`: validating request extractors
//! - `middleware`: security headers and development error detail
//! - `routes`: route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
