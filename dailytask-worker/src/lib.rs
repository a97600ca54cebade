//! # DailyTask Worker
//!
//! Background process that sends the daily "submit your task" reminder.
//! It shares the database models with the API but never serves requests.
//!
//! ## Modules
//!
//! - `config`: environment configuration
//! - `mailer`: reminder messages and the delivery trait
//! - `reminder`: candidate selection, the scan and the daily scheduler

pub mod config;
pub mod mailer;
pub mod reminder;
