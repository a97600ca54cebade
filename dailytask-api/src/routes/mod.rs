/// API route handlers, organized by resource:
///
/// - `health`: health check
/// - `users`: accounts, login and user administration
/// - `tasks`: submission, listing, status transitions and stats
/// - `comments`: review comments on tasks
/// - `files`: serving stored attachments

pub mod comments;
pub mod files;
pub mod health;
pub mod tasks;
pub mod users;
