/// Domain services
///
/// Each function takes the pool, the caller's `AuthContext` and plain inputs,
/// applies the authorization policy, and returns a `ServiceResult`. HTTP
/// handlers are thin wrappers around these.
///
/// - `lifecycle`: task submission and status transitions
/// - `comments`: review comments
/// - `stats`: dashboard aggregates
/// - `users`: registration, login and user administration

pub mod comments;
pub mod lifecycle;
pub mod stats;
pub mod users;
