/// Middleware modules for the API server
///
/// - `security`: security response headers
/// - `error_detail`: internal error causes in development responses

pub mod error_detail;
pub mod security;
