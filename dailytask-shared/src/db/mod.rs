/// Database layer
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: embedded schema migrations
///
/// Query code lives beside each type in the crate-level `models` module.

pub mod migrations;
pub mod pool;
