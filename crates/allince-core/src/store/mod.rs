//! User and session store implementations
//!
//! - `postgres`: sqlx-backed stores for production
//! - `memory`: process-local stores for tests and development

pub mod memory;
pub mod postgres;

pub use memory::{MemorySessionStore, MemoryUserStore};
pub use postgres::{connect, run_migrations, PgSessionStore, PgUserStore};
