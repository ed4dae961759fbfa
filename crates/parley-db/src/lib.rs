//! Durable storage layer for the Parley relay.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization
//! and embedded SQL migrations. The conversation log table is created
//! through the versioned migrations in this crate; query helpers live with
//! the code that owns the data (`parley-history`).
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: no external database process. WAL allows
//!   concurrent readers alongside the single background writer that drains
//!   the history write queue.
//! - **`r2d2` connection pool**: bounded connection reuse for the blocking
//!   tasks that touch the store.
//! - **Embedded migrations**: SQL files are compiled in with `include_str!`
//!   so the schema ships with the binary.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
