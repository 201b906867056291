//! `jobvault-postgres` — PostgreSQL-backed job store.
//!
//! A thin façade over a shared, externally-managed PostgreSQL database: no
//! in-process locks, no caching, parameterized queries only. Claiming is
//! collapsed into a single conditional write (`FOR UPDATE SKIP LOCKED`) so
//! at most one worker ever transitions a given job out of Waiting, however
//! many processes share the table.

pub mod config;
mod row;
mod schema;
pub mod store;

pub use config::StoreConfig;
pub use store::PostgresJobStore;
