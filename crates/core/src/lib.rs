//! `jobvault-core` — job records, lifecycle, and the store contract.
//!
//! This crate defines the durable representation of a unit of work (the
//! [`Job`] record), its lifecycle states, the codec for opaque job
//! arguments, and the [`JobStore`] contract every backend implements.
//! An in-memory store is included for tests and development; durable
//! backends live in their own crates (e.g. `jobvault-postgres`).
//!
//! The store is deliberately thin: it records states and timestamps and
//! answers queries. Retry policy, handler execution, and worker scheduling
//! belong to the callers driving it.

pub mod args;
pub mod error;
pub mod id;
pub mod job;
pub mod memory;
pub mod state;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use id::JobId;
pub use job::{Job, now_ns};
pub use memory::InMemoryJobStore;
pub use state::JobState;
pub use store::{JobStore, ListRequest, ListResponse, Stats};
