//! In-memory key-value storage.
//!
//! The map lives inside a single actor task and is reachable only through
//! the [`Store`] handle, so all operations are serialized and data races are
//! impossible by construction.

mod actor;

pub use actor::Store;
