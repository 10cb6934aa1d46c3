//! Store contracts and implementations.
//!
//! # Responsibility
//! - Define the two persistence contracts an item collection reconciles:
//!   a local key-file store and a remote document store.
//! - Ship one implementation of each (`FsLocalStore`, `SqliteDocumentStore`).
//!
//! # Invariants
//! - Store failures are values (`LocalStoreError`, `RemoteStoreError`), never
//!   panics or process exits.

pub mod local;
pub mod remote;
pub mod sqlite_remote;
