//! Domain model for note/goal collections.
//!
//! # Responsibility
//! - Define the store-agnostic item shape shared by notes and goals.
//! - Define persisted record shapes for the local and remote stores.
//!
//! # Invariants
//! - Every item is identified by an id unique across both stores.
//! - Every item is owned by exactly one store at a time.

pub mod category;
pub mod goal;
pub mod item;
pub mod record;
