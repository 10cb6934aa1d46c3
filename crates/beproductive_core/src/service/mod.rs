//! Collection use-cases on top of the stores.

pub mod collection;
pub mod selection;
pub mod view;
