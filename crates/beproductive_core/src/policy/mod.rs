//! Pure tier rules shared by every collection.

pub mod tier;
