//! Domain layer types and invariants.

pub mod document;
pub mod login;
pub mod state;
