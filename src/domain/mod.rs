//! Domain layer types and invariants.

pub mod csv;
pub mod entities;
pub mod error;
pub mod tasks;
pub mod types;
pub mod users;
