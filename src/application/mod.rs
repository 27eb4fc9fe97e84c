//! Application services layer.

pub mod auth;
pub mod database;
pub mod error;
pub mod history;
pub mod profile;
pub mod repos;
pub mod tasks;
