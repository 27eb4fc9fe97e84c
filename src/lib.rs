//! todolist: a personal task tracker served over a JSON API, with an
//! offline layer that caches reads and queues writes while the server is
//! unreachable.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod offline;
