//! Data layer module
//!
//! SQLite persistence for users, linked osu! players and their
//! statistics snapshots.

mod database;
mod models;

pub use database::{Database, LinkedPlayer};
pub use models::*;

#[cfg(test)]
mod database_test;
