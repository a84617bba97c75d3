//! Database layer for Ward

mod connection;
mod migrations;

pub use connection::Database;
