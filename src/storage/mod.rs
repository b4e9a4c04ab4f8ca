pub mod db;
mod keys;
pub mod models;
mod tables;

pub use db::{Database, DatabaseError};
pub use keys::{KeyStore, PROBE_KEY};
pub use tables::*;
