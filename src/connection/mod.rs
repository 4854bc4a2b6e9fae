pub mod config;

pub use config::{ConnectionConfig, StorageLocation};
