pub mod config;
pub mod summary;
