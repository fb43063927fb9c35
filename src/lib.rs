pub mod archive;
pub mod commands;
pub mod config;
pub mod error;
pub mod observability;
pub mod store;
pub mod transfer;
