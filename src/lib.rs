pub mod api;
pub mod config;
pub mod error;
pub mod progress;
pub mod pronunciation;
pub mod quiz;
pub mod store;
pub mod student;
pub mod utils;
