pub mod auth;
pub mod commands;
pub mod config;
pub mod embed;
pub mod error;
pub mod ipc;
pub mod permission;
pub mod search;
pub mod store;
pub mod types;

pub use error::{GalleryError, Result};
pub use types::*;
