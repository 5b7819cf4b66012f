pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod guard;
pub mod session;
pub mod template;
pub mod validation;

// Re-export the shared error type
pub use error::{ConsoleError, Result};
