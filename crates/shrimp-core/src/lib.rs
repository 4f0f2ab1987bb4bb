//! Shared configuration and platform helpers for the Shrimp workspace.

pub mod config;
pub mod error;
pub mod platform;

pub use config::ShrimpConfig;
pub use error::{CoreError, Result};
pub use platform::{default_shell, Platform};
