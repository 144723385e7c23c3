//! Shared error definitions and small helpers used across all chatmux crates.

pub mod error;
pub mod redact;

pub use {
    error::{Error, FromMessage, Result},
    redact::{REDACTED, fingerprint},
};
