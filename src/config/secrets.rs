//! Secret handling utilities.
//!
//! Re-exports the secrecy types orderq wraps its credentials in.

pub use secrecy::{ExposeSecret, SecretString};
