//! Utility functions and helpers.
//!
//! Common functionality used across multiple dyps crates.

pub mod hash;
pub mod url;

// Re-export commonly used utilities
pub use hash::{blake3_hash, fingerprint};
pub use url::{is_url, normalize_source_url, short_name};
