//! DataLogger common types, keys, and errors.
//!
//! This crate provides foundational types shared across dl-core modules:
//! - Composite index keys and the reversible cache key codec
//! - The artifact tier chain
//! - Session identifiers for log correlation
//! - The unified error taxonomy

pub mod error;
pub mod id;
pub mod key;
pub mod schema;
pub mod tier;

pub use error::{Error, Result};
pub use id::SessionId;
pub use key::{decode_filename, decode_key, encode_key, CompositeKey};
pub use schema::CACHE_FORMAT_VERSION;
pub use tier::ArtifactTier;
