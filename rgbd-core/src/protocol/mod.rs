//! Structured payloads carried inside packets.

pub mod metadata;

pub use metadata::SessionMetadata;
