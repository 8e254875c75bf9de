//! Error types for the Atomics resource client.
//!
//! # Design
//! One enum covers every failure a lookup can hit, grouped by the stage that
//! raises it: configuration and validation errors surface before any request
//! is built, transport and HTTP errors come from the round-trip, and XML and
//! malformed-response errors come from mapping the body. Nothing is retried
//! and partial results are never returned.

use thiserror::Error;

/// Errors returned by query construction, URL composition, transport and
/// response mapping.
#[derive(Debug, Error)]
pub enum AtomicsError {
    /// The record class names a service that is missing from `Endpoints`.
    #[error("no endpoint configured for service `{0}`")]
    UnknownService(String),

    /// A positional condition has a different number of `?` markers than
    /// substitution values.
    #[error("condition has {placeholders} placeholder(s) but {values} value(s)")]
    PlaceholderMismatch { placeholders: usize, values: usize },

    /// A printf-style condition could not be expanded.
    #[error("invalid condition format: {0}")]
    Format(String),

    /// The endpoint configuration could not be read or decoded.
    #[error("endpoint configuration: {0}")]
    Config(String),

    /// The request never produced an HTTP response.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The service answered with a non-200 status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body is not well-formed XML.
    #[error("response is not well-formed XML: {0}")]
    Xml(String),

    /// A `record` or `field` element lacks the children the mapper expects.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Dynamic attribute read for a key the record does not carry.
    #[error("undefined attribute `{0}`")]
    NoSuchAttribute(String),
}

impl From<roxmltree::Error> for AtomicsError {
    fn from(e: roxmltree::Error) -> Self {
        AtomicsError::Xml(e.to_string())
    }
}

impl From<ureq::Error> for AtomicsError {
    fn from(e: ureq::Error) -> Self {
        AtomicsError::Transport(e.to_string())
    }
}
