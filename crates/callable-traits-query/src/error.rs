use callable_traits_types::{DomainFailure, ProtocolError};

/// Errors that can occur while parsing, querying or transforming callables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("parse error at offset {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("`{ty}` is not callable")]
    NotCallable { ty: String },

    #[error("`{class}` declares {count} call operators, so its signature is ambiguous")]
    AmbiguousCallOperator { class: String, count: usize },

    #[error("`{class}` inherits call operators from more than one base, so lookup is ambiguous")]
    AmbiguousBaseLookup { class: String },

    #[error("argument index {index} is out of range for a callable of arity {arity}")]
    ArgumentIndexOutOfRange { index: usize, arity: usize },

    #[error("unknown query `{0}`")]
    UnknownQuery(String),

    #[error(transparent)]
    Domain(#[from] DomainFailure),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Result type for callable-traits operations.
pub type Result<T> = std::result::Result<T, Error>;
