use std::{error, fmt};

use serde::{Serialize, Serializer};

/// The failure classes surfaced by the generator. Every error produced by
/// this crate carries exactly one of these tags.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    #[error("invalid-input")]
    InvalidInput,
    #[error("io-failure")]
    IoFailure,
    #[error("parse-failure")]
    ParseFailure,
    #[error("resolve-failure")]
    ResolveFailure,
    #[error("unsupported-shape")]
    UnsupportedShape,
    #[error("cancelled")]
    Cancelled,
    #[error("internal")]
    Internal,
}

pub type Result<T> = std::result::Result<T, Error>;

type Cause = Box<dyn error::Error + Send + Sync + 'static>;

/// A tagged error with an ordered key/value metadata bag and a causal chain.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    meta: Vec<(String, String)>,
    cause: Option<Cause>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
            meta: Vec::new(),
            cause: None,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidInput, message)
    }

    pub fn io_failure(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::IoFailure, message)
    }

    pub fn parse_failure(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::ParseFailure, message)
    }

    pub fn resolve_failure(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::ResolveFailure, message)
    }

    pub fn unsupported_shape(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::UnsupportedShape, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Cancelled, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Internal, message)
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.push((key.into(), value.into()));
        self
    }

    pub fn with_cause(mut self, cause: impl Into<Cause>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn meta(&self) -> &[(String, String)] {
        &self.meta
    }

    /// True when this error, or any error in its causal chain, is tagged
    /// `cancelled`.
    pub fn is_cancelled(&self) -> bool {
        if self.kind == ErrorKind::Cancelled {
            return true;
        }
        let mut cause = self.cause.as_deref().map(|c| c as &(dyn error::Error + 'static));
        while let Some(err) = cause {
            if let Some(own) = err.downcast_ref::<Error>() {
                if own.kind == ErrorKind::Cancelled {
                    return true;
                }
            }
            cause = err.source();
        }
        false
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fngen: [{}] {}", self.kind, self.message)?;
        if !self.meta.is_empty() {
            let pairs = self
                .meta
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, " ({pairs})")?;
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn error::Error + 'static))
    }
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::io_failure("io operation failed").with_cause(value)
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        // The cause chain is flattened to its rendering; metadata and the
        // tag survive untouched.
        Error {
            kind: self.kind,
            message: self.message.clone(),
            meta: self.meta.clone(),
            cause: self
                .cause
                .as_ref()
                .map(|c| Box::<dyn error::Error + Send + Sync>::from(c.to_string())),
        }
    }
}
