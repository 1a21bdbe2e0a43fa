//! Resolution requests produced by the input readers.

use thiserror::Error;

/// A single resolution request: a module at an exact version, or a module
/// whose newest version must still be chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Exact coordinates were requested.
    Module { path: String, version: String },
    /// No version given; the resolver picks the newest valid one.
    Latest { path: String },
}

impl Request {
    /// The module path this request refers to.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Module { path, .. } | Self::Latest { path } => path,
        }
    }
}

/// Terminal errors from a request stream.
///
/// An `Err` item ends its stream: the producing iterator yields nothing
/// after it.
#[derive(Error, Debug)]
pub enum RequestError {
    /// A line carried a malformed version after `@`.
    #[error("{label}:{line} invalid semver {literal}")]
    InvalidSemver {
        label: String,
        line: usize,
        literal: String,
    },

    /// The underlying reader failed.
    #[error("error scanning `{label}`: {source}")]
    Io {
        label: String,
        #[source]
        source: std::io::Error,
    },
}

/// A pull-based stream of resolution requests.
///
/// Streams are single-pass and not restartable; the first `Err` item is the
/// last item.
pub type RequestResult = Result<Request, RequestError>;
