//! `twoface::Error` pairs an internal error with a user-facing description. Users only ever see the
//! description; the internal half, which may name tables, hashes or tokens, is only logged.

mod extensions;
pub mod externalerror;
mod integrations;

pub use extensions::*;
pub use externalerror::{Cause, ExternalError};
use std::borrow::Cow;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Wraps a Rust error type with a user-facing description.
#[derive(Debug)]
pub struct TfError {
    /// The underlying error. May contain sensitive information, so it is never shown to users.
    pub internal: anyhow::Error,
    /// A user-friendly error that doesn't contain any sensitive information.
    pub external: ExternalError,
}

impl TfError {
    /// An error that originates in business rules rather than in a library, e.g. a rejected
    /// field. The internal half just repeats the external text.
    pub fn rejected(cause: Cause, text: impl Into<Cow<'static, str>>) -> Self {
        let external = ExternalError::new(cause, text);
        Self {
            internal: anyhow::anyhow!("rejected: {}", external),
            external,
        }
    }

    pub fn cause(&self) -> Cause {
        self.external.cause
    }
}

/// Displaying a twoface::Error will only display the external section.
impl Display for TfError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::result::Result<(), fmt::Error> {
        write!(f, "{}", self.external)
    }
}

/// Return type of a function that could fail. If it fails, it includes a twoface error (an error with
/// both internal- and external-facing values).
pub type Fallible<T> = Result<T, TfError>;
