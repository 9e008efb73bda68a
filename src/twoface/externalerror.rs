use actix_web::http::StatusCode;
use std::borrow::Cow;
use std::fmt;

/// Used to create HTTP responses with the given text and status code.
#[derive(Debug)]
pub struct ExternalError {
    /// A user-facing explanation of what caused the error.
    pub cause: Cause,
    /// Error text that will describe the problem to the user.
    pub text: Cow<'static, str>,
}

impl ExternalError {
    pub fn new(cause: Cause, text: impl Into<Cow<'static, str>>) -> Self {
        Self {
            cause,
            text: text.into(),
        }
    }
}

/// A user-facing explanation of what caused the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    ServerError,
    /// The request was well-formed but the action isn't allowed, e.g. following yourself.
    UserActionInvalid,
    UserBadAuth,
    UserConflict,
    UserInvalidField,
    NotFound,
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        // Make fmt::Display the same as fmt::Debug, i.e. each variant's name.
        write!(f, "{:?}", self)
    }
}

impl From<Cause> for StatusCode {
    /// Causes can be mapped to HTTP status codes. ExternalError doesn't use status codes directly,
    /// because some components (e.g. the Datastore) shouldn't need to know about HTTP codes.
    fn from(cause: Cause) -> Self {
        match cause {
            Cause::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Cause::UserActionInvalid => StatusCode::BAD_REQUEST,
            Cause::UserInvalidField => StatusCode::BAD_REQUEST,
            Cause::UserBadAuth => StatusCode::UNAUTHORIZED,
            Cause::UserConflict => StatusCode::CONFLICT,
            Cause::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl fmt::Display for ExternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}: {}", self.cause, self.text)
    }
}

impl Default for ExternalError {
    // Default to ServerError and a very vague generic message.
    fn default() -> Self {
        Self::new(Cause::ServerError, "Internal server error")
    }
}
