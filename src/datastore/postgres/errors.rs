use crate::datastore::{EMAIL_TAKEN, USERNAME_TAKEN};
use crate::twoface::{Cause, Describe, ExternalError, Fallible, TfError};
use actix_web::error::BlockingError;
use anyhow::anyhow;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// Convenience extension used to extract errors from `web::block`.
pub trait BlockingResp<T> {
    /// Convert the return from a web::block into a normal `Fallible<T>`.
    fn to_resp(self) -> Fallible<T>;
}

impl<T> BlockingResp<T> for Result<Fallible<T>, BlockingError> {
    fn to_resp(self) -> Fallible<T> {
        match self {
            Ok(t) => t,
            Err(_) => Err(anyhow!("DB operation cancelled").into()),
        }
    }
}

/// A unique index on `user` rejected a write that raced past the existence check.
pub fn describe_user_conflict(err: DieselError) -> TfError {
    let text = match &err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            match info.constraint_name() {
                Some(name) if name.contains("email") => EMAIL_TAKEN,
                _ => USERNAME_TAKEN,
            }
        }
        _ => return err.into(),
    };
    err.describe(ExternalError::new(Cause::UserConflict, text))
}
