//! Password credentials. Only Argon2id PHC strings are ever stored; plaintexts stay in memory for
//! the duration of a single call and are never logged.
use crate::datastore::{structs::User, Datastore};
use crate::twoface::{Cause, DescribeErr, ExternalError, Fallible};
use actix_web::web::block;
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use rand::rngs::OsRng;
use tracing::info;

/// A well-formed hash nobody knows the password for. Verifying against it costs the same as
/// verifying against a real credential.
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Derive a salted hash suitable for storage. The work runs on the blocking thread pool, like
/// database calls.
pub async fn hash_password(plaintext: &str) -> Fallible<String> {
    let plaintext = plaintext.to_owned();
    block(move || hash_blocking(&plaintext))
        .await
        .describe_err(ExternalError::new(
            Cause::ServerError,
            "Couldn't store the password",
        ))?
}

fn hash_blocking(plaintext: &str) -> Fallible<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("failed to hash password: {}", e))
        .describe_err(ExternalError::new(
            Cause::ServerError,
            "Couldn't store the password",
        ))
}

/// Check a plaintext against a stored hash, off the async worker. No hash, or one that doesn't
/// parse, never matches.
pub async fn verify_password(stored: Option<String>, plaintext: &str) -> bool {
    let plaintext = plaintext.to_owned();
    block(move || verify_blocking(stored.as_deref(), &plaintext))
        .await
        .unwrap_or(false)
}

fn verify_blocking(stored: Option<&str>, plaintext: &str) -> bool {
    guard!(let Some(stored) = stored else {
        return false
    });
    guard!(let Ok(parsed) = PasswordHash::new(stored) else {
        return false
    });
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

/// Burn the same work as a real verification, for lookups that found no user.
pub async fn verify_nobody(plaintext: &str) -> bool {
    verify_password(Some(DUMMY_HASH.to_owned()), plaintext).await;
    false
}

/// Replace the user's credential.
pub async fn set_credential<DS: Datastore>(ds: &DS, user: &User, plaintext: &str) -> Fallible<()> {
    let hash = hash_password(plaintext).await?;
    ds.set_password_hash(user.id, hash).await?;
    info!(user_id = user.id, "credential updated");
    Ok(())
}

pub async fn verify_credential(user: &User, plaintext: &str) -> bool {
    verify_password(user.password_hash.clone(), plaintext).await
}
