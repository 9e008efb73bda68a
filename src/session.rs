//! Signed, self-expiring tokens: session tokens returned by login, and password reset tokens sent
//! by email. Both are HS256 JWTs signed with the configured secret key, with claim sets that can't
//! be mistaken for one another.
use crate::datastore::{structs::User, Datastore};
use crate::twoface::{Cause, DescribeErr, ExternalError, Fallible, TfError};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use chrono::{offset::Utc, DateTime, Duration, TimeZone};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use anyhow::{anyhow, Context};
use std::fmt;

pub const BAD_SESSION: &str = "Please log in again";

pub struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    session_ttl: Duration,
    reset_ttl: Duration,
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys")
            .field("session_ttl", &self.session_ttl)
            .field("reset_ttl", &self.reset_ttl)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct SessionClaims {
    user_id: i32,
    exp: i64,
}

#[derive(Serialize, Deserialize, Debug)]
struct ResetClaims {
    reset_password: i32,
    exp: i64,
}

/// What login hands back to the client.
#[derive(Serialize, Deserialize, Debug)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Keys {
    pub fn new(secret: &str, session_ttl_secs: u64, reset_ttl_secs: u64) -> anyhow::Result<Self> {
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            session_ttl: ttl(session_ttl_secs).context("session_ttl_secs is out of range")?,
            reset_ttl: ttl(reset_ttl_secs).context("reset_token_ttl_secs is out of range")?,
        })
    }

    pub fn issue_session(&self, user: &User) -> Fallible<SessionToken> {
        let expires_at = expiry(self.session_ttl)?;
        let claims = SessionClaims {
            user_id: user.id,
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        Ok(SessionToken {
            token,
            // Round to whole seconds, like the token itself.
            expires_at: Utc
                .timestamp_opt(claims.exp, 0)
                .single()
                .unwrap_or(expires_at),
        })
    }

    /// The user id a valid, unexpired session token was issued to.
    pub fn session_subject(&self, token: &str) -> Fallible<i32> {
        let data = decode::<SessionClaims>(token, &self.decoding, &Validation::default())
            .describe_err(ExternalError::new(Cause::UserBadAuth, BAD_SESSION))?;
        Ok(data.claims.user_id)
    }

    pub fn issue_reset_token(&self, user: &User) -> Fallible<String> {
        let claims = ResetClaims {
            reset_password: user.id,
            exp: expiry(self.reset_ttl)?.timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// The user id a valid, unexpired reset token was issued to.
    pub fn reset_subject(&self, token: &str) -> Fallible<i32> {
        let data = decode::<ResetClaims>(token, &self.decoding, &Validation::default())
            .describe_err(ExternalError::new(
                Cause::UserBadAuth,
                "The password reset link is invalid or has expired",
            ))?;
        Ok(data.claims.reset_password)
    }
}

fn ttl(secs: u64) -> Option<Duration> {
    i64::try_from(secs).ok().and_then(Duration::try_seconds)
}

fn expiry(ttl: Duration) -> anyhow::Result<DateTime<Utc>> {
    Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| anyhow!("token lifetime {} overflows the clock", ttl))
}

/// Resolve the bearer token to the user making this request, and record their activity.
/// Handlers pass the returned user explicitly into every operation. A request without an
/// `Authorization: Bearer` header gets the same rejection as one with a bad token.
pub async fn current_user<DS: Datastore>(
    ds: &DS,
    keys: &Keys,
    credentials: Option<&BearerAuth>,
) -> Fallible<User> {
    guard!(let Some(credentials) = credentials else {
        return Err(TfError::rejected(Cause::UserBadAuth, BAD_SESSION))
    });
    let user_id = keys.session_subject(credentials.token())?;
    let user = ds.get_user(user_id).await?;
    guard!(let Some(mut user) = user else {
        return Err(TfError::rejected(Cause::UserBadAuth, BAD_SESSION))
    });
    let now = Utc::now();
    ds.touch_last_seen(user.id, now).await?;
    user.last_seen = now;
    Ok(user)
}
