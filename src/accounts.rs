//! Registration, login, profile lookups and edits, and password reset.
use crate::credentials;
use crate::datastore::{
    structs::{NewUser, ProfileChanges, User},
    Datastore,
};
use crate::mail::{self, Mailer};
use crate::session::Keys;
use crate::twoface::{Cause, Fallible, OrNotFound, TfError};
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info};

pub const MAX_USERNAME_CHARS: usize = 64;
pub const MAX_EMAIL_CHARS: usize = 120;
pub const MAX_ABOUT_ME_CHARS: usize = 140;

/// Same text for "no such user" and "wrong password".
pub const BAD_LOGIN: &str = "Invalid username or password";

lazy_static! {
    static ref EMAIL: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("couldn't compile EMAIL");
}

fn invalid(text: &'static str) -> TfError {
    TfError::rejected(Cause::UserInvalidField, text)
}

fn validate_username(username: &str) -> Fallible<()> {
    if username.trim().is_empty() {
        return Err(invalid("Username is required"));
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(invalid("Username must be at most 64 characters"));
    }
    Ok(())
}

fn validate_email(email: &str) -> Fallible<()> {
    if email.is_empty() {
        return Err(invalid("Email is required"));
    }
    if email.chars().count() > MAX_EMAIL_CHARS || !EMAIL.is_match(email) {
        return Err(invalid("Invalid email address"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Fallible<()> {
    if password.is_empty() {
        return Err(invalid("Password is required"));
    }
    Ok(())
}

pub async fn register<DS: Datastore>(
    ds: &DS,
    username: &str,
    email: &str,
    password: &str,
) -> Fallible<User> {
    let username = username.trim();
    let email = email.trim();
    validate_username(username)?;
    validate_email(email)?;
    validate_password(password)?;

    let user = ds
        .new_user(NewUser {
            username: username.to_owned(),
            email: email.to_owned(),
            password_hash: Some(credentials::hash_password(password).await?),
        })
        .await?;
    info!(user_id = user.id, username = &user.username[..], "registered user");
    Ok(user)
}

/// Unknown usernames and wrong passwords are indistinguishable to the caller, including in how
/// long the check takes.
pub async fn authenticate<DS: Datastore>(
    ds: &DS,
    username: &str,
    password: &str,
) -> Fallible<User> {
    let user = ds.find_user_by_username(username.trim()).await?;
    let verified = match &user {
        Some(user) => credentials::verify_credential(user, password).await,
        None => credentials::verify_nobody(password).await,
    };
    match user {
        Some(user) if verified => {
            debug!(user_id = user.id, "login succeeded");
            Ok(user)
        }
        _ => Err(TfError::rejected(Cause::UserBadAuth, BAD_LOGIN)),
    }
}

pub async fn find_by_username<DS: Datastore>(ds: &DS, username: &str) -> Fallible<User> {
    ds.find_user_by_username(username)
        .await?
        .or_not_found(format!("User {} not found.", username))
}

pub async fn find_by_id<DS: Datastore>(ds: &DS, user_id: i32) -> Fallible<User> {
    ds.get_user(user_id).await?.or_not_found("User not found.")
}

/// A requested profile edit, as submitted.
#[derive(Debug, Default, Clone)]
pub struct ProfileEdit {
    pub username: Option<String>,
    pub about_me: Option<String>,
}

pub async fn edit_profile<DS: Datastore>(ds: &DS, user: &User, edit: ProfileEdit) -> Fallible<User> {
    let mut changes = ProfileChanges::default();
    if let Some(username) = edit.username {
        let username = username.trim().to_owned();
        validate_username(&username)?;
        if username != user.username {
            changes.username = Some(username);
        }
    }
    if let Some(about_me) = edit.about_me {
        if about_me.chars().count() > MAX_ABOUT_ME_CHARS {
            return Err(invalid("About me must be at most 140 characters"));
        }
        changes.about_me = Some(Some(about_me).filter(|text| !text.trim().is_empty()));
    }
    let updated = ds
        .update_profile(user.id, changes)
        .await?
        .or_not_found("User not found.")?;
    info!(user_id = user.id, "profile updated");
    Ok(updated)
}

/// Email a reset token if someone owns this address. Callers can't tell whether anyone did.
pub async fn request_password_reset<DS: Datastore>(
    ds: &DS,
    keys: &Keys,
    mailer: Arc<dyn Mailer>,
    sender: &str,
    email: &str,
) -> Fallible<()> {
    let user = ds.find_user_by_email(email.trim()).await?;
    guard!(let Some(user) = user else {
        debug!("password reset requested for unknown email");
        return Ok(())
    });
    let token = keys.issue_reset_token(&user)?;
    mail::dispatch(mailer, mail::password_reset_email(sender, &user, &token));
    info!(user_id = user.id, "password reset email dispatched");
    Ok(())
}

pub async fn reset_password<DS: Datastore>(
    ds: &DS,
    keys: &Keys,
    token: &str,
    new_password: &str,
) -> Fallible<User> {
    let user_id = keys.reset_subject(token)?;
    validate_password(new_password)?;
    let user = ds.get_user(user_id).await?;
    guard!(let Some(user) = user else {
        return Err(TfError::rejected(
            Cause::UserBadAuth,
            "The password reset link is invalid or has expired",
        ))
    });
    credentials::set_credential(ds, &user, new_password).await?;
    find_by_id(ds, user.id).await
}
