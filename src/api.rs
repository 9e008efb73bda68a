use crate::datastore::{
    postfilters::Page,
    structs::{Post, User},
};
use crate::mail::Mailer;
use crate::metrics;
use crate::session::Keys;
use crate::twoface::{Cause, Fallible, TfError};
use chrono::{offset::Utc, DateTime};
use actix_web::web;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub mod userfacing;

/// Everything a handler needs. The current user is deliberately not in here: it's resolved from
/// each request's bearer token and passed along explicitly.
pub struct State<DS> {
    pub ds: Arc<DS>,
    pub keys: Arc<Keys>,
    pub mailer: Arc<dyn Mailer>,
    pub mail_sender: String,
    pub posts_per_page: u32,
}

impl<DS> Clone for State<DS> {
    fn clone(&self) -> Self {
        Self {
            ds: Arc::clone(&self.ds),
            keys: Arc::clone(&self.keys),
            mailer: Arc::clone(&self.mailer),
            mail_sender: self.mail_sender.clone(),
            posts_per_page: self.posts_per_page,
        }
    }
}

impl<DS> State<DS> {
    fn page(&self, query: &PageQuery) -> Page {
        Page::new(query.page.unwrap_or(1), self.posts_per_page)
    }
}

/// JSON bodies up to `limit` bytes. Bodies that can't be read or parsed get the usual error JSON.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| {
            debug!("rejected request body: {}", err);
            TfError::rejected(Cause::UserInvalidField, "Invalid request body").into()
        })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        debug!("rejected path: {}", err);
        TfError::rejected(Cause::UserInvalidField, "Invalid path").into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        debug!("rejected query string: {}", err);
        TfError::rejected(Cause::UserInvalidField, "Invalid query string").into()
    })
}

/// `?page=N`, 1-based.
#[derive(Deserialize, Debug, Default)]
pub struct PageQuery {
    pub page: Option<u32>,
}

/// A user as other users see them: no email, no credential.
#[derive(Serialize, Deserialize, Eq, PartialEq, Debug)]
pub struct UserFacingUser {
    pub id: i32,
    pub username: String,
    pub about_me: Option<String>,
    pub last_seen: DateTime<Utc>,
}

impl From<User> for UserFacingUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            about_me: u.about_me,
            last_seen: u.last_seen,
        }
    }
}

/// A user as they see themselves.
#[derive(Serialize, Deserialize, Eq, PartialEq, Debug)]
pub struct OwnAccount {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub about_me: Option<String>,
    pub last_seen: DateTime<Utc>,
}

impl From<User> for OwnAccount {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            about_me: u.about_me,
            last_seen: u.last_seen,
        }
    }
}

#[derive(Serialize, Deserialize, Eq, PartialEq, Debug)]
pub struct UserFacingPost {
    pub id: i32,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub author_id: i32,
}

impl From<Post> for UserFacingPost {
    fn from(p: Post) -> Self {
        Self {
            id: p.id,
            body: p.body,
            timestamp: p.timestamp,
            author_id: p.user_id,
        }
    }
}

pub trait CoerceColl<T>
where
    Self: IntoIterator<Item = T>,
{
    fn coerce_into<U: From<T>>(self) -> Vec<U>;
}

impl<T> CoerceColl<T> for Vec<T> {
    fn coerce_into<U: From<T>>(self) -> Vec<U> {
        self.into_iter().map(|v| v.into()).collect()
    }
}

/// Execute the closure, then log its operational metrics, e.g. time taken, whether it returned Ok/Err, etc.
async fn observe<F, Fut, R>(name: &'static str, f: F) -> Fallible<R>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Fallible<R>>,
{
    let start = Instant::now();
    let return_val = f().await;
    let duration = start.elapsed();
    metrics::HANDLER_SECS
        .with_label_values(&[name])
        .observe(duration.as_secs_f64());
    metrics::RESPONSES
        .with_label_values(&[name, variant_name(&return_val)])
        .inc();
    return_val
}

fn variant_name<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "ok"
    } else {
        "err"
    }
}
