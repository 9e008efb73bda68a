#[cfg(test)]
pub mod mock;
pub mod postfilters;
pub mod postgres;
pub mod structs;
pub mod tables;

use crate::datastore::postfilters::{Page, PostFilters};
use crate::datastore::structs::{NewPost, NewUser, Post, ProfileChanges, User};
use crate::twoface::Fallible;
use async_trait::async_trait;
use chrono::{offset::Utc, DateTime};

pub const USERNAME_TAKEN: &str = "Please use a different username.";
pub const EMAIL_TAKEN: &str = "Please use a different email address.";

/// The interface for storing users, posts and the follow graph. Every method runs immediately and
/// returns materialized results; every write is one transaction.
#[async_trait]
pub trait Datastore: Clone + Send + Sync {
    /// Fails with `UserConflict` if the username or email is taken.
    async fn new_user(&self, new_user: NewUser) -> Fallible<User>;
    async fn get_user(&self, user_id: i32) -> Fallible<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> Fallible<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Fallible<Option<User>>;
    /// Returns `None` if the user doesn't exist. Fails with `UserConflict` on a taken username.
    async fn update_profile(&self, user_id: i32, changes: ProfileChanges)
        -> Fallible<Option<User>>;
    async fn set_password_hash(&self, user_id: i32, password_hash: String) -> Fallible<()>;
    async fn touch_last_seen(&self, user_id: i32, at: DateTime<Utc>) -> Fallible<()>;

    async fn new_post(&self, new_post: NewPost) -> Fallible<Post>;
    /// Posts matching the filters, newest first.
    async fn list_posts(&self, filters: PostFilters) -> Fallible<Vec<Post>>;
    /// The user's own posts plus posts from everyone they follow, newest first.
    async fn feed(&self, user_id: i32, page: Page) -> Fallible<Vec<Post>>;

    /// Returns true if a new edge was created.
    async fn follow(&self, follower_id: i32, followed_id: i32) -> Fallible<bool>;
    /// Returns true if an edge was removed.
    async fn unfollow(&self, follower_id: i32, followed_id: i32) -> Fallible<bool>;
    async fn is_following(&self, follower_id: i32, followed_id: i32) -> Fallible<bool>;
    /// Users who follow `user_id`, by username.
    async fn followers(&self, user_id: i32) -> Fallible<Vec<User>>;
    /// Users `user_id` follows, by username.
    async fn followed(&self, user_id: i32) -> Fallible<Vec<User>>;
    /// (followers, followed) counts.
    async fn follow_counts(&self, user_id: i32) -> Fallible<(i64, i64)>;
}
