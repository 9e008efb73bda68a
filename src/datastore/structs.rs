use crate::datastore::tables::{followers, posts, users};
use chrono::{offset::Utc, DateTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// A registered user. Holds the credential hash, so it must never be serialized to users directly;
/// the API layer has its own redacted view.
#[derive(Queryable, Selectable, Identifiable, Clone, Debug, PartialEq, Eq)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub about_me: Option<String>,
    pub last_seen: DateTime<Utc>,
}

/// Parameters for the database statement which inserts new users.
#[derive(Insertable, Debug)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
}

/// Profile fields a user may change. `None` leaves the column alone.
#[derive(AsChangeset, Default, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = users)]
pub struct ProfileChanges {
    pub username: Option<String>,
    /// `Some(None)` clears the bio.
    pub about_me: Option<Option<String>>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.about_me.is_none()
    }
}

/// A post from a user
#[derive(
    Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash,
)]
#[diesel(table_name = posts, belongs_to(User))]
pub struct Post {
    pub id: i32,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: i32,
}

impl Post {
    #[cfg(test)]
    /// Feed order: newest first, ties broken by the higher (later inserted) id.
    pub fn newest_first(a: &Post, b: &Post) -> std::cmp::Ordering {
        b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id))
    }
}

/// Parameters for the database statement which inserts new posts. The store sets the timestamp.
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = posts)]
pub struct NewPost {
    pub body: String,
    pub user_id: i32,
}

/// A directed edge: `follower_id` sees `followed_id`'s posts in their feed.
#[derive(Queryable, Insertable, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[diesel(table_name = followers)]
pub struct Follow {
    pub follower_id: i32,
    pub followed_id: i32,
}

#[cfg(test)]
mod post_tests {
    use super::*;
    use chrono::TimeZone;

    fn post(id: i32, secs: i64) -> Post {
        Post {
            id,
            body: format!("post {}", id),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            user_id: 1,
        }
    }

    #[test]
    fn test_newest_first_breaks_ties_by_id() {
        let mut posts = vec![post(1, 10), post(3, 5), post(2, 10)];
        posts.sort_by(Post::newest_first);
        let ids: Vec<i32> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }
}
