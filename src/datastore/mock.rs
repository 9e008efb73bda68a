use crate::datastore::{
    postfilters::{Page, PostFilters},
    structs::{Follow, NewPost, NewUser, Post, ProfileChanges, User},
    EMAIL_TAKEN, USERNAME_TAKEN,
};
use crate::feed;
use crate::twoface::{Cause, Fallible, OrNotFound, TfError};
use async_trait::async_trait;
use chrono::{offset::Utc, DateTime};
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Default, Debug)]
struct Tables {
    users: Vec<User>,
    posts: Vec<Post>,
    followers: BTreeSet<Follow>,
}

/// A mock implementation of datastore::Datastore. Like the real store it allocates ids from 1 and
/// enforces the unique username/email and (follower, followed) constraints.
#[derive(Clone, Default, Debug)]
pub struct Client {
    tables: Arc<Mutex<Tables>>,
}

impl Client {
    /// Replace every post, e.g. to pin exact timestamps in a test.
    pub fn set_posts(&self, posts: Vec<Post>) {
        self.tables.lock().unwrap().posts = posts;
    }

    /// Write an edge without any of the graph component's checks.
    pub fn insert_raw_follow(&self, follower_id: i32, followed_id: i32) {
        self.tables.lock().unwrap().followers.insert(Follow {
            follower_id,
            followed_id,
        });
    }

    pub fn edge_count(&self) -> usize {
        self.tables.lock().unwrap().followers.len()
    }
}

impl Tables {
    fn user(&self, user_id: i32) -> Option<&User> {
        self.users.iter().find(|u| u.id == user_id)
    }

    fn users_by_name(&self, ids: impl Iterator<Item = i32>) -> Vec<User> {
        let mut users: Vec<User> = ids.filter_map(|id| self.user(id).cloned()).collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }
}

#[async_trait]
impl super::Datastore for Client {
    async fn new_user(&self, new_user: NewUser) -> Fallible<User> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.iter().any(|u| u.username == new_user.username) {
            return Err(TfError::rejected(Cause::UserConflict, USERNAME_TAKEN));
        }
        if tables.users.iter().any(|u| u.email == new_user.email) {
            return Err(TfError::rejected(Cause::UserConflict, EMAIL_TAKEN));
        }
        let user = User {
            id: tables.users.len() as i32 + 1,
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            about_me: None,
            last_seen: Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: i32) -> Fallible<Option<User>> {
        Ok(self.tables.lock().unwrap().user(user_id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Fallible<Option<User>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Fallible<Option<User>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn update_profile(
        &self,
        user_id: i32,
        changes: ProfileChanges,
    ) -> Fallible<Option<User>> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(username) = &changes.username {
            if tables
                .users
                .iter()
                .any(|u| &u.username == username && u.id != user_id)
            {
                return Err(TfError::rejected(Cause::UserConflict, USERNAME_TAKEN));
            }
        }
        let user = tables.users.iter_mut().find(|u| u.id == user_id);
        guard!(let Some(user) = user else {
            return Ok(None)
        });
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(about_me) = changes.about_me {
            user.about_me = about_me;
        }
        Ok(Some(user.clone()))
    }

    async fn set_password_hash(&self, user_id: i32, password_hash: String) -> Fallible<()> {
        let mut tables = self.tables.lock().unwrap();
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .or_not_found("User not found")?;
        user.password_hash = Some(password_hash);
        Ok(())
    }

    async fn touch_last_seen(&self, user_id: i32, at: DateTime<Utc>) -> Fallible<()> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == user_id) {
            user.last_seen = at;
        }
        Ok(())
    }

    async fn new_post(&self, new_post: NewPost) -> Fallible<Post> {
        let mut tables = self.tables.lock().unwrap();
        if tables.user(new_post.user_id).is_none() {
            return Err(anyhow::anyhow!("post.user_id violates foreign key").into());
        }
        let post = Post {
            id: tables.posts.iter().map(|p| p.id).max().unwrap_or(0) + 1,
            body: new_post.body,
            timestamp: Utc::now(),
            user_id: new_post.user_id,
        };
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn list_posts(&self, filters: PostFilters) -> Fallible<Vec<Post>> {
        let tables = self.tables.lock().unwrap();
        let mut posts: Vec<Post> = tables
            .posts
            .iter()
            .filter(|p| filters.matches(p))
            .cloned()
            .collect();
        posts.sort_by(Post::newest_first);
        Ok(filters.page.slice(&posts))
    }

    async fn feed(&self, user_id: i32, page: Page) -> Fallible<Vec<Post>> {
        let tables = self.tables.lock().unwrap();
        let followed: HashSet<i32> = tables
            .followers
            .iter()
            .filter(|f| f.follower_id == user_id)
            .map(|f| f.followed_id)
            .collect();
        let posts = feed::compose(user_id, &followed, tables.posts.iter());
        Ok(page.slice(&posts))
    }

    async fn follow(&self, follower_id: i32, followed_id: i32) -> Fallible<bool> {
        let mut tables = self.tables.lock().unwrap();
        if tables.user(follower_id).is_none() || tables.user(followed_id).is_none() {
            return Err(anyhow::anyhow!("followers violates foreign key").into());
        }
        Ok(tables.followers.insert(Follow {
            follower_id,
            followed_id,
        }))
    }

    async fn unfollow(&self, follower_id: i32, followed_id: i32) -> Fallible<bool> {
        Ok(self.tables.lock().unwrap().followers.remove(&Follow {
            follower_id,
            followed_id,
        }))
    }

    async fn is_following(&self, follower_id: i32, followed_id: i32) -> Fallible<bool> {
        Ok(self.tables.lock().unwrap().followers.contains(&Follow {
            follower_id,
            followed_id,
        }))
    }

    async fn followers(&self, user_id: i32) -> Fallible<Vec<User>> {
        let tables = self.tables.lock().unwrap();
        let ids = tables
            .followers
            .iter()
            .filter(|f| f.followed_id == user_id)
            .map(|f| f.follower_id);
        Ok(tables.users_by_name(ids))
    }

    async fn followed(&self, user_id: i32) -> Fallible<Vec<User>> {
        let tables = self.tables.lock().unwrap();
        let ids = tables
            .followers
            .iter()
            .filter(|f| f.follower_id == user_id)
            .map(|f| f.followed_id);
        Ok(tables.users_by_name(ids))
    }

    async fn follow_counts(&self, user_id: i32) -> Fallible<(i64, i64)> {
        let tables = self.tables.lock().unwrap();
        let followers = tables
            .followers
            .iter()
            .filter(|f| f.followed_id == user_id)
            .count();
        let followed = tables
            .followers
            .iter()
            .filter(|f| f.follower_id == user_id)
            .count();
        Ok((followers as i64, followed as i64))
    }
}
