mod errors;
pub mod follow_store;
pub mod post_store;
pub mod user_store;

use crate::config::Config;
use crate::datastore::{
    postfilters::{Page, PostFilters},
    structs::{Follow, NewPost, NewUser, Post, ProfileChanges, User},
    Datastore,
};
use crate::twoface::{Fallible, TfError};
use actix_web::web::block;
use async_trait::async_trait;
use chrono::{offset::Utc, DateTime};
use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, Pool},
    Connection,
};
use errors::BlockingResp;
use prometheus::{
    core::{Collector, Desc},
    proto::MetricFamily,
    IntGauge, Opts,
};
use std::time::Duration;

pub struct Dsn {
    secret: String,
}

impl Dsn {
    pub fn new(config: &Config) -> Self {
        Dsn {
            secret: config.db_dsn.clone(),
        }
    }
}

impl From<Dsn> for String {
    fn from(dsn: Dsn) -> String {
        dsn.secret
    }
}

/// An implementation of datastore::Datastore backed by Postgres
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool<ConnectionManager<PgConnection>>,
    idle_conns: IntGauge,
    conns: IntGauge,
}

impl PostgresStore {
    pub fn new(
        dsn: Dsn,
        max_pool_size: u32,
        conn_timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let manager = ConnectionManager::<PgConnection>::new(String::from(dsn));
        let pool = Pool::builder()
            .max_size(max_pool_size)
            .connection_timeout(conn_timeout)
            .build(manager)?;
        let idle_conns = IntGauge::with_opts(Opts::new(
            "microblog_db_connections_idle",
            "How many DB connections are currently idle",
        ))?;
        let conns = IntGauge::with_opts(Opts::new(
            "microblog_db_connections",
            "How many DB connections are open",
        ))?;
        Ok(Self {
            pool,
            idle_conns,
            conns,
        })
    }

    /// Run `f` inside one transaction on a pooled connection, on the blocking thread pool.
    /// Any error returned by `f` rolls the transaction back.
    async fn transact<T, F>(&self, f: F) -> Fallible<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> Fallible<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        block(move || {
            let mut pooled = pool.get()?;
            let conn: &mut PgConnection = &mut pooled;
            conn.transaction::<T, TfError, _>(f)
        })
        .await
        .to_resp()
    }

    /// Run a read-only `f` on a pooled connection, on the blocking thread pool.
    async fn query<T, F>(&self, f: F) -> Fallible<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> Fallible<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        block(move || {
            let mut pooled = pool.get()?;
            let conn: &mut PgConnection = &mut pooled;
            f(conn)
        })
        .await
        .to_resp()
    }
}

#[async_trait]
impl Datastore for PostgresStore {
    async fn new_user(&self, new_user: NewUser) -> Fallible<User> {
        self.insert_user(new_user).await
    }

    async fn get_user(&self, user_id: i32) -> Fallible<Option<User>> {
        self.select_user(user_id).await
    }

    async fn find_user_by_username(&self, username: &str) -> Fallible<Option<User>> {
        self.select_user_by_username(username.to_owned()).await
    }

    async fn find_user_by_email(&self, email: &str) -> Fallible<Option<User>> {
        self.select_user_by_email(email.to_owned()).await
    }

    async fn update_profile(
        &self,
        user_id: i32,
        changes: ProfileChanges,
    ) -> Fallible<Option<User>> {
        self.update_user_profile(user_id, changes).await
    }

    async fn set_password_hash(&self, user_id: i32, password_hash: String) -> Fallible<()> {
        self.update_password_hash(user_id, password_hash).await
    }

    async fn touch_last_seen(&self, user_id: i32, at: DateTime<Utc>) -> Fallible<()> {
        self.update_last_seen(user_id, at).await
    }

    async fn new_post(&self, new_post: NewPost) -> Fallible<Post> {
        self.insert_post(new_post).await
    }

    async fn list_posts(&self, filters: PostFilters) -> Fallible<Vec<Post>> {
        self.select_posts(filters).await
    }

    async fn feed(&self, user_id: i32, page: Page) -> Fallible<Vec<Post>> {
        self.select_feed(user_id, page).await
    }

    async fn follow(&self, follower_id: i32, followed_id: i32) -> Fallible<bool> {
        self.insert_follow(Follow {
            follower_id,
            followed_id,
        })
        .await
    }

    async fn unfollow(&self, follower_id: i32, followed_id: i32) -> Fallible<bool> {
        self.delete_follow(Follow {
            follower_id,
            followed_id,
        })
        .await
    }

    async fn is_following(&self, follower_id: i32, followed_id: i32) -> Fallible<bool> {
        self.select_is_following(Follow {
            follower_id,
            followed_id,
        })
        .await
    }

    async fn followers(&self, user_id: i32) -> Fallible<Vec<User>> {
        self.select_followers(user_id).await
    }

    async fn followed(&self, user_id: i32) -> Fallible<Vec<User>> {
        self.select_followed(user_id).await
    }

    async fn follow_counts(&self, user_id: i32) -> Fallible<(i64, i64)> {
        self.count_follows(user_id).await
    }
}

impl Collector for PostgresStore {
    fn desc(&self) -> Vec<&Desc> {
        let mut descs = self.idle_conns.desc();
        descs.extend(self.conns.desc());
        descs
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let state = self.pool.state();
        self.idle_conns.set(i64::from(state.idle_connections));
        self.conns.set(i64::from(state.connections));
        let mut metrics = self.idle_conns.collect();
        metrics.extend(self.conns.collect());
        metrics
    }
}

/// These run against a real, migrated database:
/// `DATABASE_URL=postgres://localhost/microblog_test cargo test -- --ignored`
#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::tables::posts;
    use diesel::{ExpressionMethods, QueryDsl, RunQueryDsl};

    fn store() -> Option<PostgresStore> {
        let secret = std::env::var("DATABASE_URL").ok()?;
        Some(PostgresStore::new(Dsn { secret }, 2, Duration::from_secs(5)).unwrap())
    }

    async fn new_user(ds: &PostgresStore, name: &str) -> User {
        let suffix = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        ds.new_user(NewUser {
            username: format!("{}-{}", name, suffix),
            email: format!("{}-{}@example.com", name, suffix),
            password_hash: None,
        })
        .await
        .unwrap()
    }

    async fn new_post(ds: &PostgresStore, author: &User, body: &str) -> Post {
        ds.new_post(NewPost {
            body: body.to_owned(),
            user_id: author.id,
        })
        .await
        .unwrap()
    }

    #[actix_rt::test]
    #[ignore]
    async fn test_follow_edges_are_idempotent() {
        guard!(let Some(ds) = store() else { return });
        let me = new_user(&ds, "me").await;
        let them = new_user(&ds, "them").await;

        assert!(ds.follow(me.id, them.id).await.unwrap());
        assert!(!ds.follow(me.id, them.id).await.unwrap());
        assert!(ds.is_following(me.id, them.id).await.unwrap());
        assert_eq!(ds.follow_counts(them.id).await.unwrap(), (1, 0));

        assert!(ds.unfollow(me.id, them.id).await.unwrap());
        assert!(!ds.unfollow(me.id, them.id).await.unwrap());
        assert!(!ds.is_following(me.id, them.id).await.unwrap());
    }

    #[actix_rt::test]
    #[ignore]
    async fn test_feed_query() {
        guard!(let Some(ds) = store() else { return });
        let me = new_user(&ds, "me").await;
        let them = new_user(&ds, "them").await;
        let stranger = new_user(&ds, "stranger").await;

        let mine = new_post(&ds, &me, "mine").await;
        let first = new_post(&ds, &them, "first").await;
        let second = new_post(&ds, &them, "second").await;
        new_post(&ds, &stranger, "not followed").await;
        ds.follow(me.id, them.id).await.unwrap();
        // The store itself accepts a self-edge; the feed must still list each post once.
        ds.follow(me.id, me.id).await.unwrap();

        // Equal timestamps fall back to id order.
        let ids = vec![mine.id, first.id, second.id];
        let at = Utc::now();
        ds.transact(move |conn| {
            diesel::update(posts::table.filter(posts::id.eq_any(ids)))
                .set(posts::timestamp.eq(at))
                .execute(conn)?;
            Ok(())
        })
        .await
        .unwrap();

        let feed = ds.feed(me.id, Page::new(1, 50)).await.unwrap();
        let ids: Vec<i32> = feed.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second.id, first.id, mine.id]);

        let page_two = ds.feed(me.id, Page::new(2, 2)).await.unwrap();
        assert_eq!(page_two.len(), 1);
        assert_eq!(page_two[0].id, mine.id);
    }
}
