use crate::datastore::{
    postgres::PostgresStore,
    structs::{Follow, User},
    tables::{followers, users},
};
use crate::twoface::Fallible;
use diesel::{
    dsl::exists, select, ExpressionMethods, JoinOnDsl, QueryDsl, RunQueryDsl, SelectableHelper,
};

impl PostgresStore {
    pub(super) async fn insert_follow(&self, edge: Follow) -> Fallible<bool> {
        self.transact(move |conn| {
            // The (follower_id, followed_id) primary key turns a repeated follow into a no-op.
            let inserted = diesel::insert_into(followers::table)
                .values(&edge)
                .on_conflict_do_nothing()
                .execute(conn)?;
            Ok(inserted > 0)
        })
        .await
    }

    pub(super) async fn delete_follow(&self, edge: Follow) -> Fallible<bool> {
        self.transact(move |conn| {
            let deleted = diesel::delete(followers::table.find((edge.follower_id, edge.followed_id)))
                .execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }

    pub(super) async fn select_is_following(&self, edge: Follow) -> Fallible<bool> {
        self.query(move |conn| {
            let found = select(exists(
                followers::table.find((edge.follower_id, edge.followed_id)),
            ))
            .get_result(conn)?;
            Ok(found)
        })
        .await
    }

    pub(super) async fn select_followers(&self, user_id: i32) -> Fallible<Vec<User>> {
        self.query(move |conn| {
            let users = followers::table
                .filter(followers::followed_id.eq(user_id))
                .inner_join(users::table.on(users::id.eq(followers::follower_id)))
                .order_by(users::username.asc())
                .select(User::as_select())
                .load(conn)?;
            Ok(users)
        })
        .await
    }

    pub(super) async fn select_followed(&self, user_id: i32) -> Fallible<Vec<User>> {
        self.query(move |conn| {
            let users = followers::table
                .filter(followers::follower_id.eq(user_id))
                .inner_join(users::table.on(users::id.eq(followers::followed_id)))
                .order_by(users::username.asc())
                .select(User::as_select())
                .load(conn)?;
            Ok(users)
        })
        .await
    }

    pub(super) async fn count_follows(&self, user_id: i32) -> Fallible<(i64, i64)> {
        self.query(move |conn| {
            let followers_count = followers::table
                .filter(followers::followed_id.eq(user_id))
                .count()
                .get_result(conn)?;
            let followed_count = followers::table
                .filter(followers::follower_id.eq(user_id))
                .count()
                .get_result(conn)?;
            Ok((followers_count, followed_count))
        })
        .await
    }
}
