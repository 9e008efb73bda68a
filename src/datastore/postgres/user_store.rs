use crate::datastore::{
    postgres::{errors::describe_user_conflict, PostgresStore},
    structs::{NewUser, ProfileChanges, User},
    tables::users,
    EMAIL_TAKEN, USERNAME_TAKEN,
};
use crate::twoface::{Cause, Fallible, OrNotFound, TfError};
use chrono::{offset::Utc, DateTime};
use diesel::{
    dsl::exists, pg::PgConnection, select, ExpressionMethods, OptionalExtension, QueryDsl,
    RunQueryDsl, SelectableHelper,
};

/// Is `username` held by anyone other than `except`?
fn username_taken(conn: &mut PgConnection, username: &str, except: Option<i32>) -> Fallible<bool> {
    let holder: Option<i32> = users::table
        .filter(users::username.eq(username))
        .select(users::id)
        .first(conn)
        .optional()?;
    Ok(matches!(holder, Some(id) if Some(id) != except))
}

impl PostgresStore {
    pub(super) async fn insert_user(&self, new_user: NewUser) -> Fallible<User> {
        self.transact(move |conn| {
            if username_taken(conn, &new_user.username, None)? {
                return Err(TfError::rejected(Cause::UserConflict, USERNAME_TAKEN));
            }
            let email_taken: bool = select(exists(
                users::table.filter(users::email.eq(&new_user.email)),
            ))
            .get_result(conn)?;
            if email_taken {
                return Err(TfError::rejected(Cause::UserConflict, EMAIL_TAKEN));
            }

            diesel::insert_into(users::table)
                .values(&new_user)
                .returning(User::as_returning())
                .get_result(conn)
                .map_err(describe_user_conflict)
        })
        .await
    }

    pub(super) async fn select_user(&self, user_id: i32) -> Fallible<Option<User>> {
        self.query(move |conn| {
            let user = users::table
                .find(user_id)
                .select(User::as_select())
                .first(conn)
                .optional()?;
            Ok(user)
        })
        .await
    }

    pub(super) async fn select_user_by_username(&self, username: String) -> Fallible<Option<User>> {
        self.query(move |conn| {
            let user = users::table
                .filter(users::username.eq(username))
                .select(User::as_select())
                .first(conn)
                .optional()?;
            Ok(user)
        })
        .await
    }

    pub(super) async fn select_user_by_email(&self, email: String) -> Fallible<Option<User>> {
        self.query(move |conn| {
            let user = users::table
                .filter(users::email.eq(email))
                .select(User::as_select())
                .first(conn)
                .optional()?;
            Ok(user)
        })
        .await
    }

    pub(super) async fn update_user_profile(
        &self,
        user_id: i32,
        changes: ProfileChanges,
    ) -> Fallible<Option<User>> {
        self.transact(move |conn| {
            if let Some(username) = &changes.username {
                if username_taken(conn, username, Some(user_id))? {
                    return Err(TfError::rejected(Cause::UserConflict, USERNAME_TAKEN));
                }
            }
            let target = users::table.find(user_id);
            if changes.is_empty() {
                let user = target.select(User::as_select()).first(conn).optional()?;
                return Ok(user);
            }
            diesel::update(target)
                .set(&changes)
                .returning(User::as_returning())
                .get_result(conn)
                .optional()
                .map_err(describe_user_conflict)
        })
        .await
    }

    pub(super) async fn update_password_hash(
        &self,
        user_id: i32,
        password_hash: String,
    ) -> Fallible<()> {
        self.transact(move |conn| {
            let updated = diesel::update(users::table.find(user_id))
                .set(users::password_hash.eq(Some(password_hash)))
                .execute(conn)?;
            (updated > 0).then_some(()).or_not_found("User not found")
        })
        .await
    }

    pub(super) async fn update_last_seen(&self, user_id: i32, at: DateTime<Utc>) -> Fallible<()> {
        self.transact(move |conn| {
            diesel::update(users::table.find(user_id))
                .set(users::last_seen.eq(at))
                .execute(conn)?;
            Ok(())
        })
        .await
    }
}
