use crate::datastore::{
    postfilters::{Page, PostFilters},
    postgres::PostgresStore,
    structs::{NewPost, Post},
    tables::{followers, posts},
};
use crate::twoface::Fallible;
use diesel::{
    expression::BoxableExpression, pg::Pg, sql_types::Bool, BoolExpressionMethods,
    ExpressionMethods, QueryDsl, RunQueryDsl, SelectableHelper, TextExpressionMethods,
};

impl PostgresStore {
    pub(super) async fn insert_post(&self, new_post: NewPost) -> Fallible<Post> {
        self.transact(move |conn| {
            let post = diesel::insert_into(posts::table)
                .values(&new_post)
                .returning(Post::as_returning())
                .get_result(conn)?;
            Ok(post)
        })
        .await
    }

    pub(super) async fn select_posts(&self, filters: PostFilters) -> Fallible<Vec<Post>> {
        self.query(move |conn| {
            let mut query = posts::table.select(Post::as_select()).into_boxed();
            for filter in filters.as_sql_where() {
                query = query.filter(filter);
            }
            let posts = query
                .order_by((posts::timestamp.desc(), posts::id.desc()))
                .limit(filters.page.limit())
                .offset(filters.page.offset())
                .load(conn)?;
            Ok(posts)
        })
        .await
    }

    pub(super) async fn select_feed(&self, user_id: i32, page: Page) -> Fallible<Vec<Post>> {
        self.query(move |conn| {
            // One scan over `post`, so a post can't appear twice even if its author is both
            // the reader and someone the reader follows.
            let followed = followers::table
                .filter(followers::follower_id.eq(user_id))
                .select(followers::followed_id);
            let feed = posts::table
                .filter(
                    posts::user_id
                        .eq(user_id)
                        .or(posts::user_id.eq_any(followed)),
                )
                .order_by((posts::timestamp.desc(), posts::id.desc()))
                .limit(page.limit())
                .offset(page.offset())
                .select(Post::as_select())
                .load(conn)?;
            Ok(feed)
        })
        .await
    }
}

impl PostFilters {
    pub fn as_sql_where(&self) -> Vec<Box<dyn BoxableExpression<posts::table, Pg, SqlType = Bool>>> {
        let mut wheres: Vec<Box<dyn BoxableExpression<posts::table, Pg, SqlType = Bool>>> =
            Vec::new();
        if let Some(substring) = &self.text_contains {
            wheres.push(Box::new(
                posts::body.like(format!("%{}%", escape_like(substring))),
            ))
        }
        if let Some(user_id) = self.user_id {
            wheres.push(Box::new(posts::user_id.eq(user_id)))
        }
        wheres
    }
}

/// Postgres' default LIKE escape character is a backslash.
fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("100%_sure\\"), "100\\%\\_sure\\\\");
    }
}
