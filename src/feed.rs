//! Posting, and the reverse-chronological views over posts.
use crate::datastore::{
    postfilters::{Page, PostFilters},
    structs::{NewPost, Post, User},
    Datastore,
};
use crate::twoface::{Cause, Fallible, TfError};
#[cfg(test)]
use std::collections::HashSet;
use tracing::info;

pub const MAX_POST_CHARS: usize = 140;

#[cfg(test)]
/// The feed rule over an in-memory set of posts: everything by `user_id` or by anyone in
/// `followed`, each post once, newest first.
pub fn compose<'a>(
    user_id: i32,
    followed: &HashSet<i32>,
    posts: impl IntoIterator<Item = &'a Post>,
) -> Vec<Post> {
    let mut seen = HashSet::new();
    let mut feed: Vec<Post> = posts
        .into_iter()
        .filter(|p| p.user_id == user_id || followed.contains(&p.user_id))
        .filter(|p| seen.insert(p.id))
        .cloned()
        .collect();
    feed.sort_by(Post::newest_first);
    feed
}

/// The user's own posts plus those of everyone they currently follow.
pub async fn feed_for<DS: Datastore>(ds: &DS, user: &User, page: Page) -> Fallible<Vec<Post>> {
    ds.feed(user.id, page).await
}

pub async fn user_posts<DS: Datastore>(ds: &DS, user: &User, page: Page) -> Fallible<Vec<Post>> {
    ds.list_posts(PostFilters {
        user_id: Some(user.id),
        page,
        ..Default::default()
    })
    .await
}

pub async fn search<DS: Datastore>(ds: &DS, keyword: &str, page: Page) -> Fallible<Vec<Post>> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Ok(Vec::new());
    }
    ds.list_posts(PostFilters {
        text_contains: Some(keyword.to_owned()),
        page,
        ..Default::default()
    })
    .await
}

pub async fn publish<DS: Datastore>(ds: &DS, author: &User, body: &str) -> Fallible<Post> {
    let body = body.trim();
    if body.is_empty() {
        return Err(TfError::rejected(Cause::UserInvalidField, "Say something!"));
    }
    if body.chars().count() > MAX_POST_CHARS {
        return Err(TfError::rejected(
            Cause::UserInvalidField,
            "Posts must be at most 140 characters",
        ));
    }
    let post = ds
        .new_post(NewPost {
            body: body.to_owned(),
            user_id: author.id,
        })
        .await?;
    info!(post_id = post.id, user_id = author.id, "post published");
    Ok(post)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::register;
    use crate::datastore::mock;
    use crate::graph;
    use chrono::{TimeZone, Utc};

    fn post_at(id: i32, user_id: i32, secs: i64) -> Post {
        Post {
            id,
            body: format!("post {}", id),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            user_id,
        }
    }

    fn ids(posts: &[Post]) -> Vec<i32> {
        posts.iter().map(|p| p.id).collect()
    }

    #[test]
    fn test_compose_orders_and_filters() {
        let posts = vec![
            post_at(1, 2, 1),
            post_at(2, 2, 2),
            post_at(3, 2, 3),
            post_at(4, 1, 0),
            post_at(5, 3, 4),
        ];
        let followed: HashSet<i32> = [2].into_iter().collect();
        assert_eq!(ids(&compose(1, &followed, &posts)), vec![3, 2, 1, 4]);
        assert_eq!(ids(&compose(1, &HashSet::new(), &posts)), vec![4]);
    }

    #[test]
    fn test_compose_never_duplicates() {
        let posts = vec![post_at(1, 1, 1), post_at(2, 1, 2)];
        let with_self: HashSet<i32> = [1].into_iter().collect();
        let twice = posts.iter().chain(posts.iter());
        assert_eq!(ids(&compose(1, &with_self, twice)), vec![2, 1]);
    }

    #[actix_rt::test]
    async fn test_feed_ordering_with_followed_user() {
        let ds = mock::Client::default();
        let me = register(&ds, "me", "me@example.com", "pw").await.unwrap();
        let them = register(&ds, "them", "them@example.com", "pw").await.unwrap();
        graph::follow(&ds, &me, &them).await.unwrap();
        ds.set_posts(vec![
            post_at(1, them.id, 1),
            post_at(2, them.id, 2),
            post_at(3, them.id, 3),
            post_at(4, me.id, 0),
        ]);

        let feed = feed_for(&ds, &me, Page::default()).await.unwrap();
        assert_eq!(ids(&feed), vec![3, 2, 1, 4]);
    }

    #[actix_rt::test]
    async fn test_own_posts_always_in_feed() {
        let ds = mock::Client::default();
        let me = register(&ds, "me", "me@example.com", "pw").await.unwrap();
        let them = register(&ds, "them", "them@example.com", "pw").await.unwrap();
        let mine = publish(&ds, &me, "hello").await.unwrap();
        publish(&ds, &them, "not followed").await.unwrap();

        let feed = feed_for(&ds, &me, Page::default()).await.unwrap();
        assert_eq!(ids(&feed), vec![mine.id]);

        graph::follow(&ds, &me, &them).await.unwrap();
        graph::unfollow(&ds, &me, &them).await.unwrap();
        let feed = feed_for(&ds, &me, Page::default()).await.unwrap();
        assert_eq!(ids(&feed), vec![mine.id]);
    }

    #[actix_rt::test]
    async fn test_self_edge_does_not_duplicate_posts() {
        let ds = mock::Client::default();
        let me = register(&ds, "me", "me@example.com", "pw").await.unwrap();
        publish(&ds, &me, "one").await.unwrap();
        publish(&ds, &me, "two").await.unwrap();
        ds.insert_raw_follow(me.id, me.id);

        let feed = feed_for(&ds, &me, Page::default()).await.unwrap();
        assert_eq!(feed.len(), 2);
    }

    #[actix_rt::test]
    async fn test_feed_pages_are_contiguous() {
        let ds = mock::Client::default();
        let me = register(&ds, "me", "me@example.com", "pw").await.unwrap();
        ds.set_posts((1..=5).map(|id| post_at(id, me.id, 100)).collect());

        let first = feed_for(&ds, &me, Page::new(1, 2)).await.unwrap();
        let second = feed_for(&ds, &me, Page::new(2, 2)).await.unwrap();
        let third = feed_for(&ds, &me, Page::new(3, 2)).await.unwrap();
        assert_eq!(ids(&first), vec![5, 4]);
        assert_eq!(ids(&second), vec![3, 2]);
        assert_eq!(ids(&third), vec![1]);
    }

    #[actix_rt::test]
    async fn test_publish_validates_body() {
        let ds = mock::Client::default();
        let me = register(&ds, "me", "me@example.com", "pw").await.unwrap();

        let empty = publish(&ds, &me, "   ").await.unwrap_err();
        assert_eq!(empty.cause(), Cause::UserInvalidField);
        let long = publish(&ds, &me, &"a".repeat(MAX_POST_CHARS + 1))
            .await
            .unwrap_err();
        assert_eq!(long.cause(), Cause::UserInvalidField);

        // Length counts characters, not bytes.
        let multibyte = "说".repeat(MAX_POST_CHARS);
        let post = publish(&ds, &me, &multibyte).await.unwrap();
        assert_eq!(post.user_id, me.id);
    }

    #[actix_rt::test]
    async fn test_search_and_user_posts() {
        let ds = mock::Client::default();
        let me = register(&ds, "me", "me@example.com", "pw").await.unwrap();
        let them = register(&ds, "them", "them@example.com", "pw").await.unwrap();
        publish(&ds, &me, "Beautiful day in Portland!").await.unwrap();
        publish(&ds, &them, "The Avengers movie was so cool!").await.unwrap();

        let found = search(&ds, "Portland", Page::default()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].user_id, me.id);
        assert!(search(&ds, "  ", Page::default()).await.unwrap().is_empty());

        let theirs = user_posts(&ds, &them, Page::default()).await.unwrap();
        assert_eq!(theirs.len(), 1);
        assert_eq!(theirs[0].user_id, them.id);
    }
}
