//! The follow graph. Edges are directed: `follower` sees `target`'s posts in their feed.
use crate::datastore::{structs::User, Datastore};
use crate::twoface::{Cause, Fallible, TfError};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub async fn follow<DS: Datastore>(ds: &DS, follower: &User, target: &User) -> Fallible<()> {
    if follower.id == target.id {
        return Err(TfError::rejected(
            Cause::UserActionInvalid,
            "You cannot follow yourself!",
        ));
    }
    let created = ds.follow(follower.id, target.id).await?;
    debug!(follower = follower.id, followed = target.id, created, "follow");
    Ok(())
}

pub async fn unfollow<DS: Datastore>(ds: &DS, follower: &User, target: &User) -> Fallible<()> {
    if follower.id == target.id {
        return Err(TfError::rejected(
            Cause::UserActionInvalid,
            "You cannot unfollow yourself!",
        ));
    }
    let removed = ds.unfollow(follower.id, target.id).await?;
    debug!(follower = follower.id, followed = target.id, removed, "unfollow");
    Ok(())
}

pub async fn is_following<DS: Datastore>(ds: &DS, follower: &User, target: &User) -> Fallible<bool> {
    ds.is_following(follower.id, target.id).await
}

pub async fn followers<DS: Datastore>(ds: &DS, user: &User) -> Fallible<Vec<User>> {
    ds.followers(user.id).await
}

pub async fn following<DS: Datastore>(ds: &DS, user: &User) -> Fallible<Vec<User>> {
    ds.followed(user.id).await
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowCounts {
    pub followers: i64,
    pub following: i64,
}

pub async fn follow_counts<DS: Datastore>(ds: &DS, user: &User) -> Fallible<FollowCounts> {
    let (followers, following) = ds.follow_counts(user.id).await?;
    Ok(FollowCounts {
        followers,
        following,
    })
}
