diesel::table! {
    #[sql_name = "user"]
    users (id) {
        id -> Int4,
        username -> Varchar,
        email -> Varchar,
        password_hash -> Nullable<Varchar>,
        about_me -> Nullable<Varchar>,
        last_seen -> Timestamptz,
    }
}

diesel::table! {
    #[sql_name = "post"]
    posts (id) {
        id -> Int4,
        body -> Varchar,
        timestamp -> Timestamptz,
        user_id -> Int4,
    }
}

diesel::table! {
    followers (follower_id, followed_id) {
        follower_id -> Int4,
        followed_id -> Int4,
    }
}

diesel::joinable!(posts -> users (user_id));
diesel::allow_tables_to_appear_in_same_query!(followers, posts, users);
