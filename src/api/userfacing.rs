//! The JSON API. Handlers turn requests into calls on the core components, and core types into the
//! redacted views in `api`.
use crate::accounts::{self, ProfileEdit};
use crate::api::{
    observe, path_config, query_config, CoerceColl, OwnAccount, PageQuery, State,
    UserFacingPost, UserFacingUser,
};
use crate::datastore::Datastore;
use crate::feed;
use crate::graph::{self, FollowCounts};
use crate::session::{self, SessionToken};
use crate::twoface::Fallible;
use actix_web::{web, HttpResponse};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub fn configure<DS: Datastore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.app_data(path_config())
        .app_data(query_config())
        .service(
        web::scope("/auth")
            .route("/register", web::post().to(register::<DS>))
            .route("/login", web::post().to(login::<DS>))
            .route(
                "/reset_password_request",
                web::post().to(reset_password_request::<DS>),
            )
            .route("/reset_password/{token}", web::post().to(reset_password::<DS>)),
    )
    .route("/index", web::get().to(index::<DS>))
    .route("/posts", web::post().to(write_post::<DS>))
    .route("/search", web::get().to(search::<DS>))
    .route("/edit_profile", web::put().to(edit_profile::<DS>))
    .route("/follow/{username}", web::post().to(follow::<DS>))
    .route("/unfollow/{username}", web::post().to(unfollow::<DS>))
    .service(
        web::scope("/user/{username}")
            .route("", web::get().to(profile::<DS>))
            .route("/followers", web::get().to(followers::<DS>))
            .route("/following", web::get().to(following::<DS>)),
    );
}

#[derive(Serialize, Deserialize)]
pub struct RegisterBody {
    pub username: String,
    pub email: String,
    pub password: String,
}

async fn register<DS: Datastore>(
    state: web::Data<State<DS>>,
    body: web::Json<RegisterBody>,
) -> Fallible<HttpResponse> {
    observe("register", || async {
        let user = accounts::register(&*state.ds, &body.username, &body.email, &body.password)
            .await?;
        Ok(HttpResponse::Created().json(OwnAccount::from(user)))
    })
    .await
}

#[derive(Serialize, Deserialize)]
pub struct LoginBody {
    pub username: String,
    pub password: String,
}

async fn login<DS: Datastore>(
    state: web::Data<State<DS>>,
    body: web::Json<LoginBody>,
) -> Fallible<web::Json<SessionToken>> {
    observe("login", || async {
        let user = accounts::authenticate(&*state.ds, &body.username, &body.password).await?;
        let session = state.keys.issue_session(&user)?;
        Ok(web::Json(session))
    })
    .await
}

#[derive(Serialize, Deserialize)]
pub struct ResetRequestBody {
    pub email: String,
}

async fn reset_password_request<DS: Datastore>(
    state: web::Data<State<DS>>,
    body: web::Json<ResetRequestBody>,
) -> Fallible<HttpResponse> {
    observe("reset_password_request", || async {
        accounts::request_password_reset(
            &*state.ds,
            &state.keys,
            state.mailer.clone(),
            &state.mail_sender,
            &body.email,
        )
        .await?;
        Ok(HttpResponse::Accepted()
            .json(json!({"message": "Check your email for the instructions to reset your password"})))
    })
    .await
}

#[derive(Serialize, Deserialize)]
pub struct ResetPasswordBody {
    pub password: String,
}

async fn reset_password<DS: Datastore>(
    state: web::Data<State<DS>>,
    token: web::Path<String>,
    body: web::Json<ResetPasswordBody>,
) -> Fallible<HttpResponse> {
    observe("reset_password", || async {
        accounts::reset_password(&*state.ds, &state.keys, &token, &body.password).await?;
        Ok(HttpResponse::NoContent().finish())
    })
    .await
}

// The signed-in user's feed
async fn index<DS: Datastore>(
    state: web::Data<State<DS>>,
    auth: Option<BearerAuth>,
    query: web::Query<PageQuery>,
) -> Fallible<web::Json<Vec<UserFacingPost>>> {
    observe("index", || async {
        let me = session::current_user(&*state.ds, &state.keys, auth.as_ref()).await?;
        let posts = feed::feed_for(&*state.ds, &me, state.page(&query)).await?;
        Ok(web::Json(posts.coerce_into()))
    })
    .await
}

#[derive(Serialize, Deserialize)]
pub struct WritePostBody {
    pub body: String,
}

async fn write_post<DS: Datastore>(
    state: web::Data<State<DS>>,
    auth: Option<BearerAuth>,
    body: web::Json<WritePostBody>,
) -> Fallible<HttpResponse> {
    observe("write_post", || async {
        let me = session::current_user(&*state.ds, &state.keys, auth.as_ref()).await?;
        let post = feed::publish(&*state.ds, &me, &body.body).await?;
        Ok(HttpResponse::Created().json(UserFacingPost::from(post)))
    })
    .await
}

#[derive(Deserialize, Debug)]
pub struct SearchQuery {
    pub keyword: String,
    pub page: Option<u32>,
}

async fn search<DS: Datastore>(
    state: web::Data<State<DS>>,
    auth: Option<BearerAuth>,
    query: web::Query<SearchQuery>,
) -> Fallible<web::Json<Vec<UserFacingPost>>> {
    observe("search", || async {
        session::current_user(&*state.ds, &state.keys, auth.as_ref()).await?;
        let page = state.page(&PageQuery { page: query.page });
        let posts = feed::search(&*state.ds, &query.keyword, page).await?;
        Ok(web::Json(posts.coerce_into()))
    })
    .await
}

#[derive(Serialize, Deserialize, Default)]
pub struct EditProfileBody {
    pub username: Option<String>,
    pub about_me: Option<String>,
}

async fn edit_profile<DS: Datastore>(
    state: web::Data<State<DS>>,
    auth: Option<BearerAuth>,
    body: web::Json<EditProfileBody>,
) -> Fallible<web::Json<OwnAccount>> {
    observe("edit_profile", || async {
        let me = session::current_user(&*state.ds, &state.keys, auth.as_ref()).await?;
        let body = body.into_inner();
        let edit = ProfileEdit {
            username: body.username,
            about_me: body.about_me,
        };
        let user = accounts::edit_profile(&*state.ds, &me, edit).await?;
        Ok(web::Json(user.into()))
    })
    .await
}

async fn follow<DS: Datastore>(
    state: web::Data<State<DS>>,
    auth: Option<BearerAuth>,
    username: web::Path<String>,
) -> Fallible<HttpResponse> {
    observe("follow", || async {
        let me = session::current_user(&*state.ds, &state.keys, auth.as_ref()).await?;
        let target = accounts::find_by_username(&*state.ds, &username).await?;
        graph::follow(&*state.ds, &me, &target).await?;
        Ok(HttpResponse::Ok().json(json!({"status": "following", "username": target.username})))
    })
    .await
}

async fn unfollow<DS: Datastore>(
    state: web::Data<State<DS>>,
    auth: Option<BearerAuth>,
    username: web::Path<String>,
) -> Fallible<HttpResponse> {
    observe("unfollow", || async {
        let me = session::current_user(&*state.ds, &state.keys, auth.as_ref()).await?;
        let target = accounts::find_by_username(&*state.ds, &username).await?;
        graph::unfollow(&*state.ds, &me, &target).await?;
        Ok(HttpResponse::Ok().json(json!({"status": "not_following", "username": target.username})))
    })
    .await
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Profile {
    pub user: UserFacingUser,
    pub counts: FollowCounts,
    /// Absent on your own profile.
    pub is_following: Option<bool>,
    pub posts: Vec<UserFacingPost>,
}

async fn profile<DS: Datastore>(
    state: web::Data<State<DS>>,
    auth: Option<BearerAuth>,
    username: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Fallible<web::Json<Profile>> {
    observe("profile", || async {
        let me = session::current_user(&*state.ds, &state.keys, auth.as_ref()).await?;
        let user = accounts::find_by_username(&*state.ds, &username).await?;
        let is_following = if user.id == me.id {
            None
        } else {
            Some(graph::is_following(&*state.ds, &me, &user).await?)
        };
        let counts = graph::follow_counts(&*state.ds, &user).await?;
        let posts = feed::user_posts(&*state.ds, &user, state.page(&query)).await?;
        Ok(web::Json(Profile {
            user: user.into(),
            counts,
            is_following,
            posts: posts.coerce_into(),
        }))
    })
    .await
}

async fn followers<DS: Datastore>(
    state: web::Data<State<DS>>,
    auth: Option<BearerAuth>,
    username: web::Path<String>,
) -> Fallible<web::Json<Vec<UserFacingUser>>> {
    observe("followers", || async {
        session::current_user(&*state.ds, &state.keys, auth.as_ref()).await?;
        let user = accounts::find_by_username(&*state.ds, &username).await?;
        Ok(web::Json(graph::followers(&*state.ds, &user).await?.coerce_into()))
    })
    .await
}

async fn following<DS: Datastore>(
    state: web::Data<State<DS>>,
    auth: Option<BearerAuth>,
    username: web::Path<String>,
) -> Fallible<web::Json<Vec<UserFacingUser>>> {
    observe("following", || async {
        session::current_user(&*state.ds, &state.keys, auth.as_ref()).await?;
        let user = accounts::find_by_username(&*state.ds, &username).await?;
        Ok(web::Json(graph::following(&*state.ds, &user).await?.coerce_into()))
    })
    .await
}
