//! Home page

use axum::{
    Router,
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
};

use crate::AppState;
use crate::auth::{LOGIN_PATH, SessionContext};
use crate::error::AppError;

pub fn home_router() -> Router<AppState> {
    Router::new().route("/", get(home))
}

/// GET /
///
/// Sign-in link for visitors, settings link and logout for signed-in users.
async fn home(
    State(state): State<AppState>,
    context: SessionContext,
) -> Result<impl IntoResponse, AppError> {
    let user = match context
        .session
        .user_id
        .as_deref()
        .filter(|_| context.session.is_authenticated())
    {
        Some(user_id) => state.db.get_user(user_id).await?,
        None => None,
    };

    let body = match user {
        Some(user) => format!(
            r#"<p>Signed in as @{screen_name}</p>
    <a href="/settings">Settings</a>
    <form method="post" action="/logout"><button type="submit">Sign out</button></form>"#,
            screen_name = html_escape::encode_text(&user.screen_name),
        ),
        None => format!(r#"<a href="{LOGIN_PATH}">Sign in with Twitter</a>"#),
    };

    Ok(Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>osutweet</title></head>
<body>
    <h1>osutweet</h1>
    <p>Tweet your osu! statistics.</p>
    {body}
</body>
</html>
"#
    )))
}
