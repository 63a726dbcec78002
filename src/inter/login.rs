/*!
Logging users in and out.
*/
use axum::extract::Form;
use serde_json::json;

use crate::auth;
use crate::forms::LoginData;
use super::*;

/// Render the login page. `error_message` is the generic
/// bad-credentials line; `notice` is the post-registration nudge.
pub fn login_page(
    code: StatusCode,
    error_message: Option<&str>,
    notice: Option<&str>,
) -> Response {
    log::trace!("login::login_page( {} ) called.", &code);

    let data = json!({
        "title": "Login",
        "error_message": error_message,
        "notice": notice,
    });

    serve_template(code, "login", &data, vec![])
}

pub async fn form(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    log::trace!("login::form() called.");

    if let Some(u) = current_user(&headers, &glob).await {
        return redirect_to(dashboard_path(u.role()));
    }

    login_page(StatusCode::OK, None, None)
}

pub async fn submit(
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<LoginData>,
) -> Response {
    log::trace!("login::submit( {:?} ) called.", &form.uname);

    let uname = form.uname.trim();

    let user = match glob.store.get_user_by_uname(uname).await {
        Ok(Some(u)) => u,
        // An unknown uname gets the same response as a bad password;
        // nothing here confirms whether an account exists.
        Ok(None) => { return respond_bad_password(); },
        Err(e) => {
            log::error!("Error fetching user {:?} at login: {}", uname, &e);
            return html_500();
        },
    };

    match auth::verify_password(&form.password, user.hash()) {
        Ok(true) => { /* This is the good path; fall through. */ },
        Ok(false) => { return respond_bad_password(); },
        Err(e) => {
            log::error!(
                "Error verifying password for {:?}: {}",
                user.uname(), &e
            );
            return html_500();
        },
    }

    let key = glob.sessions.issue_key(user.uname()).await;
    log::info!("{} {:?} logged in.", user.role(), user.uname());

    redirect_to(dashboard_path(user.role()))
        .add_headers(vec![set_session_cookie(&key)])
}

pub async fn logout(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    log::trace!("login::logout() called.");

    if let Some(key) = session_key(&headers) {
        if glob.sessions.revoke_key(&key).await {
            log::trace!("    ...session revoked.");
        } else {
            log::trace!("    ...cookie held a dead key.");
        }
    }

    redirect_to("/login")
        .add_headers(vec![clear_session_cookie()])
}
