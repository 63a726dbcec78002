/*!
Interoperation between the client (user) and server.

(Not the application and the database; that's covered by `auth` and
`store`.)
*/
use std::{
    fmt::Debug,
    path::Path,
    sync::Arc,
};

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    http::header::{HeaderMap, HeaderName, HeaderValue},
    response::{Html, IntoResponse, Redirect, Response},
};
use handlebars::Handlebars;
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::json;

use crate::config::Glob;
use crate::user::{Role, User};

pub mod dashboard;
pub mod login;
pub mod register;

static TEMPLATES: OnceCell<Handlebars> = OnceCell::new();

/// Name of the cookie the session key rides in.
pub const SESSION_COOKIE: &str = "enroll_session";

static HTML_500: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>enroll | Error</title>
<link rel="stylesheet" href="/static/enroll.css">
</head>
<body>
<h1>Internal Server Error</h1>
<p>(Error 500)</p>
<p>Something went wrong on our end. No further or more
helpful information is available about the problem.</p>
</body>
</html>"#;

/// The one place role maps to dashboard path; everything that steers a
/// logged-in user somewhere goes through `dashboard_path()`.
static DASHBOARDS: &[(Role, &str)] = &[
    (Role::Admin, "/dashboard/admin"),
    (Role::Teacher, "/dashboard/teacher"),
    (Role::Student, "/dashboard/student"),
];

pub fn dashboard_path(role: Role) -> &'static str {
    // DASHBOARDS covers every Role variant.
    DASHBOARDS.iter()
        .find(|(r, _)| *r == role)
        .map(|(_, path)| *path)
        .unwrap()
}

/// Human-facing label for the role's attribute field.
pub fn attr_label(role: Role) -> &'static str {
    match role {
        Role::Admin => "Residence",
        Role::Teacher => "Course",
        Role::Student => "School",
    }
}

trait AddHeaders: IntoResponse + Sized {
    fn add_headers(self, mut new_headers: Vec<(HeaderName, HeaderValue)>) -> Response {
        let mut r = self.into_response();
        let r_headers = r.headers_mut();
        for (name, value) in new_headers.drain(..) {
            r_headers.insert(name, value);
        }

        r
    }
}

impl<T: IntoResponse + Sized> AddHeaders for T {}

/**
Initializes the resources used in this module. This function should be called
before any functionality of this module or any of its submodules is used.

Currently the only thing that happens here is loading the templates used by
`serve_template()`, which will panic unless `init()` has been called first.

The argument is the path to the directory where the templates used by
`serve_template()` can be found.
*/
pub fn init<P: AsRef<Path>>(template_dir: P) -> Result<(), String> {
    if TEMPLATES.get().is_some() {
        log::warn!("Templates directory already initialized; ignoring.");
        return Ok(())
    }

    let template_dir = template_dir.as_ref();

    let mut h = Handlebars::new();
    #[cfg(debug_assertions)]
    h.set_dev_mode(true);
    h.register_templates_directory(".html", template_dir)
        .map_err(|e| format!(
            "Error registering templates directory {}: {}",
            template_dir.display(), &e
        ))?;

    TEMPLATES.set(h)
        .map_err(|old_h| {
            let mut estr = String::from("Templates directory already registered w/templates:");
            for template_name in old_h.get_templates().keys() {
                estr.push('\n');
                estr.push_str(template_name.as_str());
            }
            estr
        })?;

    Ok(())
}

/**
Return an HTML response in the case of an unrecoverable* error.

(*"Unrecoverable" from the perspective of fielding the current request,
not from the perspective of the program crashing.)
*/
pub fn html_500() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(HTML_500)
    ).into_response()
}

pub fn serve_template<S>(
    code: StatusCode,
    template_name: &str,
    data: &S,
    addl_headers: Vec<(HeaderName, HeaderValue)>
) -> Response
where
    S: Serialize + Debug
{
    log::trace!("serve_template( {}, {:?}, ... ) called.", &code, template_name);

    match TEMPLATES.get().unwrap().render(template_name, data) {
        Ok(response_body) => (
            code,
            Html(response_body)
        ).add_headers(addl_headers),
        Err(e) => {
            log::error!(
                "Error rendering template {:?} with data {:?}:\n{}",
                template_name, data, &e
            );
            html_500()
        },
    }
}

/// The one message a failed login gets, whichever half of the
/// credentials was wrong.
pub fn respond_bad_password() -> Response {
    log::trace!("respond_bad_password() called.");

    let data = json!({
        "title": "Login",
        "error_message": "Invalid username/password combination."
    });

    serve_template(
        StatusCode::UNAUTHORIZED,
        "login",
        &data,
        vec![]
    )
}

pub fn redirect_to(path: &str) -> Response {
    log::trace!("redirect_to( {:?} ) called.", path);

    Redirect::to(path).into_response()
}

/// Pull the session key out of the request's Cookie header, if it has
/// one.
pub fn session_key(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;

    for pair in cookies.split(';') {
        if let Some((name, value)) = pair.trim().split_once('=') {
            if name == SESSION_COOKIE {
                return Some(value.to_owned());
            }
        }
    }

    None
}

pub fn set_session_cookie(key: &str) -> (HeaderName, HeaderValue) {
    let value = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, key
    );
    // Session keys come from a fixed alphanumeric alphabet, so this
    // value is always a legal header.
    (header::SET_COOKIE, HeaderValue::from_str(&value).unwrap())
}

pub fn clear_session_cookie() -> (HeaderName, HeaderValue) {
    (
        header::SET_COOKIE,
        HeaderValue::from_static(
            "enroll_session=; Path=/; HttpOnly; Max-Age=0"
        ),
    )
}

/**
Resolve the requester's authenticated identity: read the session cookie,
look the key up in the live-session table, then fetch the user record.

`None` covers every unauthenticated shade: no cookie, a revoked or
made-up key, or a session pointing at a user the store no longer
returns.
*/
pub async fn current_user(headers: &HeaderMap, glob: &Glob) -> Option<User> {
    let key = session_key(headers)?;
    let uname = glob.sessions.uname_for_key(&key).await?;

    match glob.store.get_user_by_uname(&uname).await {
        Ok(u) => u,
        Err(e) => {
            log::error!(
                "Error fetching user {:?} for live session: {}",
                &uname, &e
            );
            None
        },
    }
}

/// The landing page: a dashboard redirect for the logged-in, links to
/// the forms for everyone else.
pub async fn home(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    log::trace!("home() called.");

    if let Some(u) = current_user(&headers, &glob).await {
        return redirect_to(dashboard_path(u.role()));
    }

    let data = json!({ "title": "Home" });
    serve_template(StatusCode::OK, "index", &data, vec![])
}
