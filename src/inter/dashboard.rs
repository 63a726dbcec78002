/*!
The role-gated dashboard pages.
*/
use serde_json::json;

use super::*;

pub async fn admin(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    serve(Role::Admin, headers, glob).await
}

pub async fn teacher(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    serve(Role::Teacher, headers, glob).await
}

pub async fn student(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    serve(Role::Student, headers, glob).await
}

async fn serve(role: Role, headers: HeaderMap, glob: Arc<Glob>) -> Response {
    log::trace!("dashboard::serve( {} ) called.", role);

    let user = match current_user(&headers, &glob).await {
        Some(u) => u,
        None => { return redirect_to("/login"); },
    };

    // Authenticated, but this is not their page; send them to theirs.
    if user.role() != role {
        return redirect_to(dashboard_path(user.role()));
    }

    match role {
        Role::Admin => admin_page(&user, &glob).await,
        _ => profile_page(&user),
    }
}

/// Admins additionally get the roster of everyone registered.
async fn admin_page(user: &User, glob: &Glob) -> Response {
    log::trace!("dashboard::admin_page( {:?} ) called.", user.uname());

    let users = match glob.store.get_users().await {
        Ok(users) => users,
        Err(e) => {
            log::error!("Error fetching user roster: {}", &e);
            return html_500();
        },
    };

    let roster: Vec<serde_json::Value> = users.iter()
        .map(|u| json!({
            "uname": u.uname(),
            "email": u.email(),
            "role": u.role().to_string(),
            "attr": u.role_attr(),
        }))
        .collect();

    let data = json!({
        "title": "Admin Dashboard",
        "role": user.role().to_string(),
        "uname": user.uname(),
        "email": user.email(),
        "attr_label": attr_label(user.role()),
        "attr": user.role_attr(),
        "roster": roster,
    });

    serve_template(StatusCode::OK, "dashboard", &data, vec![])
}

fn profile_page(user: &User) -> Response {
    log::trace!("dashboard::profile_page( {:?} ) called.", user.uname());

    let data = json!({
        "title": format!("{} Dashboard", user.role()),
        "role": user.role().to_string(),
        "uname": user.uname(),
        "email": user.email(),
        "attr_label": attr_label(user.role()),
        "attr": user.role_attr(),
    });

    serve_template(StatusCode::OK, "dashboard", &data, vec![])
}
