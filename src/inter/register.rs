/*!
The three role-specific registration forms.

One form, one validation pass, one insert; the per-role handlers are
thin wrappers that pin down the role and its attribute field.
*/
use axum::extract::Form;
use serde_json::{json, Map};

use crate::forms::{
    self, AdminRegistration, FieldError, Registration, StudentRegistration,
    TeacherRegistration,
};
use crate::store::DbError;
use crate::user::BaseUser;
use super::*;

pub async fn admin_form(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    show_form(Role::Admin, headers, glob).await
}

pub async fn teacher_form(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    show_form(Role::Teacher, headers, glob).await
}

pub async fn student_form(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    show_form(Role::Student, headers, glob).await
}

pub async fn admin_submit(
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<AdminRegistration>,
) -> Response {
    submit(form.into(), glob).await
}

pub async fn teacher_submit(
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<TeacherRegistration>,
) -> Response {
    submit(form.into(), glob).await
}

pub async fn student_submit(
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<StudentRegistration>,
) -> Response {
    submit(form.into(), glob).await
}

async fn show_form(role: Role, headers: HeaderMap, glob: Arc<Glob>) -> Response {
    log::trace!("register::show_form( {} ) called.", role);

    // An authenticated user gets steered to their dashboard instead of
    // a blank form.
    if let Some(u) = current_user(&headers, &glob).await {
        return redirect_to(dashboard_path(u.role()));
    }

    registration_page(StatusCode::OK, role, None, &[])
}

/**
Render the registration form for `role`.

On a validation re-render, `values` carries the submitted field values
back into the form; the password fields always come back blank. Errors
hang off the field they belong to.
*/
fn registration_page(
    code: StatusCode,
    role: Role,
    values: Option<&Registration>,
    errors: &[FieldError],
) -> Response {
    log::trace!(
        "register::registration_page( {}, {}, [ {} errors ] ) called.",
        &code, role, errors.len()
    );

    let mut error_map = Map::new();
    for e in errors.iter() {
        // First error per field wins.
        if !error_map.contains_key(e.field) {
            error_map.insert(e.field.to_owned(), json!(&e.message));
        }
    }

    let data = json!({
        "title": format!("{} Registration", role),
        "role": role.to_string(),
        "action": format!("/register/{}", role.to_string().to_lowercase()),
        "attr_field": role.attr_column(),
        "attr_label": attr_label(role),
        "uname": values.map(|v| v.uname.as_str()).unwrap_or(""),
        "email": values.map(|v| v.email.as_str()).unwrap_or(""),
        "attr": values.map(|v| v.attr.as_str()).unwrap_or(""),
        "errors": error_map,
    });

    serve_template(code, "register", &data, vec![])
}

async fn submit(reg: Registration, glob: Arc<Glob>) -> Response {
    log::trace!(
        "register::submit( [ {} registration for {:?} ] ) called.",
        reg.role, &reg.uname
    );

    let errors = match forms::validate(&reg, &glob.store).await {
        Ok(errors) => errors,
        Err(e) => {
            log::error!(
                "Error validating {} registration for {:?}: {}",
                reg.role, &reg.uname, &e
            );
            return html_500();
        },
    };
    if !errors.is_empty() {
        return registration_page(StatusCode::OK, reg.role, Some(&reg), &errors);
    }

    let digest = match crate::auth::hash_password(&reg.password) {
        Ok(digest) => digest,
        Err(e) => {
            log::error!(
                "Error hashing password for new {} {:?}: {}",
                reg.role, &reg.uname, &e
            );
            return html_500();
        },
    };

    // The id is the database's to assign.
    let base = BaseUser {
        id: 0,
        uname: reg.uname.trim().to_owned(),
        email: reg.email.trim().to_owned(),
        hash: digest,
    };
    let attr = reg.attr.trim().to_owned();
    let user = match reg.role {
        Role::Admin => base.into_admin(attr),
        Role::Teacher => base.into_teacher(attr),
        Role::Student => base.into_student(attr),
    };

    match glob.store.insert_user(&user).await {
        Ok(id) => {
            log::info!(
                "Registered {} {:?} ({}) with id {}.",
                user.role(), user.uname(), user.email(), &id
            );
            login::login_page(
                StatusCode::OK,
                None,
                Some("Registered successfully. Log in below."),
            )
        },
        Err(DbError::Duplicate(field)) => {
            // A concurrent registration won the race between the
            // validation pre-check and this insert; same message the
            // validator would have given.
            log::info!(
                "Registration for {:?} lost a uniqueness race on {}.",
                user.uname(), field
            );
            let errors = vec![forms::taken_message(field)];
            registration_page(StatusCode::OK, reg.role, Some(&reg), &errors)
        },
        Err(e) => {
            log::error!(
                "Error inserting {} {:?} into user DB: {}",
                reg.role, &reg.uname, &e
            );
            html_500()
        },
    }
}
