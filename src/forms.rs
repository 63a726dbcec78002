/*!
Registration and login form data, and the checks applied to it.

Each role gets its own `Deserialize` struct because each form carries a
differently-named role attribute (residence, course, school). All three
funnel into a common `Registration`, so the actual rules live in one
place, parameterized by the role's field set.
*/
use serde::Deserialize;

use crate::store::{DbError, Store};
use crate::user::Role;

/// Data type to read the form data from a front-page login request.
#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub uname: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminRegistration {
    pub uname: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub residence: String,
}

#[derive(Debug, Deserialize)]
pub struct TeacherRegistration {
    pub uname: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub course: String,
}

#[derive(Debug, Deserialize)]
pub struct StudentRegistration {
    pub uname: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub school: String,
}

/// A submitted registration with the role attribute folded down to one
/// field; what the shared validation and the insert both consume.
#[derive(Debug)]
pub struct Registration {
    pub role: Role,
    pub uname: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub attr: String,
}

impl From<AdminRegistration> for Registration {
    fn from(f: AdminRegistration) -> Self {
        Registration {
            role: Role::Admin,
            uname: f.uname,
            email: f.email,
            password: f.password,
            confirm_password: f.confirm_password,
            attr: f.residence,
        }
    }
}

impl From<TeacherRegistration> for Registration {
    fn from(f: TeacherRegistration) -> Self {
        Registration {
            role: Role::Teacher,
            uname: f.uname,
            email: f.email,
            password: f.password,
            confirm_password: f.confirm_password,
            attr: f.course,
        }
    }
}

impl From<StudentRegistration> for Registration {
    fn from(f: StudentRegistration) -> Self {
        Registration {
            role: Role::Student,
            uname: f.uname,
            email: f.email,
            password: f.password,
            confirm_password: f.confirm_password,
            attr: f.school,
        }
    }
}

/// One problem with one submitted field. `field` matches the form
/// input's name attribute, so the template can hang the message on the
/// right input.
#[derive(Debug, PartialEq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn required(field: &'static str) -> Self {
        FieldError {
            field,
            message: "This field is required.".to_owned(),
        }
    }
}

/// The "taken" message for a uniqueness collision on `field`, whether
/// it came from a validation pre-check or from the database constraint
/// itself.
pub fn taken_message(field: &'static str) -> FieldError {
    let noun = match field {
        "uname" => "username",
        "email" => "email",
        "residence" => "residence",
        "school" => "school",
        "course" => "course",
        _ => "value",
    };
    FieldError {
        field,
        message: format!("That {} is taken. Please choose a different one.", noun),
    }
}

/// Just-plausible-enough email shape check: one `@`, something before
/// it, a dot-bearing domain after it. Deliverability is the mail
/// server's problem.
fn looks_like_email(s: &str) -> bool {
    let mut parts = s.split('@');
    let local = match parts.next() {
        Some(p) => p,
        None => { return false; },
    };
    let domain = match parts.next() {
        Some(p) => p,
        None => { return false; },
    };
    if parts.next().is_some() {
        return false;
    }

    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// The checks that need no database: presence, email shape, password
/// confirmation.
pub fn structural_errors(reg: &Registration) -> Vec<FieldError> {
    log::trace!(
        "structural_errors( [ {} registration for {:?} ] ) called.",
        reg.role, &reg.uname
    );

    let mut errors: Vec<FieldError> = Vec::new();

    if reg.uname.trim().is_empty() {
        errors.push(FieldError::required("uname"));
    }

    if reg.email.trim().is_empty() {
        errors.push(FieldError::required("email"));
    } else if !looks_like_email(reg.email.trim()) {
        errors.push(FieldError {
            field: "email",
            message: "That doesn't look like an email address.".to_owned(),
        });
    }

    if reg.attr.trim().is_empty() {
        errors.push(FieldError::required(reg.role.attr_column()));
    }

    if reg.password.is_empty() {
        errors.push(FieldError::required("password"));
    }
    if reg.confirm_password.is_empty() {
        errors.push(FieldError::required("confirm_password"));
    } else if !reg.password.is_empty() && reg.password != reg.confirm_password {
        errors.push(FieldError {
            field: "confirm_password",
            message: "Passwords must match.".to_owned(),
        });
    }

    errors
}

/**
Run the full set of registration checks, structural ones first, then
uname/email uniqueness against the store.

An empty error Vec means the registration may proceed to the insert.
The insert can still fail with `DbError::Duplicate` if a concurrent
registration wins the race between these checks and the write; callers
fold that case back into the same "taken" message.
*/
pub async fn validate(
    reg: &Registration,
    store: &Store,
) -> Result<Vec<FieldError>, DbError> {
    log::trace!("validate( [ {} registration ], [ Store ] ) called.", reg.role);

    let mut errors = structural_errors(reg);

    let uname = reg.uname.trim();
    if !uname.is_empty() && store.get_user_by_uname(uname).await?.is_some() {
        errors.push(taken_message("uname"));
    }

    let email = reg.email.trim();
    if !email.is_empty() && store.get_user_by_email(email).await?.is_some() {
        errors.push(taken_message("email"));
    }

    Ok(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    fn good_admin() -> Registration {
        Registration {
            role: Role::Admin,
            uname: "alice".to_owned(),
            email: "a@x.com".to_owned(),
            password: "p1".to_owned(),
            confirm_password: "p1".to_owned(),
            attr: "NY".to_owned(),
        }
    }

    #[test]
    fn good_registration_passes() {
        ensure_logging();
        assert!(structural_errors(&good_admin()).is_empty());
    }

    #[test]
    fn blank_fields_are_caught() {
        ensure_logging();

        let mut reg = good_admin();
        reg.uname = "   ".to_owned();
        reg.attr = String::new();
        let errors = structural_errors(&reg);

        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["uname", "residence"]);
    }

    #[test]
    fn attr_error_names_the_roles_field() {
        ensure_logging();

        let reg = Registration {
            role: Role::Student,
            attr: String::new(),
            ..good_admin()
        };
        let errors = structural_errors(&reg);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "school");
    }

    #[test]
    fn email_shapes() {
        ensure_logging();

        for good in ["a@x.com", "first.last@sub.example.org", "x@y.z"] {
            assert!(looks_like_email(good), "{:?} should pass", good);
        }
        for bad in ["", "plainaddress", "@x.com", "a@", "a@nodot", "a@.com", "a@x.com.", "a@b@c.com"] {
            assert!(!looks_like_email(bad), "{:?} should fail", bad);
        }
    }

    #[test]
    fn password_mismatch_is_caught() {
        ensure_logging();

        let mut reg = good_admin();
        reg.confirm_password = "p2".to_owned();
        let errors = structural_errors(&reg);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "confirm_password");
        assert_eq!(errors[0].message, "Passwords must match.");
    }

    #[test]
    fn missing_confirmation_is_required_not_mismatched() {
        ensure_logging();

        let mut reg = good_admin();
        reg.confirm_password = String::new();
        let errors = structural_errors(&reg);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "This field is required.");
    }

    #[test]
    fn per_role_structs_fold_to_the_right_attr() {
        ensure_logging();

        let reg: Registration = TeacherRegistration {
            uname: "jenny".to_owned(),
            email: "jenny@x.com".to_owned(),
            password: "p1".to_owned(),
            confirm_password: "p1".to_owned(),
            course: "Geometry".to_owned(),
        }.into();
        assert_eq!((reg.role, reg.attr.as_str()), (Role::Teacher, "Geometry"));

        let reg: Registration = StudentRegistration {
            uname: "jsmith".to_owned(),
            email: "js@x.com".to_owned(),
            password: "p1".to_owned(),
            confirm_password: "p1".to_owned(),
            school: "Springfield High".to_owned(),
        }.into();
        assert_eq!((reg.role, reg.attr.as_str()), (Role::Student, "Springfield High"));
    }

    #[test]
    fn taken_messages_name_the_field() {
        ensure_logging();

        let e = taken_message("uname");
        assert_eq!(e.field, "uname");
        assert_eq!(e.message, "That username is taken. Please choose a different one.");

        assert_eq!(taken_message("course").field, "course");
    }
}
