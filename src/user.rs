/*!
Database users.
*/

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    /// Name of the one role-specific column that should be non-NULL for
    /// a user of this role.
    pub fn attr_column(&self) -> &'static str {
        match self {
            Role::Admin   => "residence",
            Role::Teacher => "course",
            Role::Student => "school",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let token = match self {
            Role::Admin   => "Admin",
            Role::Teacher => "Teacher",
            Role::Student => "Student",
        };

        write!(f, "{}", token)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin"   => Ok(Role::Admin),
            "Teacher" => Ok(Role::Teacher),
            "Student" => Ok(Role::Student),
            _ => Err(format!("{:?} is not a valid Role.", s)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BaseUser {
    pub id: i64,
    pub uname: String,
    pub email: String,
    /// Opaque PHC-format password digest; never rendered anywhere.
    pub hash: String,
}

impl BaseUser {
    pub fn into_admin(self, residence: String) -> User {
        User::Admin(Admin { base: self, residence })
    }
    pub fn into_teacher(self, course: String) -> User {
        User::Teacher(Teacher { base: self, course })
    }
    pub fn into_student(self, school: String) -> User {
        User::Student(Student { base: self, school })
    }
}

#[derive(Clone, Debug)]
pub struct Admin {
    pub base: BaseUser,
    pub residence: String,
}

#[derive(Clone, Debug)]
pub struct Teacher {
    pub base: BaseUser,
    pub course: String,
}

#[derive(Clone, Debug)]
pub struct Student {
    pub base: BaseUser,
    pub school: String,
}

#[derive(Clone, Debug)]
pub enum User {
    Admin(Admin),
    Teacher(Teacher),
    Student(Student),
}

impl User {
    pub fn uname(&self) -> &str {
        match self {
            User::Admin(a) => &a.base.uname,
            User::Teacher(t) => &t.base.uname,
            User::Student(s) => &s.base.uname,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            User::Admin(a) => &a.base.email,
            User::Teacher(t) => &t.base.email,
            User::Student(s) => &s.base.email,
        }
    }

    pub fn hash(&self) -> &str {
        match self {
            User::Admin(a) => &a.base.hash,
            User::Teacher(t) => &t.base.hash,
            User::Student(s) => &s.base.hash,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            User::Admin(_) => Role::Admin,
            User::Teacher(_) => Role::Teacher,
            User::Student(_) => Role::Student,
        }
    }

    /// The value of the one role-specific attribute this user carries.
    pub fn role_attr(&self) -> &str {
        match self {
            User::Admin(a) => &a.residence,
            User::Teacher(t) => &t.course,
            User::Student(s) => &s.school,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trip() {
        for role in [Role::Admin, Role::Teacher, Role::Student] {
            let s = role.to_string();
            let back: Role = s.parse().unwrap();
            assert_eq!(role, back);
        }

        assert!("Boss".parse::<Role>().is_err());
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn role_attrs() {
        let base = BaseUser {
            id: 1,
            uname: "alice".to_owned(),
            email: "a@x.com".to_owned(),
            hash: "$argon2id$not-a-real-hash".to_owned(),
        };

        let u = base.clone().into_admin("NY".to_owned());
        assert_eq!(u.role(), Role::Admin);
        assert_eq!(u.role_attr(), "NY");
        assert_eq!(u.uname(), "alice");

        let u = base.clone().into_teacher("Geometry".to_owned());
        assert_eq!(u.role(), Role::Teacher);
        assert_eq!(u.role_attr(), "Geometry");

        let u = base.into_student("Springfield High".to_owned());
        assert_eq!(u.role(), Role::Student);
        assert_eq!(u.role_attr(), "Springfield High");
        assert_eq!(Role::Student.attr_column(), "school");
    }
}
