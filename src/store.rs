/*!
Database interaction module.

The Postgres database to which this connects holds the single table of
registered users.

```sql

CREATE TABLE users (
    id        BIGSERIAL PRIMARY KEY,
    uname     TEXT NOT NULL UNIQUE,
    email     TEXT NOT NULL UNIQUE,
    hash      TEXT NOT NULL,
    role      TEXT NOT NULL,  /* one of { 'Admin', 'Teacher', 'Student' } */
    residence TEXT UNIQUE,    /* Admins only */
    school    TEXT UNIQUE,    /* Students only */
    course    TEXT UNIQUE     /* Teachers only */
);
```

Exactly one of the three role-specific columns is non-NULL per row;
Postgres `UNIQUE` admits any number of NULLs in the other two. The
`UNIQUE` constraints are the authoritative duplicate check: the form
validator's pre-checks can race with a concurrent registration, so a
violation surfacing from the insert itself is converted to
`DbError::Duplicate` and handled exactly like a validation failure.
*/
use std::fmt::Write;

use tokio_postgres::{Client, NoTls, Row, error::SqlState};

use crate::user::{BaseUser, Role, User};

static SCHEMA: &[(&str, &str, &str)] = &[
    (
        "SELECT FROM information_schema.tables WHERE table_name = 'users'",
        "CREATE TABLE users (
            id        BIGSERIAL PRIMARY KEY,
            uname     TEXT NOT NULL UNIQUE,
            email     TEXT NOT NULL UNIQUE,
            hash      TEXT NOT NULL,
            role      TEXT NOT NULL,
            residence TEXT UNIQUE,
            school    TEXT UNIQUE,
            course    TEXT UNIQUE
        )",
        "DROP TABLE users",
    ),
];

#[derive(Debug, PartialEq)]
pub enum DbError {
    /// A uniqueness constraint tripped; the payload is the name of the
    /// offending column.
    Duplicate(&'static str),
    Other(String),
}

impl DbError {
    /// Prepend some contextual `annotation` for the error.
    ///
    /// `Duplicate` errors pass through untouched; their meaning is
    /// exact already.
    fn annotate(self, annotation: &str) -> Self {
        match self {
            DbError::Other(s) => DbError::Other(format!("{}: {}", annotation, &s)),
            dup => dup,
        }
    }
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DbError::Duplicate(field) => write!(f, "duplicate {} value", field),
            DbError::Other(s) => write!(f, "{}", s),
        }
    }
}

impl From<tokio_postgres::error::Error> for DbError {
    fn from(e: tokio_postgres::error::Error) -> DbError {
        if let Some(dbe) = e.as_db_error() {
            if dbe.code() == &SqlState::UNIQUE_VIOLATION {
                // Postgres's default constraint names for the schema above.
                let field = match dbe.constraint() {
                    Some("users_uname_key") => "uname",
                    Some("users_email_key") => "email",
                    Some("users_residence_key") => "residence",
                    Some("users_school_key") => "school",
                    Some("users_course_key") => "course",
                    _ => "record",
                };
                return DbError::Duplicate(field);
            }
            let mut s = format!("User DB: {}", &e);
            write!(&mut s, "; {}", dbe).unwrap();
            return DbError::Other(s);
        }
        DbError::Other(format!("User DB: {}", &e))
    }
}

impl From<String> for DbError {
    fn from(s: String) -> DbError { DbError::Other(s) }
}

fn user_from_row(row: &Row) -> Result<User, DbError> {
    log::trace!("user_from_row( {:?} ) called.", row);

    let role_str: &str = row.try_get("role")?;
    let role: Role = role_str.parse()?;
    let base = BaseUser {
        id: row.try_get("id")?,
        uname: row.try_get("uname")?,
        email: row.try_get("email")?,
        hash: row.try_get("hash")?,
    };

    let attr: Option<String> = row.try_get(role.attr_column())?;
    let attr = match attr {
        Some(attr) => attr,
        None => {
            return Err(DbError::Other(format!(
                "users row {:?} has role {} but a NULL {} column.",
                &base.uname, &role, role.attr_column()
            )));
        },
    };

    let u = match role {
        Role::Admin => base.into_admin(attr),
        Role::Teacher => base.into_teacher(attr),
        Role::Student => base.into_student(attr),
    };

    log::trace!("    ...user_from_row() returning {:?}", &u);
    Ok(u)
}

#[derive(Debug)]
pub struct Store {
    connection_string: String,
}

impl Store {
    pub fn new(connection_string: String) -> Self {
        log::trace!("Store::new( {:?} ) called.", &connection_string);

        Self { connection_string }
    }

    async fn connect(&self) -> Result<Client, DbError> {
        log::trace!(
            "Store::connect() called w/connection string {:?}",
            &self.connection_string
        );

        match tokio_postgres::connect(&self.connection_string, NoTls).await {
            Ok((client, connection)) => {
                log::trace!("    ...connection successful.");
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        log::error!("User DB connection error: {}", &e);
                    } else {
                        log::trace!("tokio connection runtime drops.");
                    }
                });
                Ok(client)
            },
            Err(e) => {
                let dberr = DbError::from(e);
                log::trace!("    ...connection failed: {:?}", &dberr);
                Err(dberr.annotate("Unable to connect"))
            }
        }
    }

    pub async fn ensure_db_schema(&self) -> Result<(), DbError> {
        log::trace!("Store::ensure_db_schema() called.");

        let mut client = self.connect().await?;
        let t = client.transaction().await
            .map_err(|e| DbError::from(e)
                .annotate("User DB unable to begin transaction"))?;

        for (test_stmt, create_stmt, _) in SCHEMA.iter() {
            if t.query_opt(test_stmt.to_owned(), &[]).await?.is_none() {
                log::info!(
                    "{:?} returned no results; attempting to insert table.",
                    test_stmt
                );
                t.execute(create_stmt.to_owned(), &[]).await?;
            }
        }

        t.commit().await
            .map_err(|e| DbError::from(e)
                .annotate("Error committing transaction"))
    }

    /**
    Drop all database tables to fully reset database state.

    This is only meant for cleanup after testing. It is advisable to look at
    the ERROR level log output when testing to ensure this method did its job.
    */
    #[cfg(test)]
    pub async fn nuke_database(&self) -> Result<(), DbError> {
        log::trace!("Store::nuke_database() called.");

        let client = self.connect().await?;

        for (_, _, drop_stmt) in SCHEMA.iter().rev() {
            if let Err(e) = client.execute(drop_stmt.to_owned(), &[]).await {
                let err = DbError::from(e);
                log::error!("Error dropping: {:?}: {}", &drop_stmt, &err);
            }
        }

        log::trace!("    ...nuking complete.");
        Ok(())
    }

    /**
    Insert a freshly-registered user, returning the id the database
    assigned.

    The `id` on the passed `User` is ignored. A tripped uniqueness
    constraint comes back as `DbError::Duplicate` naming the column,
    whether the collision predated the request or arrived concurrently
    with it.
    */
    pub async fn insert_user(&self, user: &User) -> Result<i64, DbError> {
        log::trace!(
            "Store::insert_user( {:?} [{}] ) called.",
            user.uname(), user.role()
        );

        let (residence, school, course): (Option<&str>, Option<&str>, Option<&str>) =
            match user {
                User::Admin(a) => (Some(&a.residence), None, None),
                User::Student(s) => (None, Some(&s.school), None),
                User::Teacher(t) => (None, None, Some(&t.course)),
            };

        let mut client = self.connect().await?;
        let t = client.transaction().await?;

        let row = t.query_one(
            "INSERT INTO users (uname, email, hash, role, residence, school, course)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id",
            &[
                &user.uname(),
                &user.email(),
                &user.hash(),
                &user.role().to_string(),
                &residence,
                &school,
                &course,
            ]
        ).await?;
        let id: i64 = row.try_get("id")?;

        t.commit().await?;
        log::trace!(
            "Inserted {} {:?} ({}) with id {}.",
            user.role(), user.uname(), user.email(), &id
        );
        Ok(id)
    }

    pub async fn get_user_by_uname(
        &self,
        uname: &str,
    ) -> Result<Option<User>, DbError> {
        log::trace!("Store::get_user_by_uname( {:?} ) called.", uname);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM users WHERE uname = $1",
            &[&uname]
        ).await? {
            None => Ok(None),
            Some(row) => {
                let u = user_from_row(&row)
                    .map_err(|e| e.annotate("Unable to read user row"))?;
                Ok(Some(u))
            },
        }
    }

    pub async fn get_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<User>, DbError> {
        log::trace!("Store::get_user_by_email( {:?} ) called.", email);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM users WHERE email = $1",
            &[&email]
        ).await? {
            None => Ok(None),
            Some(row) => {
                let u = user_from_row(&row)
                    .map_err(|e| e.annotate("Unable to read user row"))?;
                Ok(Some(u))
            },
        }
    }

    /// All registered users, ordered by uname. This feeds the roster on
    /// the admin dashboard.
    pub async fn get_users(&self) -> Result<Vec<User>, DbError> {
        log::trace!("Store::get_users() called.");

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT * FROM users ORDER BY uname",
            &[]
        ).await?;

        let mut users: Vec<User> = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            users.push(user_from_row(row)?);
        }

        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    /*!
    These tests assume you have a Postgres instance running on your local
    machine with resources named according to what you see in the
    `static TEST_CONNECTION &str`:

    ```text
    user: enroll_test
    password: enroll_test

    with write access to:

    database: enroll_store_test
    ```

    They are all `#[ignore]`d so the default `cargo test` run requires
    no database; run them with

    ```bash
    cargo test store -- --ignored
    ```
    */
    use super::*;
    use crate::tests::ensure_logging;

    use serial_test::serial;

    static TEST_CONNECTION: &str = "host=localhost user=enroll_test password='enroll_test' dbname=enroll_store_test";

    fn sample_user(uname: &str, email: &str, role: Role, attr: &str) -> User {
        let base = BaseUser {
            id: 0,
            uname: uname.to_owned(),
            email: email.to_owned(),
            hash: "$argon2id$not-a-real-hash".to_owned(),
        };
        match role {
            Role::Admin => base.into_admin(attr.to_owned()),
            Role::Teacher => base.into_teacher(attr.to_owned()),
            Role::Student => base.into_student(attr.to_owned()),
        }
    }

    /**
    This function is for getting the database back in a blank slate state if
    a test panics partway through and leaves it munged.

    ```bash
    cargo test reset_store -- --ignored
    ```
    */
    #[tokio::test]
    #[ignore]
    #[serial]
    async fn reset_store() {
        ensure_logging();
        let db = Store::new(TEST_CONNECTION.to_owned());
        db.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn create_store() {
        ensure_logging();

        let db = Store::new(TEST_CONNECTION.to_owned());
        db.ensure_db_schema().await.unwrap();
        db.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn insert_and_fetch() {
        ensure_logging();

        let db = Store::new(TEST_CONNECTION.to_owned());
        db.ensure_db_schema().await.unwrap();

        let alice = sample_user("alice", "a@x.com", Role::Admin, "NY");
        let jenny = sample_user("jenny", "jenny@x.com", Role::Teacher, "Geometry");
        let jsmith = sample_user("jsmith", "js@x.com", Role::Student, "Springfield High");

        for u in [&alice, &jenny, &jsmith] {
            db.insert_user(u).await.unwrap();
        }

        let u = db.get_user_by_uname("alice").await.unwrap().unwrap();
        assert_eq!(
            (u.uname(), u.email(), u.role(), u.role_attr()),
            ("alice", "a@x.com", Role::Admin, "NY")
        );
        let u = db.get_user_by_email("jenny@x.com").await.unwrap().unwrap();
        assert_eq!((u.uname(), u.role()), ("jenny", Role::Teacher));

        assert!(db.get_user_by_uname("nobody").await.unwrap().is_none());

        let all = db.get_users().await.unwrap();
        let unames: Vec<&str> = all.iter().map(|u| u.uname()).collect();
        assert_eq!(unames, vec!["alice", "jenny", "jsmith"]);

        db.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn duplicates_rejected() {
        ensure_logging();

        let db = Store::new(TEST_CONNECTION.to_owned());
        db.ensure_db_schema().await.unwrap();

        let alice = sample_user("alice", "a@x.com", Role::Admin, "NY");
        db.insert_user(&alice).await.unwrap();

        let same_uname = sample_user("alice", "other@x.com", Role::Student, "Springfield High");
        assert_eq!(
            db.insert_user(&same_uname).await,
            Err(DbError::Duplicate("uname"))
        );

        let same_email = sample_user("bob", "a@x.com", Role::Teacher, "Geometry");
        assert_eq!(
            db.insert_user(&same_email).await,
            Err(DbError::Duplicate("email"))
        );

        let same_residence = sample_user("carol", "c@x.com", Role::Admin, "NY");
        assert_eq!(
            db.insert_user(&same_residence).await,
            Err(DbError::Duplicate("residence"))
        );

        // The failed inserts must not have left rows behind.
        let all = db.get_users().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].uname(), "alice");

        db.nuke_database().await.unwrap();
    }
}
