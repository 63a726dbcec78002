/*!
Password verification and login session tracking.

Passwords are hashed with Argon2id into self-describing PHC strings;
the digest is the only thing the `store` ever sees. Sessions are
opaque random keys mapped to unames in process memory; a key is issued
at login, travels back and forth in a cookie, and is revoked at
logout. Restarting the process logs everyone out, which is fine.
*/
use std::collections::HashMap;

use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::OsRng,
    },
};
use rand::{Rng, distributions};
use tokio::sync::RwLock;

const DEFAULT_KEY_LENGTH: usize = 32;
const DEFAULT_KEY_CHARS: &str =
"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, PartialEq)]
pub struct AuthError(String);

impl AuthError {
    /// Prepend some contextual `annotation` for the error.
    fn annotate(self, annotation: &str) -> Self {
        let s = format!("{}: {}", annotation, &self.0);
        Self(s)
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

/// Hash `plaintext` with a fresh random salt into a PHC-format string.
pub fn hash_password(plaintext: &str) -> Result<String, AuthError> {
    log::trace!("hash_password( [ {} bytes ] ) called.", plaintext.len());

    let salt = SaltString::generate(&mut OsRng);
    let digest = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| AuthError(format!("{}", &e))
            .annotate("Error hashing password"))?;

    Ok(digest.to_string())
}

/// Check `plaintext` against a stored digest.
///
/// A digest that won't even parse is an error; a well-formed digest
/// that doesn't match is just `Ok(false)`.
pub fn verify_password(plaintext: &str, digest: &str) -> Result<bool, AuthError> {
    log::trace!("verify_password( [ {} bytes ], ... ) called.", plaintext.len());

    let parsed = PasswordHash::new(digest)
        .map_err(|e| AuthError(format!("{}", &e))
            .annotate("Stored digest unparseable"))?;

    Ok(Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok())
}

/**
The table of live login sessions.

One of these lives in the `Glob` for the life of the process. Keys are
random alphanumeric strings long enough that guessing one is not a
realistic plan.
*/
#[derive(Debug)]
pub struct Sessions {
    keys: RwLock<HashMap<String, String>>,
    key_chars: Vec<char>,
    key_length: usize,
}

impl Sessions {
    pub fn new() -> Self {
        let key_chars: Vec<char> = DEFAULT_KEY_CHARS.chars().collect();
        let key_length = DEFAULT_KEY_LENGTH;

        Self {
            keys: RwLock::new(HashMap::new()),
            key_chars,
            key_length,
        }
    }

    /// Generate a new session key based on the current values of
    /// self.key_chars and self.key_length.
    fn generate_key(&self) -> String {
        // self.key_chars should never have zero length.
        let dist = distributions::Slice::new(&self.key_chars).unwrap();
        let rng = rand::thread_rng();
        let new_key: String = rng.sample_iter(&dist)
            .take(self.key_length)
            .collect();
        new_key
    }

    /// Establish a session for `uname`, returning the key that will
    /// ride in the session cookie.
    pub async fn issue_key(&self, uname: &str) -> String {
        log::trace!("Sessions::issue_key( {:?} ) called.", uname);

        let key = self.generate_key();
        self.keys.write().await
            .insert(key.clone(), uname.to_owned());
        key
    }

    /// The uname bound to `key`, if `key` names a live session.
    pub async fn uname_for_key(&self, key: &str) -> Option<String> {
        log::trace!("Sessions::uname_for_key( {:?} ) called.", key);

        self.keys.read().await.get(key).cloned()
    }

    /// Tear down the session for `key`. Returns whether there was one.
    pub async fn revoke_key(&self, key: &str) -> bool {
        log::trace!("Sessions::revoke_key( {:?} ) called.", key);

        self.keys.write().await.remove(key).is_some()
    }
}

impl Default for Sessions {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    #[test]
    fn password_round_trip() {
        ensure_logging();

        let digest = hash_password("p1").unwrap();
        assert!(digest.starts_with("$argon2"));
        assert!(verify_password("p1", &digest).unwrap());
        assert!(!verify_password("p2", &digest).unwrap());

        // Two hashes of the same password must not collide (fresh salt
        // per call).
        let again = hash_password("p1").unwrap();
        assert_ne!(digest, again);
        assert!(verify_password("p1", &again).unwrap());
    }

    #[test]
    fn garbage_digest_is_an_error() {
        ensure_logging();
        assert!(verify_password("p1", "not a digest").is_err());
    }

    #[tokio::test]
    async fn session_lifecycle() {
        ensure_logging();

        let sessions = Sessions::new();
        let key = sessions.issue_key("alice").await;
        assert_eq!(key.len(), DEFAULT_KEY_LENGTH);

        assert_eq!(
            sessions.uname_for_key(&key).await.as_deref(),
            Some("alice")
        );
        assert!(sessions.uname_for_key("no-such-key").await.is_none());

        assert!(sessions.revoke_key(&key).await);
        assert!(sessions.uname_for_key(&key).await.is_none());
        // Revoking twice is quietly a no-op.
        assert!(!sessions.revoke_key(&key).await);
    }

    #[tokio::test]
    async fn distinct_keys_per_login() {
        ensure_logging();

        let sessions = Sessions::new();
        let a = sessions.issue_key("alice").await;
        let b = sessions.issue_key("alice").await;
        assert_ne!(a, b);

        // Both sessions are live at once.
        assert_eq!(sessions.uname_for_key(&a).await.as_deref(), Some("alice"));
        assert_eq!(sessions.uname_for_key(&b).await.as_deref(), Some("alice"));
    }
}
