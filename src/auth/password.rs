use anyhow::anyhow;
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

fn argon2() -> Argon2<'static> {
    Argon2::default()
}

/// PHC string stored for a newly registered or updated account password.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    argon2()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("argon2 hashing failed: {e}"))
}

/// Checks a login attempt against the stored PHC string.
///
/// A wrong password is `Ok(false)`. A stored hash that cannot be parsed or
/// verified is an `Err`, since it points at a corrupt record rather than a
/// bad login.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "stored password hash is not a PHC string");
        anyhow!("stored password hash unreadable: {e}")
    })?;
    match argon2().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => {
            error!(error = %e, "argon2 verification failed");
            Err(anyhow!("argon2 verification failed: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_hash_is_argon2id_and_verifies() {
        let hash = hash_password("password123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("password123"));
        assert!(verify_password("password123", &hash).unwrap());
    }

    #[test]
    fn wrong_login_password_is_a_mismatch_not_an_error() {
        let hash = hash_password("password123").unwrap();
        assert!(!verify_password("password124", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn untrimmed_passwords_are_distinct() {
        let hash = hash_password(" secret12 ").unwrap();
        assert!(verify_password(" secret12 ", &hash).unwrap());
        assert!(!verify_password("secret12", &hash).unwrap());
    }

    #[test]
    fn reregistering_same_password_gets_new_salt() {
        let a = hash_password("12345678").unwrap();
        let b = hash_password("12345678").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn corrupt_stored_hash_is_an_error() {
        assert!(verify_password("anything", "plain-text-password").is_err());
    }
}
