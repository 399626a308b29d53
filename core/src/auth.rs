use anyhow::{Context, Result};

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
// Keeps the registration-heavy test suite fast
#[cfg(test)]
const HASH_COST: u32 = 4; // bcrypt::MIN_COST (private in bcrypt 0.16)

/// bcrypt hash with an embedded random salt, as stored in `users`.
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, HASH_COST).context("Failed to hash password")
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    bcrypt::verify(password, password_hash).context("Stored password hash is malformed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_password() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_same_password_hashes_differ() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("same-password", &a).unwrap());
        assert!(verify_password("same-password", &b).unwrap());
    }

    #[test]
    fn test_hash_is_bcrypt_with_work_factor() {
        let hash = hash_password("pw-1!").unwrap();
        assert_eq!(hash.len(), 60);
        assert!(hash.starts_with(&format!("$2b${HASH_COST:02}$")));
        assert!(!hash.contains("pw-1!"));
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(verify_password("pw", "not-a-bcrypt-hash").is_err());
    }
}
