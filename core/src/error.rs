use thiserror::Error;

/// Failures a front end needs to tell apart from ordinary errors.
///
/// These travel inside `anyhow::Error`; callers recover them with
/// `err.downcast_ref::<StrideError>()`.
#[derive(Debug, Error)]
pub enum StrideError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("User {0} not found")]
    UserNotFound(i64),

    #[error("Food {0} not found")]
    FoodNotFound(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = StrideError::UserNotFound(7).into();
        let err = err.context("Loading profile");
        assert!(matches!(
            err.downcast_ref::<StrideError>(),
            Some(StrideError::UserNotFound(7))
        ));
        assert_eq!(format!("{err:#}"), "Loading profile: User 7 not found");
    }
}
