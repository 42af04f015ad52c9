use thiserror::Error;

use super::sequence::Cancelled;

/// Outcome errors of the auth flow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("User is not signed in")]
    NotSignedIn,

    #[error("Username or Password is incorrect")]
    InvalidCredentials,

    #[error("Sign-out failed: {0}")]
    SignOut(String),

    #[error("Could not obtain ID token: {0}")]
    Token(String),

    #[error("Auth flow cancelled")]
    Cancelled,
}

impl From<Cancelled> for AuthError {
    fn from(_: Cancelled) -> Self {
        AuthError::Cancelled
    }
}
