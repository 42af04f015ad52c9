use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Credentials rejected: {0}")]
    InvalidCredentials(String),

    #[error("Unauthorized - refresh token may be revoked")]
    Unauthorized,

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Identity provider is not configured (missing API key)")]
    NotConfigured,

    #[error("Session storage error: {0}")]
    Storage(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Provider error codes that mean "wrong email or password" in some form
const CREDENTIAL_CODES: &[&str] = &[
    "EMAIL_NOT_FOUND",
    "INVALID_PASSWORD",
    "INVALID_LOGIN_CREDENTIALS",
    "INVALID_EMAIL",
    "MISSING_PASSWORD",
    "MISSING_EMAIL",
    "USER_DISABLED",
];

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl IdentityError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Extract the provider's error code, e.g. `TOO_MANY_ATTEMPTS_TRY_LATER`
    /// from `"TOO_MANY_ATTEMPTS_TRY_LATER : Access to this account..."`.
    fn provider_code(body: &str) -> Option<String> {
        let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
        let code = envelope
            .error
            .message
            .split(" : ")
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        (!code.is_empty()).then_some(code)
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        if let Some(code) = Self::provider_code(body) {
            if CREDENTIAL_CODES.contains(&code.as_str()) {
                return IdentityError::InvalidCredentials(code);
            }
            if code.starts_with("TOO_MANY_ATTEMPTS") {
                return IdentityError::RateLimited;
            }
            if matches!(
                code.as_str(),
                "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND"
            ) {
                return IdentityError::Unauthorized;
            }
            if status.is_client_error() {
                return IdentityError::Provider(code);
            }
        }

        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 | 403 => IdentityError::Unauthorized,
            429 => IdentityError::RateLimited,
            500..=599 => IdentityError::ServerError(truncated),
            _ => IdentityError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn body(message: &str) -> String {
        format!(r#"{{"error": {{"code": 400, "message": "{}", "errors": []}}}}"#, message)
    }

    #[test]
    fn test_credential_codes_map_to_invalid_credentials() {
        for code in ["EMAIL_NOT_FOUND", "INVALID_PASSWORD", "INVALID_LOGIN_CREDENTIALS"] {
            let err = IdentityError::from_status(StatusCode::BAD_REQUEST, &body(code));
            assert!(
                matches!(err, IdentityError::InvalidCredentials(ref c) if c == code),
                "{code} mapped to {err:?}"
            );
        }
    }

    #[test]
    fn test_code_with_detail_suffix() {
        let err = IdentityError::from_status(
            StatusCode::BAD_REQUEST,
            &body("TOO_MANY_ATTEMPTS_TRY_LATER : Access to this account has been temporarily disabled"),
        );
        assert!(matches!(err, IdentityError::RateLimited));
    }

    #[test]
    fn test_unknown_client_code_is_provider_error() {
        let err = IdentityError::from_status(StatusCode::BAD_REQUEST, &body("OPERATION_NOT_ALLOWED"));
        assert!(matches!(err, IdentityError::Provider(ref c) if c == "OPERATION_NOT_ALLOWED"));
    }

    #[test]
    fn test_plain_status_fallbacks() {
        assert!(matches!(
            IdentityError::from_status(StatusCode::UNAUTHORIZED, ""),
            IdentityError::Unauthorized
        ));
        assert!(matches!(
            IdentityError::from_status(StatusCode::BAD_GATEWAY, "upstream down"),
            IdentityError::ServerError(_)
        ));
        assert!(matches!(
            IdentityError::from_status(StatusCode::IM_A_TEAPOT, "?"),
            IdentityError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let long = "é".repeat(400);
        let err = IdentityError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &long);
        match err {
            IdentityError::ServerError(msg) => {
                assert!(msg.contains("truncated, 800 total bytes"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
