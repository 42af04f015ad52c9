//! Firebase Authentication over its REST API.
//!
//! Email/password sign-in goes through Identity Toolkit
//! (`accounts:signInWithPassword`), ID-token re-issue through Secure Token
//! (`v1/token`). Sign-out is local, exactly like the web SDK: the session
//! is forgotten and the refresh token is never used again.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{FirebaseConfig, IDENTITY_TOOLKIT_URL, SECURE_TOKEN_URL};

use super::{
    AuthState, AuthStateChannel, AuthStateSubscription, IdentityError, IdentityGateway, Session,
    SessionFile,
};

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Fallback lifetime when the provider omits `expiresIn` (Firebase issues one-hour tokens)
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    email: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
    user_id: Option<String>,
}

fn lifetime_secs(expires_in: Option<&str>) -> i64 {
    expires_in
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
}

/// Identity gateway backed by a Firebase project.
pub struct FirebaseGateway {
    client: Client,
    api_key: Option<String>,
    identity_base: String,
    token_base: String,
    sessions: Option<SessionFile>,
    state: AuthStateChannel,
}

impl FirebaseGateway {
    /// Create a gateway and restore the persisted session, if any.
    ///
    /// With `session_dir` set the session survives restarts; without it the
    /// gateway starts signed out every time.
    pub fn new(api_key: Option<String>, session_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let gateway = Self {
            client,
            api_key,
            identity_base: IDENTITY_TOOLKIT_URL.to_string(),
            token_base: SECURE_TOKEN_URL.to_string(),
            sessions: session_dir.map(SessionFile::new),
            state: AuthStateChannel::new(AuthState::Unresolved),
        };
        gateway.restore();
        Ok(gateway)
    }

    /// Create a gateway from configuration, honouring endpoint overrides.
    pub fn from_config(config: &FirebaseConfig, session_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let (identity_base, token_base) = config.endpoints();
        Ok(Self::new(config.api_key.clone(), session_dir)?
            .with_endpoints(&identity_base, &token_base))
    }

    /// Point the gateway at other endpoints (emulator or test server).
    pub fn with_endpoints(mut self, identity_base: &str, token_base: &str) -> Self {
        self.identity_base = identity_base.trim_end_matches('/').to_string();
        self.token_base = token_base.trim_end_matches('/').to_string();
        self
    }

    /// Current auth state without subscribing.
    pub fn current_state(&self) -> AuthState {
        self.state.current()
    }

    pub fn listener_count(&self) -> usize {
        self.state.listener_count()
    }

    fn restore(&self) {
        let restored = match self.sessions.as_ref().map(SessionFile::load) {
            Some(Ok(Some(session))) => {
                debug!(uid = %session.uid, "Restored persisted session");
                AuthState::SignedIn(session)
            }
            Some(Err(e)) => {
                warn!(error = %e, "Failed to restore session, starting signed out");
                AuthState::SignedOut
            }
            _ => AuthState::SignedOut,
        };
        self.state.publish(restored);
    }

    fn api_key(&self) -> Result<&str, IdentityError> {
        self.api_key.as_deref().ok_or(IdentityError::NotConfigured)
    }

    fn persist(&self, session: &Session) {
        if let Some(ref sessions) = self.sessions {
            if let Err(e) = sessions.save(session) {
                warn!(error = %e, "Failed to persist session");
            }
        }
    }

    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, IdentityError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(IdentityError::from_status(status, &body))
        }
    }

    async fn refresh(&self, session: &Session) -> Result<Session, IdentityError> {
        let url = format!("{}/v1/token", self.token_base);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key()?)])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", session.refresh_token.as_str()),
            ])
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;

        Ok(Session {
            uid: refreshed.user_id.unwrap_or_else(|| session.uid.clone()),
            email: session.email.clone(),
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
            expires_at: Utc::now()
                + chrono::Duration::seconds(lifetime_secs(refreshed.expires_in.as_deref())),
        })
    }
}

#[async_trait]
impl IdentityGateway for FirebaseGateway {
    async fn sign_in_with_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(), IdentityError> {
        let url = format!("{}/v1/accounts:signInWithPassword", self.identity_base);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key()?)])
            .json(&SignInRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let signed_in: SignInResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;

        let session = Session {
            uid: signed_in.local_id,
            email: signed_in.email.or_else(|| Some(email.to_string())),
            id_token: signed_in.id_token,
            refresh_token: signed_in.refresh_token,
            expires_at: Utc::now()
                + chrono::Duration::seconds(lifetime_secs(signed_in.expires_in.as_deref())),
        };

        info!(uid = %session.uid, "Provider sign-in succeeded");
        self.persist(&session);
        self.state.publish(AuthState::SignedIn(session));
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        if let Some(ref sessions) = self.sessions {
            sessions
                .clear()
                .map_err(|e| IdentityError::Storage(e.to_string()))?;
        }
        self.state.publish(AuthState::SignedOut);
        info!("Provider sign-out complete");
        Ok(())
    }

    fn on_auth_state_changed(&self) -> AuthStateSubscription {
        self.state.subscribe()
    }

    async fn id_token(&self, session: &Session) -> Result<String, IdentityError> {
        // Prefer the gateway's copy: it may hold a token re-issued since
        // the caller took its snapshot.
        let current = match self.state.current() {
            AuthState::SignedIn(current) if current.uid == session.uid => current,
            _ => session.clone(),
        };

        if !current.needs_refresh() {
            return Ok(current.id_token);
        }

        debug!(uid = %current.uid, "ID token stale, re-issuing");
        let refreshed = self.refresh(&current).await?;
        self.persist(&refreshed);
        let token = refreshed.id_token.clone();
        self.state.publish(AuthState::SignedIn(refreshed));
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn gateway(server: &Server, dir: Option<PathBuf>) -> FirebaseGateway {
        FirebaseGateway::new(Some("api-key".to_string()), dir)
            .unwrap()
            .with_endpoints(&server.url(), &server.url())
    }

    fn sign_in_body() -> String {
        json!({
            "localId": "uid-42",
            "email": "ada@example.com",
            "idToken": "id-token-1",
            "refreshToken": "refresh-1",
            "expiresIn": "3600"
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_sign_in_publishes_and_persists_session() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/accounts:signInWithPassword")
            .match_query(Matcher::UrlEncoded("key".into(), "api-key".into()))
            .match_body(Matcher::Json(json!({
                "email": "ada@example.com",
                "password": "hunter2",
                "returnSecureToken": true
            })))
            .with_status(200)
            .with_body(sign_in_body())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let gw = gateway(&server, Some(dir.path().to_path_buf()));
        assert_eq!(gw.current_state(), AuthState::SignedOut);

        gw.sign_in_with_credentials("ada@example.com", "hunter2")
            .await
            .unwrap();
        mock.assert_async().await;

        let session = gw.current_state().session().cloned().unwrap();
        assert_eq!(session.uid, "uid-42");
        assert_eq!(gw.id_token(&session).await.unwrap(), "id-token-1");

        // A fresh gateway over the same directory comes back signed in
        let restored = gateway(&server, Some(dir.path().to_path_buf()));
        assert_eq!(restored.current_state().session().map(|s| s.uid.as_str()), Some("uid-42"));
    }

    #[tokio::test]
    async fn test_wrong_password_is_invalid_credentials() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/accounts:signInWithPassword")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error": {"code": 400, "message": "INVALID_LOGIN_CREDENTIALS"}}"#)
            .create_async()
            .await;

        let gw = gateway(&server, None);
        let err = gw
            .sign_in_with_credentials("ada@example.com", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::InvalidCredentials(_)));
        assert_eq!(gw.current_state(), AuthState::SignedOut);
    }

    #[tokio::test]
    async fn test_from_config_uses_endpoint_overrides() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/identitytoolkit.googleapis.com/v1/accounts:signInWithPassword")
            .match_query(Matcher::UrlEncoded("key".into(), "emulator-key".into()))
            .with_status(200)
            .with_body(sign_in_body())
            .create_async()
            .await;

        let config = FirebaseConfig {
            api_key: Some("emulator-key".to_string()),
            emulator_host: Some(server.host_with_port()),
            ..FirebaseConfig::default()
        };
        let gw = FirebaseGateway::from_config(&config, None).unwrap();
        gw.sign_in_with_credentials("ada@example.com", "pw").await.unwrap();

        mock.assert_async().await;
        assert!(gw.current_state().session().is_some());
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_request() {
        let gw = FirebaseGateway::new(None, None).unwrap();
        let err = gw.sign_in_with_credentials("a@b.c", "pw").await.unwrap_err();
        assert!(matches!(err, IdentityError::NotConfigured));
    }

    #[tokio::test]
    async fn test_stale_token_is_reissued() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/token")
            .match_query(Matcher::UrlEncoded("key".into(), "api-key".into()))
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "refresh-old".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "id_token": "id-token-new",
                    "refresh_token": "refresh-new",
                    "expires_in": "3600",
                    "user_id": "uid-7"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let gw = gateway(&server, None);
        let stale = Session {
            uid: "uid-7".to_string(),
            email: None,
            id_token: "id-token-old".to_string(),
            refresh_token: "refresh-old".to_string(),
            expires_at: Utc::now() - chrono::Duration::minutes(1),
        };

        assert_eq!(gw.id_token(&stale).await.unwrap(), "id-token-new");
        mock.assert_async().await;

        let current = gw.current_state().session().cloned().unwrap();
        assert_eq!(current.refresh_token, "refresh-new");
        assert!(!current.needs_refresh());
    }

    #[tokio::test]
    async fn test_sign_out_forgets_session() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/accounts:signInWithPassword")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(sign_in_body())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let gw = gateway(&server, Some(dir.path().to_path_buf()));
        gw.sign_in_with_credentials("ada@example.com", "pw").await.unwrap();
        gw.sign_out().await.unwrap();
        assert_eq!(gw.current_state(), AuthState::SignedOut);

        let restored = gateway(&server, Some(dir.path().to_path_buf()));
        assert_eq!(restored.current_state(), AuthState::SignedOut);
    }

    #[tokio::test]
    async fn test_subscription_sees_signed_in_state() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/accounts:signInWithPassword")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(sign_in_body())
            .create_async()
            .await;

        let gw = gateway(&server, None);
        gw.sign_in_with_credentials("ada@example.com", "pw").await.unwrap();

        let mut sub = gw.on_auth_state_changed();
        assert_eq!(gw.listener_count(), 1);
        let state = sub.first().await.unwrap();
        assert!(state.session().is_some());
        sub.unsubscribe();
        assert_eq!(gw.listener_count(), 0);
    }
}
