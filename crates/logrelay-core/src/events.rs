//! Client for the log server's event intake (`POST /log`).
//!
//! The server timestamps each message and appends it to the file that
//! `/get_logs` serves.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Event intake endpoint
pub const LOG_PATH: &str = "/log";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct LogEvent<'a> {
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct LogReply {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct LogClient {
    client: Client,
    log_url: Url,
}

impl LogClient {
    pub fn new(server: &Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let log_url = server.join(LOG_PATH).context("Failed to build log URL")?;
        Ok(Self { client, log_url })
    }

    /// Append one message to the server log. Returns the server's
    /// confirmation text.
    pub async fn append(&self, message: &str) -> Result<String> {
        let response = self
            .client
            .post(self.log_url.clone())
            .json(&LogEvent { message })
            .send()
            .await
            .context("Failed to send log event")?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let reply: Option<LogReply> = serde_json::from_str(&body).ok();

        if status.is_success() {
            let confirmation = reply
                .and_then(|r| r.message)
                .unwrap_or_else(|| "Log entry added".to_string());
            debug!(%confirmation, "Log event accepted");
            Ok(confirmation)
        } else {
            let detail = reply.and_then(|r| r.error).unwrap_or(body);
            Err(anyhow::anyhow!("Log server rejected event ({}): {}", status, detail))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_append_posts_json_message() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/log")
            .match_body(Matcher::Json(json!({"message": "deploy finished"})))
            .with_status(200)
            .with_body(r#"{"message": "Log entry added successfully"}"#)
            .create_async()
            .await;

        let client = LogClient::new(&Url::parse(&server.url()).unwrap()).unwrap();
        let reply = client.append("deploy finished").await.unwrap();

        mock.assert_async().await;
        assert_eq!(reply, "Log entry added successfully");
    }

    #[tokio::test]
    async fn test_append_surfaces_server_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/log")
            .with_status(500)
            .with_body(r#"{"error": "Failed to write to log file: disk full"}"#)
            .create_async()
            .await;

        let client = LogClient::new(&Url::parse(&server.url()).unwrap()).unwrap();
        let err = client.append("x").await.unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }
}
