use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::notify::{reject_unless_success, Notifier, NotifierDeliveryError};
use crate::strategies::digest::DigestMessage;

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const EXPIRY_SKEW_SECS: i64 = 60;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Authorized-user credentials file (`token.json`) as written by Google's client libraries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedUserToken {
    #[serde(default)]
    pub token: Option<String>,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub expiry: Option<String>,
    /// Fields we don't use (scopes, account, ...) survive a rewrite
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl AuthorizedUserToken {
    pub fn load(path: &Path) -> Result<Self, NotifierDeliveryError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            NotifierDeliveryError::Credentials(format!(
                "{}: {} (authorize once and place token.json there)",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            NotifierDeliveryError::Credentials(format!("{}: {}", path.display(), e))
        })
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.expiry.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            // Older writers omit the offset
            .or_else(|| {
                chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }

    /// Access token still usable at `now`; unknown expiry counts as stale.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expires_at()) {
            (Some(_), Some(expiry)) => expiry > now + Duration::seconds(EXPIRY_SKEW_SECS),
            _ => false,
        }
    }

    fn apply_refresh(&mut self, response: RefreshResponse, now: DateTime<Utc>) {
        self.token = Some(response.access_token);
        self.expiry = response
            .expires_in
            .map(|secs| (now + Duration::seconds(secs)).to_rfc3339());
    }
}

/// Sends the digest as a plain-text email through the Gmail REST API.
pub struct GmailNotifier {
    client: Client,
    token_path: PathBuf,
    sender: String,
    recipient: String,
    subject: Option<String>,
    api_base: String,
}

impl GmailNotifier {
    pub fn new(
        client: Client,
        token_path: PathBuf,
        sender: String,
        recipient: String,
        subject: Option<String>,
    ) -> Self {
        Self {
            client,
            token_path,
            sender,
            recipient,
            subject,
            api_base: GMAIL_API_BASE.to_string(),
        }
    }

    async fn access_token(&self) -> Result<String, NotifierDeliveryError> {
        let mut token = AuthorizedUserToken::load(&self.token_path)?;
        let now = Utc::now();

        if token.is_fresh(now) {
            if let Some(access) = token.token.clone() {
                debug!("Using cached Gmail access token");
                return Ok(access);
            }
        }

        info!("Refreshing Gmail access token");
        let response = self
            .client
            .post(&token.token_uri)
            .form(&[
                ("client_id", token.client_id.as_str()),
                ("client_secret", token.client_secret.as_str()),
                ("refresh_token", token.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifierDeliveryError::Auth(format!("{}: {}", status, body.trim())));
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| NotifierDeliveryError::Auth(e.to_string()))?;
        token.apply_refresh(refreshed, now);

        if let Err(e) = token.save(&self.token_path) {
            warn!(path = %self.token_path.display(), error = %e, "Could not persist refreshed token");
        }

        token
            .token
            .ok_or_else(|| NotifierDeliveryError::Auth("refresh returned no token".to_string()))
    }
}

#[async_trait]
impl Notifier for GmailNotifier {
    fn channel(&self) -> &'static str {
        "gmail"
    }

    async fn send(&self, message: &DigestMessage) -> Result<(), NotifierDeliveryError> {
        let access_token = self.access_token().await?;
        let mime = build_mime(
            &self.sender,
            &self.recipient,
            self.subject.as_deref(),
            &message.body(),
        );

        let response = self
            .client
            .post(format!("{}/gmail/v1/users/me/messages/send", self.api_base))
            .bearer_auth(access_token)
            .json(&json!({ "raw": URL_SAFE.encode(mime.as_bytes()) }))
            .send()
            .await?;

        reject_unless_success(self.channel(), response).await?;
        info!(to = %self.recipient, "Digest emailed");
        Ok(())
    }
}

fn header_value(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

fn encode_subject(subject: &str) -> String {
    let subject = header_value(subject);
    if subject.is_ascii() {
        subject
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(subject.as_bytes()))
    }
}

/// Single-part `text/plain` message with CRLF line endings.
pub fn build_mime(sender: &str, recipient: &str, subject: Option<&str>, body: &str) -> String {
    let mut mime = format!(
        "To: {}\r\nFrom: {}\r\n",
        header_value(recipient),
        header_value(sender)
    );
    if let Some(subject) = subject {
        mime.push_str(&format!("Subject: {}\r\n", encode_subject(subject)));
    }
    mime.push_str("MIME-Version: 1.0\r\n");
    mime.push_str("Content-Type: text/plain; charset=\"UTF-8\"\r\n");
    mime.push_str("Content-Transfer-Encoding: 8bit\r\n\r\n");
    mime.push_str(&body.replace("\r\n", "\n").replace('\n', "\r\n"));
    mime
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn token_json(expiry: &str) -> String {
        format!(
            r#"{{
                "token": "ya29.cached",
                "refresh_token": "1//refresh",
                "token_uri": "https://oauth2.googleapis.com/token",
                "client_id": "id.apps.googleusercontent.com",
                "client_secret": "shh",
                "scopes": ["https://www.googleapis.com/auth/gmail.send"],
                "universe_domain": "googleapis.com",
                "expiry": "{}"
            }}"#,
            expiry
        )
    }

    #[test]
    fn test_build_mime_plain() {
        let mime = build_mime("me@example.com", "5551234567@vtext.com", None, "Header\nLine");

        assert!(mime.starts_with("To: 5551234567@vtext.com\r\nFrom: me@example.com\r\n"));
        assert!(!mime.contains("Subject:"));
        assert!(mime.contains("Content-Type: text/plain; charset=\"UTF-8\"\r\n"));
        assert!(mime.ends_with("\r\n\r\nHeader\r\nLine"));
    }

    #[test]
    fn test_build_mime_subject_encoding() {
        let ascii = build_mime("a@b.co", "c@d.co", Some("Today's picks"), "x");
        assert!(ascii.contains("Subject: Today's picks\r\n"));

        let unicode = build_mime("a@b.co", "c@d.co", Some("Picks ⚾"), "x");
        assert!(unicode.contains("Subject: =?UTF-8?B?"));

        let injected = build_mime("a@b.co", "c@d.co", Some("hi\r\nBcc: x@y.co"), "x");
        assert!(!injected.contains("\r\nBcc:"));
    }

    #[test]
    fn test_raw_encoding_is_url_safe() {
        let mime = build_mime("a@b.co", "c@d.co", None, "??>>??>>");
        let raw = URL_SAFE.encode(mime.as_bytes());
        assert!(!raw.contains('+'));
        assert!(!raw.contains('/'));
    }

    #[test]
    fn test_token_freshness() {
        let now = DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let fresh: AuthorizedUserToken =
            serde_json::from_str(&token_json("2024-06-01T13:00:00.123456Z")).unwrap();
        assert!(fresh.is_fresh(now));

        let nearly: AuthorizedUserToken =
            serde_json::from_str(&token_json("2024-06-01T12:00:30Z")).unwrap();
        assert!(!nearly.is_fresh(now));

        let naive: AuthorizedUserToken =
            serde_json::from_str(&token_json("2024-06-01T13:00:00.5")).unwrap();
        assert!(naive.is_fresh(now));

        let garbage: AuthorizedUserToken =
            serde_json::from_str(&token_json("soon")).unwrap();
        assert!(!garbage.is_fresh(now));
    }

    #[test]
    fn test_apply_refresh_updates_token() {
        let mut token: AuthorizedUserToken =
            serde_json::from_str(&token_json("2000-01-01T00:00:00Z")).unwrap();
        let now = Utc::now();

        token.apply_refresh(
            RefreshResponse {
                access_token: "ya29.new".to_string(),
                expires_in: Some(3599),
            },
            now,
        );

        assert_eq!(token.token.as_deref(), Some("ya29.new"));
        assert!(token.is_fresh(now));
    }

    #[test]
    fn test_token_round_trip_keeps_unknown_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", token_json("2024-06-01T13:00:00Z")).unwrap();

        let token = AuthorizedUserToken::load(file.path()).unwrap();
        token.save(file.path()).unwrap();

        let saved: Value =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(saved["universe_domain"], "googleapis.com");
        assert_eq!(saved["refresh_token"], "1//refresh");
    }

    #[test]
    fn test_missing_token_file_is_credentials_error() {
        let result = AuthorizedUserToken::load(Path::new("/no/such/token.json"));
        assert!(matches!(result, Err(NotifierDeliveryError::Credentials(_))));
    }
}
