//! Sessions and the providers that log in to get them.

use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use super::error::{RemoteError, Result};
use super::markers;

static RE_SESSKEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"sesskey["']?\s*[=:]\s*["']?(\w+)"#).unwrap());

static RE_LOGINTOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<input[^>]*name="logintoken"[^>]*value="(\w+)""#).unwrap()
});

/// An authenticated session: the gradebook's per-session key plus the time
/// it was obtained. Cookies live in the HTTP client shared with the
/// provider that made it.
pub struct Session {
    sesskey: SecretString,
    established_at: DateTime<Utc>,
}

impl Session {
    pub fn new(sesskey: impl Into<String>) -> Self {
        Self {
            sesskey: SecretString::from(sesskey.into()),
            established_at: Utc::now(),
        }
    }

    /// Key every mutating request must carry.
    pub fn sesskey(&self) -> &SecretString {
        &self.sesskey
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("sesskey", &"****")
            .field("established_at", &self.established_at)
            .finish()
    }
}

/// Produces sessions. The executor calls this again once when a run hits a
/// transport-level failure.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn establish(&self) -> Result<Session>;
}

/// Password login against the gradebook's login form.
pub struct MoodleSessionProvider {
    http: Client,
    base_url: String,
    username: String,
    password: SecretString,
}

impl MoodleSessionProvider {
    pub(super) fn new(
        http: Client,
        base_url: String,
        username: String,
        password: SecretString,
    ) -> Self {
        Self {
            http,
            base_url,
            username,
            password,
        }
    }

    /// Reuses a live session if the cookie jar already has one.
    async fn existing_session(&self) -> Result<Option<Session>> {
        let body = self
            .http
            .get(format!("{}/my/", self.base_url))
            .send()
            .await?
            .text()
            .await?;

        if !body.to_lowercase().contains("logout") {
            return Ok(None);
        }
        Ok(extract_sesskey(&body).map(Session::new))
    }
}

#[async_trait]
impl SessionProvider for MoodleSessionProvider {
    async fn establish(&self) -> Result<Session> {
        if let Some(session) = self.existing_session().await? {
            log::info!("Reusing active session for {}", self.username);
            return Ok(session);
        }

        let login_url = format!("{}/login/index.php", self.base_url);
        let login_page = self.http.get(&login_url).send().await?.text().await?;
        let token = RE_LOGINTOKEN
            .captures(&login_page)
            .map(|caps| caps[1].to_string())
            .ok_or_else(|| {
                RemoteError::Authentication("login token not found on login page".to_string())
            })?;

        let form = [
            ("username", self.username.as_str()),
            ("password", self.password.expose_secret()),
            ("anchor", ""),
            ("logintoken", token.as_str()),
        ];
        let body = self
            .http
            .post(&login_url)
            .form(&form)
            .send()
            .await?
            .text()
            .await?;

        // A rejected login re-renders the form, which carries a guest sesskey.
        if markers::is_login_page(&body) {
            return Err(RemoteError::Authentication(format!(
                "login for '{}' was rejected",
                self.username
            )));
        }

        match extract_sesskey(&body) {
            Some(sesskey) => {
                log::info!("Logged in as {}", self.username);
                Ok(Session::new(sesskey))
            }
            None => Err(RemoteError::Authentication(format!(
                "login for '{}' was rejected (no session key in response)",
                self.username
            ))),
        }
    }
}

fn extract_sesskey(body: &str) -> Option<String> {
    RE_SESSKEY.captures(body).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_sesskey_from_link_and_config() {
        assert_eq!(
            extract_sesskey(r#"<a href="/login/logout.php?sesskey=Ab12Cd34">Log out</a>"#),
            Some("Ab12Cd34".to_string())
        );
        assert_eq!(
            extract_sesskey(r#"M.cfg = {"sesskey":"xyz789","themerev":1};"#),
            Some("xyz789".to_string())
        );
        assert_eq!(extract_sesskey("<html></html>"), None);
    }

    #[test]
    fn test_login_token_pattern() {
        let page = r#"<input type="hidden" name="logintoken" value="0123456789abcdef0123456789abcdef">"#;
        let caps = RE_LOGINTOKEN.captures(page).unwrap();
        assert_eq!(&caps[1], "0123456789abcdef0123456789abcdef");
    }

    #[test]
    fn test_session_debug_hides_key() {
        let session = Session::new("supersecret");
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("supersecret"));
        assert_eq!(session.sesskey().expose_secret(), "supersecret");
    }
}
