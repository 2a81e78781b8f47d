//! HTTP client for a Moodle gradebook.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::sanitize::{redact_sesskey, truncate_body};
use crate::tree::{GlobalGradeConfig, ObservedEntity, RemoteId};

use super::error::{RemoteError, Result};
use super::forms::{self, Fields};
use super::markers::{self, Verdict};
use super::session::{MoodleSessionProvider, Session};
use super::{CategoryUpdate, CourseId, GradebookClient, ItemUpdate};

/// Default connect timeout for HTTP requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout for HTTP requests (30 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

static RE_TRAILING_SLASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/+$").unwrap());

/// Creates an HTTP client with a cookie store and appropriate timeouts.
fn create_http_client() -> Result<Client> {
    Client::builder()
        .cookie_store(true)
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| RemoteError::Client(e.to_string()))
}

/// HTTP client for a Moodle gradebook's setup pages.
///
/// Cookies are kept in the underlying `reqwest::Client`, which is shared with
/// the session provider created by [`MoodleClient::session_provider`].
#[derive(Clone)]
pub struct MoodleClient {
    http: Client,
    base_url: String,
}

impl MoodleClient {
    /// A client for the site at `base_url` (trailing slashes ignored) with
    /// its own cookie jar.
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            http: create_http_client()?,
            base_url: RE_TRAILING_SLASH.replace(base_url.trim(), "").into_owned(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// A password-login provider sharing this client's cookie jar.
    pub fn session_provider(
        &self,
        username: impl Into<String>,
        password: SecretString,
    ) -> MoodleSessionProvider {
        MoodleSessionProvider::new(
            self.http.clone(),
            self.base_url.clone(),
            username.into(),
            password,
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Reads the body, mapping non-2xx statuses and login redirects.
    async fn read_page(&self, response: Response, what: &str) -> Result<String> {
        let status = response.status();
        let final_url = response.url().to_string();
        let body = response.text().await?;

        if final_url.contains("/login/index.php") || markers::is_login_page(&body) {
            return Err(RemoteError::SessionExpired(what.to_string()));
        }
        if !status.is_success() {
            return Err(RemoteError::Operation(format!(
                "{} returned HTTP {}: {}",
                what,
                status.as_u16(),
                truncate_body(&body)
            )));
        }
        Ok(body)
    }

    /// Posts a classic edit form. The gradebook answers 200 either way, so
    /// the body decides whether the edit was saved.
    async fn post_edit_form(&self, path: &str, fields: &Fields) -> Result<()> {
        let response = self.http.post(self.url(path)).form(fields).send().await?;
        let body = self.read_page(response, path).await?;
        match markers::edit_rejection(&body) {
            Some(message) => Err(RemoteError::Operation(format!(
                "{} was not saved: {}",
                path, message
            ))),
            None => Ok(()),
        }
    }

    async fn submit_dynamic_form(
        &self,
        sesskey: &SecretString,
        form: &str,
        fields: &Fields,
    ) -> Result<()> {
        let url = format!(
            "{}?sesskey={}&info=core_form_dynamic_form",
            self.url("/lib/ajax/service.php"),
            sesskey.expose_secret()
        );
        log::debug!("POST {}", redact_sesskey(&url));

        let response = self
            .http
            .post(&url)
            .json(&forms::dynamic_form_request(form, fields))
            .send()
            .await?;
        let body = self.read_page(response, "dynamic form service").await?;
        check_dynamic_form_response(&body)
    }
}

/// The web service answers `[{"error": false, "data": {...}}]` on success
/// and `[{"error": true, "exception": {...}}]` otherwise.
fn check_dynamic_form_response(body: &str) -> Result<()> {
    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| RemoteError::Parse(format!("dynamic form response: {}", e)))?;
    let entry = parsed
        .get(0)
        .ok_or_else(|| RemoteError::Parse("empty dynamic form response".to_string()))?;

    match entry.get("error").and_then(Value::as_bool) {
        Some(false) => {}
        Some(true) => {
            let message = entry
                .pointer("/exception/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(RemoteError::Operation(message.to_string()));
        }
        None => {
            return Err(RemoteError::Parse(
                "dynamic form response has no error flag".to_string(),
            ))
        }
    }

    // The form came back for correction instead of being saved.
    if entry.pointer("/data/submitted").and_then(Value::as_bool) == Some(false) {
        return Err(RemoteError::Operation(
            "form was not accepted by the gradebook".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl GradebookClient for MoodleClient {
    async fn fetch_tree(&self, _session: &Session, course: CourseId) -> Result<Vec<ObservedEntity>> {
        let response = self
            .http
            .get(self.url("/grade/edit/tree/index.php"))
            .query(&[("id", course.to_string())])
            .send()
            .await?;
        let body = self.read_page(response, "gradebook setup page").await?;
        let entities = super::html::parse_tree(&body);
        log::debug!("Scraped {} entities from course {}", entities.len(), course);
        Ok(entities)
    }

    async fn create_category(
        &self,
        session: &Session,
        course: CourseId,
        name: &str,
        parent: Option<RemoteId>,
        config: &GlobalGradeConfig,
    ) -> Result<()> {
        let fields = forms::add_category(course, session.sesskey(), name, parent, config);
        self.submit_dynamic_form(session.sesskey(), forms::ADD_CATEGORY_FORM, &fields)
            .await
    }

    async fn create_item(
        &self,
        session: &Session,
        course: CourseId,
        name: &str,
        parent: RemoteId,
        config: &GlobalGradeConfig,
        id_number: Option<&str>,
    ) -> Result<()> {
        let fields = forms::add_item(course, session.sesskey(), name, parent, config, id_number);
        self.submit_dynamic_form(session.sesskey(), forms::ADD_ITEM_FORM, &fields)
            .await
    }

    async fn update_category(
        &self,
        session: &Session,
        course: CourseId,
        id: RemoteId,
        update: CategoryUpdate<'_>,
        config: &GlobalGradeConfig,
    ) -> Result<()> {
        let fields = forms::edit_category(
            course,
            session.sesskey(),
            id,
            update.name,
            config,
            update.aggregation_coefficient,
        );
        self.post_edit_form("/grade/edit/tree/category.php", &fields)
            .await
    }

    async fn update_item(
        &self,
        session: &Session,
        course: CourseId,
        id: RemoteId,
        update: ItemUpdate<'_>,
        config: &GlobalGradeConfig,
    ) -> Result<()> {
        let fields = forms::edit_item(
            course,
            session.sesskey(),
            id,
            update.name,
            config,
            update.id_number,
            update.aggregation_coefficient,
        );
        self.post_edit_form("/grade/edit/tree/item.php", &fields).await
    }

    async fn set_formula(
        &self,
        session: &Session,
        course: CourseId,
        id: RemoteId,
        formula: &str,
    ) -> Result<()> {
        let fields = forms::calculation(course, session.sesskey(), id, formula);
        self.post_edit_form("/grade/edit/tree/calculation.php", &fields)
            .await
    }

    async fn delete_entity(&self, session: &Session, course: CourseId, id: RemoteId) -> Result<()> {
        let query = forms::delete_query(course, session.sesskey(), id);
        let response = self
            .http
            .get(self.url("/grade/edit/tree/index.php"))
            .query(&query)
            .send()
            .await?;
        let body = self.read_page(response, "delete request").await?;

        match markers::classify_delete(&body) {
            Verdict::Rejected(marker) => Err(RemoteError::Operation(format!(
                "gradebook refused to delete {} (response mentions '{}')",
                id, marker
            ))),
            Verdict::Confirmed(marker) => {
                log::debug!("Delete of {} confirmed by '{}'", id, marker);
                Ok(())
            }
            Verdict::Unknown => {
                log::debug!("Delete of {} returned no marker, assuming success", id);
                Ok(())
            }
        }
    }
}
