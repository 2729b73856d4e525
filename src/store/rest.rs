use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{NewUser, PersistenceError, StoredUser, UserStore, USERS_TABLE};

const UNIQUE_VIOLATION: &str = "23505";
const MAX_DETAIL_LEN: usize = 200;

/// `users` table reached through the hosted PostgREST endpoint
/// (`{url}/rest/v1/users`), authenticated with the project access key.
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    key: Secret<String>,
    timeout: Duration,
}

/// Error body returned by PostgREST.
#[derive(Debug, Default, Deserialize)]
struct RestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

impl RestStore {
    pub fn new(base_url: &str, key: Secret<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key,
            timeout,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, USERS_TABLE)
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        let key = self.key.expose_secret();
        self.client
            .request(method, self.table_url())
            .header("apikey", key)
            .bearer_auth(key)
    }

    fn transport_error(&self, err: reqwest::Error) -> PersistenceError {
        if err.is_timeout() {
            return PersistenceError::Timeout(self.timeout);
        }
        // Drop the URL so project identifiers stay out of responses and logs.
        PersistenceError::Unavailable(err.without_url().to_string())
    }
}

#[async_trait]
impl UserStore for RestStore {
    async fn insert_user(&self, user: &NewUser) -> Result<(), PersistenceError> {
        let res = self
            .request(reqwest::Method::POST)
            .header("Prefer", "return=minimal")
            .json(user)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = res.status();
        if status.is_success() {
            debug!(%status, username = %user.username, "row inserted");
            return Ok(());
        }
        let body = res.text().await.unwrap_or_default();
        let err = classify(status, &body, self.key.expose_secret());
        warn!(%status, error = %err, "insert rejected by table store");
        Err(err)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>, PersistenceError> {
        let filter = format!("eq.{email}");
        let res = self
            .request(reqwest::Method::GET)
            .query(&[
                ("select", "username,email,password_hash"),
                ("email", filter.as_str()),
                ("limit", "1"),
            ])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(classify(status, &body, self.key.expose_secret()));
        }
        let mut rows: Vec<StoredUser> = res
            .json()
            .await
            .map_err(|e| {
                PersistenceError::Rejected(format!("unexpected response body: {}", e.without_url()))
            })?;
        Ok(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
    }
}

/// Maps a non-2xx PostgREST response to a sanitized error.
fn classify(status: StatusCode, body: &str, key: &str) -> PersistenceError {
    let parsed: RestErrorBody = serde_json::from_str(body).unwrap_or_default();
    let detail = parsed
        .message
        .or(parsed.details)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
    let detail = sanitize(&detail, key);

    if status == StatusCode::CONFLICT || parsed.code.as_deref() == Some(UNIQUE_VIOLATION) {
        PersistenceError::Conflict(detail)
    } else if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        PersistenceError::Unavailable(format!("upstream timeout ({status})"))
    } else {
        PersistenceError::Rejected(format!("{}: {detail}", status.as_u16()))
    }
}

fn sanitize(detail: &str, key: &str) -> String {
    let mut out = if key.is_empty() {
        detail.to_string()
    } else {
        detail.replace(key, "[redacted]")
    };
    if out.len() > MAX_DETAIL_LEN {
        let mut cut = MAX_DETAIL_LEN;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
        out.push('…');
    }
    out
}
