//! URL submissions, kept newest first under a single key.

use crate::error::{GatewayError, Result};
use crate::ids::{new_record_id, now};
use crate::kv_store::{get_json, put_json, KeyValueStore};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use url::Url;

/// Store key holding the submission list
pub const SUBMISSIONS_KEY: &str = "submissions";

/// Message returned when a submitted URL fails the scheme check
pub const INVALID_URL_MESSAGE: &str = "Invalid URL format";

const UNKNOWN: &str = "unknown";

/// A stored URL submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub url: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: String,
}

/// Body of `POST /api/submissions`
#[derive(Debug, Clone, Deserialize)]
pub struct NewSubmission {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Request metadata recorded alongside a submission
#[derive(Debug, Clone, PartialEq)]
pub struct ClientInfo {
    pub ip_address: String,
    pub user_agent: String,
}

impl ClientInfo {
    /// Derive client address and user agent from proxy headers
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let ip_address = header("cf-connecting-ip")
            .or_else(|| {
                header("x-forwarded-for")
                    .and_then(|v| v.split(',').next())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
            })
            .or_else(|| header("x-real-ip"))
            .unwrap_or(UNKNOWN)
            .to_string();

        let user_agent = header("user-agent").unwrap_or(UNKNOWN).to_string();

        Self {
            ip_address,
            user_agent,
        }
    }
}

/// `http://` or `https://` followed by at least one character on the same line
pub fn is_valid_url(url: &str) -> bool {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| !matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}'))
}

/// Host component of a URL, e.g. `example.com` for `https://example.com/a`
pub fn url_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
}

#[instrument(skip(store))]
pub async fn list_submissions(store: &dyn KeyValueStore) -> Result<Vec<Submission>> {
    Ok(get_json(store, SUBMISSIONS_KEY).await?.unwrap_or_default())
}

/// Validate and record a submission at the head of the list.
///
/// Nothing is written when validation fails.
#[instrument(skip(store, request, client), fields(url = %request.url))]
pub async fn add_submission(
    store: &dyn KeyValueStore,
    request: NewSubmission,
    client: ClientInfo,
    max_submissions: usize,
) -> Result<Submission> {
    if !is_valid_url(&request.url) {
        metrics::counter!("gateway_submissions_rejected_total").increment(1);
        return Err(GatewayError::Validation(INVALID_URL_MESSAGE.to_string()));
    }

    let title = match request.title.filter(|t| !t.is_empty()) {
        Some(title) => title,
        None => url_host(&request.url).ok_or_else(|| {
            metrics::counter!("gateway_submissions_rejected_total").increment(1);
            warn!("Submitted URL has no parseable host");
            GatewayError::Validation(INVALID_URL_MESSAGE.to_string())
        })?,
    };

    let submission = Submission {
        id: new_record_id(),
        url: request.url,
        title,
        created_at: now(),
        ip_address: client.ip_address,
        user_agent: client.user_agent,
    };

    let mut submissions = list_submissions(store).await?;
    submissions.insert(0, submission.clone());
    submissions.truncate(max_submissions);
    put_json(store, SUBMISSIONS_KEY, &submissions).await?;

    metrics::counter!("gateway_submissions_added_total").increment(1);
    info!(submission_id = %submission.id, count = submissions.len(), "Added submission");

    Ok(submission)
}
