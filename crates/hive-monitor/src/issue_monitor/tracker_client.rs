//! Thin GitHub REST client for the monitor: conditional issue listing plus
//! the comment, label, and close operations the lifecycle transitions need.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use hive_github::issue_snapshot::{GithubIssue, GithubIssueComment};
use hive_github::transport_helpers::{
    is_rate_limited_response, is_retryable_status, is_retryable_transport_error, parse_retry_after,
    percent_encode_path_segment, retry_delay, truncate_for_error, FetchError,
};

use super::RepoRef;

const LIST_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub(super) struct CommentCreateResponse {
    pub(super) id: u64,
}

/// Result of a conditional list fetch. `NotModified` means the tracker
/// reported HTTP 304 for the stored validator token and the cycle has no
/// detection work to do.
#[derive(Debug)]
pub(super) enum IssueListPage {
    NotModified,
    Updated {
        issues: Vec<GithubIssue>,
        etag: Option<String>,
    },
}

#[derive(Clone)]
pub(super) struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    repo: RepoRef,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl GithubApiClient {
    pub(super) fn new(
        api_base: String,
        token: String,
        repo: RepoRef,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("hive-issue-monitor"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .context("invalid github authorization header")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create github api client")?;
        Ok(Self {
            http: client,
            api_base: api_base.trim_end_matches('/').to_string(),
            repo,
            retry_max_attempts: retry_max_attempts.max(1),
            retry_base_delay_ms: retry_base_delay_ms.max(1),
        })
    }

    pub(super) async fn resolve_bot_login(&self) -> Result<String, FetchError> {
        #[derive(Deserialize)]
        struct Viewer {
            login: String,
        }

        let viewer: Viewer = self
            .request_json("resolve bot login", || {
                self.http.get(format!("{}/user", self.api_base))
            })
            .await?;
        Ok(viewer.login)
    }

    /// Lists all open issues, oldest update first. The stored validator
    /// token rides the first page as `If-None-Match`; a 304 answer short-
    /// circuits the fetch. The first page's `ETag` becomes the next token.
    pub(super) async fn list_open_issues(
        &self,
        etag: Option<&str>,
    ) -> Result<IssueListPage, FetchError> {
        let mut page = 1_u32;
        let mut issues = Vec::new();
        let mut next_etag: Option<String> = None;
        loop {
            let page_value = page.to_string();
            let conditional = if page == 1 { etag } else { None };
            let response = self
                .execute_with_retries("list open issues", || {
                    let mut request = self.http.get(format!(
                        "{}/repos/{}/{}/issues",
                        self.api_base, self.repo.owner, self.repo.name
                    ));
                    request = request.query(&[
                        ("state", "open"),
                        ("sort", "updated"),
                        ("direction", "asc"),
                        ("per_page", "100"),
                        ("page", page_value.as_str()),
                    ]);
                    if let Some(token) = conditional {
                        request = request.header(reqwest::header::IF_NONE_MATCH, token);
                    }
                    request
                })
                .await?;
            if page == 1 {
                if response.status() == StatusCode::NOT_MODIFIED {
                    return Ok(IssueListPage::NotModified);
                }
                next_etag = response
                    .headers()
                    .get(reqwest::header::ETAG)
                    .and_then(|value| value.to_str().ok())
                    .map(|value| value.to_string());
            }
            let chunk: Vec<GithubIssue> =
                response.json().await.map_err(|source| FetchError::Decode {
                    operation: "list open issues".to_string(),
                    source,
                })?;
            let chunk_len = chunk.len();
            issues.extend(chunk);
            if chunk_len < LIST_PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(IssueListPage::Updated {
            issues,
            etag: next_etag,
        })
    }

    pub(super) async fn get_issue(&self, issue_number: u64) -> Result<GithubIssue, FetchError> {
        self.request_json("get issue", || {
            self.http.get(format!(
                "{}/repos/{}/{}/issues/{issue_number}",
                self.api_base, self.repo.owner, self.repo.name
            ))
        })
        .await
    }

    pub(super) async fn list_issue_comments(
        &self,
        issue_number: u64,
    ) -> Result<Vec<GithubIssueComment>, FetchError> {
        let mut page = 1_u32;
        let mut rows = Vec::new();
        loop {
            let page_value = page.to_string();
            let chunk: Vec<GithubIssueComment> = self
                .request_json("list issue comments", || {
                    self.http
                        .get(format!(
                            "{}/repos/{}/{}/issues/{issue_number}/comments",
                            self.api_base, self.repo.owner, self.repo.name
                        ))
                        .query(&[("per_page", "100"), ("page", page_value.as_str())])
                })
                .await?;
            let chunk_len = chunk.len();
            rows.extend(chunk);
            if chunk_len < LIST_PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }

    pub(super) async fn create_issue_comment(
        &self,
        issue_number: u64,
        body: &str,
    ) -> Result<CommentCreateResponse, FetchError> {
        let payload = json!({ "body": body });
        self.request_json("create issue comment", || {
            self.http
                .post(format!(
                    "{}/repos/{}/{}/issues/{issue_number}/comments",
                    self.api_base, self.repo.owner, self.repo.name
                ))
                .json(&payload)
        })
        .await
    }

    pub(super) async fn add_issue_labels(
        &self,
        issue_number: u64,
        labels: &[String],
    ) -> Result<(), FetchError> {
        let payload = json!({ "labels": labels });
        let _ = self
            .execute_with_retries("add issue labels", || {
                self.http
                    .post(format!(
                        "{}/repos/{}/{}/issues/{issue_number}/labels",
                        self.api_base, self.repo.owner, self.repo.name
                    ))
                    .json(&payload)
            })
            .await?;
        Ok(())
    }

    /// Removes one label, percent-encoded into the path since configured
    /// names may carry separator bytes. Returns `Ok(false)` when the tracker
    /// answers 404, meaning the label was already absent.
    pub(super) async fn remove_issue_label(
        &self,
        issue_number: u64,
        label: &str,
    ) -> Result<bool, FetchError> {
        let encoded_label = percent_encode_path_segment(label);
        let result = self
            .execute_with_retries("remove issue label", || {
                self.http.delete(format!(
                    "{}/repos/{}/{}/issues/{issue_number}/labels/{encoded_label}",
                    self.api_base, self.repo.owner, self.repo.name
                ))
            })
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(FetchError::Status { status: 404, .. }) => Ok(false),
            Err(error) => Err(error),
        }
    }

    pub(super) async fn close_issue(&self, issue_number: u64) -> Result<(), FetchError> {
        let payload = json!({ "state": "closed" });
        let _ = self
            .execute_with_retries("close issue", || {
                self.http
                    .patch(format!(
                        "{}/repos/{}/{}/issues/{issue_number}",
                        self.api_base, self.repo.owner, self.repo.name
                    ))
                    .json(&payload)
            })
            .await?;
        Ok(())
    }

    /// Sends one request with bounded retries for rate limits, retryable
    /// statuses, and transient transport faults. 2xx and 304 pass through;
    /// everything else maps onto [`FetchError`] once attempts run out.
    async fn execute_with_retries<F>(
        &self,
        operation: &str,
        mut request_builder: F,
    ) -> Result<reqwest::Response, FetchError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = request_builder()
                .header("x-hive-retry-attempt", attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() || status == StatusCode::NOT_MODIFIED {
                        return Ok(response);
                    }

                    let rate_limited = is_rate_limited_response(status.as_u16(), response.headers());
                    let retry_after = parse_retry_after(response.headers());
                    if attempt < self.retry_max_attempts
                        && (rate_limited || is_retryable_status(status.as_u16()))
                    {
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    if rate_limited {
                        return Err(FetchError::RateLimited { retry_after });
                    }
                    let body = response.text().await.unwrap_or_default();
                    return Err(FetchError::Status {
                        operation: operation.to_string(),
                        status: status.as_u16(),
                        body: truncate_for_error(&body, 800),
                    });
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(FetchError::Transport(error));
                }
            }
        }
    }

    async fn request_json<T, F>(&self, operation: &str, request_builder: F) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.execute_with_retries(operation, request_builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|source| FetchError::Decode {
                operation: operation.to_string(),
                source,
            })
    }
}
