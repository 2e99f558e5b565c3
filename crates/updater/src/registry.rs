//! Registry tag listing.
//!
//! [`RegistryClient`] is the one registry capability the resolver needs.
//! [`HttpRegistryClient`] implements it over the OCI distribution API:
//!
//! - `GET /v2/<path>/tags/list`, following `Link: <...>; rel="next"` pages
//! - a `401` with a `WWW-Authenticate: Bearer` challenge is answered with an
//!   anonymous token from the advertised realm, then the request is retried
//!
//! Credentials are not managed here; private repositories surface as
//! `RegistryUnavailable` and the container falls back to digest updates.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::UpdaterError;
use crate::reference::ImageReference;

/// Upper bound on followed `Link` pages for one listing.
const MAX_PAGES: usize = 50;

/// Page size requested from the registry.
const PAGE_SIZE: usize = 1000;

/// Trait abstracting the registry API.
///
/// Implementations must be cheap to share behind an `Arc`; the scheduler
/// holds one for the lifetime of the daemon.
pub trait RegistryClient: Send + Sync + 'static {
    /// Lists every tag of the reference's repository.
    ///
    /// # Errors
    ///
    /// `RegistryUnavailable` when the registry cannot be reached, rejects
    /// the request, or answers with something that is not a tag list.
    fn list_tags(
        &self,
        reference: &ImageReference,
    ) -> impl Future<Output = Result<Vec<String>, UpdaterError>> + Send;
}

/// Tag list response body.
#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Token endpoint response body. Registries disagree on the field name.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Parameters of a `WWW-Authenticate: Bearer` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BearerChallenge {
    realm: String,
    service: Option<String>,
    scope: Option<String>,
}

/// Production registry client using `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    client: Client,
}

impl HttpRegistryClient {
    /// Creates a client whose individual requests time out after `request_timeout`.
    ///
    /// # Errors
    ///
    /// Returns `UpdaterError::Config` if the TLS backend cannot be initialised.
    pub fn new(request_timeout: Duration) -> Result<Self, UpdaterError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("orbitd/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpdaterError::Config {
                field: "registry".to_owned(),
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { client })
    }

    async fn get(
        &self,
        url: &str,
        token: Option<&str>,
        repository: &str,
    ) -> Result<reqwest::Response, UpdaterError> {
        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.map_err(|e| unavailable(repository, format!("request failed: {e}")))
    }

    async fn fetch_token(
        &self,
        challenge: &BearerChallenge,
        reference: &ImageReference,
    ) -> Result<String, UpdaterError> {
        let repository = reference.repository_path();
        let scope = challenge
            .scope
            .clone()
            .unwrap_or_else(|| format!("repository:{repository}:pull"));

        let mut query = vec![("scope", scope)];
        if let Some(service) = &challenge.service {
            query.push(("service", service.clone()));
        }

        debug!(realm = %challenge.realm, repository, "requesting anonymous registry token");

        let response = self
            .client
            .get(&challenge.realm)
            .query(&query)
            .send()
            .await
            .map_err(|e| unavailable(repository, format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(unavailable(
                repository,
                format!("token endpoint returned {}", response.status()),
            ));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| unavailable(repository, format!("invalid token response: {e}")))?;

        body.token
            .or(body.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| unavailable(repository, "token response carried no token".to_owned()))
    }
}

impl RegistryClient for HttpRegistryClient {
    async fn list_tags(&self, reference: &ImageReference) -> Result<Vec<String>, UpdaterError> {
        let repository = reference.repository_path();
        let base = base_url(reference.registry_host());
        let mut url = format!("{base}/v2/{repository}/tags/list?n={PAGE_SIZE}");
        let mut token: Option<String> = None;
        let mut tags = Vec::new();

        for _ in 0..MAX_PAGES {
            let mut response = self.get(&url, token.as_deref(), repository).await?;

            if response.status() == StatusCode::UNAUTHORIZED && token.is_none() {
                let challenge = response
                    .headers()
                    .get(header::WWW_AUTHENTICATE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_bearer_challenge)
                    .ok_or_else(|| {
                        unavailable(repository, "authentication required".to_owned())
                    })?;
                token = Some(self.fetch_token(&challenge, reference).await?);
                response = self.get(&url, token.as_deref(), repository).await?;
            }

            match response.status() {
                StatusCode::OK => {}
                StatusCode::NOT_FOUND => {
                    return Err(unavailable(repository, "repository not found".to_owned()));
                }
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(unavailable(repository, "access denied".to_owned()));
                }
                status => {
                    return Err(unavailable(repository, format!("unexpected status {status}")));
                }
            }

            let next = response
                .headers()
                .get(header::LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_next_link);

            let page: TagList = response
                .json()
                .await
                .map_err(|e| unavailable(repository, format!("invalid tag list: {e}")))?;
            tags.extend(page.tags.unwrap_or_default());

            match next {
                Some(link) => url = absolute_link(&base, &link),
                None => {
                    debug!(repository, count = tags.len(), "listed registry tags");
                    return Ok(tags);
                }
            }
        }

        warn!(repository, pages = MAX_PAGES, "tag listing truncated at page limit");
        Ok(tags)
    }
}

fn unavailable(repository: &str, reason: String) -> UpdaterError {
    UpdaterError::RegistryUnavailable {
        repository: repository.to_owned(),
        reason,
    }
}

/// Loopback registries are assumed to speak plain HTTP.
fn base_url(host: &str) -> String {
    let hostname = match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    };
    let scheme = match hostname {
        "localhost" | "127.0.0.1" | "[::1]" => "http",
        _ => "https",
    };
    format!("{scheme}://{host}")
}

fn absolute_link(base: &str, link: &str) -> String {
    if link.starts_with("http://") || link.starts_with("https://") {
        link.to_owned()
    } else {
        format!("{base}{link}")
    }
}

/// Extracts the target of the `rel="next"` entry of a `Link` header.
fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let (target, params) = entry.trim().split_once(';')?;
        let is_next = params.split(';').any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        if !is_next {
            return None;
        }
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        Some(target.to_owned())
    })
}

/// Parses `Bearer realm="...",service="...",scope="..."`.
fn parse_bearer_challenge(header: &str) -> Option<BearerChallenge> {
    let (scheme, params) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let mut realm = None;
    let mut service = None;
    let mut scope = None;

    let mut rest = params.trim();
    while !rest.is_empty() {
        let (key, after_key) = rest.split_once('=')?;
        let key = key.trim().to_ascii_lowercase();
        let after_key = after_key.trim_start();

        // Quoted values may contain commas (`scope="repository:a:pull,push"`).
        let (value, remainder) = match after_key.strip_prefix('"') {
            Some(quoted) => {
                let end = quoted.find('"')?;
                (&quoted[..end], &quoted[end + 1..])
            }
            None => match after_key.find(',') {
                Some(end) => (&after_key[..end], &after_key[end..]),
                None => (after_key, ""),
            },
        };

        match key.as_str() {
            "realm" => realm = Some(value.to_owned()),
            "service" => service = Some(value.to_owned()),
            "scope" => scope = Some(value.to_owned()),
            _ => {}
        }

        rest = remainder.trim_start().trim_start_matches(',').trim_start();
    }

    Some(BearerChallenge {
        realm: realm.filter(|r| !r.is_empty())?,
        service,
        scope,
    })
}

/// Mock registry client for unit tests.
#[cfg(test)]
#[derive(Default)]
pub struct MockRegistryClient {
    tags: std::collections::HashMap<String, Vec<String>>,
    fail: bool,
    delay: Option<Duration>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockRegistryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the tags of a repository path (`library/myapp`).
    pub fn with_tags(mut self, repository: &str, tags: &[&str]) -> Self {
        self.tags.insert(
            repository.to_owned(),
            tags.iter().map(|t| (*t).to_owned()).collect(),
        );
        self
    }

    /// Every listing fails with `RegistryUnavailable`.
    pub fn with_failure(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Every listing sleeps before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl RegistryClient for MockRegistryClient {
    async fn list_tags(&self, reference: &ImageReference) -> Result<Vec<String>, UpdaterError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(unavailable(reference.repository_path(), "mock failure".to_owned()));
        }
        self.tags
            .get(reference.repository_path())
            .cloned()
            .ok_or_else(|| unavailable(reference.repository_path(), "repository not found".to_owned()))
    }
}
