use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::try_join_all;
use metrics::{counter, histogram};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use cohort_api_types::{FriendIds, ListRecord, UserRecord, UserRef};

use crate::application::graph::{GraphError, SocialGraph};
use crate::cache::{CachedResponse, ResponseCache};

use super::config::ApiConfig;
use super::credentials::Credentials;
use super::error::ApiError;

const METRIC_API_REQUEST: &str = "cohort_api_request_total";
const METRIC_API_LATENCY: &str = "cohort_api_request_ms";

/// Maximum ids per `users/lookup` and `lists/members/create_all` request.
pub const ID_CHUNK: usize = 100;
/// Remote limit on list names, in characters.
pub const LIST_NAME_LIMIT: usize = 25;

/// REST client for the social graph API, optionally backed by a response cache.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    root: Url,
    credentials: Option<Credentials>,
    cache: Option<Arc<ResponseCache>>,
    persist_errors: bool,
}

impl RestClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(config.timeout)
            .build()
            .map_err(|source| ApiError::Transport {
                url: config.root.to_string(),
                source,
            })?;
        Ok(Self {
            http,
            root: config.root.clone(),
            credentials: config.credentials.clone(),
            cache: None,
            persist_errors: false,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("cohort/", env!("CARGO_PKG_VERSION"))
    }

    /// Serve repeated GETs from `cache`. Error responses are stored only
    /// when `persist_errors` is set.
    pub fn with_cache(mut self, cache: Arc<ResponseCache>, persist_errors: bool) -> Self {
        self.cache = Some(cache);
        self.persist_errors = persist_errors;
        self
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Issue `method` against `path` and return the response body.
    ///
    /// GET parameters travel in the query string, anything else as a form body.
    /// Only GET responses are read from or written to the cache.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<String, ApiError> {
        let url = self.root.join(path)?;
        self.call_at(method, url, params).await
    }

    /// Drop the cached response for a GET of `path` with `params`.
    pub async fn forget(&self, path: &str, params: &[(&str, String)]) -> Result<(), ApiError> {
        let url = self.root.join(path)?;
        if let Some(cache) = &self.cache {
            cache.delete(self.cache_key(&url, params).as_slice()).await;
        }
        Ok(())
    }

    async fn call_at(
        &self,
        method: Method,
        url: Url,
        params: &[(&str, String)],
    ) -> Result<String, ApiError> {
        let cacheable = method == Method::GET;
        let key = cacheable.then(|| self.cache_key(&url, params));

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(hit) = cache.fetch(key.as_slice()).await {
                debug!(
                    target = "cohort::api",
                    op = "api::call",
                    result = "cache_hit",
                    url = %url,
                    status = hit.status,
                    "Serving cached response"
                );
                return replay(&url, hit);
            }
        }

        let started_at = Instant::now();
        let response = self.send(method.clone(), url.clone(), params).await;
        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        counter!(METRIC_API_REQUEST, "method" => method.as_str().to_owned()).increment(1);
        histogram!(METRIC_API_LATENCY).record(elapsed_ms as f64);

        let response = response.map_err(|source| {
            warn!(
                target = "cohort::api",
                op = "api::call",
                result = "transport_error",
                url = %url,
                elapsed_ms,
                error = %source,
                "Remote call failed before a response arrived"
            );
            ApiError::Transport {
                url: url.to_string(),
                source,
            }
        })?;
        let snapshot = snapshot(&url, response).await?;
        let outcome = if snapshot.is_success() { "ok" } else { "rejected" };

        info!(
            target = "cohort::api",
            op = "api::call",
            result = outcome,
            method = %method,
            url = %url,
            status = snapshot.status,
            elapsed_ms,
            "Remote call completed"
        );

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if snapshot.is_success() || self.persist_errors {
                if let Err(err) = cache.store(key.as_slice(), snapshot.clone()).await {
                    warn!(
                        target = "cohort::api",
                        op = "api::call",
                        result = "cache_write_error",
                        url = %url,
                        error = %err,
                        "Failed to cache response"
                    );
                }
            }
        }

        replay(&url, snapshot)
    }

    pub async fn following(&self, user: &UserRef) -> Result<Vec<u64>, ApiError> {
        let params = [("cursor", "-1".to_owned()), user.query_pair()];
        let page: FriendIds = self.call_json(Method::GET, "friends/ids.json", &params).await?;
        Ok(page.ids)
    }

    /// Look up `ids` in chunks of [`ID_CHUNK`], concatenated in chunk order.
    pub async fn user_details(&self, ids: &[u64]) -> Result<Vec<UserRecord>, ApiError> {
        let lookups = ids.chunks(ID_CHUNK).map(|chunk| async move {
            let params = [("user_id", join_ids(chunk))];
            self.call_json::<Vec<UserRecord>>(Method::GET, "users/lookup.json", &params)
                .await
        });
        let chunks = try_join_all(lookups).await?;
        Ok(chunks.into_iter().flatten().collect())
    }

    /// Create a list named `name` (truncated to [`LIST_NAME_LIMIT`]) and add `member_ids` to it.
    pub async fn create_list(
        &self,
        name: &str,
        description: &str,
        member_ids: &[u64],
    ) -> Result<ListRecord, ApiError> {
        if self.credentials.is_none() {
            return Err(ApiError::configuration(
                "creating lists requires an access token and secret",
            ));
        }

        let name: String = name.chars().take(LIST_NAME_LIMIT).collect();
        let params = [("name", name), ("description", description.to_owned())];
        let list: ListRecord = self
            .call_json(Method::POST, "lists/create.json", &params)
            .await?;

        for chunk in member_ids.chunks(ID_CHUNK) {
            let params = [
                ("list_id", list.id_str.clone()),
                ("user_id", join_ids(chunk)),
            ];
            self.call(Method::POST, "lists/members/create_all.json", &params)
                .await?;
        }

        info!(
            target = "cohort::api",
            op = "api::create_list",
            result = "ok",
            list_id = %list.id_str,
            members = member_ids.len(),
            "List created"
        );
        Ok(list)
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.root.join(path)?;
        let body = self.call_at(method, url.clone(), params).await?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    async fn send(
        &self,
        method: Method,
        mut url: Url,
        params: &[(&str, String)],
    ) -> Result<Response, reqwest::Error> {
        let mut request = if method == Method::GET {
            {
                let mut query = url.query_pairs_mut();
                for (key, value) in params {
                    query.append_pair(key, value);
                }
            }
            self.http.request(method, url)
        } else {
            let body = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
                .finish();
            self.http
                .request(method, url)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(body)
        };

        if let Some(credentials) = &self.credentials {
            // A malformed token cannot be sent; the remote side reports it as unauthorized.
            match credentials.auth_header() {
                Ok(value) => request = request.header(AUTHORIZATION, value),
                Err(err) => warn!(
                    target = "cohort::api",
                    op = "api::send",
                    result = "skipped_auth",
                    error = %err,
                    "Access token is not a valid header value"
                ),
            }
        }

        request.send().await
    }

    fn cache_key(&self, url: &Url, params: &[(&str, String)]) -> Vec<String> {
        let sorted: BTreeMap<&str, &str> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let canonical = serde_json::to_string(&sorted).unwrap_or_default();
        let mut key = vec![url.to_string(), canonical];
        if let Some(credentials) = &self.credentials {
            key.extend(credentials.key_parts().iter().map(|part| (*part).to_owned()));
        }
        key
    }
}

async fn snapshot(url: &Url, response: Response) -> Result<CachedResponse, ApiError> {
    let status = response.status().as_u16();
    let headers = header_pairs(response.headers());
    let encoding = charset(response.headers());
    let body = response.text().await.map_err(|source| ApiError::Transport {
        url: url.to_string(),
        source,
    })?;
    Ok(CachedResponse {
        status,
        headers,
        encoding,
        body,
    })
}

fn replay(url: &Url, response: CachedResponse) -> Result<String, ApiError> {
    if response.is_success() {
        Ok(response.body)
    } else {
        Err(ApiError::RemoteCall {
            url: url.to_string(),
            status: response.status,
            body: response.body,
        })
    }
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_owned(), value.to_owned()))
        })
        .collect()
}

fn charset(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    content_type.split(';').find_map(|part| {
        part.trim()
            .strip_prefix("charset=")
            .map(|value| value.trim_matches('"').to_ascii_lowercase())
    })
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl SocialGraph for RestClient {
    async fn following(&self, user: &UserRef) -> Result<Vec<u64>, GraphError> {
        RestClient::following(self, user).await.map_err(Into::into)
    }

    async fn user_details(&self, ids: &[u64]) -> Result<Vec<UserRecord>, GraphError> {
        RestClient::user_details(self, ids)
            .await
            .map_err(Into::into)
    }
}
