use std::sync::Arc;
use std::time::Instant;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::query::{parse_content_range, Query};
use super::RestError;
use crate::auth::AuthClient;
use crate::config::BackendConfig;
use crate::logging;

/// Error body returned by the data API.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

/// Client for the data API.
///
/// Requests carry the access token of the current session, or the anon key
/// when signed out; row-level security on the backend decides the rest.
pub struct RestClient {
    http_client: Client,
    base_url: String,
    anon_key: String,
    auth: Arc<AuthClient>,
}

impl RestClient {
    pub fn new(http_client: Client, backend: &BackendConfig, auth: Arc<AuthClient>) -> Self {
        Self {
            http_client,
            base_url: format!("{}/rest/v1", backend.url.trim_end_matches('/')),
            anon_key: backend.anon_key.clone(),
            auth,
        }
    }

    /// Rows matching `query`.
    pub async fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>, RestError> {
        let builder = self
            .request(Method::GET, query.table_name())
            .await?
            .query(&query.to_pairs());

        let response = self.send(Method::GET, query.table_name(), builder).await?;
        response
            .json()
            .await
            .map_err(|e| RestError::InvalidResponse(e.to_string()))
    }

    /// The single row matching `query`, `None` when there is none.
    pub async fn select_maybe_single<T: DeserializeOwned>(
        &self,
        query: &Query,
    ) -> Result<Option<T>, RestError> {
        let mut rows: Vec<T> = self.select(&query.clone().limit(2)).await?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            n => Err(RestError::MultipleRows(n)),
        }
    }

    /// Number of rows matching `query`, without transferring them.
    pub async fn count(&self, query: &Query) -> Result<u64, RestError> {
        let builder = self
            .request(Method::HEAD, query.table_name())
            .await?
            .header("Prefer", "count=exact")
            .query(&query.filter_pairs());

        let response = self.send(Method::HEAD, query.table_name(), builder).await?;
        let range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| RestError::InvalidResponse("missing Content-Range header".to_string()))?;

        parse_content_range(range)
            .ok_or_else(|| RestError::InvalidResponse(format!("unparseable Content-Range: {}", range)))
    }

    /// Insert one row (a struct) or many (a slice).
    pub async fn insert<B: Serialize + ?Sized>(&self, table: &str, rows: &B) -> Result<(), RestError> {
        let builder = self
            .request(Method::POST, table)
            .await?
            .header("Prefer", "return=minimal")
            .json(rows);

        self.send(Method::POST, table, builder).await?;
        Ok(())
    }

    /// Insert rows, merging into existing ones on primary-key conflict.
    pub async fn upsert<B: Serialize + ?Sized>(&self, table: &str, rows: &B) -> Result<(), RestError> {
        let builder = self
            .request(Method::POST, table)
            .await?
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows);

        self.send(Method::POST, table, builder).await?;
        Ok(())
    }

    /// Apply `patch` to the rows selected by the filters of `query`.
    pub async fn update<B: Serialize + ?Sized>(&self, query: &Query, patch: &B) -> Result<(), RestError> {
        if !query.has_filters() {
            return Err(RestError::UnfilteredMutation("update"));
        }

        let builder = self
            .request(Method::PATCH, query.table_name())
            .await?
            .header("Prefer", "return=minimal")
            .query(&query.filter_pairs())
            .json(patch);

        self.send(Method::PATCH, query.table_name(), builder).await?;
        Ok(())
    }

    /// Delete the rows selected by the filters of `query`.
    pub async fn delete(&self, query: &Query) -> Result<(), RestError> {
        if !query.has_filters() {
            return Err(RestError::UnfilteredMutation("delete"));
        }

        let builder = self
            .request(Method::DELETE, query.table_name())
            .await?
            .header("Prefer", "return=minimal")
            .query(&query.filter_pairs());

        self.send(Method::DELETE, query.table_name(), builder).await?;
        Ok(())
    }

    async fn request(&self, method: Method, table: &str) -> Result<RequestBuilder, RestError> {
        let token = self
            .auth
            .access_token()
            .await?
            .unwrap_or_else(|| self.anon_key.clone());

        Ok(self
            .http_client
            .request(method, format!("{}/{}", self.base_url, table))
            .header("apikey", &self.anon_key)
            .bearer_auth(token))
    }

    async fn send(
        &self,
        method: Method,
        table: &str,
        builder: RequestBuilder,
    ) -> Result<Response, RestError> {
        let started = Instant::now();
        let path = format!("/rest/v1/{}", table);

        let response = builder.send().await.map_err(|e| {
            logging::backend_call(method.as_str(), &path, None, started);
            RestError::RequestFailed(e.to_string())
        })?;

        let status = response.status();
        logging::backend_call(method.as_str(), &path, Some(status.as_u16()), started);

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
            if let Some(details) = body.details.as_deref().or(body.hint.as_deref()) {
                tracing::debug!("Backend error detail on {}: {}", table, details);
            }
            let message = body
                .message
                .unwrap_or_else(|| format!("{}: {}", status, text));
            return Err(RestError::Api {
                status: status.as_u16(),
                code: body.code,
                message,
            });
        }

        Ok(response)
    }
}
