//! One HTTP round trip per call.
//!
//! [`Transport`] owns the `reqwest::Client`, the base URL and the headers
//! built from a [`ClientConfig`]. It sends JSON, decodes JSON, and turns every
//! non-2xx response into a classified [`SdkError`].

use crate::config::ClientConfig;
use crate::error::{classify, Result, SdkError};

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT,
};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::borrow::Cow;
use std::time::Duration;

pub use reqwest::Method;

const SDK_USER_AGENT: &str = concat!("superagent-rust/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
    timeout: Duration,
}

impl Transport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout())
            .build()?;
        Self::with_client(client, config)
    }

    /// Use a caller-supplied `reqwest::Client`. The configured timeout is still
    /// applied per request.
    pub fn with_client(client: reqwest::Client, config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            client,
            base_url: config.effective_base_url().to_string(),
            headers: build_headers(config)?,
            timeout: config.timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send one request and decode the JSON reply.
    ///
    /// An empty success body decodes to an empty object.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> Result<Value> {
        let url = self.url(path);
        tracing::debug!(%method, %url, "Sending request");

        let mut builder = self
            .client
            .request(method, &url)
            .headers(self.headers.clone())
            .timeout(self.timeout);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        tracing::debug!(status = status.as_u16(), body_len = text.len(), "Response received");

        if !status.is_success() {
            return Err(error_from_body(status, &text));
        }

        decode_body(&text)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_with_query(path, &[]).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let value = self.request(Method::GET, path, None, query).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = to_body(body)?;
        let value = self.request(Method::POST, path, Some(&body), &[]).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = to_body(body)?;
        let value = self.request(Method::PUT, path, Some(&body), &[]).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.request(Method::DELETE, path, None, &[]).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// POST a request that answers with `text/event-stream`.
    ///
    /// Returns the open response once a 2xx status arrives. The timeout covers
    /// waiting for the response head; reads of the body are timed by the decoder.
    pub async fn open_stream(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
        let url = self.url(path);
        tracing::debug!(%url, "Opening event stream");

        let send = self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .header(ACCEPT, "text/event-stream")
            .json(body)
            .send();

        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| {
                SdkError::timeout(format!(
                    "No response from {} within {}s",
                    url,
                    self.timeout.as_secs()
                ))
            })??;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error_from_body(status, &text));
        }

        Ok(response)
    }
}

fn build_headers(config: &ClientConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(SDK_USER_AGENT));

    for (raw_name, raw_value) in &config.default_headers {
        let name = HeaderName::from_bytes(raw_name.as_bytes()).map_err(|e| {
            SdkError::config(format!("Invalid header name '{raw_name}': {e}")).with_source(e)
        })?;
        let value = HeaderValue::from_str(raw_value).map_err(|e| {
            SdkError::config(format!("Invalid value for header '{raw_name}': {e}")).with_source(e)
        })?;
        headers.insert(name, value);
    }

    if let Some(key) = config.resolve_api_key() {
        let mut value = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| SdkError::config(format!("Invalid API key: {e}")).with_source(e))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}

pub(crate) fn to_body<B: Serialize + ?Sized>(body: &B) -> Result<Value> {
    serde_json::to_value(body).map_err(|e| {
        SdkError::validation(format!("Failed to serialize request body: {e}")).with_source(e)
    })
}

fn decode_body(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(text).map_err(|e| {
        SdkError::decode(format!("Invalid JSON in response body: {e}")).with_source(e)
    })
}

/// Classify an error response. Bodies that are not a JSON object are replaced
/// by `{"error": <reason phrase>}`.
fn error_from_body(status: StatusCode, text: &str) -> SdkError {
    let payload = serde_json::from_str::<Value>(text)
        .ok()
        .filter(Value::is_object)
        .unwrap_or_else(|| json!({ "error": status.canonical_reason().unwrap_or("HTTP error") }));

    tracing::warn!(status = status.as_u16(), "Service returned an error status");
    classify(status.as_u16(), payload)
}

/// Percent-encode an identifier for use as one URL path segment.
pub(crate) fn segment(id: &str) -> Cow<'_, str> {
    urlencoding::encode(id)
}

/// Pull `key` out of a JSON envelope. Missing or `null` gives the default.
pub(crate) fn take_field<T>(mut envelope: Value, key: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match envelope.get_mut(key).map(Value::take) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}
