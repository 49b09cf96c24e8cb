use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use shared_config::AppConfig;

/// A request against the clinic API, independent of the credentials used to
/// send it so the same request can be replayed after a token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Raw response: status plus the decoded JSON body (`Value::Null` when the
/// body was empty, `Value::String` when it was not JSON).
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status == StatusCode::OK
    }

    /// Both 401 and 403 mean the access token needs refreshing.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
    }

    /// Decodes the `result` member of the success envelope.
    pub fn result<T: DeserializeOwned>(&self) -> Result<T> {
        let result = self
            .body
            .get("result")
            .cloned()
            .ok_or_else(|| anyhow!("Response ({}) has no result field", self.status))?;

        Ok(serde_json::from_value(result)?)
    }

    /// Server-reported message from the error envelope, if any.
    pub fn error_message(&self) -> Option<String> {
        match self.body.get("error") {
            Some(Value::String(message)) => Some(message.clone()),
            Some(Value::Object(obj)) => obj
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    }
}

pub struct ClinicApiClient {
    client: Client,
    base_url: String,
}

impl ClinicApiClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client ({}), requests will not time out", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.clinic_api_url.trim_end_matches('/').to_string(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| anyhow!("Invalid access token header: {}", e))?,
            );
        }

        Ok(headers)
    }

    /// Sends the request and returns whatever status came back. Only
    /// transport failures are errors; HTTP error statuses are left for the
    /// caller to interpret.
    pub async fn send(&self, request: &ApiRequest, auth_token: Option<&str>) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!("Making {} request to {}", request.method, url);

        let headers = self.get_headers(auth_token)?;

        let mut req = self
            .client
            .request(request.method.clone(), &url)
            .headers(headers);

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }

        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if !status.is_success() {
            warn!("API error ({}) from {}: {}", status, request.path, body);
        }

        Ok(ApiResponse { status, body })
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
