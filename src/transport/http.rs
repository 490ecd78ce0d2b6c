use log::{ debug, error, warn };
use reqwest::{ Client as HttpClient, RequestBuilder, Response, StatusCode };
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use crate::auth::AuthToken;
use crate::config::ClientConfig;
use crate::models::api::{ ChatResponse, Reply };
use crate::models::websocket::ChatRequest;
use super::TransportError;

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_decode() {
            TransportError::Protocol(err.to_string())
        } else {
            TransportError::NetworkUnreachable(err.to_string())
        }
    }
}

pub(crate) fn build_http_client(config: &ClientConfig) -> Result<HttpClient, TransportError> {
    HttpClient::builder()
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(|e| TransportError::NetworkUnreachable(format!("Failed to build HTTP client: {}", e)))
}

pub(crate) async fn authorize(req: RequestBuilder, token: &AuthToken) -> RequestBuilder {
    match token.bearer().await {
        Some(bearer) => req.header(AUTHORIZATION, bearer),
        None => req,
    }
}

/// Turns a non-2xx response into a `ServerError`, unwrapping `{"detail": ...}`
/// bodies. A 401 evicts the session token.
pub(crate) async fn failure_from_response(resp: Response, token: &AuthToken) -> TransportError {
    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED {
        token.evict().await;
    }
    let raw = match resp.text().await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Failed to read {} response body: {}", status, e);
            String::new()
        }
    };
    let body = error_detail(&raw).unwrap_or(raw);
    error!("Server answered {}: {}", status, body);
    TransportError::ServerError { status: status.as_u16(), body }
}

fn error_detail(raw: &str) -> Option<String> {
    let value: JsonValue = serde_json::from_str(raw).ok()?;
    match value.get("detail")? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Object(obj) => obj.get("message").and_then(JsonValue::as_str).map(str::to_string),
        _ => None,
    }
}

pub(crate) async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, TransportError> {
    let text = resp.text().await?;
    serde_json
        ::from_str(&text)
        .map_err(|e| TransportError::Protocol(format!("unexpected response body: {}", e)))
}

pub struct HttpTransport {
    http: HttpClient,
    chat_url: String,
    token: AuthToken,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig, token: AuthToken) -> Result<Self, TransportError> {
        Ok(Self {
            http: build_http_client(config)?,
            chat_url: config.endpoint("/chat"),
            token,
        })
    }

    /// One round trip to `POST /chat`; never retried here.
    pub async fn send_once(&self, request: &ChatRequest) -> Result<Reply, TransportError> {
        debug!(
            "POST {} ({} history entries)",
            self.chat_url,
            request.chat_history.len()
        );
        let req = authorize(self.http.post(&self.chat_url).json(request), &self.token).await;
        let resp = req.send().await.map_err(|e| {
            warn!("Chat request failed: {}", e);
            TransportError::from(e)
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(failure_from_response(resp, &self.token).await);
        }

        let body: ChatResponse = read_json(resp).await?;
        body.into_reply(status.as_u16())
    }
}
