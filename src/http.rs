use crate::auth::Token;
use crate::error::FtmError;
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Transport settings shared by every request of a dispatch.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Accept invalid or self-signed certificates. The token and feature
    /// endpoints of the internal environments use self-signed certificates,
    /// so this is on unless the operator turns it off.
    pub insecure_skip_verify: bool,
    pub timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            insecure_skip_verify: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

pub fn build_client(settings: &HttpSettings) -> Result<reqwest::Client, FtmError> {
    if settings.insecure_skip_verify {
        tracing::warn!("TLS certificate verification is disabled (http.insecure_skip_verify)");
    }

    reqwest::Client::builder()
        .timeout(settings.timeout)
        .danger_accept_invalid_certs(settings.insecure_skip_verify)
        .build()
        .map_err(FtmError::Client)
}

/// Successful response of the feature API.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    fn parse(body: String) -> Self {
        if body.trim().is_empty() {
            return ResponseBody::Text(body);
        }
        match serde_json::from_str(&body) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(body),
        }
    }
}

impl fmt::Display for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Json(value) => write!(f, "{}", value),
            ResponseBody::Text(text) if text.trim().is_empty() => f.write_str("(empty response)"),
            ResponseBody::Text(text) => f.write_str(text),
        }
    }
}

/// Send one authenticated request to the feature API.
///
/// Only POST, PUT and DELETE are allowed; any other method fails with
/// [`FtmError::UnsupportedMethod`] before a request is made.
pub async fn execute(
    client: &reqwest::Client,
    method: Method,
    url: &str,
    token: &Token,
    body: Option<&Value>,
) -> Result<ResponseBody, FtmError> {
    let mut request = match method {
        Method::POST => client.post(url),
        Method::PUT => client.put(url),
        Method::DELETE => client.delete(url),
        other => return Err(FtmError::UnsupportedMethod(other.to_string())),
    };

    request = request.bearer_auth(token.as_str()).header(ACCEPT, "*/*");
    if let Some(body) = body {
        // also sets Content-Type: application/json
        request = request.json(body);
    }

    let response = request
        .send()
        .await
        .map_err(|e| FtmError::transport(format!("{} {}", method, url), e))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| FtmError::transport(format!("reading response of {} {}", method, url), e))?;

    if !status.is_success() {
        return Err(FtmError::HttpRequestFailed {
            method: method.to_string(),
            url: url.to_string(),
            status: status.as_u16(),
            body: text,
        });
    }

    Ok(ResponseBody::parse(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_body_prefers_json() {
        assert_eq!(
            ResponseBody::parse(r#"{"id":"a.b.c","enabled":true}"#.to_string()),
            ResponseBody::Json(json!({"id": "a.b.c", "enabled": true}))
        );
        assert_eq!(
            ResponseBody::parse("Feature deleted".to_string()),
            ResponseBody::Text("Feature deleted".to_string())
        );
        assert_eq!(
            ResponseBody::parse(String::new()),
            ResponseBody::Text(String::new())
        );
    }

    #[test]
    fn test_response_body_display() {
        assert_eq!(
            ResponseBody::Json(json!({"ok": true})).to_string(),
            r#"{"ok":true}"#
        );
        assert_eq!(
            ResponseBody::Text(String::new()).to_string(),
            "(empty response)"
        );
    }

    #[tokio::test]
    async fn test_unsupported_method_is_rejected_before_io() {
        let client = reqwest::Client::new();
        // Nothing listens here; reaching the network would produce a transport error instead.
        let result = execute(
            &client,
            Method::GET,
            "http://127.0.0.1:9/feature",
            &Token::new("t"),
            None,
        )
        .await;

        match result {
            Err(FtmError::UnsupportedMethod(method)) => assert_eq!(method, "GET"),
            other => panic!("expected UnsupportedMethod, got {:?}", other),
        }
    }
}
